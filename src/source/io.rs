//! Byte reader over `std::io` types.

use std::io::{BufRead, ErrorKind};

use crate::source::ByteReader;
use crate::SourceError;

/// Adapts any [`BufRead`] into a [`ByteReader`].
///
/// Bytes are taken from the reader's internal buffer, so reading one byte
/// at a time costs one syscall per buffer refill, not per byte.
/// Interrupted reads are retried.
pub struct IoReader<R> {
    inner: R,
}

impl<R: BufRead + Send> IoReader<R> {
    /// Wraps a buffered reader.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Returns the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: BufRead + Send> ByteReader for IoReader<R> {
    fn next_byte(&mut self) -> Result<Option<u8>, SourceError> {
        loop {
            match self.inner.fill_buf() {
                Ok([]) => return Ok(None),
                Ok(buf) => {
                    let byte = buf[0];
                    self.inner.consume(1);
                    return Ok(Some(byte));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
