//! Byte sources feeding the merge.
//!
//! A [`ByteSource`] describes where bytes come from. It is opened on the
//! producer thread that drains it, so a slow or failing open never blocks
//! registration of other sources. Opening yields a [`ByteReader`], which
//! hands out one byte at a time and reports exhaustion as `Ok(None)`.

mod io;
mod mock;
mod source_id;

pub use io::IoReader;
pub use mock::MockSource;
pub use source_id::SourceId;

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::sync::Arc;

use crate::SourceError;

/// A lazily opened, possibly infinite sequence of bytes.
///
/// Implementations are driven from a single producer thread, so they only
/// need to be `Send`.
///
/// # Example
///
/// ```
/// use stream_merge::source::ByteReader;
/// use stream_merge::SourceError;
///
/// /// Counts down from `n` to 1, then ends.
/// struct Countdown(u8);
///
/// impl ByteReader for Countdown {
///     fn next_byte(&mut self) -> Result<Option<u8>, SourceError> {
///         if self.0 == 0 {
///             return Ok(None);
///         }
///         self.0 -= 1;
///         Ok(Some(self.0 + 1))
///     }
/// }
/// ```
pub trait ByteReader: Send {
    /// Returns the next byte, or `Ok(None)` once the source is exhausted.
    ///
    /// After `Ok(None)` or an error the reader is not called again.
    fn next_byte(&mut self) -> Result<Option<u8>, SourceError>;
}

impl<R: ByteReader + ?Sized> ByteReader for Box<R> {
    fn next_byte(&mut self) -> Result<Option<u8>, SourceError> {
        (**self).next_byte()
    }
}

type Opener = Box<dyn FnOnce() -> Result<Box<dyn ByteReader>, SourceError> + Send>;

/// Where a registered source reads from.
pub(crate) enum SourceKind {
    /// A file opened on the producer thread.
    File(PathBuf),
    /// Any reader, e.g. stdin or a pipe.
    Reader(Box<dyn Read + Send>),
    /// Bytes held in memory.
    Bytes(Arc<[u8]>),
    /// A scripted source for tests and demos.
    Mock(MockSource),
    /// A user-supplied opener.
    Custom(Opener),
}

/// Describes a source to register with a [`Merger`](crate::Merger).
///
/// # Example
///
/// ```
/// use stream_merge::source::{ByteSource, MockSource};
///
/// let file = ByteSource::file("input-1.txt");
/// let memory = ByteSource::bytes(b"hello".to_vec());
/// let endless = ByteSource::mock(MockSource::repeating(b"y\n".to_vec()));
/// # let _ = (file, memory, endless);
/// ```
pub struct ByteSource {
    pub(crate) kind: SourceKind,
}

impl ByteSource {
    /// A file, opened when its producer starts.
    ///
    /// A missing or unreadable file is reported as
    /// [`SourceError::FileOpen`] for this source only.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: SourceKind::File(path.into()),
        }
    }

    /// Any `Read` implementation, buffered internally.
    pub fn reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            kind: SourceKind::Reader(Box::new(reader)),
        }
    }

    /// A fixed sequence of bytes.
    pub fn bytes(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            kind: SourceKind::Bytes(data.into()),
        }
    }

    /// A scripted [`MockSource`].
    pub fn mock(mock: MockSource) -> Self {
        Self {
            kind: SourceKind::Mock(mock),
        }
    }

    /// A custom source, opened on the producer thread.
    ///
    /// An `Err` from `open` is recorded as this source's failure.
    pub fn custom<F, R>(open: F) -> Self
    where
        F: FnOnce() -> Result<R, SourceError> + Send + 'static,
        R: ByteReader + 'static,
    {
        Self {
            kind: SourceKind::Custom(Box::new(move || {
                open().map(|reader| Box::new(reader) as Box<dyn ByteReader>)
            })),
        }
    }

    /// Opens the source. Runs on the producer thread.
    pub(crate) fn open(self) -> Result<Box<dyn ByteReader>, SourceError> {
        match self.kind {
            SourceKind::File(path) => {
                let file = File::open(&path).map_err(|e| SourceError::file_open(&path, e))?;
                Ok(Box::new(IoReader::new(BufReader::new(file))))
            }
            SourceKind::Reader(reader) => Ok(Box::new(IoReader::new(BufReader::new(reader)))),
            SourceKind::Bytes(data) => Ok(Box::new(IoReader::new(std::io::Cursor::new(data)))),
            SourceKind::Mock(mock) => mock.open(),
            SourceKind::Custom(open) => open(),
        }
    }
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SourceKind::File(path) => f.debug_tuple("File").field(path).finish(),
            SourceKind::Reader(_) => f.write_str("Reader"),
            SourceKind::Bytes(data) => f.debug_struct("Bytes").field("len", &data.len()).finish(),
            SourceKind::Mock(mock) => f.debug_tuple("Mock").field(mock).finish(),
            SourceKind::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl From<MockSource> for ByteSource {
    fn from(mock: MockSource) -> Self {
        Self::mock(mock)
    }
}
