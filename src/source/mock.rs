//! Scripted byte source for testing without files.

use std::time::Duration;

use crate::source::ByteReader;
use crate::SourceError;

/// A scripted source that replays bytes and can inject failures.
///
/// This allows exercising the whole pipeline, including open failures,
/// mid-stream read errors, slow sources and sources with no end, without
/// touching the filesystem.
///
/// # Example
///
/// ```
/// use stream_merge::source::MockSource;
///
/// // Three bytes, then a read error.
/// let flaky = MockSource::new(b"abc".to_vec()).fail_after(3, "device unplugged");
///
/// // "xy" repeated forever; only stops when cancelled.
/// let endless = MockSource::repeating(b"xy".to_vec());
/// # let _ = (flaky, endless);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    data: Vec<u8>,
    repeat: bool,
    open_error: Option<String>,
    read_error: Option<(u64, String)>,
    read_delay: Option<Duration>,
}

impl MockSource {
    /// A source that yields `data` once, then ends.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// A source that yields `pattern` over and over and never ends.
    ///
    /// An empty pattern is treated as a single zero byte.
    pub fn repeating(pattern: impl Into<Vec<u8>>) -> Self {
        let mut data = pattern.into();
        if data.is_empty() {
            data.push(0);
        }
        Self {
            data,
            repeat: true,
            ..Self::default()
        }
    }

    /// Makes opening the source fail with the given reason.
    #[must_use]
    pub fn fail_to_open(mut self, reason: impl Into<String>) -> Self {
        self.open_error = Some(reason.into());
        self
    }

    /// Makes the read after `bytes` successful reads fail.
    #[must_use]
    pub fn fail_after(mut self, bytes: u64, reason: impl Into<String>) -> Self {
        self.read_error = Some((bytes, reason.into()));
        self
    }

    /// Sleeps for `delay` before every read, simulating a slow device.
    #[must_use]
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Returns the scripted bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn open(self) -> Result<Box<dyn ByteReader>, SourceError> {
        if let Some(reason) = self.open_error {
            return Err(SourceError::open_failed(reason));
        }
        Ok(Box::new(MockReader {
            data: self.data,
            repeat: self.repeat,
            read_error: self.read_error,
            read_delay: self.read_delay,
            position: 0,
            produced: 0,
        }))
    }
}

/// Reader side of an opened [`MockSource`].
struct MockReader {
    data: Vec<u8>,
    repeat: bool,
    read_error: Option<(u64, String)>,
    read_delay: Option<Duration>,
    position: usize,
    produced: u64,
}

impl ByteReader for MockReader {
    fn next_byte(&mut self) -> Result<Option<u8>, SourceError> {
        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
        }
        if let Some((after, reason)) = &self.read_error {
            if self.produced >= *after {
                return Err(SourceError::read_failed(reason.clone()));
            }
        }
        if self.position == self.data.len() {
            if !self.repeat {
                return Ok(None);
            }
            self.position = 0;
        }
        let byte = self.data[self.position];
        self.position += 1;
        self.produced += 1;
        Ok(Some(byte))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn take(reader: &mut dyn ByteReader, n: usize) -> Vec<u8> {
        (0..n)
            .map_while(|_| reader.next_byte().ok().flatten())
            .collect()
    }

    #[test]
    fn test_mock_source_finite() {
        let mut reader = MockSource::new(b"AB".to_vec()).open().unwrap();
        assert_eq!(take(reader.as_mut(), 10), b"AB");
        assert_eq!(reader.next_byte().unwrap(), None);
    }

    #[test]
    fn test_mock_source_repeating() {
        let mut reader = MockSource::repeating(b"xy".to_vec()).open().unwrap();
        assert_eq!(take(reader.as_mut(), 5), b"xyxyx");
    }

    #[test]
    fn test_mock_source_empty_repeating_pattern() {
        let mock = MockSource::repeating(Vec::new());
        assert_eq!(mock.data(), &[0]);
    }

    #[test]
    fn test_mock_source_open_failure() {
        let err = MockSource::new(b"A".to_vec())
            .fail_to_open("no such device")
            .open()
            .err()
            .unwrap();
        assert!(err.is_open_error());
    }

    #[test]
    fn test_mock_source_read_failure() {
        let mut reader = MockSource::new(b"abcdef".to_vec())
            .fail_after(2, "unplugged")
            .open()
            .unwrap();
        assert_eq!(reader.next_byte().unwrap(), Some(b'a'));
        assert_eq!(reader.next_byte().unwrap(), Some(b'b'));
        let err = reader.next_byte().unwrap_err();
        assert_eq!(err.to_string(), "read failed: unplugged");
    }

    #[test]
    fn test_mock_source_empty() {
        let mut reader = MockSource::new(Vec::new()).open().unwrap();
        assert_eq!(reader.next_byte().unwrap(), None);
    }
}
