//! In-memory sink implementation.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::sink::Sink;
use crate::SinkError;

/// A sink that collects merged bytes in memory.
///
/// The sink itself moves into the consumer thread; keep a
/// [`MemorySinkHandle`] to read the bytes while or after the merge runs.
///
/// # Example
///
/// ```
/// use stream_merge::MemorySink;
///
/// let sink = MemorySink::new();
/// let handle = sink.handle();
/// // Use sink with the StreamMerge builder, then:
/// assert!(handle.contents().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct MemorySink {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    /// Creates an empty memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle that observes the collected bytes.
    pub fn handle(&self) -> MemorySinkHandle {
        MemorySinkHandle {
            bytes: Arc::clone(&self.bytes),
        }
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        self.bytes.lock().extend_from_slice(bytes);
        Ok(())
    }
}

/// Shared view of the bytes collected by a [`MemorySink`].
#[derive(Debug, Clone)]
pub struct MemorySinkHandle {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl MemorySinkHandle {
    /// Returns a copy of the bytes written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    /// Returns `true` if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.bytes.lock().is_empty()
    }

    /// Returns how many times `byte` has been written so far.
    pub fn count_of(&self, byte: u8) -> usize {
        self.bytes.lock().iter().filter(|&&b| b == byte).count()
    }
}
