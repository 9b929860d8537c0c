//! Tokio mpsc channel sink implementation.

use tokio::sync::mpsc;

use crate::sink::Sink;
use crate::SinkError;

/// A sink that forwards merged byte batches to a tokio mpsc channel.
///
/// This bridges the thread-based pipeline into async code. The consumer
/// thread uses `blocking_send`, so a full channel applies backpressure all
/// the way to the producers.
///
/// # Example
///
/// ```
/// use stream_merge::ChannelSink;
/// use tokio::sync::mpsc;
///
/// let (tx, mut rx) = mpsc::channel::<Vec<u8>>(16);
/// let sink = ChannelSink::new(tx);
///
/// // Use sink with the StreamMerge builder...
/// // Then receive batches:
/// // while let Some(batch) = rx.recv().await { ... }
/// ```
pub struct ChannelSink {
    name: String,
    sender: mpsc::Sender<Vec<u8>>,
}

impl ChannelSink {
    /// Creates a new channel sink with the given sender.
    pub fn new(sender: mpsc::Sender<Vec<u8>>) -> Self {
        Self {
            name: "channel".to_string(),
            sender,
        }
    }

    /// Creates a new channel sink with a custom name.
    pub fn with_name(name: impl Into<String>, sender: mpsc::Sender<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }
}

impl Sink for ChannelSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_start(&mut self) -> Result<(), SinkError> {
        if self.sender.is_closed() {
            return Err(SinkError::ChannelClosed);
        }
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        self.sender
            .blocking_send(bytes.to_vec())
            .map_err(|_| SinkError::ChannelClosed)
    }
}
