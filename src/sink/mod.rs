//! Sink trait and implementations for the merged output.
//!
//! A [`Sink`] is the single destination of a merge. The crate provides
//! three built-in sinks:
//!
//! - [`FileSink`]: Writes bytes to a file
//! - [`MemorySink`]: Collects bytes in memory, readable through a handle
//! - [`ChannelSink`]: Sends byte batches to a tokio mpsc channel
//!
//! You can implement the [`Sink`] trait for custom destinations.

mod channel;
mod file;
mod memory;

pub use channel::ChannelSink;
pub use file::FileSink;
pub use memory::{MemorySink, MemorySinkHandle};

use crate::SinkError;

/// The destination of merged bytes.
///
/// The sink is owned by the consumer thread for the whole run, so methods
/// take `&mut self` and the sink only needs to be `Send`.
///
/// # Lifecycle
///
/// - `on_start` is called once, on the control thread, when the consumer
///   is about to start. An error here aborts the whole merge.
/// - `write` is called with batches of bytes in buffer order. Errors are
///   retried with backoff; persistent errors abort the merge.
/// - `on_stop` is called once after the last byte; flush or close here.
///
/// # Example
///
/// ```
/// use stream_merge::{Sink, SinkError};
///
/// struct CountingSink {
///     bytes: usize,
/// }
///
/// impl Sink for CountingSink {
///     fn name(&self) -> &str {
///         "counter"
///     }
///
///     fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
///         self.bytes += bytes.len();
///         Ok(())
///     }
/// }
/// ```
pub trait Sink: Send {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// Called once before any bytes flow; open resources here.
    ///
    /// Default implementation does nothing.
    fn on_start(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Appends a batch of bytes.
    fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError>;

    /// Called after the last write; flush and release resources here.
    ///
    /// Default implementation does nothing.
    fn on_stop(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn on_start(&mut self) -> Result<(), SinkError> {
        (**self).on_start()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        (**self).write(bytes)
    }

    fn on_stop(&mut self) -> Result<(), SinkError> {
        (**self).on_stop()
    }
}
