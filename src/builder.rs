//! Builder pattern for `StreamMerge`.

use std::time::Duration;

use crate::session::Merger;
use crate::sink::Sink;
use crate::{event_callback, EventCallback, MergeConfig, MergeError, MergeEvent};

/// Builder for configuring and starting a merge.
///
/// Use [`StreamMerge::builder()`] to create a new builder.
///
/// # Example
///
/// ```
/// use stream_merge::{FileSink, StreamMerge};
///
/// # fn main() -> Result<(), stream_merge::MergeError> {
/// # let dir = tempfile::tempdir().unwrap();
/// # let output = dir.path().join("output");
/// let mut merger = StreamMerge::builder()
///     .buffer_capacity(10)
///     .consumer_threshold(3)
///     .sink(FileSink::create(&output))
///     .on_event(|e| tracing::debug!(?e, "merge event"))
///     .start()?;
///
/// merger.register_file("input-1.txt")?;
/// merger.register_file("input-2.txt")?;
/// let result = merger.shutdown()?;
/// # let _ = result;
/// # Ok(())
/// # }
/// ```
///
/// [`StreamMerge::builder()`]: crate::StreamMerge::builder
#[must_use]
pub struct MergeBuilder {
    /// Merge configuration.
    config: MergeConfig,
    /// The sink receiving merged bytes.
    sink: Option<Box<dyn Sink>>,
    /// Event callback.
    event_callback: Option<EventCallback>,
}

impl Default for MergeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: MergeConfig::default(),
            sink: None,
            event_callback: None,
        }
    }

    /// Set the number of items the shared buffer can hold.
    ///
    /// Default: 10
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    /// Set how many sources must register before the consumer starts.
    ///
    /// Default: 3
    pub fn consumer_threshold(mut self, threshold: usize) -> Self {
        self.config.consumer_threshold = threshold;
        self
    }

    /// Set the maximum number of buffered items written per sink call.
    ///
    /// Default: 64
    pub fn sink_batch_size(mut self, batch_size: usize) -> Self {
        self.config.sink_batch_size = batch_size;
        self
    }

    /// Set how often a failing sink write is attempted before aborting.
    ///
    /// Default: 3
    pub fn sink_retry_attempts(mut self, attempts: u32) -> Self {
        self.config.sink_retry_attempts = attempts;
        self
    }

    /// Set the initial delay between sink retries.
    ///
    /// Default: 10ms
    pub fn sink_retry_delay(mut self, delay: Duration) -> Self {
        self.config.sink_retry_delay = delay;
        self
    }

    /// Set the sink that receives the merged bytes.
    ///
    /// Calling this again replaces the previous sink.
    pub fn sink<S: Sink + 'static>(mut self, sink: S) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Set a callback to receive runtime events.
    ///
    /// Events include source registration and completion, source failures
    /// and sink errors.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(MergeEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Set a complete merge configuration.
    pub fn with_config(mut self, config: MergeConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Start the merge.
    ///
    /// Returns a [`Merger`] that accepts sources. No thread runs until the
    /// first source is registered.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No sink is configured
    /// - Capacity, threshold or batch size is zero
    pub fn start(self) -> Result<Merger, MergeError> {
        self.config.validate()?;
        let sink = self.sink.ok_or(MergeError::NoSinkConfigured)?;

        tracing::info!(
            sink = sink.name(),
            buffer_capacity = self.config.buffer_capacity,
            consumer_threshold = self.config.consumer_threshold,
            "starting merge"
        );
        Ok(Merger::new(self.config, sink, self.event_callback))
    }
}

/// Main entry point for stream-merge.
///
/// Use [`StreamMerge::builder()`] to start configuring a merge.
pub struct StreamMerge;

impl StreamMerge {
    /// Creates a new builder for configuring a merge.
    pub fn builder() -> MergeBuilder {
        MergeBuilder::new()
    }
}
