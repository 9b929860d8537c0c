//! Configuration types for the merge pipeline.

use std::time::Duration;

use crate::MergeError;

/// Configuration for a merge run.
///
/// The two parameters that shape the pipeline, buffer capacity and the
/// consumer start threshold, are explicit arguments of [`MergeConfig::new`].
/// [`MergeConfig::default()`] uses a capacity of 10 items and starts the
/// consumer after 3 sources.
///
/// # Example
///
/// ```
/// use stream_merge::MergeConfig;
/// use std::time::Duration;
///
/// let config = MergeConfig {
///     sink_retry_delay: Duration::from_millis(50),
///     ..MergeConfig::new(4, 3)
/// };
/// assert_eq!(config.buffer_capacity, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConfig {
    /// Maximum number of items held by the shared buffer.
    ///
    /// This bounds memory use: a producer that finds the buffer full
    /// blocks until the consumer frees space. Must be at least 1.
    /// Default: 10
    pub buffer_capacity: usize,

    /// Number of registered sources after which the consumer starts.
    ///
    /// The consumer also starts on `no_more_sources()` if fewer sources
    /// were registered. Must be at least 1.
    /// Default: 3
    pub consumer_threshold: usize,

    /// Maximum number of buffered items the consumer moves per sink write.
    ///
    /// Default: 64
    pub sink_batch_size: usize,

    /// Number of attempts for a failing sink write before the merge aborts.
    ///
    /// Default: 3
    pub sink_retry_attempts: u32,

    /// Initial delay between sink retry attempts.
    ///
    /// Uses exponential backoff (delay doubles each attempt).
    /// Default: 10ms
    pub sink_retry_delay: Duration,
}

impl MergeConfig {
    /// Creates a configuration with the given capacity and consumer threshold.
    ///
    /// Remaining fields take their default values.
    #[must_use]
    pub fn new(buffer_capacity: usize, consumer_threshold: usize) -> Self {
        Self {
            buffer_capacity,
            consumer_threshold,
            ..Self::default()
        }
    }

    /// Checks that every field is usable.
    pub(crate) fn validate(&self) -> Result<(), MergeError> {
        if self.buffer_capacity == 0 {
            return Err(MergeError::InvalidCapacity);
        }
        if self.consumer_threshold == 0 {
            return Err(MergeError::InvalidThreshold);
        }
        if self.sink_batch_size == 0 {
            return Err(MergeError::InvalidBatchSize);
        }
        Ok(())
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 10,
            consumer_threshold: 3,
            sink_batch_size: 64,
            sink_retry_attempts: 3,
            sink_retry_delay: Duration::from_millis(10),
        }
    }
}
