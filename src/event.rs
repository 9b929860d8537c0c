//! Runtime events for monitoring a merge.
//!
//! Events are notifications about pipeline progress. The merge continues
//! after any event; they exist for logging, metrics and tests, not error
//! handling. Events are delivered on whichever thread caused them
//! (control, producer or consumer thread).

use std::sync::Arc;

use crate::source::SourceId;

/// Runtime events emitted during a merge.
///
/// # Example
///
/// ```
/// use stream_merge::MergeEvent;
///
/// fn handle_event(event: MergeEvent) {
///     match event {
///         MergeEvent::SourceFailed { source_id, error } => {
///             eprintln!("{source_id} failed: {error}");
///         }
///         MergeEvent::SinkError { sink_name, error } => {
///             eprintln!("sink '{sink_name}' error: {error}");
///         }
///         other => println!("{other:?}"),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeEvent {
    /// A source was accepted and its producer spawned.
    SourceRegistered {
        /// ID of the new source.
        source_id: SourceId,
        /// Number of sources registered so far, including this one.
        total_registered: usize,
    },

    /// The consumer started draining the buffer into the sink.
    ConsumerStarted {
        /// Number of sources registered when the consumer started.
        registered: usize,
    },

    /// A source was read to its end.
    SourceCompleted {
        /// ID of the source.
        source_id: SourceId,
        /// Bytes read from the source.
        bytes_read: u64,
    },

    /// A source stopped early because it was cancelled or the run aborted.
    SourceCancelled {
        /// ID of the source.
        source_id: SourceId,
        /// Bytes read before stopping.
        bytes_read: u64,
    },

    /// A source failed to open or read. Other sources are unaffected.
    SourceFailed {
        /// ID of the source.
        source_id: SourceId,
        /// Description of the error.
        error: String,
    },

    /// The consumer wrote the last byte of a completed source.
    SourceDrained {
        /// ID of the source.
        source_id: SourceId,
    },

    /// The buffer was closed; the consumer stops once it is empty.
    BufferClosed,

    /// A sink write failed. The consumer retries according to
    /// [`MergeConfig`](crate::MergeConfig).
    SinkError {
        /// Name of the sink.
        sink_name: String,
        /// Description of the error.
        error: String,
    },
}

/// Callback type for receiving runtime events.
///
/// Register one via [`MergeBuilder::on_event()`].
///
/// [`MergeBuilder::on_event()`]: crate::MergeBuilder::on_event
pub type EventCallback = Arc<dyn Fn(MergeEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use stream_merge::{event_callback, MergeEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// callback(MergeEvent::BufferClosed);
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(MergeEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Sends an event to the callback if one is configured.
pub(crate) fn emit(callback: Option<&EventCallback>, event: MergeEvent) {
    if let Some(callback) = callback {
        callback(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_merge_event_debug() {
        let event = MergeEvent::SourceCompleted {
            source_id: SourceId::new("a.txt"),
            bytes_read: 42,
        };
        let debug = format!("{event:?}");
        assert!(debug.contains("SourceCompleted"));
        assert!(debug.contains("42"));
    }

    #[test]
    fn test_emit_without_callback_is_noop() {
        emit(None, MergeEvent::BufferClosed);
    }

    #[test]
    fn test_event_callback_helper() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let callback = event_callback(move |event| seen_clone.lock().push(event));
        emit(Some(&callback), MergeEvent::BufferClosed);
        emit(
            Some(&callback),
            MergeEvent::ConsumerStarted { registered: 3 },
        );

        assert_eq!(
            *seen.lock(),
            vec![
                MergeEvent::BufferClosed,
                MergeEvent::ConsumerStarted { registered: 3 }
            ]
        );
    }
}
