//! Completion accounting that decides when the buffer closes.
//!
//! The control thread registers sources and declares the end of
//! registration; producer threads report their terminal status. The buffer
//! is closed exactly once, when no more sources will arrive and every
//! registered producer has reported.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::event::emit;
use crate::pipeline::BoundedBuffer;
use crate::session::SourceFailure;
use crate::source::SourceId;
use crate::{EventCallback, MergeError, MergeEvent, SourceError};

/// Terminal status of a producer.
#[derive(Debug)]
pub(crate) enum ProducerOutcome {
    /// The source was read to its end.
    Completed { bytes_read: u64 },
    /// The producer stopped early: cancel flag or closed buffer.
    Cancelled { bytes_read: u64 },
    /// Opening or reading the source failed.
    Failed { error: SourceError },
}

#[derive(Debug, Default)]
struct TrackerState {
    registered: usize,
    active: usize,
    no_more_sources: bool,
    closed: bool,
    aborted: Option<String>,
    completed: usize,
    failures: Vec<SourceFailure>,
    cancelled: Vec<SourceId>,
}

/// Shared orchestrator state. Mutated only through these methods.
pub(crate) struct CompletionTracker {
    state: Mutex<TrackerState>,
    buffer: Arc<BoundedBuffer>,
    event_callback: Option<EventCallback>,
}

/// Outcomes collected at shutdown.
pub(crate) struct TrackerSummary {
    pub registered: usize,
    pub failures: Vec<SourceFailure>,
    pub cancelled: Vec<SourceId>,
}

impl CompletionTracker {
    pub fn new(buffer: Arc<BoundedBuffer>, event_callback: Option<EventCallback>) -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            buffer,
            event_callback,
        }
    }

    /// Counts a new source as registered and active.
    ///
    /// Returns the total number of registered sources.
    pub fn register(&self, source_id: &SourceId) -> Result<usize, MergeError> {
        let mut state = self.state.lock();
        if state.no_more_sources {
            return Err(MergeError::RegistrationClosed {
                source_id: source_id.clone(),
            });
        }
        if let Some(reason) = &state.aborted {
            return Err(MergeError::Aborted {
                reason: reason.clone(),
            });
        }
        if self.buffer.is_closed() {
            return Err(MergeError::Aborted {
                reason: "buffer closed after a sink failure".to_string(),
            });
        }
        state.registered += 1;
        state.active += 1;
        Ok(state.registered)
    }

    /// Records a producer's terminal status. Called once per producer.
    pub fn report(&self, source_id: &SourceId, outcome: ProducerOutcome) {
        let event = match outcome {
            ProducerOutcome::Completed { bytes_read } => {
                tracing::debug!(source = %source_id, bytes_read, "source completed");
                MergeEvent::SourceCompleted {
                    source_id: source_id.clone(),
                    bytes_read,
                }
            }
            ProducerOutcome::Cancelled { bytes_read } => {
                tracing::debug!(source = %source_id, bytes_read, "source cancelled");
                MergeEvent::SourceCancelled {
                    source_id: source_id.clone(),
                    bytes_read,
                }
            }
            ProducerOutcome::Failed { ref error } => {
                tracing::warn!(source = %source_id, %error, "source failed");
                MergeEvent::SourceFailed {
                    source_id: source_id.clone(),
                    error: error.to_string(),
                }
            }
        };

        let closed = {
            let mut state = self.state.lock();
            state.active = state.active.saturating_sub(1);
            match outcome {
                ProducerOutcome::Completed { .. } => state.completed += 1,
                ProducerOutcome::Cancelled { .. } => state.cancelled.push(source_id.clone()),
                ProducerOutcome::Failed { error } => state.failures.push(SourceFailure {
                    source_id: source_id.clone(),
                    error,
                }),
            }
            self.close_if_done(&mut state)
        };

        emit(self.event_callback.as_ref(), event);
        if closed {
            emit(self.event_callback.as_ref(), MergeEvent::BufferClosed);
        }
    }

    /// Marks the end of registration. Idempotent.
    pub fn no_more_sources(&self) {
        let closed = {
            let mut state = self.state.lock();
            if !state.no_more_sources {
                tracing::info!(
                    registered = state.registered,
                    active = state.active,
                    "no more sources"
                );
            }
            state.no_more_sources = true;
            self.close_if_done(&mut state)
        };
        if closed {
            emit(self.event_callback.as_ref(), MergeEvent::BufferClosed);
        }
    }

    /// Aborts the run: records the first reason and closes the buffer.
    pub fn abort(&self, reason: String) {
        let closed = {
            let mut state = self.state.lock();
            if state.aborted.is_none() {
                tracing::error!("merge aborted: {reason}");
                state.aborted = Some(reason);
            }
            state.closed = true;
            self.buffer.close()
        };
        if closed {
            emit(self.event_callback.as_ref(), MergeEvent::BufferClosed);
        }
    }

    /// Closes the buffer once registration ended and nothing is active.
    fn close_if_done(&self, state: &mut TrackerState) -> bool {
        if state.closed || !state.no_more_sources || state.active > 0 {
            return false;
        }
        state.closed = true;
        tracing::info!(
            completed = state.completed,
            failed = state.failures.len(),
            cancelled = state.cancelled.len(),
            "all producers finished, closing buffer"
        );
        self.buffer.close()
    }

    pub fn abort_reason(&self) -> Option<String> {
        self.state.lock().aborted.clone()
    }

    pub fn registered(&self) -> usize {
        self.state.lock().registered
    }

    pub fn active(&self) -> usize {
        self.state.lock().active
    }

    /// Moves the collected outcomes out, sorted by source ID.
    pub fn take_summary(&self) -> TrackerSummary {
        let mut state = self.state.lock();
        let mut failures = std::mem::take(&mut state.failures);
        let mut cancelled = std::mem::take(&mut state.cancelled);
        failures.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        cancelled.sort();
        TrackerSummary {
            registered: state.registered,
            failures,
            cancelled,
        }
    }
}
