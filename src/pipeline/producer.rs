//! Producer task: drains one source into the shared buffer.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::panic_message;
use crate::pipeline::tracker::{CompletionTracker, ProducerOutcome};
use crate::pipeline::BoundedBuffer;
use crate::session::MergeState;
use crate::source::{ByteSource, SourceId};
use crate::{BufferClosed, Item, SourceError};

/// Lifecycle of a producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProducerState {
    /// Reading from the source.
    Reading,
    /// Waiting for space in a full buffer.
    Blocked,
    /// Source exhausted or cancelled.
    Done,
    /// Opening or reading the source failed.
    Failed,
}

/// Reads one source byte by byte and pushes each byte into the buffer.
///
/// Between reads the task checks its cancel flag, so a source with no end
/// stops promptly once cancelled. After reaching a terminal state it never
/// touches the buffer again.
pub(crate) struct ProducerTask {
    source_id: SourceId,
    buffer: Arc<BoundedBuffer>,
    cancel: Arc<AtomicBool>,
    merge_state: Arc<MergeState>,
    state: ProducerState,
    bytes_read: u64,
}

impl ProducerTask {
    pub fn new(
        source_id: SourceId,
        buffer: Arc<BoundedBuffer>,
        cancel: Arc<AtomicBool>,
        merge_state: Arc<MergeState>,
    ) -> Self {
        Self {
            source_id,
            buffer,
            cancel,
            merge_state,
            state: ProducerState::Reading,
            bytes_read: 0,
        }
    }

    /// Drains `source` until it ends, fails, or the task is cancelled.
    pub fn run(&mut self, source: ByteSource) -> ProducerOutcome {
        let mut reader = match source.open() {
            Ok(reader) => reader,
            Err(error) => return self.fail(error),
        };
        tracing::debug!(source = %self.source_id, "producer opened source");

        loop {
            if self.cancel.load(Ordering::Acquire) {
                return self.cancelled();
            }
            match reader.next_byte() {
                Ok(Some(byte)) => {
                    if self.push(Item::Data(byte)).is_err() {
                        return self.cancelled();
                    }
                    self.bytes_read += 1;
                    self.merge_state.bytes_read.fetch_add(1, Ordering::Relaxed);
                }
                Ok(None) => {
                    if self.push(Item::EndOfSource(self.source_id.clone())).is_err() {
                        return self.cancelled();
                    }
                    self.transition(ProducerState::Done);
                    return ProducerOutcome::Completed {
                        bytes_read: self.bytes_read,
                    };
                }
                Err(error) => return self.fail(error),
            }
        }
    }

    fn push(&mut self, item: Item) -> Result<(), BufferClosed> {
        if self.buffer.is_full() {
            self.transition(ProducerState::Blocked);
        }
        let result = self.buffer.push(item);
        if self.state == ProducerState::Blocked {
            self.transition(ProducerState::Reading);
        }
        result
    }

    fn cancelled(&mut self) -> ProducerOutcome {
        self.transition(ProducerState::Done);
        ProducerOutcome::Cancelled {
            bytes_read: self.bytes_read,
        }
    }

    fn fail(&mut self, error: SourceError) -> ProducerOutcome {
        self.transition(ProducerState::Failed);
        ProducerOutcome::Failed { error }
    }

    fn transition(&mut self, next: ProducerState) {
        if self.state != next {
            tracing::trace!(
                source = %self.source_id,
                "producer {:?} -> {:?}",
                self.state,
                next
            );
            self.state = next;
        }
    }
}

/// Spawns the producer thread.
///
/// The thread reports exactly one outcome to the tracker, including when the
/// source implementation panics.
pub(crate) fn spawn_producer(
    mut task: ProducerTask,
    source: ByteSource,
    tracker: Arc<CompletionTracker>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("producer-{}", task.source_id))
        .spawn(move || {
            let source_id = task.source_id.clone();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.run(source)))
                .unwrap_or_else(|payload| ProducerOutcome::Failed {
                    error: SourceError::Panicked {
                        reason: panic_message(payload.as_ref()),
                    },
                });
            tracker.report(&source_id, outcome);
        })
}
