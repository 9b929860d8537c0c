//! Consumer task: drains the shared buffer into the sink.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::panic_message;
use crate::event::emit;
use crate::pipeline::BoundedBuffer;
use crate::session::MergeState;
use crate::sink::Sink;
use crate::source::SourceId;
use crate::{EventCallback, Item, MergeConfig, MergeError, MergeEvent, SinkError};

/// Lifecycle of the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConsumerState {
    /// Blocked on an empty, open buffer.
    Waiting,
    /// Writing a batch to the sink.
    Writing,
    /// The buffer is closed; emptying what is left.
    Draining,
    /// Buffer closed and empty; sink stopped.
    Terminated,
}

/// Pops batches from the buffer and appends their bytes to the sink.
///
/// End-of-source markers only report progress. The consumer stops when
/// `pop_batch` signals that the buffer is closed and empty.
pub(crate) struct ConsumerTask {
    buffer: Arc<BoundedBuffer>,
    sink: Box<dyn Sink>,
    merge_state: Arc<MergeState>,
    event_callback: Option<EventCallback>,
    batch_size: usize,
    retry_attempts: u32,
    retry_delay: Duration,
    state: ConsumerState,
    bytes_written: u64,
}

impl ConsumerTask {
    pub fn new(
        buffer: Arc<BoundedBuffer>,
        sink: Box<dyn Sink>,
        merge_state: Arc<MergeState>,
        config: &MergeConfig,
        event_callback: Option<EventCallback>,
    ) -> Self {
        Self {
            buffer,
            sink,
            merge_state,
            event_callback,
            batch_size: config.sink_batch_size,
            retry_attempts: config.sink_retry_attempts.max(1),
            retry_delay: config.sink_retry_delay,
            state: ConsumerState::Waiting,
            bytes_written: 0,
        }
    }

    /// Runs until the buffer is closed and empty or the sink gives up.
    ///
    /// Returns the number of bytes written. On a persistent sink failure the
    /// buffer is closed so blocked producers stop, and the error is returned.
    pub fn run(mut self) -> Result<u64, MergeError> {
        match self.drain() {
            Ok(()) => {
                self.transition(ConsumerState::Terminated);
                self.sink.on_stop().map_err(|source| MergeError::SinkFailed {
                    sink_name: self.sink.name().to_string(),
                    source,
                })?;
                tracing::info!(
                    sink = self.sink.name(),
                    bytes_written = self.bytes_written,
                    "consumer finished"
                );
                Ok(self.bytes_written)
            }
            Err(source) => {
                self.buffer.close();
                self.transition(ConsumerState::Terminated);
                if let Err(e) = self.sink.on_stop() {
                    tracing::warn!(sink = self.sink.name(), "error stopping failed sink: {e}");
                }
                Err(MergeError::SinkFailed {
                    sink_name: self.sink.name().to_string(),
                    source,
                })
            }
        }
    }

    fn drain(&mut self) -> Result<(), SinkError> {
        let mut pending: Vec<u8> = Vec::with_capacity(self.batch_size);

        while let Some(batch) = self.buffer.pop_batch(self.batch_size) {
            if self.buffer.is_closed() {
                self.transition(ConsumerState::Draining);
            }
            for item in batch {
                match item {
                    Item::Data(byte) => pending.push(byte),
                    Item::EndOfSource(source_id) => {
                        self.flush(&mut pending)?;
                        self.source_drained(source_id);
                    }
                }
            }
            self.flush(&mut pending)?;
            if self.state == ConsumerState::Writing {
                self.transition(ConsumerState::Waiting);
            }
        }
        Ok(())
    }

    fn flush(&mut self, pending: &mut Vec<u8>) -> Result<(), SinkError> {
        if pending.is_empty() {
            return Ok(());
        }
        if self.state == ConsumerState::Waiting {
            self.transition(ConsumerState::Writing);
        }
        self.write_with_retry(pending)?;
        let n = pending.len() as u64;
        self.bytes_written += n;
        self.merge_state.bytes_written.fetch_add(n, Ordering::Relaxed);
        pending.clear();
        Ok(())
    }

    /// Writes one batch, retrying with exponential backoff.
    fn write_with_retry(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        let mut attempts = 0;
        let mut delay = self.retry_delay;

        loop {
            match self.sink.write(bytes) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempts += 1;
                    tracing::warn!(
                        sink = self.sink.name(),
                        attempt = attempts,
                        "sink write failed: {e}"
                    );
                    emit(
                        self.event_callback.as_ref(),
                        MergeEvent::SinkError {
                            sink_name: self.sink.name().to_string(),
                            error: e.to_string(),
                        },
                    );

                    if attempts >= self.retry_attempts {
                        return Err(e);
                    }

                    thread::sleep(delay);
                    delay *= 2;
                }
            }
        }
    }

    fn source_drained(&self, source_id: SourceId) {
        tracing::debug!(source = %source_id, "source drained into sink");
        emit(
            self.event_callback.as_ref(),
            MergeEvent::SourceDrained { source_id },
        );
    }

    fn transition(&mut self, next: ConsumerState) {
        if self.state != next {
            tracing::trace!("consumer {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

/// Spawns the consumer thread.
///
/// A panic inside the sink closes the buffer and is returned as
/// [`MergeError::ConsumerPanicked`].
pub(crate) fn spawn_consumer(
    task: ConsumerTask,
) -> std::io::Result<JoinHandle<Result<u64, MergeError>>> {
    let buffer = Arc::clone(&task.buffer);
    thread::Builder::new()
        .name("merge-consumer".to_string())
        .spawn(move || {
            panic::catch_unwind(AssertUnwindSafe(|| task.run())).unwrap_or_else(|payload| {
                buffer.close();
                Err(MergeError::ConsumerPanicked {
                    reason: panic_message(payload.as_ref()),
                })
            })
        })
}
