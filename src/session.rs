//! Merge session management.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::panic_message;
use crate::event::emit;
use crate::pipeline::{
    spawn_consumer, spawn_producer, BoundedBuffer, CompletionTracker, ConsumerTask, ProducerOutcome,
    ProducerTask,
};
use crate::sink::Sink;
use crate::source::{ByteSource, SourceId};
use crate::{EventCallback, MergeConfig, MergeError, MergeEvent, SourceError};

/// A source that failed, with the reason.
#[derive(Debug)]
pub struct SourceFailure {
    /// ID of the failed source.
    pub source_id: SourceId,
    /// Why the source failed.
    pub error: SourceError,
}

/// Outcome of a completed merge, returned by [`Merger::shutdown()`].
#[derive(Debug)]
pub struct MergeResult {
    /// Bytes written to the sink.
    pub bytes_written: u64,
    /// Sources that failed to open or read, sorted by ID.
    pub failures: Vec<SourceFailure>,
    /// Sources that stopped before their end, sorted by ID.
    pub cancelled: Vec<SourceId>,
    /// Number of sources registered over the whole run.
    pub sources_registered: usize,
    /// Largest number of items the buffer ever held.
    pub peak_buffered: usize,
}

impl MergeResult {
    /// Returns `true` if every source was read to its end.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.cancelled.is_empty()
    }

    /// Returns the error recorded for `source_id`, if it failed.
    pub fn failure_for(&self, source_id: &str) -> Option<&SourceError> {
        self.failures
            .iter()
            .find(|f| f.source_id.as_str() == source_id)
            .map(|f| &f.error)
    }
}

/// Live statistics about a running merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Sources registered so far.
    pub sources_registered: usize,
    /// Producers that have not reported a terminal status yet.
    pub active_producers: usize,
    /// Bytes read from all sources.
    pub bytes_read: u64,
    /// Bytes written to the sink.
    pub bytes_written: u64,
    /// Items currently held by the buffer.
    pub buffered_items: usize,
    /// Whether the consumer thread is running.
    pub consumer_running: bool,
}

/// Counters shared between the merger and its worker threads.
pub(crate) struct MergeState {
    pub bytes_read: AtomicU64,
    pub bytes_written: AtomicU64,
}

impl MergeState {
    pub fn new() -> Self {
        Self {
            bytes_read: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
        }
    }
}

enum ConsumerSlot {
    /// Not started yet; holds the sink until then.
    Pending(Box<dyn Sink>),
    Running(JoinHandle<Result<u64, MergeError>>),
    /// The sink failed to open or the consumer could not be spawned.
    Aborted,
    Taken,
}

struct ProducerHandle {
    source_id: SourceId,
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Handle to a running merge.
///
/// The `Merger` is returned by [`MergeBuilder::start()`] and accepts sources
/// over time. Each registered source is read on its own thread into a shared
/// bounded buffer; one consumer thread writes the buffer to the sink.
///
/// # Lifecycle
///
/// 1. Created by [`MergeBuilder::start()`]
/// 2. Sources are added with [`register_source()`](Merger::register_source);
///    the consumer starts once `consumer_threshold` sources are registered
/// 3. [`no_more_sources()`](Merger::no_more_sources) ends registration
/// 4. [`shutdown()`](Merger::shutdown) waits for every source and the sink
///
/// Sources that never end must be cancelled with
/// [`cancel_source()`](Merger::cancel_source) or
/// [`cancel_all()`](Merger::cancel_all) before `shutdown()`. Dropping the
/// `Merger` without `shutdown()` cancels all producers and closes the buffer.
///
/// # Example
///
/// ```
/// use stream_merge::{MemorySink, StreamMerge};
/// use stream_merge::source::ByteSource;
///
/// # fn main() -> Result<(), stream_merge::MergeError> {
/// let sink = MemorySink::new();
/// let output = sink.handle();
///
/// let mut merger = StreamMerge::builder().sink(sink).start()?;
/// merger.register_source("a", ByteSource::bytes(b"AA".to_vec()))?;
/// merger.register_source("b", ByteSource::bytes(b"BBB".to_vec()))?;
///
/// let result = merger.shutdown()?;
/// assert_eq!(result.bytes_written, 5);
/// assert_eq!(output.count_of(b'B'), 3);
/// # Ok(())
/// # }
/// ```
///
/// [`MergeBuilder::start()`]: crate::MergeBuilder::start
pub struct Merger {
    config: MergeConfig,
    buffer: Arc<BoundedBuffer>,
    tracker: Arc<CompletionTracker>,
    state: Arc<MergeState>,
    consumer: ConsumerSlot,
    producers: Vec<ProducerHandle>,
    source_ids: HashSet<SourceId>,
    event_callback: Option<EventCallback>,
    finished: bool,
}

impl Merger {
    /// Creates an idle merger. The config must already be validated.
    pub(crate) fn new(
        config: MergeConfig,
        sink: Box<dyn Sink>,
        event_callback: Option<EventCallback>,
    ) -> Self {
        let buffer = Arc::new(BoundedBuffer::new(config.buffer_capacity));
        let tracker = Arc::new(CompletionTracker::new(
            Arc::clone(&buffer),
            event_callback.clone(),
        ));
        Self {
            config,
            buffer,
            tracker,
            state: Arc::new(MergeState::new()),
            consumer: ConsumerSlot::Pending(sink),
            producers: Vec::new(),
            source_ids: HashSet::new(),
            event_callback,
            finished: false,
        }
    }

    /// Registers a source and starts reading it on a new producer thread.
    ///
    /// When this registration reaches `consumer_threshold`, the sink is
    /// opened and the consumer starts.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `source_id` is already registered
    /// - [`no_more_sources()`](Self::no_more_sources) was already called
    /// - The merge was aborted
    /// - The sink fails to open (the merge is aborted)
    /// - A thread cannot be spawned
    pub fn register_source(
        &mut self,
        source_id: impl Into<SourceId>,
        source: impl Into<ByteSource>,
    ) -> Result<(), MergeError> {
        let source_id = source_id.into();
        if self.source_ids.contains(&source_id) {
            return Err(MergeError::DuplicateSourceId { source_id });
        }
        let total = self.tracker.register(&source_id)?;

        let cancel = Arc::new(AtomicBool::new(false));
        let task = ProducerTask::new(
            source_id.clone(),
            Arc::clone(&self.buffer),
            Arc::clone(&cancel),
            Arc::clone(&self.state),
        );
        let handle = match spawn_producer(task, source.into(), Arc::clone(&self.tracker)) {
            Ok(handle) => handle,
            Err(e) => {
                // Keep the active count exact so the buffer can still close.
                self.tracker.report(
                    &source_id,
                    ProducerOutcome::Failed {
                        error: SourceError::open_failed(format!("thread spawn failed: {e}")),
                    },
                );
                return Err(MergeError::Spawn {
                    name: format!("producer-{source_id}"),
                    source: e,
                });
            }
        };

        tracing::info!(source = %source_id, total_registered = total, "source registered");
        self.source_ids.insert(source_id.clone());
        self.producers.push(ProducerHandle {
            source_id: source_id.clone(),
            cancel,
            handle,
        });
        emit(
            self.event_callback.as_ref(),
            MergeEvent::SourceRegistered {
                source_id,
                total_registered: total,
            },
        );

        if total >= self.config.consumer_threshold {
            self.start_consumer()?;
        }
        Ok(())
    }

    /// Registers a file, using its path as the source ID.
    ///
    /// The file is opened on the producer thread; a missing file is
    /// reported in [`MergeResult::failures`], not here.
    ///
    /// # Errors
    ///
    /// Same as [`register_source()`](Self::register_source).
    pub fn register_file(&mut self, path: impl AsRef<Path>) -> Result<SourceId, MergeError> {
        let path = path.as_ref();
        let source_id = SourceId::from_path(path);
        self.register_source(source_id.clone(), ByteSource::file(path))?;
        Ok(source_id)
    }

    /// Declares that no further sources will be registered.
    ///
    /// Starts the consumer if fewer than `consumer_threshold` sources were
    /// registered. Once every producer has finished, the buffer closes and
    /// the consumer drains it. Calling this again has no further effect.
    ///
    /// # Errors
    ///
    /// Returns an error if the merge was aborted or the sink fails to open.
    pub fn no_more_sources(&mut self) -> Result<(), MergeError> {
        if let Some(reason) = self.tracker.abort_reason() {
            return Err(MergeError::Aborted { reason });
        }
        self.tracker.no_more_sources();
        self.start_consumer()
    }

    /// Asks one producer to stop at its next read.
    ///
    /// Bytes already read stay in the output. Returns `false` if no source
    /// with this ID was registered.
    pub fn cancel_source(&self, source_id: &SourceId) -> bool {
        match self.producers.iter().find(|p| &p.source_id == source_id) {
            Some(producer) => {
                tracing::debug!(source = %source_id, "cancelling source");
                producer.cancel.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Asks every producer to stop at its next read.
    pub fn cancel_all(&self) {
        tracing::debug!(producers = self.producers.len(), "cancelling all sources");
        for producer in &self.producers {
            producer.cancel.store(true, Ordering::Release);
        }
    }

    /// Returns current merge statistics.
    pub fn stats(&self) -> MergeStats {
        MergeStats {
            sources_registered: self.tracker.registered(),
            active_producers: self.tracker.active(),
            bytes_read: self.state.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.state.bytes_written.load(Ordering::Relaxed),
            buffered_items: self.buffer.len(),
            consumer_running: matches!(
                &self.consumer,
                ConsumerSlot::Running(handle) if !handle.is_finished()
            ),
        }
    }

    /// Finishes the merge.
    ///
    /// This will:
    /// 1. End registration, starting the consumer if needed
    /// 2. Wait for every producer to finish
    /// 3. Wait for the consumer to drain the buffer and stop the sink
    ///
    /// Blocks until all sources end, so cancel sources that never end first.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink failed to open or kept failing, the
    /// consumer panicked, or the merge was aborted.
    pub fn shutdown(mut self) -> Result<MergeResult, MergeError> {
        let declared = self.no_more_sources();
        self.finished = true;

        for producer in self.producers.drain(..) {
            if let Err(payload) = producer.handle.join() {
                tracing::error!(
                    source = %producer.source_id,
                    "producer thread panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }

        declared?;
        let bytes_written = match std::mem::replace(&mut self.consumer, ConsumerSlot::Taken) {
            ConsumerSlot::Running(handle) => handle.join().unwrap_or_else(|payload| {
                Err(MergeError::ConsumerPanicked {
                    reason: panic_message(payload.as_ref()),
                })
            })?,
            _ => {
                return Err(MergeError::Aborted {
                    reason: self
                        .tracker
                        .abort_reason()
                        .unwrap_or_else(|| "consumer never started".to_string()),
                })
            }
        };

        let summary = self.tracker.take_summary();
        let result = MergeResult {
            bytes_written,
            failures: summary.failures,
            cancelled: summary.cancelled,
            sources_registered: summary.registered,
            peak_buffered: self.buffer.high_water_mark(),
        };
        tracing::info!(
            bytes_written = result.bytes_written,
            sources = result.sources_registered,
            failed = result.failures.len(),
            cancelled = result.cancelled.len(),
            "merge finished"
        );
        Ok(result)
    }

    /// Opens the sink and spawns the consumer, once.
    fn start_consumer(&mut self) -> Result<(), MergeError> {
        let mut sink = match std::mem::replace(&mut self.consumer, ConsumerSlot::Taken) {
            ConsumerSlot::Pending(sink) => sink,
            other => {
                self.consumer = other;
                return Ok(());
            }
        };

        if let Err(source) = sink.on_start() {
            let sink_name = sink.name().to_string();
            self.abort(format!("sink '{sink_name}' failed to open: {source}"));
            return Err(MergeError::SinkOpen { sink_name, source });
        }

        let task = ConsumerTask::new(
            Arc::clone(&self.buffer),
            sink,
            Arc::clone(&self.state),
            &self.config,
            self.event_callback.clone(),
        );
        let handle = match spawn_consumer(task) {
            Ok(handle) => handle,
            Err(source) => {
                self.abort(format!("failed to spawn consumer: {source}"));
                return Err(MergeError::Spawn {
                    name: "merge-consumer".to_string(),
                    source,
                });
            }
        };
        self.consumer = ConsumerSlot::Running(handle);

        let registered = self.tracker.registered();
        tracing::info!(registered, "consumer started");
        emit(
            self.event_callback.as_ref(),
            MergeEvent::ConsumerStarted { registered },
        );
        Ok(())
    }

    /// Cancels every producer and closes the buffer for good.
    fn abort(&mut self, reason: String) {
        self.consumer = ConsumerSlot::Aborted;
        self.cancel_all();
        self.tracker.abort(reason);
    }
}

impl Drop for Merger {
    fn drop(&mut self) {
        if !self.finished {
            // Dropped without shutdown(): unblock every thread.
            tracing::warn!("merger dropped without shutdown, cancelling sources");
            self.cancel_all();
            self.tracker.abort("merger dropped without shutdown".to_string());
        }
    }
}
