//! Error types for stream-merge.
//!
//! Errors are split by how far they reach:
//! - **Fatal errors** ([`MergeError`]): Stop the merge or reject an API call
//! - **Per-source errors** ([`SourceError`]): End one producer; the rest of
//!   the pipeline keeps running and the failure shows up in
//!   [`MergeResult::failures`](crate::MergeResult::failures)
//! - **Sink errors** ([`SinkError`]): Raised by [`Sink`](crate::Sink)
//!   implementations; retried by the consumer before becoming fatal

use std::path::PathBuf;

use crate::source::SourceId;

/// Fatal errors returned by the merge API.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// The buffer capacity must hold at least one item.
    #[error("buffer capacity must be at least 1")]
    InvalidCapacity,

    /// The consumer start threshold must be at least one source.
    #[error("consumer threshold must be at least 1")]
    InvalidThreshold,

    /// Sink writes must carry at least one byte per batch.
    #[error("sink batch size must be at least 1")]
    InvalidBatchSize,

    /// No sink was configured before starting.
    #[error("no sink configured - call sink() before start()")]
    NoSinkConfigured,

    /// A source ID was registered more than once.
    #[error("duplicate source ID: {source_id}")]
    DuplicateSourceId {
        /// The duplicated source ID.
        source_id: SourceId,
    },

    /// A source was registered after `no_more_sources()`.
    #[error("cannot register {source_id}: no more sources are accepted")]
    RegistrationClosed {
        /// The rejected source ID.
        source_id: SourceId,
    },

    /// The sink could not be opened. All producers are cancelled.
    #[error("sink '{sink_name}' failed to open: {source}")]
    SinkOpen {
        /// Name of the sink.
        sink_name: String,
        /// Why the sink failed to open.
        #[source]
        source: SinkError,
    },

    /// The sink kept failing after all retry attempts.
    #[error("sink '{sink_name}' failed: {source}")]
    SinkFailed {
        /// Name of the sink.
        sink_name: String,
        /// The last error reported by the sink.
        #[source]
        source: SinkError,
    },

    /// The merge was aborted earlier and accepts no further work.
    #[error("merge aborted: {reason}")]
    Aborted {
        /// Why the merge was aborted.
        reason: String,
    },

    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn thread '{name}': {source}")]
    Spawn {
        /// Name of the thread that could not be spawned.
        name: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The consumer thread panicked.
    #[error("consumer thread panicked: {reason}")]
    ConsumerPanicked {
        /// Panic payload, if it was a string.
        reason: String,
    },
}

/// Errors that end a single producer.
///
/// These never stop the merge; they are collected into
/// [`MergeResult::failures`](crate::MergeResult::failures).
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source could not be opened.
    #[error("open failed: {reason}")]
    OpenFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// A file source could not be opened.
    #[error("cannot open {path}: {source}")]
    FileOpen {
        /// Path to the file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading from the source failed.
    #[error("read failed: {reason}")]
    ReadFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// Reading from an I/O backed source failed.
    #[error("read error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The source implementation panicked on the producer thread.
    #[error("source panicked: {reason}")]
    Panicked {
        /// Panic payload, if it was a string.
        reason: String,
    },
}

impl SourceError {
    /// Creates an open failure with the given reason.
    pub fn open_failed(reason: impl Into<String>) -> Self {
        Self::OpenFailed {
            reason: reason.into(),
        }
    }

    /// Creates a read failure with the given reason.
    pub fn read_failed(reason: impl Into<String>) -> Self {
        Self::ReadFailed {
            reason: reason.into(),
        }
    }

    /// Creates a file open error for the given path.
    pub fn file_open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileOpen {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the source failed before producing anything.
    pub fn is_open_error(&self) -> bool {
        matches!(self, Self::OpenFailed { .. } | Self::FileOpen { .. })
    }
}

/// Errors that can occur within a [`Sink`](crate::Sink) implementation.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// A write operation failed.
    #[error("write failed: {reason}")]
    WriteFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// File I/O error.
    #[error("file error: {path}: {source}")]
    FileError {
        /// Path to the file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The receiving channel was closed.
    #[error("channel closed")]
    ChannelClosed,

    /// The sink was written to before `on_start`.
    #[error("sink not initialized (call on_start first)")]
    NotInitialized,

    /// Custom error for user-implemented sinks.
    #[error("{0}")]
    Custom(String),
}

impl SinkError {
    /// Creates a custom sink error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Creates a write failed error with the given reason.
    pub fn write_failed(reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            reason: reason.into(),
        }
    }

    /// Creates a file error for the given path.
    pub fn file_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileError {
            path: path.into(),
            source,
        }
    }
}

/// Returned by [`BoundedBuffer::push`](crate::pipeline::BoundedBuffer::push)
/// once the buffer no longer accepts items.
///
/// This is the expected way a producer learns that the run was aborted; it
/// is not a failure of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("buffer closed")]
pub struct BufferClosed;

/// Extracts a readable message from a thread panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
