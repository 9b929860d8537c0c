//! # stream-merge
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Merge byte streams from many sources into a single sink.
//!
//! `stream-merge` reads every registered source on its own thread and funnels
//! the bytes through one bounded buffer into a sink (file, channel, memory,
//! custom). Sources can be added while the merge runs; a slow sink stalls
//! producers instead of growing memory, and a failing source never stops the
//! others.
//!
//! ## Quick Start
//!
//! ```rust
//! use stream_merge::{MemorySink, StreamMerge};
//! use stream_merge::source::ByteSource;
//!
//! # fn main() -> Result<(), stream_merge::MergeError> {
//! let sink = MemorySink::new();
//! let output = sink.handle();
//!
//! let mut merger = StreamMerge::builder()
//!     .buffer_capacity(4)                 // items held at most
//!     .consumer_threshold(3)              // start writing after 3 sources
//!     .sink(sink)
//!     .on_event(|e| tracing::debug!(?e, "merge event"))
//!     .start()?;
//!
//! merger.register_source("a", ByteSource::bytes(b"AA".to_vec()))?;
//! merger.register_source("b", ByteSource::bytes(b"BBB".to_vec()))?;
//! merger.register_source("c", ByteSource::bytes(b"C".to_vec()))?;
//!
//! let result = merger.shutdown()?;
//! assert_eq!(result.bytes_written, 6);
//! assert_eq!(output.count_of(b'B'), 3);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **Producer threads**: One per source, blocking when the buffer is full
//! - **Bounded buffer**: FIFO monitor that admits waiting producers in order
//! - **Consumer thread**: Writes batches to the sink, retrying failed writes
//!
//! The buffer closes once registration has ended and every producer has
//! finished; the consumer then drains what is left and stops the sink.
//! Bytes from one source keep their order; bytes from different sources
//! interleave in whatever order producers win the buffer.

#![warn(missing_docs)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::missing_panics_doc)]

mod builder;
mod config;
mod error;
mod event;
mod item;
pub mod pipeline;
mod session;
mod sink;
pub mod source;

pub use builder::{MergeBuilder, StreamMerge};
pub use config::MergeConfig;
pub use error::{BufferClosed, MergeError, SinkError, SourceError};
pub use event::{event_callback, EventCallback, MergeEvent};
pub use item::Item;
pub use session::{MergeResult, MergeStats, Merger, SourceFailure};
pub use sink::{ChannelSink, FileSink, MemorySink, MemorySinkHandle, Sink};
pub use source::{ByteSource, SourceId};
