//! Merge pipeline components.
//!
//! Every source gets its own producer thread; all of them feed one bounded
//! buffer that a single consumer drains into the sink:
//!
//! ```text
//! Source A → Producer A ┐
//! Source B → Producer B ┼→ Bounded Buffer → Consumer → Sink
//! Source C → Producer C ┘
//! ```
//!
//! - **Bounded Buffer**: Blocking FIFO monitor; a full buffer stalls producers
//! - **Producer**: Reads one source byte by byte, ends with an end marker
//! - **Consumer**: Writes buffered bytes to the sink in batches, with retry
//! - **Tracker**: Counts live producers and closes the buffer when the last
//!   one finishes after registration has ended

mod buffer;
mod consumer;
mod producer;
mod tracker;

pub use buffer::BoundedBuffer;
pub(crate) use consumer::{spawn_consumer, ConsumerTask};
pub(crate) use producer::{spawn_producer, ProducerTask};
pub(crate) use tracker::{CompletionTracker, ProducerOutcome};
