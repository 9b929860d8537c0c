//! Infinite source example.
//!
//! Merges an endless source (`/dev/urandom` when available, otherwise a
//! repeating pattern) with two finite ones, and shows that the finite
//! sources still get through. Once both finish, the endless source is
//! cancelled and the merge shuts down.
//!
//! Run with: cargo run --example infinite_source

use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use parking_lot::Mutex;
use stream_merge::source::{ByteSource, MockSource};
use stream_merge::{MemorySink, MergeEvent, SourceId, StreamMerge};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (done_tx, done_rx) = mpsc::channel();
    let done_tx = Mutex::new(done_tx);

    let sink = MemorySink::new();
    let output = sink.handle();

    let mut merger = StreamMerge::builder()
        .buffer_capacity(8)
        .consumer_threshold(2)
        .sink(sink)
        .on_event(move |event| {
            if let MergeEvent::SourceCompleted { source_id, .. } = event {
                let _ = done_tx.lock().send(source_id);
            }
        })
        .start()?;

    let endless = if Path::new("/dev/urandom").exists() {
        ByteSource::file("/dev/urandom")
    } else {
        ByteSource::mock(MockSource::repeating(b"~".to_vec()))
    };
    merger.register_source("endless", endless)?;
    merger.register_source("letters", ByteSource::bytes(b"abcdefghij".to_vec()))?;
    merger.register_source("digits", ByteSource::bytes(b"0123456789".to_vec()))?;

    for _ in 0..2 {
        let finished = done_rx.recv_timeout(Duration::from_secs(10))?;
        println!("{finished} finished");
    }

    let stats = merger.stats();
    println!("Stats before cancelling: {stats:?}");

    merger.cancel_source(&SourceId::new("endless"));
    let result = merger.shutdown()?;

    let merged = output.contents();
    let letters = merged.iter().filter(|b| b.is_ascii_lowercase()).count();
    println!(
        "Wrote {} bytes, peak buffer {} items, cancelled {:?}",
        result.bytes_written, result.peak_buffered, result.cancelled
    );
    println!("At least {letters} lowercase bytes made it through");

    Ok(())
}
