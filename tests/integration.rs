//! Integration tests for stream-merge.

use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stream_merge::source::{ByteSource, MockSource};
use stream_merge::{
    ChannelSink, FileSink, MemorySink, MergeError, MergeEvent, SourceError, SourceId, StreamMerge,
};
use tokio::sync::mpsc;

/// Collects every event emitted during a merge.
#[derive(Clone, Default)]
struct EventLog {
    events: Arc<Mutex<Vec<MergeEvent>>>,
}

impl EventLog {
    fn record(&self) -> impl Fn(MergeEvent) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |event| events.lock().push(event)
    }

    fn count(&self, pred: impl Fn(&MergeEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

fn sorted(mut bytes: Vec<u8>) -> Vec<u8> {
    bytes.sort_unstable();
    bytes
}

#[test]
fn test_three_sources_merge_every_byte() {
    let sink = MemorySink::new();
    let output = sink.handle();
    let log = EventLog::default();

    let mut merger = StreamMerge::builder()
        .buffer_capacity(4)
        .consumer_threshold(3)
        .sink(sink)
        .on_event(log.record())
        .start()
        .unwrap();

    merger
        .register_source("a", ByteSource::bytes(b"AA".to_vec()))
        .unwrap();
    merger
        .register_source("b", ByteSource::bytes(b"BBB".to_vec()))
        .unwrap();
    merger
        .register_source("c", ByteSource::bytes(b"C".to_vec()))
        .unwrap();
    merger.no_more_sources().unwrap();

    let result = merger.shutdown().unwrap();
    assert!(result.is_clean());
    assert_eq!(result.bytes_written, 6);
    assert_eq!(result.sources_registered, 3);
    assert!(result.peak_buffered <= 4);
    assert_eq!(sorted(output.contents()), b"AABBBC");

    assert_eq!(
        log.count(|e| matches!(e, MergeEvent::SourceCompleted { .. })),
        3
    );
    assert_eq!(
        log.count(|e| matches!(e, MergeEvent::SourceDrained { .. })),
        3
    );
    assert_eq!(log.count(|e| *e == MergeEvent::BufferClosed), 1);
    assert_eq!(
        log.count(|e| matches!(e, MergeEvent::ConsumerStarted { registered: 3 })),
        1
    );
}

#[test]
fn test_single_source_keeps_order_at_every_capacity() {
    for capacity in 1..=8 {
        let sink = MemorySink::new();
        let output = sink.handle();
        let mut merger = StreamMerge::builder()
            .buffer_capacity(capacity)
            .consumer_threshold(1)
            .sink(sink)
            .start()
            .unwrap();

        merger
            .register_source("only", ByteSource::bytes(b"ABC".to_vec()))
            .unwrap();
        let result = merger.shutdown().unwrap();

        assert_eq!(output.contents(), b"ABC", "capacity {capacity}");
        assert!(result.peak_buffered <= capacity);
    }
}

#[test]
fn test_capacity_one() {
    let sink = MemorySink::new();
    let output = sink.handle();
    let mut merger = StreamMerge::builder()
        .buffer_capacity(1)
        .consumer_threshold(1)
        .sink(sink)
        .start()
        .unwrap();

    merger
        .register_source("x", ByteSource::bytes(b"X".to_vec()))
        .unwrap();
    let result = merger.shutdown().unwrap();

    assert_eq!(output.contents(), b"X");
    assert_eq!(result.peak_buffered, 1);
}

#[test]
fn test_randomized_runs_terminate_without_loss() {
    const SOURCES: usize = 5;
    // Each source draws from its own range of byte values, so its bytes can
    // be picked back out of the merged output.
    const RANGE: usize = 50;

    let mut rng = StdRng::seed_from_u64(0x5EED);

    for round in 0..24 {
        let capacity = rng.gen_range(1..=16);
        let source_count = rng.gen_range(1..=SOURCES);
        let threshold = rng.gen_range(1..=source_count + 1);

        let inputs: Vec<Vec<u8>> = (0..source_count)
            .map(|i| {
                let len = rng.gen_range(0..=1000);
                (0..len)
                    .map(|_| u8::try_from(i * RANGE + rng.gen_range(0..RANGE)).unwrap())
                    .collect()
            })
            .collect();

        let sink = MemorySink::new();
        let output = sink.handle();
        let mut merger = StreamMerge::builder()
            .buffer_capacity(capacity)
            .consumer_threshold(threshold)
            .sink_batch_size(rng.gen_range(1..=32))
            .sink(sink)
            .start()
            .unwrap();

        for (i, data) in inputs.iter().enumerate() {
            merger
                .register_source(format!("src-{i}"), ByteSource::bytes(data.clone()))
                .unwrap();
        }
        let result = merger.shutdown().unwrap();

        let merged = output.contents();
        let total: usize = inputs.iter().map(Vec::len).sum();
        assert_eq!(merged.len(), total, "round {round}");
        assert_eq!(result.bytes_written, total as u64, "round {round}");
        assert!(result.peak_buffered <= capacity, "round {round}");

        for (i, data) in inputs.iter().enumerate() {
            let range = i * RANGE..(i + 1) * RANGE;
            let from_source: Vec<u8> = merged
                .iter()
                .copied()
                .filter(|b| range.contains(&usize::from(*b)))
                .collect();
            assert_eq!(&from_source, data, "round {round}, source {i}");
        }
    }
}

#[test]
fn test_infinite_source_does_not_starve_others() {
    let sink = MemorySink::new();
    let output = sink.handle();
    let (done_tx, done_rx) = std_mpsc::channel();
    let done_tx = Mutex::new(done_tx);

    let mut merger = StreamMerge::builder()
        .buffer_capacity(4)
        .consumer_threshold(2)
        .sink(sink)
        .on_event(move |event| {
            if let MergeEvent::SourceCompleted { source_id, .. } = event {
                let _ = done_tx.lock().send(source_id);
            }
        })
        .start()
        .unwrap();

    merger
        .register_source("endless", MockSource::repeating(b"i".to_vec()))
        .unwrap();
    merger
        .register_source("finite", ByteSource::bytes(vec![b'f'; 10]))
        .unwrap();

    let completed = done_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(completed, SourceId::new("finite"));

    assert!(merger.cancel_source(&SourceId::new("endless")));
    let result = merger.shutdown().unwrap();

    assert_eq!(output.count_of(b'f'), 10);
    assert!(output.count_of(b'i') > 0);
    assert_eq!(result.cancelled, vec![SourceId::new("endless")]);
    assert!(result.failures.is_empty());
}

#[test]
fn test_missing_file_does_not_affect_other_sources() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("input-1.txt");
    let missing = dir.path().join("input-2.txt");
    std::fs::write(&good, b"hello").unwrap();

    let sink = MemorySink::new();
    let output = sink.handle();
    let mut merger = StreamMerge::builder().sink(sink).start().unwrap();

    merger.register_file(&good).unwrap();
    let missing_id = merger.register_file(&missing).unwrap();
    let result = merger.shutdown().unwrap();

    assert_eq!(output.contents(), b"hello");
    assert_eq!(result.failures.len(), 1);
    let error = result.failure_for(missing_id.as_str()).unwrap();
    assert!(matches!(error, SourceError::FileOpen { .. }));
    assert!(error.is_open_error());
}

#[test]
fn test_read_failure_keeps_bytes_before_the_error() {
    let sink = MemorySink::new();
    let output = sink.handle();
    let mut merger = StreamMerge::builder()
        .consumer_threshold(1)
        .sink(sink)
        .start()
        .unwrap();

    merger
        .register_source(
            "flaky",
            MockSource::new(b"abcdef".to_vec()).fail_after(3, "device unplugged"),
        )
        .unwrap();
    merger
        .register_source("steady", ByteSource::bytes(b"XYZ".to_vec()))
        .unwrap();
    let result = merger.shutdown().unwrap();

    let merged = output.contents();
    let lower: Vec<u8> = merged
        .iter()
        .copied()
        .filter(u8::is_ascii_lowercase)
        .collect();
    assert_eq!(lower, b"abc");
    assert_eq!(output.count_of(b'X') + output.count_of(b'Y'), 2);
    assert_eq!(output.count_of(b'Z'), 1);

    let error = result.failure_for("flaky").unwrap();
    assert!(matches!(error, SourceError::ReadFailed { .. }));
}

#[test]
fn test_sink_open_failure_aborts_merge() {
    let dir = tempfile::tempdir().unwrap();
    let unreachable = dir.path().join("no-such-dir").join("output");

    let mut merger = StreamMerge::builder()
        .consumer_threshold(1)
        .sink(FileSink::create(&unreachable))
        .start()
        .unwrap();

    let first = merger.register_source("a", MockSource::repeating(b"a".to_vec()));
    assert!(matches!(first, Err(MergeError::SinkOpen { .. })));

    let second = merger.register_source("b", ByteSource::bytes(b"b".to_vec()));
    assert!(matches!(second, Err(MergeError::Aborted { .. })));

    assert!(matches!(merger.shutdown(), Err(MergeError::Aborted { .. })));
}

#[test]
fn test_register_after_no_more_sources_rejected() {
    let mut merger = StreamMerge::builder()
        .sink(MemorySink::new())
        .start()
        .unwrap();
    merger
        .register_source("a", ByteSource::bytes(b"a".to_vec()))
        .unwrap();
    merger.no_more_sources().unwrap();

    let late = merger.register_source("late", ByteSource::bytes(b"z".to_vec()));
    assert!(matches!(late, Err(MergeError::RegistrationClosed { .. })));

    let result = merger.shutdown().unwrap();
    assert_eq!(result.sources_registered, 1);
}

#[test]
fn test_consumer_starts_below_threshold() {
    let sink = MemorySink::new();
    let output = sink.handle();
    let log = EventLog::default();

    let mut merger = StreamMerge::builder()
        .buffer_capacity(2)
        .consumer_threshold(5)
        .sink(sink)
        .on_event(log.record())
        .start()
        .unwrap();

    merger
        .register_source("a", ByteSource::bytes(b"aaaa".to_vec()))
        .unwrap();
    merger
        .register_source("b", ByteSource::bytes(b"bbbb".to_vec()))
        .unwrap();
    assert!(!merger.stats().consumer_running);

    merger.no_more_sources().unwrap();
    let result = merger.shutdown().unwrap();

    assert_eq!(result.bytes_written, 8);
    assert_eq!(output.len(), 8);
    assert_eq!(
        log.count(|e| matches!(e, MergeEvent::ConsumerStarted { registered: 2 })),
        1
    );
}

#[test]
fn test_early_finishing_source_does_not_end_merge() {
    let sink = MemorySink::new();
    let output = sink.handle();
    let mut merger = StreamMerge::builder()
        .buffer_capacity(3)
        .consumer_threshold(1)
        .sink(sink)
        .start()
        .unwrap();

    merger
        .register_source("empty", ByteSource::bytes(Vec::new()))
        .unwrap();
    merger
        .register_source(
            "slow",
            MockSource::new(b"slow!".to_vec()).with_read_delay(Duration::from_millis(5)),
        )
        .unwrap();
    merger
        .register_source("fast", ByteSource::bytes(b"F".to_vec()))
        .unwrap();

    let result = merger.shutdown().unwrap();
    assert!(result.is_clean());

    let slow: Vec<u8> = output
        .contents()
        .into_iter()
        .filter(|b| b"slow!".contains(b))
        .collect();
    assert_eq!(slow, b"slow!");
    assert_eq!(output.count_of(b'F'), 1);
}

#[test]
fn test_file_sink_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = [("input-1.txt", "AA"), ("input-2.txt", "BBB"), ("input-3.txt", "C")];
    for (name, contents) in inputs {
        std::fs::write(dir.path().join(name), contents).unwrap();
    }
    let output_path = dir.path().join("output");

    let mut merger = StreamMerge::builder()
        .buffer_capacity(4)
        .sink(FileSink::create(&output_path))
        .start()
        .unwrap();
    for (name, _) in inputs {
        merger.register_file(dir.path().join(name)).unwrap();
    }
    let result = merger.shutdown().unwrap();

    assert_eq!(result.bytes_written, 6);
    let written = std::fs::read(&output_path).unwrap();
    assert_eq!(sorted(written), b"AABBBC");
}

#[tokio::test]
async fn test_channel_sink_end_to_end() {
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(2);

    let merge = tokio::task::spawn_blocking(move || {
        let mut merger = StreamMerge::builder()
            .consumer_threshold(1)
            .sink_batch_size(4)
            .sink(ChannelSink::new(tx))
            .start()?;
        merger.register_source("a", ByteSource::bytes(vec![b'a'; 20]))?;
        merger.register_source("b", ByteSource::bytes(vec![b'b'; 20]))?;
        merger.shutdown()
    });

    let mut received = Vec::new();
    while let Some(batch) = rx.recv().await {
        assert!(batch.len() <= 4);
        received.extend(batch);
    }

    let result = merge.await.unwrap().unwrap();
    assert_eq!(result.bytes_written, 40);
    assert_eq!(received.len(), 40);
    assert_eq!(received.iter().filter(|&&b| b == b'a').count(), 20);
}

#[test]
fn test_duplicate_source_id_rejected() {
    let mut merger = StreamMerge::builder()
        .sink(MemorySink::new())
        .start()
        .unwrap();
    merger
        .register_source("dup", ByteSource::bytes(b"1".to_vec()))
        .unwrap();

    let again = merger.register_source("dup", ByteSource::bytes(b"2".to_vec()));
    assert!(matches!(again, Err(MergeError::DuplicateSourceId { .. })));

    let result = merger.shutdown().unwrap();
    assert_eq!(result.bytes_written, 1);
}

#[test]
fn test_stats_after_sources_finish() {
    let mut merger = StreamMerge::builder()
        .consumer_threshold(1)
        .sink(MemorySink::new())
        .start()
        .unwrap();
    merger
        .register_source("a", ByteSource::bytes(b"abcd".to_vec()))
        .unwrap();

    // Wait until the producer has reported.
    while merger.stats().active_producers > 0 {
        std::thread::yield_now();
    }
    let stats = merger.stats();
    assert_eq!(stats.sources_registered, 1);
    assert_eq!(stats.bytes_read, 4);

    merger.shutdown().unwrap();
}
