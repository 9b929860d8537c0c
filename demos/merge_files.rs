//! Merge files example.
//!
//! Merges input files into a single output file. Paths come from the command
//! line, or from stdin one per line until a line reading `NULL`. The consumer
//! starts writing once three files are registered.
//!
//! Run with: cargo run --example merge_files -- input-1.txt input-2.txt input-3.txt
//! Or interactively: cargo run --example merge_files
//!
//! Set `MERGE_OUTPUT` to change the output path (default: `output`).

use std::io::{self, BufRead, Write};

use stream_merge::{FileSink, MergeEvent, StreamMerge};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let output = std::env::var("MERGE_OUTPUT").unwrap_or_else(|_| "output".to_string());

    let mut merger = StreamMerge::builder()
        .buffer_capacity(10)
        .consumer_threshold(3)
        .sink(FileSink::create(&output))
        .on_event(|event| {
            if let MergeEvent::SourceFailed { source_id, error } = event {
                eprintln!("Skipping {source_id}: {error}");
            }
        })
        .start()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();
        loop {
            print!("Enter input file or type NULL to finish: ");
            io::stdout().flush()?;
            let Some(line) = lines.next() else { break };
            let path = line?;
            let path = path.trim();
            if path == "NULL" {
                break;
            }
            if !path.is_empty() {
                merger.register_file(path)?;
            }
        }
    } else {
        for path in &args {
            merger.register_file(path)?;
        }
    }

    merger.no_more_sources()?;
    let result = merger.shutdown()?;

    println!(
        "Merged {} sources into {output} ({} bytes)",
        result.sources_registered, result.bytes_written
    );
    for failure in &result.failures {
        println!("  failed: {} ({})", failure.source_id, failure.error);
    }

    Ok(())
}
