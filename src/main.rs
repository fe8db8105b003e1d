use anyhow::{anyhow, Result};
use axslog::{output, parse_chunk, LogFormat, ParseMode, ParseOptions, Record};
use clap::Parser;
use memchr::memchr_iter;
use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log format; guessed per line when omitted
    #[arg(short, long, value_enum)]
    format: Option<LogFormat>,

    #[arg(short, long, value_enum, default_value_t = ParseMode::Lenient, env = "AXSLOG_MODE")]
    mode: ParseMode,

    #[arg(short, long, default_value = "stdout")]
    output: String,

    #[arg(value_name = "FILE")]
    file: String,

    #[arg(long, default_value = "100000")]
    batch_size: usize,

    #[arg(long)]
    benchmark: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let options = ParseOptions { mode: args.mode };

    let start_time = Instant::now();
    let file_size = std::fs::metadata(&args.file)?.len();

    // mmap the file; empty files cannot be mapped everywhere
    let file = File::open(&args.file)?;
    let mmap = if file_size > 0 {
        Some(unsafe { Mmap::map(&file)? })
    } else {
        None
    };
    let input: &[u8] = mmap.as_deref().unwrap_or_default();

    let batches = split_batches(input, args.batch_size.max(1));
    info!(file = %args.file, batches = batches.len(), "parsing");

    // channel for sending parsed batches to writer
    let (tx, rx) = crossbeam::channel::unbounded::<Vec<Record>>();

    // spawn writer thread
    let output_arg = args.output.clone();
    let writer_handle = std::thread::spawn(move || -> Result<()> {
        let mut writer = output::create_writer(&output_arg)?;
        for batch in rx {
            writer.write_batch(&batch)?;
        }
        writer.finish()
    });

    let run_batch = |batch: &&[u8]| -> Counts {
        let (records, failed) = parse_batch(batch, args.format, options);
        let parsed = records.len();
        if tx.send(records).is_err() {
            warn!("writer stopped, dropping batch");
        }
        Counts { parsed, failed }
    };

    #[cfg(feature = "parallel")]
    let counts: Counts = batches.par_iter().map(run_batch).reduce(Counts::default, Counts::merge);
    #[cfg(not(feature = "parallel"))]
    let counts: Counts = batches.iter().map(run_batch).fold(Counts::default(), Counts::merge);

    // close channel so writer thread can finish
    drop(tx);
    writer_handle
        .join()
        .map_err(|_| anyhow!("writer thread panicked"))??;

    if counts.failed > 0 {
        warn!(failed = counts.failed, parsed = counts.parsed, "some lines could not be parsed");
    }

    if args.benchmark {
        print_benchmark_results(file_size, counts, start_time.elapsed());
    }

    Ok(())
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    parsed: usize,
    failed: usize,
}

impl Counts {
    fn merge(self, other: Counts) -> Counts {
        Counts {
            parsed: self.parsed + other.parsed,
            failed: self.failed + other.failed,
        }
    }
}

/// Parses one batch of raw lines, returning the records and the number of rejected lines.
///
/// Bytes that are not valid UTF-8 are replaced rather than failing the batch.
fn parse_batch(
    batch: &[u8],
    format: Option<LogFormat>,
    options: ParseOptions,
) -> (Vec<Record>, usize) {
    let text = String::from_utf8_lossy(batch);
    if let Cow::Owned(_) = text {
        debug!("replaced invalid utf-8 in batch");
    }
    let mut records = Vec::new();
    let mut failed = 0usize;
    for result in parse_chunk(&text, format, options) {
        match result {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(kind = ?e.kind(), error = %e, "skipping line");
                failed += 1;
            }
        }
    }
    (records, failed)
}

/// Slices `input` into runs of `batch_size` lines, cut on newline boundaries.
fn split_batches(input: &[u8], batch_size: usize) -> Vec<&[u8]> {
    let mut batches = Vec::new();
    let mut start = 0usize;
    for (n, nl) in memchr_iter(b'\n', input).enumerate() {
        if (n + 1) % batch_size == 0 {
            batches.push(&input[start..=nl]);
            start = nl + 1;
        }
    }
    if start < input.len() {
        batches.push(&input[start..]);
    }
    batches
}

fn print_benchmark_results(file_size: u64, counts: Counts, duration: std::time::Duration) {
    let duration_secs = duration.as_secs_f64();
    let total_lines = counts.parsed + counts.failed;
    let file_size_mb = file_size as f64 / (1024.0 * 1024.0);

    eprintln!("\n=== BENCHMARK RESULTS ===");
    eprintln!("File size: {:.2} MB", file_size_mb);
    eprintln!("Total lines: {}", total_lines);
    eprintln!("Parsed records: {}", counts.parsed);
    eprintln!("Rejected lines: {}", counts.failed);
    eprintln!("Processing time: {:.3}s", duration_secs);
    eprintln!("Throughput: {:.2} MB/s", file_size_mb / duration_secs);
    eprintln!("Throughput: {:.0} lines/s", total_lines as f64 / duration_secs);
    if total_lines > 0 {
        eprintln!(
            "Parse success rate: {:.1}%",
            (counts.parsed as f64 / total_lines as f64) * 100.0
        );
    }
}
