//! `flightlog fetch`: download one log to a file or stdout.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::{debug, warn};

use flightlog_core::{DataRequest, FetchSummary, ListRequest, LogDataChunk};

use crate::cli::FetchArgs;
use crate::commands::Context;
use crate::commands::list::fetch_directory;
use crate::commands::util::require_success;
use crate::error::CliError;
use crate::output;

// ── Sinks ────────────────────────────────────────────────────────────

/// Where downloaded bytes go. Offsets are relative to the requested start.
enum Sink {
    /// Chunks land at their own offset, so reordering leaves no damage.
    File { file: File, base: u32 },
    /// Sequential only; duplicates are skipped and gaps logged.
    Stdout { next: u64, base: u32 },
}

impl Sink {
    fn open(path: Option<&Path>, base: u32) -> Result<Self, CliError> {
        Ok(match path {
            Some(path) => Self::File {
                file: File::create(path)?,
                base,
            },
            None => Self::Stdout {
                next: u64::from(base),
                base,
            },
        })
    }

    fn write_chunk(&mut self, chunk: &LogDataChunk) -> Result<(), CliError> {
        match self {
            Self::File { file, base } => {
                let Some(position) = chunk.offset.checked_sub(*base) else {
                    warn!(offset = chunk.offset, "chunk before requested start, skipped");
                    return Ok(());
                };
                file.seek(SeekFrom::Start(u64::from(position)))?;
                file.write_all(&chunk.bytes)?;
            }
            Self::Stdout { next, base } => {
                let offset = u64::from(chunk.offset);
                if offset < *next {
                    debug!(offset, "duplicate chunk skipped");
                    return Ok(());
                }
                if offset > *next {
                    warn!(
                        expected = *next - u64::from(*base),
                        got = offset - u64::from(*base),
                        "gap in log data; output will be short"
                    );
                }
                io::stdout().lock().write_all(&chunk.bytes)?;
                *next = chunk.end_offset();
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<(), CliError> {
        match self {
            Self::File { file, .. } => file.sync_all()?,
            Self::Stdout { .. } => io::stdout().lock().flush()?,
        }
        Ok(())
    }
}

// ── Progress ─────────────────────────────────────────────────────────

fn progress_bar(total: u64, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
    let style = ProgressStyle::with_template(
        "{spinner} [{elapsed_precise}] {bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn handle(args: FetchArgs, ctx: &Context) -> Result<(), CliError> {
    // The directory gives the log size; the vehicle never says a log is missing.
    let directory = fetch_directory(ctx, ListRequest::all()).await?;
    let entry = directory
        .iter()
        .find(|e| e.id == args.id && !e.is_empty_marker())
        .ok_or(CliError::LogNotFound { id: args.id })?;

    let size = entry.size_bytes;
    if args.offset > size {
        return Err(CliError::Validation {
            field: "offset".into(),
            reason: format!("log {} is only {size} bytes", args.id),
        });
    }
    let remaining = size - args.offset;
    let count = args.count.map_or(remaining, |c| c.min(remaining));

    let mut sink = Sink::open(args.out.as_deref(), args.offset)?;
    if count == 0 {
        sink.finish()?;
        return Ok(());
    }

    let bar = progress_bar(u64::from(count), ctx.quiet);
    let fetches = ctx.transfer.fetch_operations();
    let mut handle = fetches
        .submit(DataRequest::new(args.id, args.offset, count))
        .await?;
    let started = Instant::now();

    // The timeout applies between chunks, not to the whole download.
    loop {
        tokio::select! {
            chunk = handle.next_feedback() => {
                let Some(chunk) = chunk else { break };
                sink.write_chunk(&chunk)?;
                bar.inc(u64::try_from(chunk.len()).unwrap_or(u64::MAX));
            }
            () = tokio::time::sleep(ctx.timeout) => {
                bar.abandon();
                fetches.cancel(&handle).await?;
                return Err(CliError::Timeout { seconds: ctx.timeout.as_secs() });
            }
            _ = tokio::signal::ctrl_c() => {
                bar.abandon();
                fetches.cancel(&handle).await?;
                return Err(CliError::Interrupted);
            }
        }
    }

    let summary = require_success("fetch", handle.wait().await)?;
    bar.finish_and_clear();
    sink.finish()?;

    if summary.bytes_received < u64::from(count) {
        warn!(
            received = summary.bytes_received,
            expected = count,
            "log ended early; some chunks were lost"
        );
    }

    let elapsed = Duration::from_millis(
        u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    );
    if args.out.is_some() {
        let out = output::render_single(
            ctx.output,
            &summary,
            |s| describe(s, elapsed),
            |s| s.bytes_received.to_string(),
        );
        output::print_output(&out, ctx.quiet);
    } else if !ctx.quiet {
        // stdout carries the log itself.
        eprintln!("{}", describe(&summary, elapsed));
    }
    Ok(())
}

fn describe(summary: &FetchSummary, elapsed: Duration) -> String {
    format!(
        "Fetched log {}: {} in {} chunks ({})",
        summary.id,
        output::format_size(summary.bytes_received),
        summary.chunks,
        humantime::format_duration(elapsed),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bytes::Bytes;
    use chrono::Utc;

    use super::*;

    fn chunk(offset: u32, fill: u8, len: usize) -> LogDataChunk {
        LogDataChunk {
            id: 1,
            offset,
            bytes: Bytes::from(vec![fill; len]),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn file_sink_places_chunks_at_their_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.bin");

        let mut sink = Sink::open(Some(path.as_path()), 100).unwrap();
        sink.write_chunk(&chunk(190, b'b', 90)).unwrap();
        sink.write_chunk(&chunk(100, b'a', 90)).unwrap();
        sink.finish().unwrap();

        let written = std::fs::read(&path).unwrap();
        assert_eq!(written.len(), 180);
        assert!(written[..90].iter().all(|&b| b == b'a'));
        assert!(written[90..].iter().all(|&b| b == b'b'));
    }

    #[test]
    fn file_sink_skips_chunk_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.bin");

        let mut sink = Sink::open(Some(path.as_path()), 100).unwrap();
        sink.write_chunk(&chunk(10, b'x', 90)).unwrap();
        sink.finish().unwrap();
        assert!(std::fs::read(&path).unwrap().is_empty());
    }

    #[test]
    fn describe_names_size_and_chunks() {
        let summary = FetchSummary {
            id: 4,
            bytes_received: 900,
            chunks: 10,
        };
        let text = describe(&summary, Duration::from_millis(1500));
        assert!(text.starts_with("Fetched log 4:"));
        assert!(text.contains("10 chunks"));
        assert!(text.contains("1s 500ms"));
    }
}
