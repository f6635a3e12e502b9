//! `flightlog watch`: stream every translated entry and chunk.

use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;

use flightlog_core::LogRecord;

use crate::cli::{OutputFormat, WatchArgs};
use crate::commands::Context;
use crate::error::CliError;
use crate::output;

/// One line of watch output.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RecordLine {
    Entry {
        id: u16,
        num_logs: u16,
        last_log_id: u16,
        time_utc: DateTime<Utc>,
        size_bytes: u32,
    },
    Chunk {
        id: u16,
        offset: u32,
        len: usize,
        received_at: DateTime<Utc>,
    },
}

impl From<&LogRecord> for RecordLine {
    fn from(record: &LogRecord) -> Self {
        match record {
            LogRecord::Entry(e) => Self::Entry {
                id: e.id,
                num_logs: e.num_logs,
                last_log_id: e.last_log_id,
                time_utc: e.time_utc,
                size_bytes: e.size_bytes,
            },
            LogRecord::Chunk(c) => Self::Chunk {
                id: c.id,
                offset: c.offset,
                len: c.len(),
                received_at: c.received_at,
            },
        }
    }
}

fn render_line(format: OutputFormat, line: &RecordLine, color: bool) -> String {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(line, true),
        OutputFormat::Yaml => format!("---\n{}", serde_yaml::to_string(line).unwrap_or_default()),
        OutputFormat::Table | OutputFormat::Plain => match line {
            RecordLine::Entry {
                id,
                last_log_id,
                time_utc,
                size_bytes,
                ..
            } => format!(
                "{}  log {id}/{last_log_id}  {}  {}",
                label("entry", color),
                output::format_time(time_utc),
                output::format_size(u64::from(*size_bytes)),
            ),
            RecordLine::Chunk {
                id, offset, len, ..
            } => format!("{}  log {id}  @{offset}  {len} bytes", label("chunk", color)),
        },
    }
}

fn label(kind: &str, color: bool) -> String {
    match (kind, color) {
        (_, false) => kind.to_owned(),
        ("entry", true) => kind.green().to_string(),
        _ => kind.cyan().to_string(),
    }
}

pub async fn handle(args: WatchArgs, ctx: &Context) -> Result<(), CliError> {
    let mut records = ctx.transfer.subscribe();
    let mut seen = 0usize;

    if !ctx.quiet {
        eprintln!("Watching log traffic (Ctrl-C to stop)");
    }

    loop {
        if args.limit.is_some_and(|limit| seen >= limit) {
            return Ok(());
        }
        tokio::select! {
            record = records.recv() => {
                let Some(record) = record else { return Ok(()) };
                seen += 1;
                let line = render_line(ctx.output, &RecordLine::from(&record), ctx.color);
                output::print_output(&line, false);
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use flightlog_core::LogDataChunk;

    fn chunk() -> LogRecord {
        LogRecord::Chunk(LogDataChunk {
            id: 2,
            offset: 180,
            bytes: Bytes::from_static(&[0; 90]),
            received_at: Utc::now(),
        })
    }

    #[test]
    fn chunk_renders_as_text() {
        let line = render_line(OutputFormat::Table, &RecordLine::from(&chunk()), false);
        assert_eq!(line, "chunk  log 2  @180  90 bytes");
    }

    #[test]
    fn json_lines_are_tagged() {
        let line = render_line(OutputFormat::Json, &RecordLine::from(&chunk()), true);
        assert!(line.starts_with(r#"{"kind":"chunk","id":2,"offset":180,"len":90"#));
        assert!(!line.contains('\n'));
    }
}
