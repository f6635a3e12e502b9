//! `flightlog list`: enumerate the vehicle's log directory.

use tabled::Tabled;
use tracing::debug;

use flightlog_core::{ListRequest, LogEntrySummary};

use crate::cli::{ListArgs, OutputFormat};
use crate::commands::Context;
use crate::commands::util::{Waited, require_success, wait_goal};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct LogRow {
    #[tabled(rename = "ID")]
    id: u16,
    #[tabled(rename = "Recorded (UTC)")]
    recorded: String,
    #[tabled(rename = "Size")]
    size: String,
}

impl From<&LogEntrySummary> for LogRow {
    fn from(entry: &LogEntrySummary) -> Self {
        Self {
            id: entry.id,
            recorded: output::format_time(&entry.time_utc),
            size: output::format_size(u64::from(entry.size_bytes)),
        }
    }
}

/// Run a list goal over `request` and return the entries, sorted by id.
pub async fn fetch_directory(
    ctx: &Context,
    request: ListRequest,
) -> Result<Vec<LogEntrySummary>, CliError> {
    let lists = ctx.transfer.list_operations();
    let mut handle = lists.submit(request).await?;

    match wait_goal(&mut handle, ctx.timeout).await {
        Waited::Done(result) => require_success("list", result),
        Waited::TimedOut => {
            lists.cancel(&handle).await?;
            Err(CliError::Timeout {
                seconds: ctx.timeout.as_secs(),
            })
        }
        Waited::Interrupted => {
            lists.cancel(&handle).await?;
            Err(CliError::Interrupted)
        }
    }
}

pub async fn handle(args: ListArgs, ctx: &Context) -> Result<(), CliError> {
    if args.start > args.end {
        return Err(CliError::Validation {
            field: "start".into(),
            reason: format!("{} is past --end {}", args.start, args.end),
        });
    }

    let entries = fetch_directory(ctx, ListRequest::new(args.start, args.end)).await?;
    // A vehicle with no logs answers with a single zero-count marker.
    let entries: Vec<_> = entries
        .into_iter()
        .filter(|e| !e.is_empty_marker())
        .collect();
    debug!(count = entries.len(), "log directory received");

    if entries.is_empty() && ctx.output == OutputFormat::Table {
        if !ctx.quiet {
            eprintln!("No logs on the vehicle");
        }
        return Ok(());
    }

    let out = output::render_list(ctx.output, &entries, |e| LogRow::from(e), |e| {
        e.id.to_string()
    });
    output::print_output(&out, ctx.quiet);
    Ok(())
}
