//! `flightlog raw`: single commands that bypass coordination.

use tracing::info;

use flightlog_link::CommandKind;

use crate::cli::{RawArgs, RawCommand};
use crate::commands::Context;
use crate::error::CliError;

pub fn handle(args: RawArgs, ctx: &Context) -> Result<(), CliError> {
    let transfer = &ctx.transfer;
    let command = match args.command {
        RawCommand::List { start, end } => {
            transfer.request_log_list(start, end)?;
            CommandKind::RequestList
        }
        RawCommand::Data { id, offset, count } => {
            transfer.request_log_data(id, offset, count)?;
            CommandKind::RequestData
        }
        RawCommand::End => {
            transfer.request_log_end()?;
            CommandKind::RequestEnd
        }
    };

    info!(%command, vehicle = %transfer.config().target, "raw command sent");
    if !ctx.quiet {
        eprintln!("Sent {command} to {}", transfer.config().target);
    }
    Ok(())
}
