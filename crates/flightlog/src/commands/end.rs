//! `flightlog end`: stop whatever transfer the vehicle is running.

use crate::commands::Context;
use crate::commands::util::confirm;
use crate::error::CliError;

/// Another ground station may own the running transfer, so this asks first.
///
/// The coordinated end only covers goals of this process; the raw stop that
/// follows reaches sessions started elsewhere.
pub async fn handle(ctx: &Context) -> Result<(), CliError> {
    let target = ctx.transfer.config().target;
    if !confirm(&format!("Stop the log transfer on vehicle {target}?"), ctx.yes)? {
        return Ok(());
    }

    ctx.transfer.end_transfer().await?;
    ctx.transfer.request_log_end()?;
    if !ctx.quiet {
        eprintln!("Log transfer on vehicle {target} ended");
    }
    Ok(())
}
