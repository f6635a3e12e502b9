//! Shared helpers for command handlers.

use std::time::Duration;

use flightlog_core::{GoalHandle, GoalKind, GoalResult, GoalStatus};

use crate::error::CliError;

/// How waiting on a goal ended.
pub enum Waited<O> {
    Done(GoalResult<O>),
    TimedOut,
    Interrupted,
}

/// Wait for a goal's result, giving up after `timeout` or on Ctrl-C.
pub async fn wait_goal<K: GoalKind>(
    handle: &mut GoalHandle<K>,
    timeout: Duration,
) -> Waited<K::Output> {
    tokio::select! {
        result = handle.wait() => Waited::Done(result),
        () = tokio::time::sleep(timeout) => Waited::TimedOut,
        _ = tokio::signal::ctrl_c() => Waited::Interrupted,
    }
}

/// Turn a terminal result into an error unless it succeeded.
///
/// A goal that succeeded but whose closing stop failed still hands back its
/// output; the failure is only logged.
pub fn require_success<O>(goal: &'static str, result: GoalResult<O>) -> Result<O, CliError> {
    if result.status != GoalStatus::Succeeded {
        return Err(CliError::GoalFailed {
            goal,
            status: result.status,
            reason: result.reason.unwrap_or_else(|| "no reason given".into()),
        });
    }
    if !result.success {
        tracing::warn!(goal, "vehicle may still be transferring; run: flightlog end");
    }
    Ok(result.output)
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(prompt_err)?;
    Ok(confirmed)
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e} (use --yes in non-interactive contexts)"),
    }
}
