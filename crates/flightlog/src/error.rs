//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use flightlog_config::ConfigError;
use flightlog_core::{CoreError, GoalStatus, SendFailure};
use flightlog_link::{CommandKind, LinkError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Link ─────────────────────────────────────────────────────────

    #[error("No vehicle heard on {bind} within {seconds}s")]
    #[diagnostic(
        code(flightlog::no_vehicle),
        help(
            "Check that the vehicle (or its telemetry router) sends to this address.\n\
             Or give the vehicle address explicitly: flightlog --remote <host:port> ..."
        )
    )]
    NoVehicle { bind: String, seconds: u64 },

    #[error("Link error: {0}")]
    #[diagnostic(code(flightlog::link))]
    Link(#[from] LinkError),

    #[error("Could not send {command}: {reason}")]
    #[diagnostic(
        code(flightlog::send_failed),
        help("The outbound queue is full or the link is down. Retry, or run with -v for details.")
    )]
    SendFailed { command: CommandKind, reason: String },

    // ── Goals ────────────────────────────────────────────────────────

    #[error("Log {goal} ended {status}: {reason}")]
    #[diagnostic(code(flightlog::goal_failed))]
    GoalFailed {
        goal: &'static str,
        status: GoalStatus,
        reason: String,
    },

    #[error("Log {id} not found on the vehicle")]
    #[diagnostic(
        code(flightlog::log_not_found),
        help("Run: flightlog list to see the logs the vehicle holds")
    )]
    LogNotFound { id: u16 },

    #[error("Log transfer service stopped")]
    #[diagnostic(code(flightlog::stopped))]
    CoordinatorStopped,

    #[error("Interrupted")]
    #[diagnostic(code(flightlog::interrupted))]
    Interrupted,

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(flightlog::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(flightlog::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: flightlog config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(flightlog::config))]
    Config(Box<figment::Error>),

    #[error("Could not write configuration: {0}")]
    #[diagnostic(code(flightlog::config_write))]
    ConfigWrite(#[from] toml::ser::Error),

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Vehicle did not answer within {seconds}s")]
    #[diagnostic(
        code(flightlog::timeout),
        help("Increase timeout with --timeout or check the telemetry link.")
    )]
    Timeout { seconds: u64 },

    // ── IO ───────────────────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoVehicle { .. } | Self::Link(_) | Self::SendFailed { .. } => {
                exit_code::CONNECTION
            }
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::LogNotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Interrupted => exit_code::INTERRUPTED,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Library errors → CliError ────────────────────────────────────────

impl From<SendFailure> for CliError {
    fn from(failure: SendFailure) -> Self {
        Self::SendFailed {
            command: failure.command,
            reason: failure.reason,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::CoordinatorStopped => Self::CoordinatorStopped,
            CoreError::Timeout(after) => Self::Timeout {
                seconds: after.as_secs(),
            },
            CoreError::Send(failure) => failure.into(),
            CoreError::Link(err) => Self::Link(err),
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::UnknownProfile { name } => Self::ProfileNotFound {
                name,
                available: "(run: flightlog config profiles)".into(),
            },
            ConfigError::Serialization(err) => Self::ConfigWrite(err),
            ConfigError::Figment(err) => Self::Config(err),
            ConfigError::Io(err) => Self::Io(err),
        }
    }
}
