//! Log retrieval layer between `flightlog-link` and consumers (CLI, services).
//!
//! This crate owns the coordination logic for pulling onboard logs off a
//! MAVLink vehicle over a lossy link:
//!
//! - **[`LogTransfer`]**: Facade that wires a [`Link`](flightlog_link::Link)
//!   to the coordinator, spawns the background tasks and vends everything
//!   below. [`start()`](LogTransfer::start) flushes any stale vehicle
//!   session first.
//!
//! - **Coordinator**: Single actor task owning the session state
//!   ([`SessionState`]): idle, listing, or downloading. The vehicle allows
//!   one session at a time; a newer goal preempts or supersedes the active
//!   one after a LOG_REQUEST_END.
//!
//! - **Goals**: [`ListOperations`] and [`FetchOperations`] return a
//!   [`GoalHandle`] exposing status, streamed feedback and the terminal
//!   [`GoalResult`].
//!
//! - **Publishing**: Every translated entry and chunk goes out on a
//!   broadcast channel ([`RecordStream`]) whether or not a goal claims it.
//!
//! - **Thin services**: [`LogTransfer::request_log_list`] and friends send
//!   one raw command with no coordination.

pub mod config;
pub mod convert;
pub mod coordinator;
pub mod emitter;
pub mod error;
pub mod goal;
pub mod model;
pub mod operation;
pub mod stream;
pub mod transfer;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::TransferConfig;
pub use coordinator::SessionState;
pub use emitter::CommandEmitter;
pub use error::{CoreError, SendFailure};
pub use goal::{
    FetchGoal, GoalHandle, GoalId, GoalKind, GoalResult, GoalSnapshot, GoalStatus, ListGoal,
};
pub use model::{
    DataRequest, FetchSummary, ListRequest, LogDataChunk, LogEntrySummary, LogRecord,
};
pub use operation::{FetchOperations, ListOperations};
pub use stream::{RecordStream, RecordWatchStream};
pub use transfer::LogTransfer;
