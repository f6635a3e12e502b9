// ── Log transfer domain model ──
//
// Validated records republished to consumers and the request types the
// goal front ends accept.

pub mod log;
pub mod request;

// ── Re-exports ──────────────────────────────────────────────────────

pub use log::{FetchSummary, LogDataChunk, LogEntrySummary, LogRecord};
pub use request::{DataRequest, ListRequest};
