// ── Wire-to-domain conversions ──
//
// Bridges raw `flightlog_link` records into `flightlog_core::model` types.
// Pure field mapping plus the LOG_DATA clamp: a chunk never exceeds the
// configured capacity and never reads past the payload that arrived.

use chrono::{DateTime, Utc};
use flightlog_link::{LogDataRaw, LogEntryRaw};

use crate::model::{LogDataChunk, LogEntrySummary};

/// Seconds since the UNIX epoch to `DateTime<Utc>`.
fn epoch_to_datetime(secs: u32) -> DateTime<Utc> {
    DateTime::from_timestamp(i64::from(secs), 0).unwrap_or_default()
}

pub fn to_entry_summary(raw: &LogEntryRaw, received_at: DateTime<Utc>) -> LogEntrySummary {
    LogEntrySummary {
        id: raw.id,
        num_logs: raw.num_logs,
        last_log_id: raw.last_log_num,
        time_utc: epoch_to_datetime(raw.time_utc),
        size_bytes: raw.size,
        received_at,
    }
}

/// Copy `min(count, capacity)` bytes from the front of the payload.
pub fn to_data_chunk(
    raw: &LogDataRaw,
    max_chunk_capacity: usize,
    received_at: DateTime<Utc>,
) -> LogDataChunk {
    let claimed = usize::try_from(raw.count).unwrap_or(usize::MAX);
    let effective = claimed.min(max_chunk_capacity).min(raw.data.len());

    LogDataChunk {
        id: raw.id,
        offset: raw.ofs,
        bytes: raw.data.slice(..effective),
        received_at,
    }
}
