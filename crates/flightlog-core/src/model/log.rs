// ── Log records ──

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the vehicle's log directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntrySummary {
    pub id: u16,
    /// Total number of logs on the vehicle. Zero means the directory is
    /// empty and this record is only a marker.
    pub num_logs: u16,
    pub last_log_id: u16,
    /// Log creation time. The UNIX epoch when the vehicle had no clock.
    pub time_utc: DateTime<Utc>,
    pub size_bytes: u32,
    /// When this record was ingested locally.
    pub received_at: DateTime<Utc>,
}

impl LogEntrySummary {
    /// `true` for the "no logs on board" marker record.
    pub fn is_empty_marker(&self) -> bool {
        self.num_logs == 0
    }
}

/// A slice of one log's bytes, already clamped to the chunk capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDataChunk {
    pub id: u16,
    pub offset: u32,
    pub bytes: Bytes,
    pub received_at: DateTime<Utc>,
}

impl LogDataChunk {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Offset one past the last byte in this chunk.
    pub fn end_offset(&self) -> u64 {
        u64::from(self.offset).saturating_add(u64::try_from(self.bytes.len()).unwrap_or(u64::MAX))
    }
}

/// Element type of the publish channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    Entry(LogEntrySummary),
    Chunk(LogDataChunk),
}

impl LogRecord {
    pub fn log_id(&self) -> u16 {
        match self {
            Self::Entry(entry) => entry.id,
            Self::Chunk(chunk) => chunk.id,
        }
    }
}

/// Terminal output of a fetch goal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSummary {
    pub id: u16,
    pub bytes_received: u64,
    pub chunks: u32,
}
