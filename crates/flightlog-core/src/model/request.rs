// ── Goal requests ──
//
// Passed through to the vehicle verbatim; no range validation happens
// locally.

use flightlog_link::{DATA_COUNT_ALL, LIST_END_ALL};
use serde::{Deserialize, Serialize};

/// Enumerate log entries with ids in `start_id..=end_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequest {
    pub start_id: u16,
    pub end_id: u16,
}

impl ListRequest {
    pub const fn new(start_id: u16, end_id: u16) -> Self {
        Self { start_id, end_id }
    }

    /// Every log on the vehicle.
    pub const fn all() -> Self {
        Self::new(0, LIST_END_ALL)
    }

    pub fn contains(&self, id: u16) -> bool {
        (self.start_id..=self.end_id).contains(&id)
    }
}

impl Default for ListRequest {
    fn default() -> Self {
        Self::all()
    }
}

/// Fetch `count` bytes of log `id` starting at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRequest {
    pub id: u16,
    pub offset: u32,
    pub count: u32,
}

impl DataRequest {
    pub const fn new(id: u16, offset: u32, count: u32) -> Self {
        Self { id, offset, count }
    }

    /// The whole log, from the first byte.
    pub const fn whole(id: u16) -> Self {
        Self::new(id, 0, DATA_COUNT_ALL)
    }

    /// Offset one past the last requested byte.
    pub fn end_offset(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.count)
    }
}
