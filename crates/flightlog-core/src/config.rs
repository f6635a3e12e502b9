// ── Runtime transfer configuration ──
//
// Describes how the coordinator talks to one vehicle. Never touches disk;
// `flightlog-config` (or a test) builds one and hands it in.

use flightlog_link::{LOG_DATA_CAPACITY, Target};

use crate::error::CoreError;

/// Configuration for one [`LogTransfer`](crate::LogTransfer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Vehicle address stamped on every outbound command.
    pub target: Target,
    /// Largest chunk the translator will emit. Defaults to the LOG_DATA
    /// field size; a chunk shorter than this ends a fetch.
    pub max_chunk_capacity: usize,
    /// Depth of the coordinator's event queue.
    pub event_queue_size: usize,
    /// Capacity of the record publish channel. Slow subscribers lag.
    pub publish_capacity: usize,
    /// Send one LOG_REQUEST_END at start-up to close any session a
    /// previous process left open on the vehicle.
    pub flush_on_start: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            target: Target::default(),
            max_chunk_capacity: LOG_DATA_CAPACITY,
            event_queue_size: 64,
            publish_capacity: 1024,
            flush_on_start: true,
        }
    }
}

impl TransferConfig {
    pub fn with_target(target: Target) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let zero = [
            ("max_chunk_capacity", self.max_chunk_capacity),
            ("event_queue_size", self.event_queue_size),
            ("publish_capacity", self.publish_capacity),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);

        if let Some((name, _)) = zero {
            return Err(CoreError::Config {
                message: format!("{name} must be greater than zero"),
            });
        }
        // Every full LOG_DATA chunk would otherwise look short and end the fetch.
        if self.max_chunk_capacity > LOG_DATA_CAPACITY {
            return Err(CoreError::Config {
                message: format!(
                    "max_chunk_capacity {} exceeds the LOG_DATA limit of {LOG_DATA_CAPACITY}",
                    self.max_chunk_capacity
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(TransferConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_sized_queues_are_rejected() {
        let config = TransferConfig {
            event_queue_size: 0,
            ..TransferConfig::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("event_queue_size"), "{err}");
    }

    #[test]
    fn chunk_capacity_is_capped_at_wire_limit() {
        let at_limit = TransferConfig {
            max_chunk_capacity: LOG_DATA_CAPACITY,
            ..TransferConfig::default()
        };
        assert!(at_limit.validate().is_ok());

        let config = TransferConfig {
            max_chunk_capacity: LOG_DATA_CAPACITY + 1,
            ..TransferConfig::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("max_chunk_capacity"), "{err}");
    }
}
