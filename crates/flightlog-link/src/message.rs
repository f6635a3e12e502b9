// ── Wire records ──
//
// The five MAVLink common-dialect messages used for onboard log transfer,
// split by direction. Field names follow the wire definitions; conversion
// to domain records happens in `flightlog-core`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Size of the fixed `data` array in a LOG_DATA message.
pub const LOG_DATA_CAPACITY: usize = 90;

/// `end` value of a LOG_REQUEST_LIST meaning "through the last log".
pub const LIST_END_ALL: u16 = u16::MAX;

/// `count` value of a LOG_REQUEST_DATA meaning "to the end of the log".
pub const DATA_COUNT_ALL: u32 = u32::MAX;

/// A MAVLink (system id, component id) address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub system_id: u8,
    pub component_id: u8,
}

impl Target {
    pub const fn new(system_id: u8, component_id: u8) -> Self {
        Self {
            system_id,
            component_id,
        }
    }
}

impl Default for Target {
    /// First autopilot on the first vehicle.
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.system_id, self.component_id)
    }
}

// ── Inbound (vehicle → ground) ───────────────────────────────────────

/// LOG_ENTRY: one summary record per onboard log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntryRaw {
    pub id: u16,
    pub num_logs: u16,
    pub last_log_num: u16,
    /// Seconds since the UNIX epoch, 0 when the vehicle has no clock.
    pub time_utc: u32,
    pub size: u32,
}

/// LOG_DATA: one chunk of a log's bytes.
///
/// `count` is what the sender claims; `data` is whatever payload buffer
/// arrived. They are allowed to disagree and consumers must clamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDataRaw {
    pub id: u16,
    pub ofs: u32,
    pub count: u32,
    pub data: Bytes,
}

/// Messages the link delivers to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    LogEntry(LogEntryRaw),
    LogData(LogDataRaw),
}

// ── Outbound (ground → vehicle) ──────────────────────────────────────

/// Which of the three log-transfer commands a message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum CommandKind {
    #[strum(serialize = "LOG_REQUEST_LIST")]
    RequestList,
    #[strum(serialize = "LOG_REQUEST_DATA")]
    RequestData,
    #[strum(serialize = "LOG_REQUEST_END")]
    RequestEnd,
}

/// Commands sent to the vehicle, each addressed to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundMessage {
    RequestList {
        target: Target,
        start: u16,
        end: u16,
    },
    RequestData {
        target: Target,
        id: u16,
        ofs: u32,
        count: u32,
    },
    RequestEnd {
        target: Target,
    },
}

impl OutboundMessage {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::RequestList { .. } => CommandKind::RequestList,
            Self::RequestData { .. } => CommandKind::RequestData,
            Self::RequestEnd { .. } => CommandKind::RequestEnd,
        }
    }

    pub fn target(&self) -> Target {
        match *self {
            Self::RequestList { target, .. }
            | Self::RequestData { target, .. }
            | Self::RequestEnd { target } => target,
        }
    }
}

// ── Any direction ────────────────────────────────────────────────────

/// Every message the codec understands, regardless of direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Outbound(OutboundMessage),
    Inbound(InboundMessage),
}

impl From<OutboundMessage> for Message {
    fn from(msg: OutboundMessage) -> Self {
        Self::Outbound(msg)
    }
}

impl From<InboundMessage> for Message {
    fn from(msg: InboundMessage) -> Self {
        Self::Inbound(msg)
    }
}

impl Message {
    /// Wire name, used in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Outbound(OutboundMessage::RequestList { .. }) => "LOG_REQUEST_LIST",
            Self::Outbound(OutboundMessage::RequestData { .. }) => "LOG_REQUEST_DATA",
            Self::Outbound(OutboundMessage::RequestEnd { .. }) => "LOG_REQUEST_END",
            Self::Inbound(InboundMessage::LogEntry(_)) => "LOG_ENTRY",
            Self::Inbound(InboundMessage::LogData(_)) => "LOG_DATA",
        }
    }
}
