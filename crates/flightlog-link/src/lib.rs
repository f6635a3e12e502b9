// flightlog-link: MAVLink log-transfer link layer (framing + transports)

pub mod codec;
pub mod error;
pub mod loopback;
pub mod message;
pub mod sim;
pub mod transport;
pub mod udp;

pub use codec::{Frame, FrameDecoder};
pub use error::LinkError;
pub use loopback::LoopbackLink;
pub use message::{
    CommandKind, DATA_COUNT_ALL, InboundMessage, LIST_END_ALL, LOG_DATA_CAPACITY, LogDataRaw,
    LogEntryRaw, Message, OutboundMessage, Target,
};
pub use sim::{SimulatedLog, SimulatedVehicle};
pub use transport::{Link, UdpLinkConfig};
pub use udp::UdpLink;
