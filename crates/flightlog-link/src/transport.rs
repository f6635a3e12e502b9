// Shared link abstraction and transport configuration.
//
// Every transport (UDP, loopback, simulated vehicle) implements `Link`, so
// `flightlog-core` never knows which one it is talking to.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::error::LinkError;
use crate::message::{InboundMessage, OutboundMessage, Target};

/// Inbound broadcast capacity shared by all transports.
pub const INBOUND_CHANNEL_CAPACITY: usize = 1024;

/// A bidirectional, unreliable message link to one vehicle.
///
/// `send` never blocks: it either hands the message to the transport or
/// reports why it could not. Inbound messages are pushed to every
/// subscriber in arrival order.
pub trait Link: Send + Sync {
    fn send(&self, message: &OutboundMessage) -> Result<(), LinkError>;

    fn subscribe(&self) -> broadcast::Receiver<Arc<InboundMessage>>;
}

/// UDP transport configuration.
#[derive(Debug, Clone)]
pub struct UdpLinkConfig {
    /// Local address to bind (e.g. `0.0.0.0:14550`).
    pub bind: SocketAddr,
    /// Fixed remote endpoint. When `None` the first sender heard from
    /// becomes the remote.
    pub remote: Option<SocketAddr>,
    /// Our own MAVLink address, stamped on outgoing frames.
    pub local: Target,
    /// Only accept frames from this system id (any when `None`).
    pub accept_from: Option<u8>,
    /// Outbound frame queue depth; a full queue rejects sends.
    pub send_queue: usize,
}

impl Default for UdpLinkConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 14550)),
            remote: None,
            local: Target::new(255, 190),
            accept_from: None,
            send_queue: 128,
        }
    }
}
