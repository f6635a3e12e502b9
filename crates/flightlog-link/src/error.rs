use thiserror::Error;

/// Top-level error type for the `flightlog-link` crate.
///
/// Covers every failure mode of the link layer: framing, outbound queueing,
/// and the underlying socket. `flightlog-core` folds send-side variants into
/// its own `SendFailure`.
#[derive(Debug, Error)]
pub enum LinkError {
    // ── Outbound ────────────────────────────────────────────────────
    /// The outbound queue is full; the frame was not accepted.
    #[error("outbound queue full ({capacity} frames pending)")]
    QueueFull { capacity: usize },

    /// The message does not fit the wire format (e.g. a LOG_DATA payload
    /// longer than the fixed 90-byte field).
    #[error("{message} does not fit in a frame: {reason}")]
    FrameTooLarge {
        message: &'static str,
        reason: String,
    },

    /// No remote address is configured and none has been learned yet.
    #[error("no remote endpoint known yet")]
    NoRemote,

    /// The link's background tasks have shut down.
    #[error("link closed")]
    Closed,

    // ── Transport ───────────────────────────────────────────────────
    /// Socket error (bind failure, unreachable host, ...).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration problem (unparsable address, zero-sized queue, ...).
    #[error("invalid link configuration: {0}")]
    InvalidConfig(String),
}

impl LinkError {
    /// Returns `true` if the failure is the transport refusing a frame
    /// rather than the link being broken.
    pub fn is_rejected_frame(&self) -> bool {
        matches!(self, Self::QueueFull { .. } | Self::FrameTooLarge { .. })
    }
}
