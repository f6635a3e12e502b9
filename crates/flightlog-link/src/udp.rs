//! UDP transport with learned-remote support.
//!
//! Binds a local socket and spawns two background tasks: a reader that
//! decodes frames and broadcasts inbound log messages, and a writer that
//! drains the bounded outbound queue. [`Link::send`] only enqueues, so a
//! saturated queue surfaces immediately as [`LinkError::QueueFull`].
//!
//! # Example
//!
//! ```rust,ignore
//! use flightlog_link::{Link, UdpLink, UdpLinkConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let link = UdpLink::bind(UdpLinkConfig::default(), CancellationToken::new()).await?;
//! let mut rx = link.subscribe();
//! while let Ok(msg) = rx.recv().await {
//!     println!("{msg:?}");
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::codec::{self, FrameDecoder, MAX_FRAME_LEN};
use crate::error::LinkError;
use crate::message::{InboundMessage, Message, OutboundMessage, Target};
use crate::transport::{INBOUND_CHANNEL_CAPACITY, Link, UdpLinkConfig};

const RECV_BUFFER_LEN: usize = 65_536;

/// Handle to a bound UDP link.
///
/// Dropping the handle does not stop the background tasks; call
/// [`shutdown`](Self::shutdown) or cancel the token passed to
/// [`bind`](Self::bind).
pub struct UdpLink {
    local: Target,
    local_addr: SocketAddr,
    sequence: AtomicU8,
    send_queue: usize,
    outbound_tx: mpsc::Sender<Bytes>,
    inbound_tx: broadcast::Sender<Arc<InboundMessage>>,
    remote: watch::Receiver<Option<SocketAddr>>,
    cancel: CancellationToken,
}

impl UdpLink {
    /// Bind the socket and spawn the reader and writer tasks.
    pub async fn bind(config: UdpLinkConfig, cancel: CancellationToken) -> Result<Self, LinkError> {
        if config.send_queue == 0 {
            return Err(LinkError::InvalidConfig(
                "send_queue must be at least 1".into(),
            ));
        }

        let socket = Arc::new(UdpSocket::bind(config.bind).await?);
        let local_addr = socket.local_addr()?;
        let (outbound_tx, outbound_rx) = mpsc::channel(config.send_queue);
        let (inbound_tx, _) = broadcast::channel(INBOUND_CHANNEL_CAPACITY);
        let (remote_tx, remote_rx) = watch::channel(config.remote);

        info!(
            local = %local_addr,
            remote = ?config.remote,
            system_id = config.local.system_id,
            component_id = config.local.component_id,
            "UDP link bound"
        );

        tokio::spawn(read_loop(
            Arc::clone(&socket),
            inbound_tx.clone(),
            remote_tx,
            config.accept_from,
            cancel.clone(),
        ));
        tokio::spawn(write_loop(
            socket,
            outbound_rx,
            remote_rx.clone(),
            cancel.clone(),
        ));

        Ok(Self {
            local: config.local,
            local_addr,
            sequence: AtomicU8::new(0),
            send_queue: config.send_queue,
            outbound_tx,
            inbound_tx,
            remote: remote_rx,
            cancel,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The remote endpoint, configured or learned.
    pub fn remote(&self) -> Option<SocketAddr> {
        *self.remote.borrow()
    }

    /// Wait until a remote endpoint is known.
    pub async fn wait_for_remote(&self) -> Result<SocketAddr, LinkError> {
        let mut remote = self.remote.clone();
        let addr = remote
            .wait_for(Option::is_some)
            .await
            .map_err(|_| LinkError::Closed)?;
        (*addr).ok_or(LinkError::Closed)
    }

    /// Signal the background tasks to stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Link for UdpLink {
    fn send(&self, message: &OutboundMessage) -> Result<(), LinkError> {
        if self.remote.borrow().is_none() {
            return Err(LinkError::NoRemote);
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let frame = codec::encode(sequence, self.local, &Message::from(*message))?;
        if frame.len() > MAX_FRAME_LEN {
            return Err(LinkError::FrameTooLarge {
                message: Message::from(*message).name(),
                reason: format!("{} byte frame", frame.len()),
            });
        }

        self.outbound_tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => LinkError::QueueFull {
                capacity: self.send_queue,
            },
            TrySendError::Closed(_) => LinkError::Closed,
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<Arc<InboundMessage>> {
        self.inbound_tx.subscribe()
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn read_loop(
    socket: Arc<UdpSocket>,
    inbound_tx: broadcast::Sender<Arc<InboundMessage>>,
    remote_tx: watch::Sender<Option<SocketAddr>>,
    accept_from: Option<u8>,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; RECV_BUFFER_LEN];
    let mut decoder = FrameDecoder::new();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = socket.recv_from(&mut buf) => {
                let (len, from) = match result {
                    Ok(received) => received,
                    Err(e) => {
                        // ICMP port-unreachable surfaces here on some platforms.
                        warn!(error = %e, "UDP receive failed");
                        continue;
                    }
                };

                remote_tx.send_if_modified(|remote| {
                    if remote.is_some() {
                        return false;
                    }
                    info!(remote = %from, "learned remote endpoint");
                    *remote = Some(from);
                    true
                });

                decoder.push(buf.get(..len).unwrap_or_default());
                while let Some(frame) = decoder.next_frame() {
                    if accept_from.is_some_and(|id| id != frame.sender.system_id) {
                        trace!(sender = %frame.sender, "ignoring frame from other system");
                        continue;
                    }
                    match frame.message {
                        Message::Inbound(msg) => {
                            // No subscribers is fine; nobody is listening yet.
                            let _ = inbound_tx.send(Arc::new(msg));
                        }
                        Message::Outbound(cmd) => {
                            trace!(command = %cmd.kind(), "ignoring command frame");
                        }
                    }
                }
            }
        }
    }

    debug!(dropped_bytes = decoder.dropped_bytes(), "UDP read loop exiting");
}

async fn write_loop(
    socket: Arc<UdpSocket>,
    mut outbound_rx: mpsc::Receiver<Bytes>,
    remote: watch::Receiver<Option<SocketAddr>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else { break };
                let Some(addr) = *remote.borrow() else {
                    warn!("dropping outbound frame: no remote endpoint");
                    continue;
                };
                if let Err(e) = socket.send_to(&frame, addr).await {
                    warn!(error = %e, remote = %addr, "UDP send failed");
                }
            }
        }
    }

    debug!("UDP write loop exiting");
}
