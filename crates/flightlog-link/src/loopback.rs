// ── In-memory loopback link ──
//
// Records every send attempt and lets the caller inject inbound messages.
// Individual command kinds can be switched into a failing mode to exercise
// "transport refused the frame" paths without a socket.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use crate::error::LinkError;
use crate::message::{CommandKind, InboundMessage, OutboundMessage};
use crate::transport::{INBOUND_CHANNEL_CAPACITY, Link};

#[derive(Debug)]
pub struct LoopbackLink {
    sent: Mutex<Vec<OutboundMessage>>,
    failing: Mutex<HashSet<CommandKind>>,
    inbound_tx: broadcast::Sender<Arc<InboundMessage>>,
}

impl Default for LoopbackLink {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackLink {
    pub fn new() -> Self {
        let (inbound_tx, _) = broadcast::channel(INBOUND_CHANNEL_CAPACITY);
        Self {
            sent: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            inbound_tx,
        }
    }

    /// Deliver a message to every subscriber. Returns the subscriber count.
    pub fn inject(&self, message: InboundMessage) -> usize {
        self.inbound_tx.send(Arc::new(message)).unwrap_or(0)
    }

    /// Every send attempt so far, including refused ones.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        lock(&self.sent).clone()
    }

    /// Drain the send history.
    pub fn take_sent(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *lock(&self.sent))
    }

    /// Make every subsequent send of `kind` fail with [`LinkError::QueueFull`].
    pub fn fail(&self, kind: CommandKind) {
        lock(&self.failing).insert(kind);
    }

    /// Undo [`fail`](Self::fail).
    pub fn recover(&self, kind: CommandKind) {
        lock(&self.failing).remove(&kind);
    }
}

impl Link for LoopbackLink {
    fn send(&self, message: &OutboundMessage) -> Result<(), LinkError> {
        lock(&self.sent).push(*message);
        if lock(&self.failing).contains(&message.kind()) {
            return Err(LinkError::QueueFull { capacity: 0 });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Arc<InboundMessage>> {
        self.inbound_tx.subscribe()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::{LogEntryRaw, Target};

    #[test]
    fn records_attempts_and_injects_failures() {
        let link = LoopbackLink::new();
        let end = OutboundMessage::RequestEnd {
            target: Target::default(),
        };

        link.send(&end).unwrap();
        link.fail(CommandKind::RequestEnd);
        assert!(link.send(&end).is_err());
        link.recover(CommandKind::RequestEnd);
        link.send(&end).unwrap();

        assert_eq!(link.take_sent().len(), 3);
        assert!(link.sent().is_empty());
    }

    #[tokio::test]
    async fn injected_messages_reach_subscribers() {
        let link = LoopbackLink::new();
        let mut rx = link.subscribe();
        let entry = InboundMessage::LogEntry(LogEntryRaw {
            id: 1,
            num_logs: 1,
            last_log_num: 1,
            time_utc: 0,
            size: 10,
        });

        assert_eq!(link.inject(entry.clone()), 1);
        assert_eq!(*rx.recv().await.unwrap(), entry);
    }
}
