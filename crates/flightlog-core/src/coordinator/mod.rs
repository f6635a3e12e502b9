// ── Log retrieval coordinator ──
//
// One actor task owns the `SessionMachine`. Goal submissions, cancels,
// end-of-transfer requests and translated device replies all arrive on one
// bounded queue and are applied strictly in order.

mod machine;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use flightlog_link::InboundMessage;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::convert::{to_data_chunk, to_entry_summary};
use crate::error::SendFailure;
use crate::goal::{ActiveGoal, FetchGoal, GoalId, ListGoal};
use crate::model::{LogDataChunk, LogEntrySummary, LogRecord};

pub use machine::SessionState;
pub(crate) use machine::SessionMachine;

/// Everything the coordinator reacts to.
pub(crate) enum CoordinatorEvent {
    SubmitList {
        goal: ActiveGoal<ListGoal>,
        admitted: oneshot::Sender<()>,
    },
    SubmitFetch {
        goal: ActiveGoal<FetchGoal>,
        admitted: oneshot::Sender<()>,
    },
    Cancel {
        goal_id: GoalId,
        done: oneshot::Sender<bool>,
    },
    EndTransfer {
        reply: oneshot::Sender<Result<(), SendFailure>>,
    },
    Entry(LogEntrySummary),
    Chunk(LogDataChunk),
}

/// Number of list submissions queued but not yet admitted.
///
/// Incremented by the list front end once its queue slot is reserved and
/// immediately before the event is sent, decremented by the
/// coordinator on admission. A fetch processed while it is non-zero loses.
#[derive(Debug, Clone, Default)]
pub(crate) struct PendingLists(Arc<AtomicUsize>);

impl PendingLists {
    pub(crate) fn enter(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn leave(&self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn any(&self) -> bool {
        self.0.load(Ordering::SeqCst) > 0
    }
}

// ── Tasks ────────────────────────────────────────────────────────────

pub(crate) async fn coordinator_task(
    mut machine: SessionMachine,
    mut events: mpsc::Receiver<CoordinatorEvent>,
    pending_lists: PendingLists,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                handle_event(&mut machine, &pending_lists, event);
            }
        }
    }

    machine.shutdown();
    debug!("coordinator task exiting");
}

fn handle_event(machine: &mut SessionMachine, pending_lists: &PendingLists, event: CoordinatorEvent) {
    match event {
        CoordinatorEvent::SubmitList { goal, admitted } => {
            pending_lists.leave();
            machine.submit_list(goal);
            let _ = admitted.send(());
        }
        CoordinatorEvent::SubmitFetch { goal, admitted } => {
            machine.submit_fetch(goal, pending_lists.any());
            let _ = admitted.send(());
        }
        CoordinatorEvent::Cancel { goal_id, done } => {
            let _ = done.send(machine.cancel(goal_id));
        }
        CoordinatorEvent::EndTransfer { reply } => {
            let _ = reply.send(machine.end_transfer());
        }
        CoordinatorEvent::Entry(entry) => machine.on_entry(&entry),
        CoordinatorEvent::Chunk(chunk) => machine.on_chunk(&chunk),
    }
}

/// Translate device replies, publish them, then hand them to the
/// coordinator. Publishing happens regardless of session state.
pub(crate) async fn ingest_task(
    mut inbound: broadcast::Receiver<Arc<InboundMessage>>,
    publish: broadcast::Sender<LogRecord>,
    events: mpsc::Sender<CoordinatorEvent>,
    max_chunk_capacity: usize,
    cancel: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            received = inbound.recv() => received,
        };

        let message = match received {
            Ok(message) => message,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "inbound link lagged; device replies dropped");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let received_at = Utc::now();
        let (record, event) = match &*message {
            InboundMessage::LogEntry(raw) => {
                let entry = to_entry_summary(raw, received_at);
                (LogRecord::Entry(entry.clone()), CoordinatorEvent::Entry(entry))
            }
            InboundMessage::LogData(raw) => {
                let chunk = to_data_chunk(raw, max_chunk_capacity, received_at);
                (LogRecord::Chunk(chunk.clone()), CoordinatorEvent::Chunk(chunk))
            }
        };

        // No subscribers is fine.
        let _ = publish.send(record);
        if events.send(event).await.is_err() {
            break;
        }
    }

    debug!("ingest task exiting");
}
