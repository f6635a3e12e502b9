// ── LogTransfer facade ──
//
// Wires a link to the coordinator: spawns the ingest and coordinator tasks,
// owns the publish channel, and hands out goal front ends and the thin
// one-shot services.

use std::sync::Arc;

use flightlog_link::Link;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TransferConfig;
use crate::coordinator::{
    CoordinatorEvent, PendingLists, SessionMachine, SessionState, coordinator_task, ingest_task,
};
use crate::emitter::CommandEmitter;
use crate::error::{CoreError, SendFailure};
use crate::model::{DataRequest, ListRequest, LogRecord};
use crate::operation::{FetchOperations, ListOperations};
use crate::stream::RecordStream;

/// Entry point for log retrieval from one vehicle.
///
/// Cheaply cloneable via `Arc<LogTransferInner>`. Must be started inside a
/// tokio runtime.
#[derive(Clone)]
pub struct LogTransfer {
    inner: Arc<LogTransferInner>,
}

struct LogTransferInner {
    config: TransferConfig,
    emitter: CommandEmitter,
    events: mpsc::Sender<CoordinatorEvent>,
    pending_lists: PendingLists,
    publish: broadcast::Sender<LogRecord>,
    session: watch::Receiver<SessionState>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl LogTransfer {
    /// Validate the config, flush any stale vehicle session and spawn the
    /// background tasks.
    pub fn start(config: TransferConfig, link: Arc<dyn Link>) -> Result<Self, CoreError> {
        config.validate()?;

        let emitter = CommandEmitter::new(link.clone(), config.target);
        let (events_tx, events_rx) = mpsc::channel(config.event_queue_size);
        let (publish, _) = broadcast::channel(config.publish_capacity);
        let (session_tx, session_rx) = watch::channel(SessionState::Idle);
        let pending_lists = PendingLists::default();
        let cancel = CancellationToken::new();

        let machine = SessionMachine::new(emitter.clone(), config.max_chunk_capacity, session_tx);
        if config.flush_on_start {
            if let Err(failure) = machine.flush_stale_session() {
                warn!(error = %failure, "could not flush stale vehicle session");
            }
        }

        // Subscribe before spawning so no reply is missed.
        let inbound = link.subscribe();
        let handles = vec![
            tokio::spawn(coordinator_task(
                machine,
                events_rx,
                pending_lists.clone(),
                cancel.clone(),
            )),
            tokio::spawn(ingest_task(
                inbound,
                publish.clone(),
                events_tx.clone(),
                config.max_chunk_capacity,
                cancel.clone(),
            )),
        ];

        info!(vehicle = %config.target, "log transfer started");

        Ok(Self {
            inner: Arc::new(LogTransferInner {
                config,
                emitter,
                events: events_tx,
                pending_lists,
                publish,
                session: session_rx,
                cancel,
                task_handles: Mutex::new(handles),
            }),
        })
    }

    pub fn config(&self) -> &TransferConfig {
        &self.inner.config
    }

    // ── Observation ──────────────────────────────────────────────────

    /// Subscribe to every translated entry and chunk.
    pub fn subscribe(&self) -> RecordStream {
        RecordStream::new(self.inner.publish.subscribe())
    }

    pub fn session_state(&self) -> SessionState {
        *self.inner.session.borrow()
    }

    pub fn watch_session(&self) -> watch::Receiver<SessionState> {
        self.inner.session.clone()
    }

    // ── Goals ────────────────────────────────────────────────────────

    pub fn list_operations(&self) -> ListOperations {
        ListOperations::new(self.inner.events.clone(), self.inner.pending_lists.clone())
    }

    pub fn fetch_operations(&self) -> FetchOperations {
        FetchOperations::new(self.inner.events.clone())
    }

    /// Coordinated end of transfer: stops the vehicle session and preempts
    /// the active goal. A no-op while idle.
    pub async fn end_transfer(&self) -> Result<(), CoreError> {
        let (reply, rx) = oneshot::channel();
        self.inner
            .events
            .send(CoordinatorEvent::EndTransfer { reply })
            .await
            .map_err(|_| CoreError::CoordinatorStopped)?;
        rx.await.map_err(|_| CoreError::CoordinatorStopped)??;
        Ok(())
    }

    // ── Thin services ────────────────────────────────────────────────
    //
    // Raw commands that bypass the coordinator; the session state does
    // not change.

    pub fn request_log_list(&self, start: u16, end: u16) -> Result<(), SendFailure> {
        self.inner
            .emitter
            .request_list(&ListRequest::new(start, end))
    }

    pub fn request_log_data(&self, id: u16, offset: u32, count: u32) -> Result<(), SendFailure> {
        self.inner
            .emitter
            .request_data(&DataRequest::new(id, offset, count))
    }

    pub fn request_log_end(&self) -> Result<(), SendFailure> {
        self.inner.emitter.request_stop()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Stop background tasks. Active goals end `Canceled`.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "log transfer task panicked");
            }
        }
        debug!("log transfer shut down");
    }
}
