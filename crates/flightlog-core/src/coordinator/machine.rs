// ── Session state machine ──
//
// Synchronous transition logic of the log retrieval coordinator. The
// vehicle supports one log-transfer session at a time, so at most one goal
// is active and its kind is the session state. Every call here runs on the
// coordinator task; nothing else mutates the session.

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, trace};

use crate::emitter::CommandEmitter;
use crate::error::SendFailure;
use crate::goal::{ActiveGoal, FetchGoal, GoalId, GoalKind, GoalStatus, ListGoal};
use crate::model::{LogDataChunk, LogEntrySummary};

const SUPERSEDED_LIST: &str = "superseded by a new log list request";
const SUPERSEDED_DATA: &str = "superseded by a new log data request";
const PREEMPTED_BY_LIST: &str = "log list was requested";
const PREEMPTED_BY_DATA: &str = "log data was requested";
const LIST_PENDING: &str = "a log list request is pending";
const CANCELED_BY_CALLER: &str = "canceled by caller";
const TRANSFER_ENDED: &str = "log transfer was ended";
const SHUT_DOWN: &str = "log transfer service shut down";

/// Which session, if any, is open on the vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    ListActive,
    DataActive,
}

enum Session {
    Idle,
    List(ActiveGoal<ListGoal>),
    Data(ActiveGoal<FetchGoal>),
}

impl Session {
    fn state(&self) -> SessionState {
        match self {
            Self::Idle => SessionState::Idle,
            Self::List(_) => SessionState::ListActive,
            Self::Data(_) => SessionState::DataActive,
        }
    }

    /// Terminate whichever goal is active.
    fn finish(self, status: GoalStatus, reason: &str, send_failed: bool) {
        match self {
            Self::Idle => {}
            Self::List(goal) => finish_goal(goal, status, reason, send_failed),
            Self::Data(goal) => finish_goal(goal, status, reason, send_failed),
        }
    }
}

fn finish_goal<K: GoalKind>(
    mut goal: ActiveGoal<K>,
    status: GoalStatus,
    reason: &str,
    send_failed: bool,
) {
    if send_failed {
        goal.mark_send_failed();
    }
    let reason = (status != GoalStatus::Succeeded).then(|| reason.to_owned());
    goal.finish(status, reason);
}

pub(crate) struct SessionMachine {
    session: Session,
    emitter: CommandEmitter,
    max_chunk_capacity: usize,
    state_tx: watch::Sender<SessionState>,
}

impl SessionMachine {
    pub(crate) fn new(
        emitter: CommandEmitter,
        max_chunk_capacity: usize,
        state_tx: watch::Sender<SessionState>,
    ) -> Self {
        state_tx.send_replace(SessionState::Idle);
        Self {
            session: Session::Idle,
            emitter,
            max_chunk_capacity,
            state_tx,
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Close any session left open on the vehicle by an earlier process.
    pub(crate) fn flush_stale_session(&self) -> Result<(), SendFailure> {
        debug!("flushing stale vehicle session");
        self.emitter.request_stop()
    }

    // ── Goal submission ──────────────────────────────────────────────

    pub(crate) fn submit_list(&mut self, mut goal: ActiveGoal<ListGoal>) {
        let stopped = match self.take_session() {
            Session::Idle => Ok(()),
            Session::List(old) => {
                finish_goal(old, GoalStatus::Canceled, SUPERSEDED_LIST, false);
                self.emitter.request_stop()
            }
            Session::Data(old) => {
                finish_goal(old, GoalStatus::Preempted, PREEMPTED_BY_LIST, false);
                self.emitter.request_stop()
            }
        };
        if stopped.is_err() {
            goal.mark_send_failed();
        }

        match self.emitter.request_list(&goal.request()) {
            Ok(()) => {
                goal.activate();
                self.enter(Session::List(goal));
            }
            Err(failure) => {
                goal.finish(GoalStatus::Rejected, Some(failure.to_string()));
                self.enter(Session::Idle);
            }
        }
    }

    /// `list_pending` is true while a list submission is queued behind
    /// this one; lists take priority.
    pub(crate) fn submit_fetch(&mut self, mut goal: ActiveGoal<FetchGoal>, list_pending: bool) {
        if list_pending {
            info!(goal_id = %goal.id(), "fetch rejected: list request pending");
            goal.finish(GoalStatus::Rejected, Some(LIST_PENDING.into()));
            return;
        }

        let stopped = match self.take_session() {
            Session::Idle => Ok(()),
            Session::List(old) => {
                finish_goal(old, GoalStatus::Preempted, PREEMPTED_BY_DATA, false);
                self.emitter.request_stop()
            }
            Session::Data(old) => {
                finish_goal(old, GoalStatus::Canceled, SUPERSEDED_DATA, false);
                self.emitter.request_stop()
            }
        };
        if stopped.is_err() {
            goal.mark_send_failed();
        }

        match self.emitter.request_data(&goal.request()) {
            Ok(()) => {
                goal.activate();
                self.enter(Session::Data(goal));
            }
            Err(failure) => {
                goal.finish(GoalStatus::Rejected, Some(failure.to_string()));
                self.enter(Session::Idle);
            }
        }
    }

    // ── Caller-driven endings ────────────────────────────────────────

    /// Cancel the active goal if it is `goal_id`. Returns whether anything
    /// was canceled; terminal or unknown goals are ignored.
    pub(crate) fn cancel(&mut self, goal_id: GoalId) -> bool {
        let is_active = match &self.session {
            Session::Idle => false,
            Session::List(goal) => goal.id() == goal_id,
            Session::Data(goal) => goal.id() == goal_id,
        };
        if !is_active {
            debug!(%goal_id, "cancel ignored: goal is not active");
            return false;
        }

        let _ = self.close(GoalStatus::Canceled, CANCELED_BY_CALLER);
        true
    }

    /// Coordinated end of transfer. A no-op while idle.
    pub(crate) fn end_transfer(&mut self) -> Result<(), SendFailure> {
        if matches!(self.session, Session::Idle) {
            debug!("end of transfer requested while idle");
            return Ok(());
        }
        self.close(GoalStatus::Preempted, TRANSFER_ENDED)
    }

    pub(crate) fn shutdown(&mut self) {
        if !matches!(self.session, Session::Idle) {
            let _ = self.close(GoalStatus::Canceled, SHUT_DOWN);
        }
    }

    // ── Device replies ───────────────────────────────────────────────

    pub(crate) fn on_entry(&mut self, entry: &LogEntrySummary) {
        let Session::List(goal) = &mut self.session else {
            trace!(id = entry.id, "log entry outside a list session");
            return;
        };
        let request = goal.request();

        let complete = if entry.is_empty_marker() {
            true
        } else if request.contains(entry.id) {
            goal.feedback(entry.clone());
            let entries = goal.output_mut();
            let pos = entries.partition_point(|e| e.id <= entry.id);
            entries.insert(pos, entry.clone());
            entry.id == entry.last_log_id || entry.id == request.end_id
        } else {
            debug!(id = entry.id, ?request, "log entry outside requested range");
            false
        };

        if complete {
            debug!(id = entry.id, "log list complete");
            self.take_session().finish(GoalStatus::Succeeded, "", false);
            self.enter(Session::Idle);
        }
    }

    pub(crate) fn on_chunk(&mut self, chunk: &LogDataChunk) {
        let Session::Data(goal) = &mut self.session else {
            trace!(id = chunk.id, "log data outside a data session");
            return;
        };
        let request = goal.request();
        if chunk.id != request.id {
            debug!(id = chunk.id, expected = request.id, "log data for another log");
            return;
        }

        goal.feedback(chunk.clone());
        let summary = goal.output_mut();
        summary.id = request.id;
        summary.bytes_received += u64::try_from(chunk.len()).unwrap_or(u64::MAX);
        summary.chunks += 1;

        let complete =
            chunk.end_offset() >= request.end_offset() || chunk.len() < self.max_chunk_capacity;
        if complete {
            debug!(id = chunk.id, end = chunk.end_offset(), "log data complete");
            let stopped = self.emitter.request_stop();
            self.take_session()
                .finish(GoalStatus::Succeeded, "", stopped.is_err());
            self.enter(Session::Idle);
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Stop the vehicle session and terminate the active goal.
    fn close(&mut self, status: GoalStatus, reason: &str) -> Result<(), SendFailure> {
        let stopped = self.emitter.request_stop();
        if let Err(failure) = &stopped {
            error!(error = %failure, "could not stop vehicle session; proceeding");
        }
        self.take_session().finish(status, reason, stopped.is_err());
        self.enter(Session::Idle);
        stopped
    }

    fn take_session(&mut self) -> Session {
        std::mem::replace(&mut self.session, Session::Idle)
    }

    fn enter(&mut self, session: Session) {
        let next = session.state();
        let prev = self.state_tx.send_replace(next);
        if prev != next {
            debug!(from = %prev, to = %next, "session state changed");
        }
        self.session = session;
    }
}
