// ── Long-running goals ──
//
// A goal is one caller-issued list or fetch operation. The coordinator owns
// the server half (`ActiveGoal`) and drives it through
// Pending → Active → {Succeeded, Canceled, Preempted, Rejected}; the caller
// holds the `GoalHandle` and observes status, feedback and the result.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::info;
use uuid::Uuid;

use crate::model::{DataRequest, FetchSummary, ListRequest, LogDataChunk, LogEntrySummary};

// ── Identity & status ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoalId(Uuid);

impl GoalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GoalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GoalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GoalStatus {
    /// Submitted, not yet admitted by the coordinator.
    Pending,
    Active,
    Succeeded,
    /// Canceled by the caller, superseded by a same-kind goal, or shut down.
    Canceled,
    /// Terminated by a conflicting goal or an explicit end of transfer.
    Preempted,
    Rejected,
}

impl GoalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Canceled | Self::Preempted | Self::Rejected
        )
    }
}

// ── Goal kinds ───────────────────────────────────────────────────────

/// Ties a goal's request, feedback and output types together.
pub trait GoalKind: Send + Sync + 'static {
    type Request: fmt::Debug + Clone + Copy + Send + Sync + 'static;
    type Feedback: fmt::Debug + Clone + Send + Sync + 'static;
    type Output: fmt::Debug + Clone + Default + Send + Sync + 'static;

    const NAME: &'static str;
}

/// Enumerate the vehicle's log directory.
#[derive(Debug)]
pub enum ListGoal {}

impl GoalKind for ListGoal {
    type Request = ListRequest;
    type Feedback = LogEntrySummary;
    /// Entries received while active, sorted by id.
    type Output = Vec<LogEntrySummary>;

    const NAME: &'static str = "list";
}

/// Download (part of) one log.
#[derive(Debug)]
pub enum FetchGoal {}

impl GoalKind for FetchGoal {
    type Request = DataRequest;
    type Feedback = LogDataChunk;
    type Output = FetchSummary;

    const NAME: &'static str = "fetch";
}

// ── Snapshots & results ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalSnapshot<O> {
    pub status: GoalStatus,
    pub reason: Option<String>,
    /// A stop command sent on this goal's behalf failed.
    pub send_failed: bool,
    /// Present once the goal is terminal.
    pub output: Option<O>,
}

impl<O> GoalSnapshot<O> {
    fn pending() -> Self {
        Self {
            status: GoalStatus::Pending,
            reason: None,
            send_failed: false,
            output: None,
        }
    }
}

/// Terminal outcome of a goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalResult<O> {
    pub status: GoalStatus,
    /// `Succeeded` and every command sent for the goal went out.
    pub success: bool,
    pub reason: Option<String>,
    pub output: O,
}

impl<O: Default> GoalResult<O> {
    fn from_snapshot(snapshot: GoalSnapshot<O>) -> Self {
        Self {
            status: snapshot.status,
            success: snapshot.status == GoalStatus::Succeeded && !snapshot.send_failed,
            reason: snapshot.reason,
            output: snapshot.output.unwrap_or_default(),
        }
    }
}

// ── Caller side ──────────────────────────────────────────────────────

/// Caller's handle to a submitted goal.
///
/// Feedback items (entries for a list, chunks for a fetch) are buffered
/// until read, in arrival order.
pub struct GoalHandle<K: GoalKind> {
    id: GoalId,
    request: K::Request,
    state: watch::Receiver<GoalSnapshot<K::Output>>,
    feedback: mpsc::UnboundedReceiver<K::Feedback>,
}

impl<K: GoalKind> fmt::Debug for GoalHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoalHandle")
            .field("kind", &K::NAME)
            .field("id", &self.id)
            .field("request", &self.request)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl<K: GoalKind> GoalHandle<K> {
    pub fn id(&self) -> GoalId {
        self.id
    }

    pub fn request(&self) -> K::Request {
        self.request
    }

    /// Current status; never blocks.
    pub fn status(&self) -> GoalStatus {
        self.state.borrow().status
    }

    pub fn snapshot(&self) -> GoalSnapshot<K::Output> {
        self.state.borrow().clone()
    }

    /// Next feedback item. `None` once the goal is terminal and the buffer
    /// is drained.
    pub async fn next_feedback(&mut self) -> Option<K::Feedback> {
        self.feedback.recv().await
    }

    pub fn try_next_feedback(&mut self) -> Option<K::Feedback> {
        self.feedback.try_recv().ok()
    }

    /// Wait for the terminal result.
    pub async fn wait(&mut self) -> GoalResult<K::Output> {
        let snapshot = match self.state.wait_for(|s| s.status.is_terminal()).await {
            Ok(snapshot) => snapshot.clone(),
            // Coordinator went away without finishing the goal.
            Err(_) => GoalSnapshot {
                status: GoalStatus::Canceled,
                reason: Some("coordinator stopped".into()),
                send_failed: false,
                output: None,
            },
        };
        GoalResult::from_snapshot(snapshot)
    }
}

// ── Coordinator side ─────────────────────────────────────────────────

pub(crate) struct ActiveGoal<K: GoalKind> {
    id: GoalId,
    request: K::Request,
    state: watch::Sender<GoalSnapshot<K::Output>>,
    feedback: mpsc::UnboundedSender<K::Feedback>,
    output: K::Output,
    send_failed: bool,
}

impl<K: GoalKind> ActiveGoal<K> {
    pub(crate) fn new(request: K::Request) -> (Self, GoalHandle<K>) {
        let id = GoalId::new();
        let (state_tx, state_rx) = watch::channel(GoalSnapshot::pending());
        let (feedback_tx, feedback_rx) = mpsc::unbounded_channel();

        let goal = Self {
            id,
            request,
            state: state_tx,
            feedback: feedback_tx,
            output: K::Output::default(),
            send_failed: false,
        };
        let handle = GoalHandle {
            id,
            request,
            state: state_rx,
            feedback: feedback_rx,
        };
        (goal, handle)
    }

    pub(crate) fn id(&self) -> GoalId {
        self.id
    }

    pub(crate) fn request(&self) -> K::Request {
        self.request
    }

    pub(crate) fn activate(&self) {
        self.state.send_modify(|s| s.status = GoalStatus::Active);
        info!(goal = K::NAME, goal_id = %self.id, request = ?self.request, "goal active");
    }

    pub(crate) fn mark_send_failed(&mut self) {
        self.send_failed = true;
    }

    /// Deliver one feedback item. A dropped handle is not an error.
    pub(crate) fn feedback(&self, item: K::Feedback) {
        let _ = self.feedback.send(item);
    }

    pub(crate) fn output_mut(&mut self) -> &mut K::Output {
        &mut self.output
    }

    pub(crate) fn finish(self, status: GoalStatus, reason: Option<String>) {
        info!(
            goal = K::NAME,
            goal_id = %self.id,
            %status,
            reason = reason.as_deref().unwrap_or(""),
            send_failed = self.send_failed,
            "goal finished"
        );
        let snapshot = GoalSnapshot {
            status,
            reason,
            send_failed: self.send_failed,
            output: Some(self.output),
        };
        self.state.send_replace(snapshot);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn new_goal_is_pending() {
        let (_goal, handle) = ActiveGoal::<ListGoal>::new(ListRequest::all());
        assert_eq!(handle.status(), GoalStatus::Pending);
        assert!(!handle.status().is_terminal());
    }

    #[tokio::test]
    async fn finish_publishes_result_and_output() {
        let (mut goal, mut handle) = ActiveGoal::<FetchGoal>::new(DataRequest::whole(2));
        goal.activate();
        assert_eq!(handle.status(), GoalStatus::Active);

        goal.output_mut().bytes_received = 90;
        goal.finish(GoalStatus::Succeeded, None);

        let result = handle.wait().await;
        assert_eq!(result.status, GoalStatus::Succeeded);
        assert!(result.success);
        assert_eq!(result.output.bytes_received, 90);
    }

    #[tokio::test]
    async fn failed_stop_clears_success() {
        let (mut goal, mut handle) = ActiveGoal::<ListGoal>::new(ListRequest::all());
        goal.mark_send_failed();
        goal.finish(GoalStatus::Succeeded, None);

        let result = handle.wait().await;
        assert_eq!(result.status, GoalStatus::Succeeded);
        assert!(!result.success);
    }

    #[tokio::test]
    async fn dropped_goal_reads_as_canceled() {
        let (goal, mut handle) = ActiveGoal::<ListGoal>::new(ListRequest::all());
        drop(goal);
        let result = handle.wait().await;
        assert_eq!(result.status, GoalStatus::Canceled);
        assert_eq!(result.reason.as_deref(), Some("coordinator stopped"));
    }

    #[test]
    fn feedback_is_buffered_in_order() {
        let (goal, mut handle) = ActiveGoal::<FetchGoal>::new(DataRequest::whole(1));
        for offset in [0, 90, 180] {
            goal.feedback(LogDataChunk {
                id: 1,
                offset,
                bytes: bytes::Bytes::from_static(b"x"),
                received_at: chrono::Utc::now(),
            });
        }
        let offsets: Vec<u32> = std::iter::from_fn(|| handle.try_next_feedback())
            .map(|c| c.offset)
            .collect();
        assert_eq!(offsets, vec![0, 90, 180]);
    }

    #[test]
    fn status_parses_from_display() {
        assert_eq!(GoalStatus::Preempted.to_string(), "preempted");
        assert_eq!("rejected".parse::<GoalStatus>().unwrap(), GoalStatus::Rejected);
    }
}
