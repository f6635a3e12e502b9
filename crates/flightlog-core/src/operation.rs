// ── Operation front ends ──
//
// Caller-facing entry points for list and fetch goals. `submit` returns as
// soon as the coordinator has made its admission decision and emitted the
// command; it never waits for the vehicle.

use tokio::sync::{mpsc, oneshot};

use crate::coordinator::{CoordinatorEvent, PendingLists};
use crate::error::CoreError;
use crate::goal::{ActiveGoal, FetchGoal, GoalHandle, GoalId, GoalKind, GoalStatus, ListGoal};
use crate::model::{DataRequest, ListRequest};

/// Log directory listing.
#[derive(Clone)]
pub struct ListOperations {
    events: mpsc::Sender<CoordinatorEvent>,
    pending: PendingLists,
}

/// Log downloads.
#[derive(Clone)]
pub struct FetchOperations {
    events: mpsc::Sender<CoordinatorEvent>,
}

impl ListOperations {
    pub(crate) fn new(events: mpsc::Sender<CoordinatorEvent>, pending: PendingLists) -> Self {
        Self { events, pending }
    }

    /// Submit a list goal, replacing any active one.
    pub async fn submit(&self, request: ListRequest) -> Result<GoalHandle<ListGoal>, CoreError> {
        let (goal, handle) = ActiveGoal::new(request);
        let (admitted, admission) = oneshot::channel();

        // No await between enter and send: dropping this future either
        // leaves the counter untouched or hands the event to the coordinator,
        // which leaves it.
        let permit = self
            .events
            .reserve()
            .await
            .map_err(|_| CoreError::CoordinatorStopped)?;
        self.pending.enter();
        permit.send(CoordinatorEvent::SubmitList { goal, admitted });

        admission.await.map_err(|_| CoreError::CoordinatorStopped)?;
        Ok(handle)
    }

    /// Cancel the goal if it is still active. Returns whether it was.
    pub async fn cancel(&self, handle: &GoalHandle<ListGoal>) -> Result<bool, CoreError> {
        cancel(&self.events, handle.id()).await
    }

    pub fn poll(&self, handle: &GoalHandle<ListGoal>) -> GoalStatus {
        poll(handle)
    }
}

impl FetchOperations {
    pub(crate) fn new(events: mpsc::Sender<CoordinatorEvent>) -> Self {
        Self { events }
    }

    /// Submit a fetch goal, replacing any active one. Rejected while a
    /// list submission is waiting for admission.
    pub async fn submit(&self, request: DataRequest) -> Result<GoalHandle<FetchGoal>, CoreError> {
        let (goal, handle) = ActiveGoal::new(request);
        let (admitted, admission) = oneshot::channel();

        self.events
            .send(CoordinatorEvent::SubmitFetch { goal, admitted })
            .await
            .map_err(|_| CoreError::CoordinatorStopped)?;

        admission.await.map_err(|_| CoreError::CoordinatorStopped)?;
        Ok(handle)
    }

    pub async fn cancel(&self, handle: &GoalHandle<FetchGoal>) -> Result<bool, CoreError> {
        cancel(&self.events, handle.id()).await
    }

    pub fn poll(&self, handle: &GoalHandle<FetchGoal>) -> GoalStatus {
        poll(handle)
    }
}

async fn cancel(events: &mpsc::Sender<CoordinatorEvent>, goal_id: GoalId) -> Result<bool, CoreError> {
    let (done, reply) = oneshot::channel();
    events
        .send(CoordinatorEvent::Cancel { goal_id, done })
        .await
        .map_err(|_| CoreError::CoordinatorStopped)?;
    reply.await.map_err(|_| CoreError::CoordinatorStopped)
}

fn poll<K: GoalKind>(handle: &GoalHandle<K>) -> GoalStatus {
    handle.status()
}
