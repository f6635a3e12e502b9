#![allow(clippy::unwrap_used)]

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use flightlog_core::{
    CoreError, DataRequest, GoalStatus, ListRequest, LogRecord, LogTransfer, SessionState,
    TransferConfig,
};
use flightlog_link::{
    CommandKind, InboundMessage, LogDataRaw, LogEntryRaw, LoopbackLink, OutboundMessage,
    SimulatedVehicle, Target,
};
use futures_util::FutureExt;
use pretty_assertions::assert_eq;

const WAIT: Duration = Duration::from_secs(5);
const T: Target = Target::new(1, 1);
const STOP: OutboundMessage = OutboundMessage::RequestEnd { target: T };

fn start_loopback(config: TransferConfig) -> (LogTransfer, Arc<LoopbackLink>) {
    let link = Arc::new(LoopbackLink::new());
    let transfer = LogTransfer::start(config, link.clone()).unwrap();
    (transfer, link)
}

fn entry(id: u16, last: u16) -> InboundMessage {
    InboundMessage::LogEntry(LogEntryRaw {
        id,
        num_logs: last,
        last_log_num: last,
        time_utc: 1_700_000_000,
        size: 2048,
    })
}

fn data(id: u16, ofs: u32, count: u32, payload_len: usize) -> InboundMessage {
    InboundMessage::LogData(LogDataRaw {
        id,
        ofs,
        count,
        data: Bytes::from(vec![0x5A; payload_len]),
    })
}

// ── Start-up ─────────────────────────────────────────────────────────

#[tokio::test]
async fn start_flushes_stale_session_once() {
    let (transfer, link) = start_loopback(TransferConfig::default());
    assert_eq!(link.sent(), vec![STOP]);
    assert_eq!(transfer.session_state(), SessionState::Idle);
    transfer.shutdown().await;
}

#[tokio::test]
async fn flush_can_be_disabled() {
    let (transfer, link) = start_loopback(TransferConfig {
        flush_on_start: false,
        ..TransferConfig::default()
    });
    assert!(link.sent().is_empty());
    transfer.shutdown().await;
}

#[tokio::test]
async fn invalid_config_is_refused() {
    let link = Arc::new(LoopbackLink::new());
    let config = TransferConfig {
        publish_capacity: 0,
        ..TransferConfig::default()
    };
    assert!(matches!(
        LogTransfer::start(config, link),
        Err(CoreError::Config { .. })
    ));
}

#[tokio::test]
async fn chunk_capacity_beyond_log_data_is_refused() {
    let link = Arc::new(LoopbackLink::new());
    let config = TransferConfig {
        max_chunk_capacity: 2000,
        ..TransferConfig::default()
    };
    assert!(matches!(
        LogTransfer::start(config, link),
        Err(CoreError::Config { .. })
    ));
}

// ── Goal coordination ────────────────────────────────────────────────

#[tokio::test]
async fn fetch_preempts_running_list() {
    let (transfer, link) = start_loopback(TransferConfig::default());
    link.take_sent();

    let list = transfer
        .list_operations()
        .submit(ListRequest::new(0, 10))
        .await
        .unwrap();
    assert_eq!(transfer.session_state(), SessionState::ListActive);
    assert_eq!(
        link.take_sent(),
        vec![OutboundMessage::RequestList {
            target: T,
            start: 0,
            end: 10,
        }]
    );

    let fetch = transfer
        .fetch_operations()
        .submit(DataRequest::new(3, 0, 100))
        .await
        .unwrap();
    assert_eq!(list.status(), GoalStatus::Preempted);
    assert_eq!(fetch.status(), GoalStatus::Active);
    assert_eq!(
        link.take_sent(),
        vec![
            STOP,
            OutboundMessage::RequestData {
                target: T,
                id: 3,
                ofs: 0,
                count: 100,
            },
        ]
    );
    assert_eq!(transfer.session_state(), SessionState::DataActive);
    transfer.shutdown().await;
}

// The coordinator task only runs when the test yields, so submissions can
// be queued in a known order by polling each front end once.

#[tokio::test]
async fn fetch_queued_behind_list_submission_is_rejected() {
    let (transfer, link) = start_loopback(TransferConfig::default());
    link.take_sent();
    let fetches = transfer.fetch_operations();
    let lists = transfer.list_operations();

    let mut fetch = pin!(fetches.submit(DataRequest::new(3, 0, 100)));
    let mut list = pin!(lists.submit(ListRequest::all()));
    assert!(fetch.as_mut().now_or_never().is_none());
    assert!(list.as_mut().now_or_never().is_none());

    let (fetch, list) = tokio::join!(fetch, list);
    let mut fetch = fetch.unwrap();
    let list = list.unwrap();

    let rejected = fetch.wait().await;
    assert_eq!(rejected.status, GoalStatus::Rejected);
    assert_eq!(rejected.reason.as_deref(), Some("a log list request is pending"));
    assert_eq!(list.status(), GoalStatus::Active);
    assert_eq!(transfer.session_state(), SessionState::ListActive);
    assert_eq!(
        link.take_sent(),
        vec![OutboundMessage::RequestList {
            target: T,
            start: 0,
            end: u16::MAX,
        }]
    );
    transfer.shutdown().await;
}

#[tokio::test]
async fn abandoned_list_submission_does_not_block_fetches() {
    let (transfer, link) = start_loopback(TransferConfig {
        event_queue_size: 1,
        ..TransferConfig::default()
    });
    link.take_sent();
    let fetches = transfer.fetch_operations();

    // Fill the only queue slot, then give up on a list submission that
    // is still waiting for room.
    assert!(
        fetches
            .submit(DataRequest::new(3, 0, 100))
            .now_or_never()
            .is_none()
    );
    assert!(
        transfer
            .list_operations()
            .submit(ListRequest::all())
            .now_or_never()
            .is_none()
    );

    let fetch = tokio::time::timeout(WAIT, fetches.submit(DataRequest::new(4, 0, 100)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetch.status(), GoalStatus::Active);
    assert_eq!(transfer.session_state(), SessionState::DataActive);
    transfer.shutdown().await;
}

#[tokio::test]
async fn cancel_active_fetch() {
    let (transfer, link) = start_loopback(TransferConfig::default());
    let fetches = transfer.fetch_operations();
    let handle = fetches.submit(DataRequest::new(3, 0, 100)).await.unwrap();
    link.take_sent();

    assert!(fetches.cancel(&handle).await.unwrap());
    assert_eq!(link.take_sent(), vec![STOP]);
    assert_eq!(fetches.poll(&handle), GoalStatus::Canceled);
    assert_eq!(transfer.session_state(), SessionState::Idle);

    // Second cancel is a no-op.
    assert!(!fetches.cancel(&handle).await.unwrap());
    assert!(link.sent().is_empty());
    transfer.shutdown().await;
}

#[tokio::test]
async fn list_completes_from_device_entries() {
    let (transfer, link) = start_loopback(TransferConfig::default());
    let mut handle = transfer
        .list_operations()
        .submit(ListRequest::all())
        .await
        .unwrap();

    link.inject(entry(2, 3));
    link.inject(entry(1, 3));
    link.inject(entry(3, 3));

    let result = tokio::time::timeout(WAIT, handle.wait()).await.unwrap();
    assert!(result.success);
    let ids: Vec<u16> = result.output.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(transfer.session_state(), SessionState::Idle);
    transfer.shutdown().await;
}

#[tokio::test]
async fn oversized_chunk_is_clamped_and_foreign_chunk_only_published() {
    let (transfer, link) = start_loopback(TransferConfig::default());
    let mut records = transfer.subscribe();
    let mut handle = transfer
        .fetch_operations()
        .submit(DataRequest::new(3, 0, 180))
        .await
        .unwrap();
    link.take_sent();

    link.inject(data(9, 0, 100, 100));
    link.inject(data(3, 0, 50_000, 4000));

    let first = tokio::time::timeout(WAIT, handle.next_feedback())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.id, 3);
    assert_eq!(first.offset, 0);
    assert_eq!(first.len(), 90);
    assert_eq!(handle.status(), GoalStatus::Active);

    link.inject(data(3, 90, 255, 255));
    let result = tokio::time::timeout(WAIT, handle.wait()).await.unwrap();
    assert_eq!(result.status, GoalStatus::Succeeded);
    assert_eq!(result.output.bytes_received, 180);
    assert_eq!(link.take_sent(), vec![STOP]);

    let mut published = Vec::new();
    for _ in 0..3 {
        published.push(records.recv().await.unwrap().log_id());
    }
    assert_eq!(published, vec![9, 3, 3]);
    transfer.shutdown().await;
}

#[tokio::test]
async fn records_are_published_while_idle() {
    let (transfer, link) = start_loopback(TransferConfig::default());
    let mut records = transfer.subscribe();

    link.inject(entry(5, 5));
    let record = tokio::time::timeout(WAIT, records.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(record, LogRecord::Entry(ref e) if e.id == 5));
    assert_eq!(transfer.session_state(), SessionState::Idle);
    transfer.shutdown().await;
}

#[tokio::test]
async fn failed_start_rejects_goal() {
    let (transfer, link) = start_loopback(TransferConfig::default());
    link.fail(CommandKind::RequestData);

    let mut handle = transfer
        .fetch_operations()
        .submit(DataRequest::whole(1))
        .await
        .unwrap();
    let result = handle.wait().await;
    assert_eq!(result.status, GoalStatus::Rejected);
    assert!(!result.success);
    assert_eq!(transfer.session_state(), SessionState::Idle);
    transfer.shutdown().await;
}

// ── End of transfer & thin services ──────────────────────────────────

#[tokio::test]
async fn end_transfer_is_noop_when_idle() {
    let (transfer, link) = start_loopback(TransferConfig::default());
    link.take_sent();

    transfer.end_transfer().await.unwrap();
    assert!(link.sent().is_empty());
    transfer.shutdown().await;
}

#[tokio::test]
async fn end_transfer_preempts_and_reports_stop_failure() {
    let (transfer, link) = start_loopback(TransferConfig::default());
    let handle = transfer
        .list_operations()
        .submit(ListRequest::all())
        .await
        .unwrap();
    link.fail(CommandKind::RequestEnd);

    let err = transfer.end_transfer().await.unwrap_err();
    assert!(matches!(err, CoreError::Send(ref f) if f.command == CommandKind::RequestEnd));
    assert_eq!(handle.status(), GoalStatus::Preempted);
    assert_eq!(transfer.session_state(), SessionState::Idle);
    transfer.shutdown().await;
}

#[tokio::test]
async fn thin_services_bypass_coordination() {
    let (transfer, link) = start_loopback(TransferConfig::default());
    link.take_sent();

    transfer.request_log_list(0, 4).unwrap();
    transfer.request_log_data(2, 90, 180).unwrap();
    transfer.request_log_end().unwrap();
    assert_eq!(link.take_sent().len(), 3);
    assert_eq!(transfer.session_state(), SessionState::Idle);

    link.fail(CommandKind::RequestEnd);
    let failure = transfer.request_log_end().unwrap_err();
    assert_eq!(failure.command, CommandKind::RequestEnd);
    transfer.shutdown().await;
}

// ── Lifecycle ────────────────────────────────────────────────────────

#[tokio::test]
async fn shutdown_cancels_active_goal_and_refuses_new_ones() {
    let (transfer, link) = start_loopback(TransferConfig::default());
    let mut handle = transfer
        .list_operations()
        .submit(ListRequest::all())
        .await
        .unwrap();
    link.take_sent();

    transfer.shutdown().await;
    let result = handle.wait().await;
    assert_eq!(result.status, GoalStatus::Canceled);
    assert_eq!(link.take_sent(), vec![STOP]);

    let err = transfer
        .fetch_operations()
        .submit(DataRequest::whole(1))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::CoordinatorStopped));
}

// ── Against the simulated vehicle ────────────────────────────────────

#[tokio::test]
async fn lists_and_downloads_from_simulated_vehicle() {
    let vehicle = Arc::new(SimulatedVehicle::with_sample_logs(T, 3, 500));
    let transfer = LogTransfer::start(TransferConfig::with_target(T), vehicle.clone()).unwrap();

    let mut list = transfer
        .list_operations()
        .submit(ListRequest::all())
        .await
        .unwrap();
    let listed = tokio::time::timeout(WAIT, list.wait()).await.unwrap();
    assert!(listed.success);
    let sizes: Vec<u32> = listed.output.iter().map(|e| e.size_bytes).collect();
    assert_eq!(sizes, vec![500, 1000, 1500]);

    let mut fetch = transfer
        .fetch_operations()
        .submit(DataRequest::whole(2))
        .await
        .unwrap();
    let mut buf = BytesMut::new();
    while let Some(chunk) = tokio::time::timeout(WAIT, fetch.next_feedback())
        .await
        .unwrap()
    {
        assert_eq!(usize::try_from(chunk.offset).unwrap(), buf.len());
        buf.extend_from_slice(&chunk.bytes);
    }
    let result = fetch.wait().await;
    assert!(result.success);
    assert_eq!(result.output.bytes_received, 1000);
    assert_eq!(buf.freeze(), vehicle.logs()[1].data);

    assert_eq!(
        vehicle.sent().last().map(OutboundMessage::kind),
        Some(CommandKind::RequestEnd)
    );
    transfer.shutdown().await;
}
