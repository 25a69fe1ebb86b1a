//! Integration tests for the orchestrator: single-flight, broadcasting, and
//! cache management through [`SyncService`].

mod common;

use std::sync::Arc;

use common::{FakeMirror, FakeSource, TEST_TIMEOUT, config, numbered_items, numbered_pages};
use marksync::snapshot::{DEFAULT_TTL, SnapshotCache};
use marksync::sync::broadcast::VIEWER_BUFFER;
use marksync::sync::{Strategy, SyncEvent, SyncRequest, SyncService};
use tempfile::TempDir;
use tokio::sync::Notify;
use uuid::Uuid;

fn service(source: FakeSource, mirror: FakeMirror, dir: &TempDir) -> SyncService {
    SyncService::new(
        Arc::new(source),
        Arc::new(mirror),
        Arc::new(SnapshotCache::new(dir.path(), DEFAULT_TTL)),
        config(10),
    )
}

#[tokio::test(start_paused = true)]
async fn test_single_flight_lock() {
    let dir = TempDir::new().unwrap();
    let gate = Arc::new(Notify::new());
    let service = service(
        FakeSource::gated(numbered_items(2), Arc::clone(&gate)),
        FakeMirror::new(Vec::new()),
        &dir,
    );

    let first = service
        .start_sync(SyncRequest::new(Strategy::FullReset))
        .unwrap();
    assert_eq!(service.active_run().unwrap().run_id, first.run_id);

    let err = service
        .start_sync(SyncRequest::new(Strategy::SmartIncremental))
        .unwrap_err();
    assert_eq!(err.run_id, first.run_id);
    assert_eq!(err.strategy, Strategy::FullReset);

    let outcome = service.trigger(SyncRequest::new(Strategy::FullReset));
    assert!(!outcome.accepted);
    assert!(outcome.reason.unwrap().contains("already running"));

    gate.notify_one();
    let report = tokio::time::timeout(TEST_TIMEOUT, first.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.counts.created, 2);
    assert!(service.active_run().is_none());

    let third = service
        .start_sync(SyncRequest::new(Strategy::FullReset))
        .unwrap();
    gate.notify_one();
    assert!(third.wait().await.unwrap().succeeded());
}

#[tokio::test(start_paused = true)]
async fn test_failed_run_releases_lock() {
    let dir = TempDir::new().unwrap();
    let service = service(FakeSource::failing(), FakeMirror::new(Vec::new()), &dir);

    let report = service
        .start_sync(SyncRequest::new(Strategy::SmartIncremental))
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert!(!report.succeeded());

    let outcome = service.trigger(SyncRequest::new(Strategy::SmartIncremental));
    assert!(outcome.accepted);
    assert!(outcome.run_id.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_viewers_receive_events_in_order() {
    let dir = TempDir::new().unwrap();
    let service = service(
        FakeSource::new(numbered_items(3)),
        FakeMirror::new(numbered_pages(2)),
        &dir,
    );
    let mut viewer = service.broadcaster().subscribe(Uuid::new_v4());

    let ticket = service
        .start_sync(SyncRequest::new(Strategy::FullReset))
        .unwrap();

    let mut events = Vec::new();
    while let Some(event) = viewer.recv().await {
        let done = event.is_complete();
        events.push(event);
        if done {
            break;
        }
    }
    ticket.wait().await.unwrap();

    assert_eq!(events[0].message(), "Starting full-reset sync");
    let item_results = events
        .iter()
        .filter(|e| matches!(e, SyncEvent::ItemResult { .. }))
        .count();
    assert_eq!(item_results, 5);
    match events.last() {
        Some(SyncEvent::Complete { final_counts, .. }) => {
            assert_eq!(final_counts.archived, 2);
            assert_eq!(final_counts.created, 3);
        }
        other => panic!("expected complete event, got {other:?}"),
    }
}

async fn follow_to_complete(viewer: &mut tokio::sync::mpsc::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(TEST_TIMEOUT, viewer.recv())
            .await
            .expect("viewer never saw the run complete")
            .expect("viewer stream closed before completion");
        let done = event.is_complete();
        events.push(event);
        if done {
            return events;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_panicking_run_still_completes_for_viewers() {
    let dir = TempDir::new().unwrap();
    let service = service(FakeSource::panicking(), FakeMirror::new(Vec::new()), &dir);
    let mut viewer = service.broadcaster().subscribe(Uuid::new_v4());

    let ticket = service
        .start_sync(SyncRequest::new(Strategy::SmartIncremental))
        .unwrap();
    let events = follow_to_complete(&mut viewer).await;

    let report = ticket.wait().await.unwrap();
    assert_eq!(report.error.as_deref(), Some("sync run panicked"));
    assert!(matches!(
        &events[events.len() - 2],
        SyncEvent::Failed { message, .. } if message == "sync run panicked"
    ));
    assert!(service.active_run().is_none());
    assert!(service.trigger(SyncRequest::new(Strategy::FullReset)).accepted);
}

#[tokio::test(start_paused = true)]
async fn test_huge_days_back_covers_everything() {
    let dir = TempDir::new().unwrap();
    let service = service(
        FakeSource::new(numbered_items(3)),
        FakeMirror::new(Vec::new()),
        &dir,
    );
    let mut viewer = service.broadcaster().subscribe(Uuid::new_v4());

    let ticket = service
        .start_sync(
            SyncRequest::new(Strategy::SmartIncremental).with_days_back(Some(200_000_000)),
        )
        .unwrap();
    let events = follow_to_complete(&mut viewer).await;

    let report = ticket.wait().await.unwrap();
    assert!(report.succeeded());
    assert_eq!(report.counts.created, 3);
    match events.last() {
        Some(SyncEvent::Complete { final_counts, .. }) => assert_eq!(final_counts.created, 3),
        other => panic!("expected complete event, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_unread_viewer_is_cut_off_instead_of_missing_complete() {
    let dir = TempDir::new().unwrap();
    let service = service(
        FakeSource::new(numbered_items(300)),
        FakeMirror::new(Vec::new()),
        &dir,
    );
    let mut idle = service.broadcaster().subscribe(Uuid::new_v4());

    let report = service
        .start_sync(SyncRequest::new(Strategy::FullReset))
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(report.counts.created, 300);
    assert_eq!(service.broadcaster().viewer_count(), 0);

    let mut buffered = 0;
    while let Some(event) = tokio::time::timeout(TEST_TIMEOUT, idle.recv())
        .await
        .expect("cut-off viewer stream should end")
    {
        assert!(!event.is_complete());
        buffered += 1;
    }
    assert_eq!(buffered, VIEWER_BUFFER);
}

#[tokio::test(start_paused = true)]
async fn test_viewer_disconnect_does_not_cancel_run() {
    let dir = TempDir::new().unwrap();
    let service = service(
        FakeSource::new(numbered_items(4)),
        FakeMirror::new(Vec::new()),
        &dir,
    );
    let mut viewer = service.broadcaster().subscribe(Uuid::new_v4());

    let ticket = service
        .start_sync(SyncRequest::new(Strategy::FullReset))
        .unwrap();
    let _first = viewer.recv().await;
    drop(viewer);

    let report = ticket.wait().await.unwrap();
    assert_eq!(report.counts.created, 4);
    assert_eq!(service.broadcaster().viewer_count(), 0);
}

#[tokio::test]
async fn test_cache_refresh_status_and_clear() {
    let dir = TempDir::new().unwrap();
    let service = service(
        FakeSource::new(numbered_items(6)),
        FakeMirror::new(Vec::new()),
        &dir,
    );

    assert!(!service.cache_status().await.exists);

    let stats = service.refresh_cache().await.unwrap();
    assert_eq!(stats.item_count, 6);

    let status = service.cache_status().await;
    assert!(status.valid);
    assert_eq!(status.item_count, Some(6));

    service.clear_cache().await.unwrap();
    assert!(!service.cache_status().await.exists);
}

#[tokio::test]
async fn test_counts_report_each_side_independently() {
    let dir = TempDir::new().unwrap();
    let service = service(
        FakeSource::failing(),
        FakeMirror::new(numbered_pages(5)),
        &dir,
    );

    let counts = service.counts().await;
    assert_eq!(counts.source, None);
    assert!(counts.source_error.is_some());
    assert_eq!(counts.mirror, Some(5));
    assert!(counts.mirror_error.is_none());
}
