//! Recovery-engine behavior through the orchestrator.

use chrono::{Duration, Utc};

use super::fakes::{page_of, record, TestEngine};
use crate::errors::{Error, SyncErrorCode};
use crate::items::{ItemPatch, ItemRef, ItemRepositoryTrait, ItemStatus};
use crate::sync::{
    CountSet, SessionStatus, SyncConfig, SyncCounts, SyncServiceTrait, SyncSession,
};
use crate::transactions::{Transaction, TransactionRepositoryTrait};

fn item_ref(eng: &TestEngine) -> ItemRef {
    ItemRef::id(eng.item.id.clone(), eng.item.user_id.clone())
}

const FIVE_TXS: [&str; 5] = ["tx-1", "tx-2", "tx-3", "tx-4", "tx-5"];

/// Drive the engine into the partial-failure state: 5 expected, 4 applied.
async fn break_initial_sync(eng: &TestEngine) -> String {
    eng.transactions.fail_writes_for("tx-5");
    eng.gateway
        .push_page(page_of(&FIVE_TXS, &[], &[], "cursor-1", false));
    let result = eng.service.sync_transactions(item_ref(eng)).await.unwrap();
    eng.transactions.clear_write_failures();
    result.session_id.unwrap()
}

#[tokio::test]
async fn recovery_sweeps_rows_written_by_the_broken_session() {
    let eng = TestEngine::new();
    let failed_id = break_initial_sync(&eng).await;
    assert_eq!(eng.transactions.row_count(), 4);

    let result = eng.service.sync_transactions(item_ref(&eng)).await.unwrap();

    assert!(result.recovered);
    assert!(result.has_more, "recovery forces a fresh attempt next time");
    assert_eq!(result.removed, 4);
    assert_eq!(eng.transactions.row_count(), 0);

    let failed = eng.session(&failed_id);
    let recovery = eng.session(result.session_id.as_deref().unwrap());
    assert!(recovery.is_recovery);
    assert_eq!(recovery.status, SessionStatus::Complete);
    assert_eq!(recovery.sync_counts.expected.removed, Some(4));
    assert_eq!(recovery.sync_counts.actual.removed, Some(4));
    assert_eq!(recovery.sync_time, failed.sync_time);
    assert!((recovery.sync_number - 1.1).abs() < 1e-9);
    assert_eq!(recovery.recovery_attempts, 1);
    assert_eq!(recovery.prev_session_id.as_deref(), Some(failed_id.as_str()));
    assert_eq!(failed.recovery_session_id.as_deref(), Some(recovery.id.as_str()));
    assert_eq!(failed.recovery_attempts, 1);

    let item = eng.reload_item();
    assert_eq!(item.status, ItemStatus::Complete);
    assert_eq!(item.sync_id.as_deref(), Some(recovery.id.as_str()));
}

#[tokio::test]
async fn resync_after_recovery_resumes_from_the_pre_failure_cursor() {
    let eng = TestEngine::new();
    let failed_id = break_initial_sync(&eng).await;
    eng.service.sync_transactions(item_ref(&eng)).await.unwrap();

    // The provider re-delivers the same page for the rolled-back cursor.
    eng.gateway
        .push_page(page_of(&FIVE_TXS, &[], &[], "cursor-1", false));
    let result = eng.service.sync_transactions(item_ref(&eng)).await.unwrap();

    let failed = eng.session(&failed_id);
    assert_eq!(
        eng.gateway.cursors_seen().last().unwrap().as_deref(),
        failed.cursor.as_deref(),
        "resync fetches from the broken session's input cursor"
    );
    assert_eq!(result.added, 5);
    assert!(result.count_validation.unwrap().is_valid);
    assert_eq!(eng.transactions.row_count(), 5);

    let session = eng.session(result.session_id.as_deref().unwrap());
    assert_eq!(session.status, SessionStatus::Complete);
    assert_eq!(eng.reload_item().status, ItemStatus::Complete);
}

#[tokio::test]
async fn failed_recovery_sweep_is_itself_recoverable() {
    let eng = TestEngine::new();
    break_initial_sync(&eng).await;

    // One stale row refuses to delete during the sweep.
    eng.transactions.fail_writes_for("tx-2");
    let result = eng.service.sync_transactions(item_ref(&eng)).await.unwrap();

    assert!(result.recovered);
    assert_eq!(
        result.error.as_ref().unwrap().code,
        SyncErrorCode::RecoveryFailed
    );
    let recovery = eng.session(result.session_id.as_deref().unwrap());
    assert_eq!(recovery.status, SessionStatus::Error);
    assert_eq!(recovery.sync_counts.expected.removed, Some(4));
    assert_eq!(recovery.sync_counts.actual.removed, Some(3));
    assert_eq!(recovery.failed_transactions.removed.len(), 1);
    assert_eq!(eng.reload_item().status, ItemStatus::Error);
    assert!(eng.reload_item().sync_id.is_none());
    assert_eq!(eng.transactions.row_count(), 1);

    // Second pass recovers the broken recovery from the same boundary.
    eng.transactions.clear_write_failures();
    let result = eng.service.sync_transactions(item_ref(&eng)).await.unwrap();

    assert!(result.recovered);
    assert!(result.error.is_none());
    let second = eng.session(result.session_id.as_deref().unwrap());
    assert_eq!(second.status, SessionStatus::Complete);
    assert_eq!(second.recovery_attempts, 2);
    assert!((second.sync_number - 1.2).abs() < 1e-9);
    assert_eq!(eng.transactions.row_count(), 0);
    assert_eq!(
        eng.reload_item().sync_id.as_deref(),
        Some(second.id.as_str())
    );
}

#[tokio::test]
async fn recovery_attempts_are_capped() {
    let eng = TestEngine::with_config(SyncConfig {
        max_recovery_attempts: 1,
        ..SyncConfig::default()
    });
    break_initial_sync(&eng).await;

    // First (and only allowed) attempt fails mid-sweep.
    eng.transactions.fail_writes_for("tx-1");
    let result = eng.service.sync_transactions(item_ref(&eng)).await.unwrap();
    assert!(result.recovered);
    assert_eq!(
        result.error.as_ref().unwrap().code,
        SyncErrorCode::RecoveryFailed
    );

    eng.transactions.clear_write_failures();
    let err = eng.service.sync_transactions(item_ref(&eng)).await.unwrap_err();
    assert!(matches!(err, Error::RecoveryFailed(_)));

    let item = eng.reload_item();
    assert_eq!(item.status, ItemStatus::Error);
    assert_eq!(item.error.unwrap().code, SyncErrorCode::RecoveryFailed);
}

#[tokio::test]
async fn count_mismatch_triggers_recovery_even_on_a_complete_session() {
    let eng = TestEngine::new();

    // A superficially complete session whose ledger does not balance.
    let mut session = SyncSession::new(&eng.item.id, &eng.item.provider_item_id, "user-1");
    session.status = SessionStatus::Complete;
    session.sync_counts = SyncCounts {
        expected: CountSet::new(2, 0, 0),
        actual: CountSet::new(1, 0, 0),
    };
    session.next_cursor = Some("cursor-1".to_string());
    eng.sessions.seed(session.clone());
    eng.items
        .update(
            &eng.item.id,
            &eng.item.user_id,
            ItemPatch::default().with_sync_id(session.id.clone()),
        )
        .await
        .unwrap();

    let result = eng.service.sync_transactions(item_ref(&eng)).await.unwrap();
    assert!(result.recovered);
}

#[tokio::test]
async fn crashed_in_progress_session_is_recovered_after_the_staleness_window() {
    let eng = TestEngine::new();
    eng.gateway
        .push_page(page_of(&["tx-1"], &[], &[], "cursor-1", false));
    eng.service.sync_transactions(item_ref(&eng)).await.unwrap();

    // Simulate a worker that opened a session, wrote one row, and died
    // before closing: expected counts asserted, actual never recorded.
    let good = eng.session(eng.reload_item().sync_id.as_deref().unwrap());
    let mut crashed = SyncSession::new(&eng.item.id, &eng.item.provider_item_id, "user-1");
    crashed.cursor = Some("cursor-1".to_string());
    crashed.sync_time = good.sync_time + 1;
    crashed.sync_counts.expected = CountSet::new(2, 0, 0);
    crashed.prev_session_id = Some(good.id.clone());
    eng.sessions.seed(crashed.clone());

    let mut linked = good.clone();
    linked.next_session_id = Some(crashed.id.clone());
    eng.sessions.seed(linked);

    let orphan = Transaction::from_record(
        &record("tx-orphan"),
        &eng.item,
        Some("cursor-1"),
        crashed.sync_time,
    );
    eng.transactions.upsert(orphan).await.unwrap();
    assert_eq!(eng.transactions.row_count(), 2);

    let mut item = eng.reload_item();
    item.status = ItemStatus::InProgress;
    item.updated_at = Utc::now() - Duration::seconds(600);
    eng.items.seed(item);

    let result = eng.service.sync_transactions(item_ref(&eng)).await.unwrap();

    assert!(result.recovered);
    assert_eq!(result.removed, 1);
    // The crashed session's writes are gone; the good session's row remains.
    assert_eq!(eng.transactions.row_count(), 1);
    assert!(eng
        .transactions
        .get_by_provider_id("user-1", "tx-1")
        .unwrap()
        .is_some());
}
