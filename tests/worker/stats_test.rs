// Stats Worker Tests
// Tests for post-commit issuance bookkeeping and its retry policy

use skillcoin::engine::{TransferEngine, TransferRequest};
use skillcoin::identity::HolderId;
use skillcoin::ledger::CorrelationId;
use skillcoin::lock::HolderLockManager;
use skillcoin::skills::{NewSkill, SkillBook, SkillSource};
use skillcoin::worker::{MockStatsSink, SettledTransfer, StatsWorker, WorkerStats};
use skillcoin::{CoinStore, EngineConfig, WorkerConfig};
use std::sync::Arc;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn id(name: &str) -> HolderId {
    HolderId::parse(name).unwrap()
}

fn fast_config(max_retries: u32) -> WorkerConfig {
    WorkerConfig::default()
        .with_max_retries(max_retries)
        .with_retry_delay_ms(1)
}

fn settled(coin: &str, amount: u64, is_issue: bool) -> SettledTransfer {
    SettledTransfer {
        correlation: CorrelationId::generate(),
        coin: id(coin),
        payer: id(if is_issue { coin } else { "heron" }),
        receiver: id("crane"),
        amount,
        is_issue,
        is_marker: false,
        legs: 1,
    }
}

// ============================================================================
// EVENT HANDLING
// ============================================================================

#[tokio::test]
async fn test_issuances_recorded() {
    let sink = Arc::new(MockStatsSink::new());
    let (tx, handle) = StatsWorker::new(Arc::clone(&sink), fast_config(3)).spawn(8);

    tx.send(settled("ibis", 5, true)).await.unwrap();
    tx.send(settled("ibis", 7, true)).await.unwrap();
    tx.send(settled("heron", 2, true)).await.unwrap();
    drop(tx);
    let stats = handle.join().await.unwrap();

    assert_eq!(sink.total(&id("ibis")), 12);
    assert_eq!(sink.total(&id("heron")), 2);
    assert_eq!(stats.events_received, 3);
    assert_eq!(stats.issuances_recorded, 3);
    assert_eq!(stats.amount_recorded, 14);
}

#[tokio::test]
async fn test_plain_transfers_ignored() {
    let sink = Arc::new(MockStatsSink::new());
    let (tx, handle) = StatsWorker::new(Arc::clone(&sink), fast_config(3)).spawn(8);

    tx.send(settled("ibis", 5, false)).await.unwrap();
    drop(tx);
    let stats = handle.join().await.unwrap();

    assert_eq!(sink.call_count(), 0);
    assert_eq!(stats.events_received, 1);
    assert_eq!(stats.issuances_recorded, 0);
}

#[tokio::test]
async fn test_marker_issuances_ignored() {
    let sink = Arc::new(MockStatsSink::new());
    let (tx, handle) = StatsWorker::new(Arc::clone(&sink), fast_config(3)).spawn(8);

    let mut marker = settled("ibis", 9, true);
    marker.is_marker = true;
    tx.send(marker).await.unwrap();
    tx.send(settled("ibis", 4, true)).await.unwrap();
    drop(tx);
    let stats = handle.join().await.unwrap();

    assert_eq!(sink.call_count(), 1);
    assert_eq!(sink.total(&id("ibis")), 4);
    assert_eq!(stats.events_received, 2);
    assert_eq!(stats.issuances_recorded, 1);
}

#[tokio::test]
async fn test_join_with_no_events() {
    let sink = Arc::new(MockStatsSink::new());
    let (tx, handle) = StatsWorker::new(sink, fast_config(3)).spawn(8);
    drop(tx);

    assert_eq!(handle.join().await.unwrap(), WorkerStats::default());
}

// ============================================================================
// RETRIES
// ============================================================================

#[tokio::test]
async fn test_retry_until_success() {
    let sink = Arc::new(MockStatsSink::new().with_failures_then_success(2));
    let (tx, handle) = StatsWorker::new(Arc::clone(&sink), fast_config(3)).spawn(8);

    tx.send(settled("ibis", 5, true)).await.unwrap();
    drop(tx);
    let stats = handle.join().await.unwrap();

    assert_eq!(sink.call_count(), 3);
    assert_eq!(sink.total(&id("ibis")), 5);
    assert_eq!(stats.retries, 2);
    assert_eq!(stats.failures, 0);
}

#[tokio::test]
async fn test_gives_up_after_max_retries() {
    let sink = Arc::new(MockStatsSink::new().with_failures_then_success(10));
    let (tx, handle) = StatsWorker::new(Arc::clone(&sink), fast_config(2)).spawn(8);

    tx.send(settled("ibis", 5, true)).await.unwrap();
    drop(tx);
    let stats = handle.join().await.unwrap();

    // One attempt plus two retries
    assert_eq!(sink.call_count(), 3);
    assert_eq!(sink.total(&id("ibis")), 0);
    assert_eq!(stats.retries, 2);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.issuances_recorded, 0);
}

#[tokio::test]
async fn test_failed_event_does_not_block_later_ones() {
    let sink = Arc::new(MockStatsSink::new().with_failures_then_success(1));
    let (tx, handle) = StatsWorker::new(Arc::clone(&sink), fast_config(0)).spawn(8);

    tx.send(settled("ibis", 5, true)).await.unwrap();
    tx.send(settled("ibis", 3, true)).await.unwrap();
    drop(tx);
    let stats = handle.join().await.unwrap();

    assert_eq!(stats.failures, 1);
    assert_eq!(stats.issuances_recorded, 1);
    assert_eq!(sink.total(&id("ibis")), 3);
}

// ============================================================================
// ENGINE INTEGRATION
// ============================================================================

#[tokio::test]
async fn test_engine_issuances_update_coin_record() {
    let store = CoinStore::temporary().unwrap();
    for name in ["ibis", "heron", "crane"] {
        store.register_holder(&id(name)).unwrap();
    }
    let locks = HolderLockManager::new();
    let book = SkillBook::new(store.clone(), locks.clone());
    book.add_skill(&id("ibis"), NewSkill::new("Pottery", 40)).unwrap();

    let (tx, handle) = StatsWorker::new(Arc::new(store.clone()), fast_config(3)).spawn(8);
    let engine = TransferEngine::new(
        store.clone(),
        locks,
        Arc::new(book) as Arc<dyn SkillSource>,
        EngineConfig::default(),
    )
    .with_events(tx);

    engine
        .transfer(TransferRequest::new(id("ibis"), id("heron"), id("ibis"), 6))
        .await
        .unwrap();
    engine
        .transfer(TransferRequest::new(id("heron"), id("crane"), id("ibis"), 2))
        .await
        .unwrap();
    engine
        .transfer(TransferRequest::new(id("ibis"), id("crane"), id("ibis"), 3).with_marker(true))
        .await
        .unwrap();
    drop(engine);
    let stats = handle.join().await.unwrap();

    assert_eq!(stats.events_received, 3);
    assert_eq!(stats.issuances_recorded, 1);
    assert_eq!(store.coin_record(&id("ibis")).unwrap().unwrap().issued(), 6);
}
