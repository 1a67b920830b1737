// Transfer Concurrency Tests
// Tests for try-only locking between overlapping transfers and skill edits

use async_trait::async_trait;
use skillcoin::engine::{TransferEngine, TransferError, TransferRequest};
use skillcoin::identity::HolderId;
use skillcoin::lock::HolderLockManager;
use skillcoin::skills::{NewSkill, Skill, SkillBook, SkillError, SkillSource};
use skillcoin::{CoinStore, EngineConfig};
use std::sync::Arc;
use tokio::sync::Notify;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn id(name: &str) -> HolderId {
    HolderId::parse(name).unwrap()
}

/// Skill source that parks inside `active_skills` until released, so an
/// issuance can be held open while it owns its locks
struct GatedSource {
    book: SkillBook,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl SkillSource for GatedSource {
    async fn active_skills(&self, owner: &HolderId) -> Result<Vec<Skill>, SkillError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.book.active_skills(owner).await
    }
}

struct Fixture {
    store: CoinStore,
    book: SkillBook,
    engine: TransferEngine,
}

fn fixture(names: &[&str]) -> Fixture {
    let store = CoinStore::temporary().unwrap();
    for name in names {
        store.register_holder(&id(name)).unwrap();
    }
    let locks = HolderLockManager::new();
    let book = SkillBook::new(store.clone(), locks.clone());
    let engine = TransferEngine::new(
        store.clone(),
        locks,
        Arc::new(book.clone()) as Arc<dyn SkillSource>,
        EngineConfig::default(),
    );
    Fixture { store, book, engine }
}

fn gated_fixture(names: &[&str]) -> (Fixture, Arc<Notify>, Arc<Notify>) {
    let f = fixture(names);
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let source = GatedSource {
        book: f.book.clone(),
        entered: Arc::clone(&entered),
        release: Arc::clone(&release),
    };
    let engine = TransferEngine::new(
        f.store.clone(),
        f.engine.locks().clone(),
        Arc::new(source) as Arc<dyn SkillSource>,
        EngineConfig::default(),
    );
    (
        Fixture {
            store: f.store,
            book: f.book,
            engine,
        },
        entered,
        release,
    )
}

fn request(payer: &str, receiver: &str, coin: &str, amount: u64) -> TransferRequest {
    TransferRequest::new(id(payer), id(receiver), id(coin), amount)
}

fn aggregate(engine: &TransferEngine, holder: &str, coin: &str) -> i64 {
    engine.aggregate().balance(&id(holder), &id(coin), false).unwrap()
}

// ============================================================================
// OVERLAPPING OPERATIONS
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_transfer_rejected_without_waiting() {
    let (f, entered, release) = gated_fixture(&["ibis", "heron", "crane"]);
    f.book.add_skill(&id("ibis"), NewSkill::new("Pottery", 40)).unwrap();

    let engine = f.engine.clone();
    let in_flight = tokio::spawn(async move { engine.transfer(request("ibis", "heron", "ibis", 5)).await });
    entered.notified().await;

    // ibis is locked by the parked issuance
    let err = f.engine.transfer(request("ibis", "crane", "ibis", 1)).await.unwrap_err();
    assert_eq!(err, TransferError::ConcurrentOperationInProgress(id("ibis")));

    // So is heron, as the receiver
    let err = f.engine.transfer(request("crane", "heron", "ibis", 1)).await.unwrap_err();
    assert_eq!(err, TransferError::ConcurrentOperationInProgress(id("heron")));

    release.notify_one();
    in_flight.await.unwrap().unwrap();

    assert_eq!(aggregate(&f.engine, "heron", "ibis"), 5);
    assert_eq!(f.store.record_count(), 1);
    assert_eq!(f.engine.locks().active_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_skill_edit_rejected_during_issuance() {
    let (f, entered, release) = gated_fixture(&["ibis", "heron"]);
    let skill = f.book.add_skill(&id("ibis"), NewSkill::new("Pottery", 40)).unwrap();

    let engine = f.engine.clone();
    let in_flight = tokio::spawn(async move { engine.transfer(request("ibis", "heron", "ibis", 5)).await });
    entered.notified().await;

    assert!(matches!(
        f.book.add_skill(&id("ibis"), NewSkill::new("Weaving", 25)),
        Err(SkillError::Busy(_))
    ));
    assert!(matches!(
        f.book.set_active(&id("ibis"), skill.id(), false),
        Err(SkillError::Busy(_))
    ));

    release.notify_one();
    in_flight.await.unwrap().unwrap();

    // The issuance was backed by the unedited skill set
    let versions = f.engine.snapshots().versions_owned_by(&id("ibis")).unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].count(), 1);
    assert!(f.book.add_skill(&id("ibis"), NewSkill::new("Weaving", 25)).is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unrelated_transfer_proceeds_during_issuance() {
    let (f, entered, release) = gated_fixture(&["ibis", "heron", "crane", "stork"]);
    f.book.add_skill(&id("ibis"), NewSkill::new("Pottery", 40)).unwrap();
    f.book.add_skill(&id("heron"), NewSkill::new("Weaving", 25)).unwrap();

    let engine = f.engine.clone();
    let in_flight = tokio::spawn(async move { engine.transfer(request("ibis", "heron", "ibis", 5)).await });
    entered.notified().await;

    // crane and stork are free; a marker issuance needs no skill lookup
    f.engine
        .transfer(request("crane", "stork", "crane", 3).with_marker(true))
        .await
        .unwrap();

    release.notify_one();
    in_flight.await.unwrap().unwrap();
    assert_eq!(f.engine.aggregate().balance(&id("stork"), &id("crane"), true).unwrap(), 3);
}

// ============================================================================
// PARALLEL TRANSFERS
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disjoint_pairs_all_settle() {
    let payers: Vec<String> = (0..8).map(|i| format!("payer-{}", i)).collect();
    let receivers: Vec<String> = (0..8).map(|i| format!("receiver-{}", i)).collect();
    let mut names: Vec<&str> = vec!["ibis"];
    names.extend(payers.iter().map(String::as_str));
    names.extend(receivers.iter().map(String::as_str));
    let f = fixture(&names);
    f.book.add_skill(&id("ibis"), NewSkill::new("Pottery", 40)).unwrap();
    for payer in &payers {
        f.engine.transfer(request("ibis", payer, "ibis", 10)).await.unwrap();
    }

    let mut handles = Vec::new();
    for (payer, receiver) in payers.iter().zip(&receivers) {
        let engine = f.engine.clone();
        let req = request(payer, receiver, "ibis", 4);
        handles.push(tokio::spawn(async move { engine.transfer(req).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for (payer, receiver) in payers.iter().zip(&receivers) {
        assert_eq!(aggregate(&f.engine, payer, "ibis"), 6);
        assert_eq!(aggregate(&f.engine, receiver, "ibis"), 4);
    }
    assert_eq!(aggregate(&f.engine, "ibis", "ibis"), -80);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_contended_payer_never_overspends() {
    let receivers: Vec<String> = (0..16).map(|i| format!("receiver-{}", i)).collect();
    let mut names: Vec<&str> = vec!["ibis", "heron"];
    names.extend(receivers.iter().map(String::as_str));
    let f = fixture(&names);
    f.book.add_skill(&id("ibis"), NewSkill::new("Pottery", 40)).unwrap();
    f.engine.transfer(request("ibis", "heron", "ibis", 10)).await.unwrap();

    let mut handles = Vec::new();
    for receiver in &receivers {
        let engine = f.engine.clone();
        let req = request("heron", receiver, "ibis", 1);
        handles.push(tokio::spawn(async move { engine.transfer(req).await }));
    }

    let mut settled = 0i64;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => settled += 1,
            Err(TransferError::ConcurrentOperationInProgress(_)) | Err(TransferError::InsufficientBalance { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    let received: i64 = receivers.iter().map(|r| aggregate(&f.engine, r, "ibis")).sum();
    assert!(settled <= 10);
    assert_eq!(received, settled);
    assert_eq!(aggregate(&f.engine, "heron", "ibis"), 10 - settled);
    assert_eq!(f.engine.versioned().total(&id("heron"), &id("ibis")).unwrap(), 10 - settled);
    assert_eq!(f.engine.locks().active_count(), 0);
}
