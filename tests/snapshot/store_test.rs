// Snapshot Set Store Tests
// Tests for skill snapshots and backing version dedup

use skillcoin::identity::HolderId;
use skillcoin::lock::HolderLockManager;
use skillcoin::skills::{NewSkill, Skill, SkillBook, SkillUpdate};
use skillcoin::snapshot::{IdentityHasher, SkillSnapshot, SnapshotError, SnapshotSetStore, VersionId};
use skillcoin::CoinStore;
use std::sync::Arc;
use std::thread;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

struct Fixture {
    store: CoinStore,
    book: SkillBook,
    snapshots: SnapshotSetStore,
}

fn fixture(holders: &[&str]) -> Fixture {
    let store = CoinStore::temporary().unwrap();
    for name in holders {
        store.register_holder(&id(name)).unwrap();
    }
    Fixture {
        book: SkillBook::new(store.clone(), HolderLockManager::new()),
        snapshots: SnapshotSetStore::new(store.clone()),
        store,
    }
}

fn id(name: &str) -> HolderId {
    HolderId::parse(name).unwrap()
}

fn add(f: &Fixture, owner: &str, title: &str, price: u64) -> Skill {
    f.book.add_skill(&id(owner), NewSkill::new(title, price)).unwrap()
}

fn snap_all(f: &Fixture, skills: &[Skill]) -> Vec<SkillSnapshot> {
    skills.iter().map(|s| f.snapshots.snapshot_skill(s).unwrap()).collect()
}

// ============================================================================
// SKILL SNAPSHOTS
// ============================================================================

#[test]
fn test_snapshot_copies_skill_fields() {
    let f = fixture(&["ibis"]);
    let skill = f
        .book
        .add_skill(
            &id("ibis"),
            NewSkill::new("Pottery", 40)
                .with_description("wheel throwing")
                .with_tags(vec!["craft".to_string()])
                .with_pictures(vec!["pot.png".to_string()]),
        )
        .unwrap();

    let snapshot = f.snapshots.snapshot_skill(&skill).unwrap();

    assert_eq!(snapshot.skill_id(), skill.id());
    assert_eq!(snapshot.owner(), &id("ibis"));
    assert_eq!(snapshot.title(), "Pottery");
    assert_eq!(snapshot.price(), 40);
    assert_eq!(snapshot.description(), "wheel throwing");
    assert_eq!(snapshot.tags(), &["craft".to_string()]);
    assert_eq!(snapshot.pictures(), &["pot.png".to_string()]);
}

#[test]
fn test_snapshot_reused_for_unchanged_skill() {
    let f = fixture(&["ibis"]);
    let skill = add(&f, "ibis", "Pottery", 40);

    let first = f.snapshots.snapshot_skill(&skill).unwrap();
    let second = f.snapshots.snapshot_skill(&skill).unwrap();

    assert_eq!(first.id(), second.id());
}

#[test]
fn test_new_snapshot_after_update() {
    let f = fixture(&["ibis"]);
    let skill = add(&f, "ibis", "Pottery", 40);
    let first = f.snapshots.snapshot_skill(&skill).unwrap();

    let updated = f
        .book
        .update_skill(
            &id("ibis"),
            skill.id(),
            SkillUpdate {
                price: 45,
                ..SkillUpdate::default()
            },
        )
        .unwrap();
    let second = f.snapshots.snapshot_skill(&updated).unwrap();

    assert_ne!(first.id(), second.id());
    assert_eq!(second.price(), 45);
    // The old snapshot is untouched
    assert_eq!(f.snapshots.snapshot(first.id()).unwrap().unwrap().price(), 40);
}

// ============================================================================
// RESOLVE OR CREATE
// ============================================================================

#[test]
fn test_resolve_creates_version_with_value_and_count() {
    let f = fixture(&["ibis"]);
    let skills = vec![add(&f, "ibis", "Pottery", 40), add(&f, "ibis", "Weaving", 25)];
    let members = snap_all(&f, &skills);

    let version = f.snapshots.resolve_or_create(&id("ibis"), &members).unwrap();

    assert_eq!(version.owner(), &id("ibis"));
    assert_eq!(version.value(), 65);
    assert_eq!(version.count(), 2);
    let ids: Vec<_> = members.iter().map(|m| m.id()).collect();
    assert_eq!(version.digest(), &IdentityHasher::digest(&ids));
    // Members are stored descending
    assert!(version.members()[0] > version.members()[1]);
}

#[test]
fn test_resolve_is_idempotent() {
    let f = fixture(&["ibis"]);
    let skills = vec![add(&f, "ibis", "Pottery", 40), add(&f, "ibis", "Weaving", 25)];
    let members = snap_all(&f, &skills);

    let first = f.snapshots.resolve_or_create(&id("ibis"), &members).unwrap();
    let mut reversed = members.clone();
    reversed.reverse();
    let second = f.snapshots.resolve_or_create(&id("ibis"), &reversed).unwrap();

    assert_eq!(first.id(), second.id());
    assert_eq!(f.snapshots.version_count(), 1);
}

#[test]
fn test_resolve_rejects_empty_set() {
    let f = fixture(&["ibis"]);
    assert!(matches!(
        f.snapshots.resolve_or_create(&id("ibis"), &[]),
        Err(SnapshotError::EmptySet)
    ));
}

#[test]
fn test_resolve_rejects_foreign_snapshot() {
    let f = fixture(&["ibis", "crane"]);
    let mine = add(&f, "ibis", "Pottery", 40);
    let theirs = add(&f, "crane", "Fishing", 10);
    let members = snap_all(&f, &[mine, theirs]);

    assert!(matches!(
        f.snapshots.resolve_or_create(&id("ibis"), &members),
        Err(SnapshotError::ForeignSnapshot { .. })
    ));
    assert_eq!(f.snapshots.version_count(), 0);
}

#[test]
fn test_concurrent_resolve_creates_one_version() {
    let f = fixture(&["ibis"]);
    let skills = vec![add(&f, "ibis", "Pottery", 40), add(&f, "ibis", "Weaving", 25)];
    let members = Arc::new(snap_all(&f, &skills));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let snapshots = f.snapshots.clone();
            let members = Arc::clone(&members);
            thread::spawn(move || {
                snapshots
                    .resolve_or_create(&HolderId::parse("ibis").unwrap(), &members)
                    .unwrap()
                    .id()
            })
        })
        .collect();

    let ids: Vec<VersionId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.iter().all(|v| *v == ids[0]));
    assert_eq!(f.snapshots.version_count(), 1);
    assert!(f.snapshots.lookup_by_id(ids[0]).unwrap().is_some());
}

// ============================================================================
// LOOKUPS
// ============================================================================

#[test]
fn test_lookup_by_digest_and_id() {
    let f = fixture(&["ibis"]);
    let members = snap_all(&f, &[add(&f, "ibis", "Pottery", 40)]);
    let version = f.snapshots.resolve_or_create(&id("ibis"), &members).unwrap();

    let by_digest = f.snapshots.lookup_by_digest(version.digest()).unwrap().unwrap();
    let by_id = f.snapshots.lookup_by_id(version.id()).unwrap().unwrap();

    assert_eq!(by_digest, version);
    assert_eq!(by_id, version);
}

#[test]
fn test_lookup_unknown_digest() {
    let f = fixture(&["ibis"]);
    let digest = IdentityHasher::digest(&[skillcoin::snapshot::SnapshotId::new(999)]);
    assert!(f.snapshots.lookup_by_digest(&digest).unwrap().is_none());
    assert!(f.snapshots.lookup_by_id(VersionId::new(999)).unwrap().is_none());
}

#[test]
fn test_versions_owned_by_oldest_first() {
    let f = fixture(&["ibis"]);
    let pottery = add(&f, "ibis", "Pottery", 40);
    let v1 = f
        .snapshots
        .resolve_or_create(&id("ibis"), &snap_all(&f, &[pottery.clone()]))
        .unwrap();
    let weaving = add(&f, "ibis", "Weaving", 25);
    let v2 = f
        .snapshots
        .resolve_or_create(&id("ibis"), &snap_all(&f, &[pottery, weaving]))
        .unwrap();

    let versions = f.snapshots.versions_owned_by(&id("ibis")).unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].id(), v1.id());
    assert_eq!(versions[1].id(), v2.id());
    assert!(v1.id() < v2.id());
    assert!(!f.store.is_empty());
}
