// Identity Hasher Tests
// Tests for snapshot-set digests and skill fingerprints

use skillcoin::identity::HolderId;
use skillcoin::lock::HolderLockManager;
use skillcoin::skills::{NewSkill, SkillBook, SkillUpdate};
use skillcoin::snapshot::{IdentityHasher, SetDigest, SnapshotId};
use skillcoin::CoinStore;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn ids(values: &[u64]) -> Vec<SnapshotId> {
    values.iter().copied().map(SnapshotId::new).collect()
}

fn skill_book() -> (SkillBook, HolderId) {
    let store = CoinStore::temporary().unwrap();
    let owner = HolderId::parse("ibis").unwrap();
    store.register_holder(&owner).unwrap();
    (SkillBook::new(store, HolderLockManager::new()), owner)
}

// ============================================================================
// SET DIGEST
// ============================================================================

#[test]
fn test_digest_order_independent() {
    let a = IdentityHasher::digest(&ids(&[3, 1, 2]));
    let b = IdentityHasher::digest(&ids(&[1, 2, 3]));
    let c = IdentityHasher::digest(&ids(&[2, 3, 1]));
    assert_eq!(a, b);
    assert_eq!(b, c);
}

#[test]
fn test_digest_differs_for_different_sets() {
    assert_ne!(
        IdentityHasher::digest(&ids(&[1, 2, 3])),
        IdentityHasher::digest(&ids(&[1, 2, 4]))
    );
    assert_ne!(
        IdentityHasher::digest(&ids(&[1, 2])),
        IdentityHasher::digest(&ids(&[1, 2, 3]))
    );
}

#[test]
fn test_digest_is_stable() {
    let first = IdentityHasher::digest(&ids(&[10, 20]));
    let second = IdentityHasher::digest(&ids(&[10, 20]));
    assert_eq!(first.to_hex(), second.to_hex());
    assert_eq!(first.to_hex().len(), 64);
}

#[test]
fn test_canonical_order_descending_deduplicated() {
    assert_eq!(IdentityHasher::canonical_order(&ids(&[1, 5, 3, 5])), ids(&[5, 3, 1]));
}

#[test]
fn test_set_digest_hex_roundtrip() {
    let digest = IdentityHasher::digest(&ids(&[42]));
    let parsed = SetDigest::from_hex(&digest.to_hex()).unwrap();
    assert_eq!(parsed, digest);
}

#[test]
fn test_set_digest_rejects_bad_hex() {
    assert!(SetDigest::from_hex("zz").is_err());
    assert!(SetDigest::from_hex("abcd").is_err());
}

// ============================================================================
// SKILL FINGERPRINT
// ============================================================================

#[test]
fn test_fingerprint_changes_with_content() {
    let (book, owner) = skill_book();
    let skill = book.add_skill(&owner, NewSkill::new("Guitar lessons", 30)).unwrap();
    let before = IdentityHasher::skill_fingerprint(&skill);

    let updated = book
        .update_skill(
            &owner,
            skill.id(),
            SkillUpdate {
                price: 35,
                ..SkillUpdate::default()
            },
        )
        .unwrap();
    let after = IdentityHasher::skill_fingerprint(&updated);

    assert_ne!(before, after);
}

#[test]
fn test_fingerprint_ignores_activity_flag() {
    let (book, owner) = skill_book();
    let skill = book.add_skill(&owner, NewSkill::new("Bread baking", 12)).unwrap();
    let off = book.set_active(&owner, skill.id(), false).unwrap();

    assert_eq!(
        IdentityHasher::skill_fingerprint(&skill),
        IdentityHasher::skill_fingerprint(&off)
    );
}

#[test]
fn test_fingerprint_separates_fields() {
    let (book, owner) = skill_book();
    let a = book
        .add_skill(&owner, NewSkill::new("ab", 1).with_description("c"))
        .unwrap();
    let b = book
        .add_skill(&owner, NewSkill::new("a", 1).with_description("bc"))
        .unwrap();

    assert_ne!(IdentityHasher::skill_fingerprint(&a), IdentityHasher::skill_fingerprint(&b));
}
