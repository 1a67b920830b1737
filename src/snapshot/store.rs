// SnapshotSetStore - Append-only store of skill snapshots and snapshot sets
//
// Rows here are never updated or deleted once another row can reference
// them. Creation races are settled by a compare-and-swap on the content key:
// the first writer wins, later writers adopt the winner's row.

use crate::identity::HolderId;
use crate::skills::Skill;
use crate::snapshot::{BackingVersion, IdentityHasher, SetDigest, SkillSnapshot, SnapshotId, VersionId};
use crate::storage::{keys, CoinStore, StoreError};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("A snapshot set needs at least one member")]
    EmptySet,

    #[error("Snapshot {snapshot} belongs to {owner}, not to the set owner")]
    ForeignSnapshot { snapshot: SnapshotId, owner: HolderId },

    #[error("Snapshot {0} is indexed but its row is missing")]
    MissingSnapshot(SnapshotId),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct SnapshotSetStore {
    store: CoinStore,
}

impl SnapshotSetStore {
    pub fn new(store: CoinStore) -> Self {
        Self { store }
    }

    // ========================================================================
    // SKILL SNAPSHOTS
    // ========================================================================

    /// Snapshot a skill's current content, reusing an identical snapshot of
    /// the same skill if one exists.
    pub fn snapshot_skill(&self, skill: &Skill) -> Result<SkillSnapshot, SnapshotError> {
        let fingerprint = IdentityHasher::skill_fingerprint(skill);
        let index_key = keys::snapshot_index(skill.id().value(), &fingerprint);

        if let Some(existing) = self.store.get_row::<u64>(&index_key)? {
            return self.load_snapshot(SnapshotId::new(existing));
        }

        let id = SnapshotId::new(self.store.generate_id()?);
        let snapshot = SkillSnapshot::capture(id, skill, fingerprint);
        self.store.put_row(&keys::snapshot(id.value()), &snapshot)?;

        match self.store.insert_row_if_absent(&index_key, &id.value())? {
            None => {
                debug!(skill = %skill.id(), snapshot = %id, "created skill snapshot");
                Ok(snapshot)
            }
            Some(winner) => {
                // Nothing can reference the losing row yet
                self.store.db().remove(keys::snapshot(id.value())).map_err(StoreError::from)?;
                self.load_snapshot(SnapshotId::new(winner))
            }
        }
    }

    /// Load a snapshot by id
    pub fn snapshot(&self, id: SnapshotId) -> Result<Option<SkillSnapshot>, SnapshotError> {
        Ok(self.store.get_row(&keys::snapshot(id.value()))?)
    }

    fn load_snapshot(&self, id: SnapshotId) -> Result<SkillSnapshot, SnapshotError> {
        self.snapshot(id)?.ok_or(SnapshotError::MissingSnapshot(id))
    }

    // ========================================================================
    // SNAPSHOT SETS (BACKING VERSIONS)
    // ========================================================================

    /// Find the backing version for this exact snapshot set, creating it
    /// if it does not exist yet.
    pub fn resolve_or_create(
        &self,
        owner: &HolderId,
        members: &[SkillSnapshot],
    ) -> Result<BackingVersion, SnapshotError> {
        if members.is_empty() {
            return Err(SnapshotError::EmptySet);
        }
        if let Some(foreign) = members.iter().find(|s| s.owner() != owner) {
            return Err(SnapshotError::ForeignSnapshot {
                snapshot: foreign.id(),
                owner: foreign.owner().clone(),
            });
        }

        let ids: Vec<SnapshotId> = members.iter().map(|s| s.id()).collect();
        let digest = IdentityHasher::digest(&ids);

        if let Some(existing) = self.lookup_by_digest(&digest)? {
            return Ok(existing);
        }

        let canonical = IdentityHasher::canonical_order(&ids);
        let value = canonical
            .iter()
            .filter_map(|id| members.iter().find(|m| m.id() == *id))
            .fold(0u64, |sum, m| sum.saturating_add(m.price()));

        let version_id = VersionId::new(self.store.generate_id()?);
        let version = BackingVersion::new(version_id, owner.clone(), digest, canonical, value);

        // Id index first: a dangling index entry is harmless, a set row
        // without one would be unreachable by id.
        let id_key = keys::snapshot_set_id(version_id.value());
        self.store.put_row(&id_key, digest.as_bytes())?;

        match self
            .store
            .insert_row_if_absent(&keys::snapshot_set(digest.as_bytes()), &version)?
        {
            None => {
                info!(
                    owner = %owner,
                    version = %version_id,
                    digest = %digest,
                    members = version.count(),
                    value = version.value(),
                    "created backing version"
                );
                Ok(version)
            }
            Some(existing) => {
                debug!(digest = %digest, winner = %existing.id(), "backing version created concurrently");
                self.store.db().remove(id_key).map_err(StoreError::from)?;
                Ok(existing)
            }
        }
    }

    /// Look up a backing version by digest
    pub fn lookup_by_digest(&self, digest: &SetDigest) -> Result<Option<BackingVersion>, SnapshotError> {
        Ok(self.store.get_row(&keys::snapshot_set(digest.as_bytes()))?)
    }

    /// Look up a backing version by id
    pub fn lookup_by_id(&self, id: VersionId) -> Result<Option<BackingVersion>, SnapshotError> {
        let Some(digest) = self.store.get_row::<[u8; 32]>(&keys::snapshot_set_id(id.value()))? else {
            return Ok(None);
        };
        let version = self.lookup_by_digest(&SetDigest::from_bytes(digest))?;
        Ok(version.filter(|v| v.id() == id))
    }

    /// All backing versions issued by an owner, oldest first
    pub fn versions_owned_by(&self, owner: &HolderId) -> Result<Vec<BackingVersion>, SnapshotError> {
        let mut versions: Vec<BackingVersion> = self
            .store
            .scan_rows::<BackingVersion>(keys::SNAPSHOT_SET)?
            .into_iter()
            .filter(|v| v.owner() == owner)
            .collect();
        versions.sort_by_key(|v| v.id());
        Ok(versions)
    }

    /// Total number of backing versions
    pub fn version_count(&self) -> usize {
        self.store.db().scan_prefix(keys::SNAPSHOT_SET).count()
    }
}
