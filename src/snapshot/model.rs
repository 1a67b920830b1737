use crate::identity::HolderId;
use crate::skills::{Skill, SkillId};
use crate::snapshot::SetDigest;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a frozen skill snapshot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnapshotId(u64);

impl SnapshotId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "snap:{}", self.0)
    }
}

/// Identifier of a backing version. Ids grow with creation time, so ordering
/// by id is ordering from oldest to newest version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionId(u64);

impl VersionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Immutable copy of a skill's content at the time it backed an issuance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSnapshot {
    id: SnapshotId,
    skill_id: SkillId,
    owner: HolderId,
    title: String,
    price: u64,
    description: String,
    tags: Vec<String>,
    pictures: Vec<String>,
    fingerprint: [u8; 32],
    created_at_ms: i64,
}

impl SkillSnapshot {
    pub(crate) fn capture(id: SnapshotId, skill: &Skill, fingerprint: [u8; 32]) -> Self {
        Self {
            id,
            skill_id: skill.id(),
            owner: skill.owner().clone(),
            title: skill.title().to_string(),
            price: skill.price(),
            description: skill.description().to_string(),
            tags: skill.tags().to_vec(),
            pictures: skill.pictures().to_vec(),
            fingerprint,
            created_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn id(&self) -> SnapshotId {
        self.id
    }

    pub fn skill_id(&self) -> SkillId {
        self.skill_id
    }

    pub fn owner(&self) -> &HolderId {
        &self.owner
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn price(&self) -> u64 {
        self.price
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn pictures(&self) -> &[String] {
        &self.pictures
    }

    pub fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }
}

/// A snapshot set backing one or more issuances of the owner's coin
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackingVersion {
    id: VersionId,
    owner: HolderId,
    digest: SetDigest,
    /// Member snapshot ids, descending
    members: Vec<SnapshotId>,
    /// Sum of member prices
    value: u64,
    count: u32,
    created_at_ms: i64,
}

impl BackingVersion {
    pub(crate) fn new(
        id: VersionId,
        owner: HolderId,
        digest: SetDigest,
        members: Vec<SnapshotId>,
        value: u64,
    ) -> Self {
        let count = members.len() as u32;
        Self {
            id,
            owner,
            digest,
            members,
            value,
            count,
            created_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn id(&self) -> VersionId {
        self.id
    }

    pub fn owner(&self) -> &HolderId {
        &self.owner
    }

    pub fn digest(&self) -> &SetDigest {
        &self.digest
    }

    pub fn members(&self) -> &[SnapshotId] {
        &self.members
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn created_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.created_at_ms)
    }
}
