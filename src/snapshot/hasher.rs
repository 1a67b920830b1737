// Content identity for snapshot sets and skill snapshots

use crate::skills::Skill;
use crate::snapshot::SnapshotId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DigestError {
    #[error("Invalid hex digest: {0}")]
    InvalidHex(String),

    #[error("Invalid digest length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// Digest identifying a backing version (snapshot set)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SetDigest([u8; 32]);

impl SetDigest {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, DigestError> {
        let bytes = hex::decode(s).map_err(|e| DigestError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| DigestError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for SetDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// Computes order-independent identities for snapshot sets.
pub struct IdentityHasher;

impl IdentityHasher {
    const SET_DOMAIN: &'static [u8] = b"snapset:v1:";
    const SKILL_DOMAIN: &'static [u8] = b"skill:v1:";

    /// Members in canonical order: descending, without duplicates
    pub fn canonical_order(ids: &[SnapshotId]) -> Vec<SnapshotId> {
        let mut sorted = ids.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();
        sorted
    }

    /// Digest of a set of snapshot ids. Input order does not matter.
    pub fn digest(ids: &[SnapshotId]) -> SetDigest {
        let sorted = Self::canonical_order(ids);

        let mut hasher = Sha256::new();
        hasher.update(Self::SET_DOMAIN);
        hasher.update((sorted.len() as u64).to_be_bytes());
        for id in &sorted {
            hasher.update(id.value().to_be_bytes());
        }
        let result = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&result);
        SetDigest(bytes)
    }

    /// Fingerprint of a skill's current content. Two snapshots of the same
    /// skill with equal fingerprints are interchangeable.
    pub fn skill_fingerprint(skill: &Skill) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(Self::SKILL_DOMAIN);
        hasher.update(skill.id().value().to_be_bytes());
        update_str(&mut hasher, skill.title());
        hasher.update(skill.price().to_be_bytes());
        update_str(&mut hasher, skill.description());
        update_list(&mut hasher, skill.tags());
        update_list(&mut hasher, skill.pictures());
        let result = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&result);
        bytes
    }
}

// Length-prefixed so adjacent fields cannot run into each other
fn update_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_be_bytes());
    hasher.update(value.as_bytes());
}

fn update_list(hasher: &mut Sha256, values: &[String]) {
    hasher.update((values.len() as u64).to_be_bytes());
    for value in values {
        update_str(hasher, value);
    }
}
