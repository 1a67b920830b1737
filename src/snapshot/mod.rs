// Snapshot module - What backs a coin
// Frozen skill snapshots, snapshot sets (backing versions) and their identity

mod hasher;
mod model;
mod store;

pub use hasher::{DigestError, IdentityHasher, SetDigest};
pub use model::{BackingVersion, SkillSnapshot, SnapshotId, VersionId};
pub use store::{SnapshotError, SnapshotSetStore};
