// HolderLockManager - process-wide, non-blocking holder locks
//
// A holder is either free or busy with exactly one operation. Acquisition is
// try-only: a busy holder is reported immediately, never waited on. State is
// in memory only and starts empty on every process start.

use crate::identity::HolderId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

/// What a holder lock is held for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockPurpose {
    Transfer,
    SkillEdit,
}

impl fmt::Display for LockPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockPurpose::Transfer => write!(f, "transfer"),
            LockPurpose::SkillEdit => write!(f, "skill edit"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("Holder {holder} is busy with a {purpose}")]
    Busy { holder: HolderId, purpose: LockPurpose },
}

impl LockError {
    pub fn holder(&self) -> &HolderId {
        match self {
            LockError::Busy { holder, .. } => holder,
        }
    }
}

/// Shared lock table. Clones share the same table.
#[derive(Clone, Default)]
pub struct HolderLockManager {
    busy: Arc<DashMap<HolderId, LockPurpose>>,
}

impl HolderLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a holder busy, or fail if it already is
    pub fn try_acquire(&self, holder: &HolderId, purpose: LockPurpose) -> Result<HolderGuard, LockError> {
        match self.busy.entry(holder.clone()) {
            Entry::Occupied(held) => Err(LockError::Busy {
                holder: holder.clone(),
                purpose: *held.get(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(purpose);
                trace!(holder = %holder, %purpose, "holder lock acquired");
                Ok(HolderGuard {
                    manager: self.clone(),
                    holder: Some(holder.clone()),
                })
            }
        }
    }

    /// Lock both sides of a transfer, or neither.
    ///
    /// If the second holder is busy the first lock is dropped before the
    /// error is returned. A pair naming the same holder twice is always busy.
    pub fn try_acquire_pair(
        &self,
        first: &HolderId,
        second: &HolderId,
        purpose: LockPurpose,
    ) -> Result<PairGuard, LockError> {
        let first_guard = self.try_acquire(first, purpose)?;
        // On error first_guard is dropped here, rolling back the first lock
        let second_guard = self.try_acquire(second, purpose)?;
        Ok(PairGuard {
            _first: first_guard,
            _second: second_guard,
        })
    }

    /// Clear a holder's marker unconditionally
    pub fn release(&self, holder: &HolderId) {
        if self.busy.remove(holder).is_some() {
            trace!(holder = %holder, "holder lock released");
        }
    }

    pub fn is_locked(&self, holder: &HolderId) -> bool {
        self.busy.contains_key(holder)
    }

    /// Number of holders currently busy
    pub fn active_count(&self) -> usize {
        self.busy.len()
    }
}

/// Releases its holder when dropped
pub struct HolderGuard {
    manager: HolderLockManager,
    holder: Option<HolderId>,
}

impl HolderGuard {
    pub fn holder(&self) -> Option<&HolderId> {
        self.holder.as_ref()
    }
}

impl Drop for HolderGuard {
    fn drop(&mut self) {
        if let Some(holder) = self.holder.take() {
            self.manager.release(&holder);
        }
    }
}

/// Both holders of a transfer; released together when dropped
pub struct PairGuard {
    _first: HolderGuard,
    _second: HolderGuard,
}
