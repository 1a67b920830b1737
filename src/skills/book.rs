// SkillBook - a holder's listed skills, persisted in the coin store
//
// Edits take the holder's lock so a skill change and a transfer touching the
// same holder never interleave.

use crate::identity::HolderId;
use crate::lock::{HolderLockManager, LockError, LockPurpose};
use crate::skills::{NewSkill, Skill, SkillId, SkillSource, SkillUpdate};
use crate::storage::{keys, CoinStore, StoreError};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

/// Default cap on skills per holder
pub const DEFAULT_MAX_SKILLS: usize = 200;

#[derive(Error, Debug)]
pub enum SkillError {
    #[error("Holder {0} is not registered")]
    UnknownHolder(HolderId),

    #[error(transparent)]
    Busy(#[from] LockError),

    #[error("Holder {owner} already lists a skill titled {title:?}")]
    DuplicateTitle { owner: HolderId, title: String },

    #[error("Holder already lists the maximum of {max} skills")]
    TooManySkills { max: usize },

    #[error("Skill title cannot be empty")]
    EmptyTitle,

    #[error("Skill {0} not found")]
    NotFound(SkillId),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct SkillBook {
    store: CoinStore,
    locks: HolderLockManager,
    max_skills: usize,
}

impl SkillBook {
    pub fn new(store: CoinStore, locks: HolderLockManager) -> Self {
        Self {
            store,
            locks,
            max_skills: DEFAULT_MAX_SKILLS,
        }
    }

    /// Set the per-holder skill cap
    pub fn with_max_skills(mut self, max: usize) -> Self {
        self.max_skills = max;
        self
    }

    pub fn max_skills(&self) -> usize {
        self.max_skills
    }

    /// List a new skill for `owner`
    pub fn add_skill(&self, owner: &HolderId, new: NewSkill) -> Result<Skill, SkillError> {
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(SkillError::EmptyTitle);
        }
        if !self.store.holder_exists(owner)? {
            return Err(SkillError::UnknownHolder(owner.clone()));
        }

        let _guard = self.locks.try_acquire(owner, LockPurpose::SkillEdit)?;

        self.check_room_for(owner, &title, None)?;

        let new = NewSkill { title, ..new };
        let id = SkillId::new(self.store.generate_id()?);
        let skill = Skill::create(id, owner.clone(), new);
        self.store.put_row(&keys::skill(owner, id.value()), &skill)?;

        info!(owner = %owner, skill = %id, title = skill.title(), price = skill.price(), "skill added");
        Ok(skill)
    }

    /// Replace a skill's price, description, tags and pictures
    pub fn update_skill(&self, owner: &HolderId, id: SkillId, update: SkillUpdate) -> Result<Skill, SkillError> {
        let _guard = self.locks.try_acquire(owner, LockPurpose::SkillEdit)?;

        let mut skill = self.load(owner, id)?;
        skill.apply_update(update);
        self.store.put_row(&keys::skill(owner, id.value()), &skill)?;

        debug!(owner = %owner, skill = %id, version = skill.version(), "skill updated");
        Ok(skill)
    }

    /// Withdraw a skill from backing future issuances, or restore it
    pub fn set_active(&self, owner: &HolderId, id: SkillId, active: bool) -> Result<Skill, SkillError> {
        let _guard = self.locks.try_acquire(owner, LockPurpose::SkillEdit)?;

        let mut skill = self.load(owner, id)?;
        if skill.is_active() != active {
            if active {
                self.check_room_for(owner, skill.title(), Some(id))?;
            }
            skill.set_active(active);
            self.store.put_row(&keys::skill(owner, id.value()), &skill)?;
            debug!(owner = %owner, skill = %id, active, "skill switched");
        }
        Ok(skill)
    }

    /// Look up one of the owner's skills
    pub fn get_skill(&self, owner: &HolderId, id: SkillId) -> Result<Option<Skill>, SkillError> {
        Ok(self.store.get_row(&keys::skill(owner, id.value()))?)
    }

    /// Every skill the owner lists, active or not, oldest first
    pub fn list_skills(&self, owner: &HolderId) -> Result<Vec<Skill>, SkillError> {
        Ok(self.store.scan_rows(&keys::skill_prefix(owner))?)
    }

    /// Withdrawn skills neither count towards the cap nor reserve their title
    fn check_room_for(&self, owner: &HolderId, title: &str, skip: Option<SkillId>) -> Result<(), SkillError> {
        let listed: Vec<Skill> = self
            .list_skills(owner)?
            .into_iter()
            .filter(|s| s.is_active() && Some(s.id()) != skip)
            .collect();
        if listed.len() >= self.max_skills {
            return Err(SkillError::TooManySkills { max: self.max_skills });
        }
        if listed.iter().any(|s| s.title() == title) {
            return Err(SkillError::DuplicateTitle {
                owner: owner.clone(),
                title: title.to_string(),
            });
        }
        Ok(())
    }

    fn load(&self, owner: &HolderId, id: SkillId) -> Result<Skill, SkillError> {
        // Skills are keyed under their owner, so another holder's id is simply absent
        self.get_skill(owner, id)?.ok_or(SkillError::NotFound(id))
    }
}

#[async_trait]
impl SkillSource for SkillBook {
    async fn active_skills(&self, owner: &HolderId) -> Result<Vec<Skill>, SkillError> {
        Ok(self
            .list_skills(owner)?
            .into_iter()
            .filter(|s| s.is_active())
            .collect())
    }
}
