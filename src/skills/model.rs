use crate::identity::HolderId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a skill
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SkillId(u64);

impl SkillId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "skill:{}", self.0)
    }
}

/// A service offering listed by a holder. Skills are mutable; what backs a
/// coin is an immutable snapshot of the skill's fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    id: SkillId,
    owner: HolderId,
    title: String,
    price: u64,
    description: String,
    tags: Vec<String>,
    pictures: Vec<String>,
    active: bool,
    /// Bumped on every content update
    version: u64,
    created_at_ms: i64,
    updated_at_ms: i64,
}

impl Skill {
    pub(crate) fn create(id: SkillId, owner: HolderId, new: NewSkill) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id,
            owner,
            title: new.title,
            price: new.price,
            description: new.description,
            tags: new.tags,
            pictures: new.pictures,
            active: true,
            version: 1,
            created_at_ms: now,
            updated_at_ms: now,
        }
    }

    pub(crate) fn apply_update(&mut self, update: SkillUpdate) {
        self.price = update.price;
        self.description = update.description;
        self.tags = update.tags;
        self.pictures = update.pictures;
        self.version += 1;
        self.updated_at_ms = chrono::Utc::now().timestamp_millis();
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
        self.updated_at_ms = chrono::Utc::now().timestamp_millis();
    }

    pub fn id(&self) -> SkillId {
        self.id
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

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Fields for listing a new skill
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSkill {
    pub title: String,
    pub price: u64,
    pub description: String,
    pub tags: Vec<String>,
    pub pictures: Vec<String>,
}

impl NewSkill {
    pub fn new(title: &str, price: u64) -> Self {
        Self {
            title: title.to_string(),
            price,
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_pictures(mut self, pictures: Vec<String>) -> Self {
        self.pictures = pictures;
        self
    }
}

/// Replacement content for an existing skill. The title is immutable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillUpdate {
    pub price: u64,
    pub description: String,
    pub tags: Vec<String>,
    pub pictures: Vec<String>,
}
