// SkillSource - where the transfer engine reads an issuer's current skills

use crate::identity::HolderId;
use crate::skills::{Skill, SkillError};
use async_trait::async_trait;

/// Provider of a holder's active skills at issuance time
#[async_trait]
pub trait SkillSource: Send + Sync {
    /// Active skills owned by `owner`, oldest listing first
    async fn active_skills(&self, owner: &HolderId) -> Result<Vec<Skill>, SkillError>;
}
