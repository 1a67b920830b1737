// Skills module - WHAT BACKS A COIN
// Mutable skill listings and the source the engine reads them from

mod book;
mod model;
mod source;

pub use book::{SkillBook, SkillError, DEFAULT_MAX_SKILLS};
pub use model::{NewSkill, Skill, SkillId, SkillUpdate};
pub use source::SkillSource;
