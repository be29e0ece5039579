pub mod registry;
pub mod types;

pub use registry::SkillsRegistry;
pub use types::{LoadedSkills, SkillDescriptor};
