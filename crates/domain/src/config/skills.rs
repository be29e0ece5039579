use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where skill descriptors are read from, and which skills are always
/// loaded regardless of what the model requests.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SkillsConfig {
    #[serde(default)]
    pub skills_path: Option<PathBuf>,
    #[serde(default)]
    pub always_load: Vec<String>,
}
