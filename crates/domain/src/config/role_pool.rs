use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Role pool configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Concurrency admission settings for the subagent role pool.
///
/// A global cap bounds total concurrent subagent runs; per-role
/// overrides further restrict individual roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePoolConfig {
    /// Maximum number of subagent runs active at once, across all roles.
    /// Clamped to the range `1..=64`.
    #[serde(default = "default_global_max_concurrent")]
    pub global_max_concurrent: usize,
    /// Per-role overrides (role name -> max concurrent). A role with no
    /// entry here is bounded only by the global cap.
    #[serde(default)]
    pub per_role_max_concurrent: HashMap<String, usize>,
}

impl Default for RolePoolConfig {
    fn default() -> Self {
        Self {
            global_max_concurrent: default_global_max_concurrent(),
            per_role_max_concurrent: HashMap::new(),
        }
    }
}

impl RolePoolConfig {
    /// Clamp `global_max_concurrent` to the allowed range `1..=64`.
    pub fn clamped(&self) -> Self {
        Self {
            global_max_concurrent: self.global_max_concurrent.clamp(1, 64),
            per_role_max_concurrent: self.per_role_max_concurrent.clone(),
        }
    }
}

fn default_global_max_concurrent() -> usize {
    8
}
