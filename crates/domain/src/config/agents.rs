use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Subagent role definitions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for a subagent role that the main turn runtime can
/// delegate to via the subagent dispatcher.
///
/// Each role has its own tool policy and fan-out limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Tool allow/deny policy.
    #[serde(default)]
    pub tool_policy: ToolPolicy,
    /// Fan-out / recursion limits.
    #[serde(default)]
    pub limits: AgentLimits,
}

/// Hard ceilings on multi-agent fan-out to prevent runaway trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentLimits {
    /// Maximum nesting depth (parent -> child -> grandchild).
    /// A top-level turn is depth=1; a subagent it spawns is depth=2.
    #[serde(default = "d_3")]
    pub max_depth: u32,
    /// Maximum number of subagent spawns within a single parent turn.
    #[serde(default = "d_5")]
    pub max_children_per_turn: u32,
    /// Wall-clock timeout per child run (milliseconds). 0 = no limit.
    #[serde(default = "d_30000")]
    pub max_duration_ms: u64,
    /// Dedicated `max_iterations` for the child turn loop, independent
    /// of the parent's own loop bound.
    #[serde(default = "d_10")]
    pub max_iterations: usize,
}

impl Default for AgentLimits {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_children_per_turn: 5,
            max_duration_ms: 30_000,
            max_iterations: 10,
        }
    }
}

/// Tool allow/deny policy — prefix-based matching.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolPolicy {
    /// Tool name prefixes this role may use. `["*"]` or empty = unrestricted.
    #[serde(default)]
    pub allow: Vec<String>,
    /// Tool name prefixes this role is denied (evaluated before allow).
    #[serde(default)]
    pub deny: Vec<String>,
}

impl ToolPolicy {
    /// Check whether the given tool name is permitted by this policy.
    ///
    /// Matching is case-insensitive. Deny always wins over allow.
    pub fn allows(&self, tool_name: &str) -> bool {
        let name = tool_name.to_ascii_lowercase();

        for d in &self.deny {
            let d_lower = d.to_ascii_lowercase();
            if d_lower == "*" || name == d_lower || name.starts_with(&format!("{d_lower}.")) {
                return false;
            }
        }
        if self.allow.is_empty() || self.allow.iter().any(|a| a == "*") {
            return true;
        }
        for a in &self.allow {
            let a_lower = a.to_ascii_lowercase();
            if name == a_lower || name.starts_with(&format!("{a_lower}.")) {
                return true;
            }
        }
        false
    }
}

fn d_3() -> u32 {
    3
}
fn d_5() -> u32 {
    5
}
fn d_10() -> usize {
    10
}
fn d_30000() -> u64 {
    30_000
}
