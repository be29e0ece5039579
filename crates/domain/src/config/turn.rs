use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Main turn runtime configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Bounds on the main tool-calling loop (C7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Maximum number of LLM↔tool round trips in a single turn.
    #[serde(default = "d_max_iterations")]
    pub max_iterations: usize,
    /// Number of consecutive tool failures that triggers the
    /// error-guidance addendum injected into the last user message.
    #[serde(default = "d_guidance_threshold")]
    pub guidance_threshold: usize,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            max_iterations: d_max_iterations(),
            guidance_threshold: d_guidance_threshold(),
        }
    }
}

impl TurnConfig {
    pub fn clamped(&self) -> Self {
        Self {
            max_iterations: self.max_iterations.clamp(1, 200),
            guidance_threshold: self.guidance_threshold.max(1),
        }
    }
}

fn d_max_iterations() -> usize {
    20
}
fn d_guidance_threshold() -> usize {
    2
}
