use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session storage configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where sessions and their transcripts are persisted, and how large a
/// message window the context builder is allowed to read back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "d_state_dir")]
    pub state_dir: PathBuf,
    /// Maximum number of trailing messages the context builder includes
    /// in a turn's message window. Clamped to `1..=500`.
    #[serde(default = "d_window")]
    pub message_window: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            state_dir: d_state_dir(),
            message_window: d_window(),
        }
    }
}

impl SessionsConfig {
    pub fn clamped(&self) -> Self {
        Self {
            state_dir: self.state_dir.clone(),
            message_window: self.message_window.clamp(1, 500),
        }
    }
}

fn d_state_dir() -> PathBuf {
    PathBuf::from("./state/sessions")
}
fn d_window() -> usize {
    50
}
