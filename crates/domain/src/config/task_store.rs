use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Task store & tracker configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where the task graph snapshot and the run/progress log are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStoreConfig {
    #[serde(default = "d_snapshot_path")]
    pub snapshot_path: PathBuf,
    #[serde(default = "d_tracker_path")]
    pub tracker_path: PathBuf,
    /// Default `limit` used by `ListProgress` when the caller passes `<= 0`.
    #[serde(default = "d_progress_limit")]
    pub default_progress_limit: usize,
}

impl Default for TaskStoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: d_snapshot_path(),
            tracker_path: d_tracker_path(),
            default_progress_limit: d_progress_limit(),
        }
    }
}

fn d_snapshot_path() -> PathBuf {
    PathBuf::from("./state/tasks.json")
}
fn d_tracker_path() -> PathBuf {
    PathBuf::from("./state/tracker.json")
}
fn d_progress_limit() -> usize {
    20
}
