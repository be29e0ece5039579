use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
}

impl TaskStatus {
    /// Parse a status string, normalizing the tracker's aliases
    /// (`todo`→pending, `doing`→in_progress, `done`→completed).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "pending" | "todo" => Some(Self::Pending),
            "in_progress" | "doing" => Some(Self::InProgress),
            "completed" | "done" => Some(Self::Completed),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
        };
        write!(f, "{s}")
    }
}

/// A task in the dependency graph. The Task Store is the sole owner —
/// every caller receives a deep-copied view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub subject: String,
    pub description: String,
    pub active_form: String,
    pub status: TaskStatus,
    pub owner: Option<String>,
    pub blocked_by: Vec<String>,
    pub blocks: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub(crate) fn new(subject: String, description: String, active_form: Option<String>) -> Self {
        let now = Utc::now();
        let active_form = active_form.filter(|s| !s.is_empty()).unwrap_or_else(|| subject.clone());
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            subject,
            description,
            active_form,
            status: TaskStatus::Pending,
            owner: None,
            blocked_by: Vec::new(),
            blocks: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A patch applied by `Update` — every field is optional; absent
/// fields leave the task's current value unchanged.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub active_form: Option<String>,
    pub status: Option<TaskStatus>,
    pub owner: Option<Option<String>>,
}

/// `(run_id → task_id)`; upsert keeps the newest `task_id` per `run_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLink {
    pub run_id: String,
    pub task_id: String,
    pub created_at: DateTime<Utc>,
}

/// An append-only progress note attached to a task, optionally tied to
/// the run that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub entry_id: String,
    pub task_id: String,
    pub run_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
