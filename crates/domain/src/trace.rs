use serde::Serialize;

/// Structured trace events emitted across all taskloom crates.
///
/// Each variant is serialized to a single JSON blob and logged through
/// `tracing::info!` under the `trace_event` field, so a log pipeline
/// can parse it without depending on this crate.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    TaskCreated {
        task_id: String,
        subject: String,
    },
    TaskUpdated {
        task_id: String,
        status: String,
    },
    TaskDeleted {
        task_id: String,
    },
    DependencyAdded {
        task_id: String,
        blocker_id: String,
    },
    DependencyRemoved {
        task_id: String,
        blocker_id: String,
    },
    RunLinked {
        run_id: String,
        task_id: String,
    },
    ProgressAppended {
        task_id: String,
        run_id: Option<String>,
        status: Option<String>,
    },
    CircuitTransition {
        profile: String,
        from: String,
        to: String,
    },
    LlmFallback {
        from_profile: String,
        to_profile: String,
        reason: String,
    },
    TurnIteration {
        run_id: String,
        iteration: usize,
        tool_calls: usize,
    },
    TurnMaxIterationsReached {
        run_id: String,
        max_iterations: usize,
    },
    SubagentSpawned {
        run_id: String,
        parent_run_id: String,
        role: String,
        task_id: Option<String>,
    },
    SubagentCompleted {
        run_id: String,
        status: String,
    },
    ToolFailed {
        run_id: String,
        tool: String,
        consecutive_failures: usize,
    },
    SessionResolved {
        session_key: String,
        is_new: bool,
    },
    TranscriptAppend {
        session_id: String,
        lines: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "tl_event");
    }
}
