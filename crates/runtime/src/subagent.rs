//! Subagent Dispatcher (C9) — spawns role-tagged child turns under
//! the role pool's concurrency admission and correlates results back
//! to the task tracker.
//!
//! A child run is a bounded, constrained invocation of the same loop
//! the main turn runtime drives ([`Runtime::run_loop`]); the dispatcher
//! holds no loop logic of its own.

use std::time::Duration;

use tl_domain::ctx::Cancel;
use tl_domain::error::{Error, Result};
use tl_domain::trace::TraceEvent;

use crate::turn::Runtime;

pub struct SpawnRequest {
    pub role: String,
    pub task: String,
    pub task_id: Option<String>,
    pub parent_run_id: String,
    pub session_key: String,
}

impl SpawnRequest {
    /// Parse a `spawn_subagent` tool call's JSON arguments.
    pub fn from_arguments(
        args: &serde_json::Value,
        parent_run_id: String,
        session_key: String,
    ) -> Result<Self> {
        let role = args
            .get("role")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::InvalidArgument("spawn_subagent requires role".into()))?
            .to_string();
        let task = args
            .get("task")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::InvalidArgument("spawn_subagent requires task".into()))?
            .to_string();
        let task_id = args
            .get("task_id")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(Self {
            role,
            task,
            task_id,
            parent_run_id,
            session_key,
        })
    }
}

/// `Spawn(ctx, {role, task, task_id?, parent_run_id, session_key})`.
///
/// Returns the child's final output text, or an error if the role is
/// unknown, admission was cancelled, or the child turn itself failed.
pub async fn spawn(runtime: &Runtime, cancel: &dyn Cancel, req: SpawnRequest) -> Result<String> {
    let agent = runtime
        .agent_config(&req.role)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown role: {}", req.role)))?
        .clone();

    let permit = runtime.role_pool.acquire(&req.role, cancel).await?;

    let run_id = uuid::Uuid::new_v4().to_string();
    let child_session_key = format!("{}::child::{run_id}", req.session_key);

    if let Some(task_id) = &req.task_id {
        runtime.tracker.link_run(&run_id, task_id)?;
        runtime.tracker.update_task_status(task_id, "in_progress")?;
    }

    TraceEvent::SubagentSpawned {
        run_id: run_id.clone(),
        parent_run_id: req.parent_run_id.clone(),
        role: req.role.clone(),
        task_id: req.task_id.clone(),
    }
    .emit();

    let child_run = runtime.run_loop(
        cancel,
        &run_id,
        &child_session_key,
        &req.task,
        None,
        agent.limits.max_iterations,
        &agent.tool_policy,
        Default::default(),
    );

    let outcome = if agent.limits.max_duration_ms > 0 {
        match tokio::time::timeout(Duration::from_millis(agent.limits.max_duration_ms), child_run).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "subagent run {run_id} exceeded its {} ms deadline",
                agent.limits.max_duration_ms
            ))),
        }
    } else {
        child_run.await
    };

    let result = match outcome {
        Ok(turn_outcome) => {
            let final_status = if turn_outcome.canceled { "blocked" } else { "completed" };
            if let Some(task_id) = &req.task_id {
                runtime.tracker.update_task_status(task_id, final_status)?;
                runtime
                    .tracker
                    .append_progress(task_id, Some(&run_id), Some(final_status), &turn_outcome.output)?;
            }
            TraceEvent::SubagentCompleted {
                run_id: run_id.clone(),
                status: final_status.to_string(),
            }
            .emit();
            Ok(turn_outcome.output)
        }
        Err(e) => {
            if let Some(task_id) = &req.task_id {
                let _ = runtime.tracker.update_task_status(task_id, "blocked");
                let _ = runtime
                    .tracker
                    .append_progress(task_id, Some(&run_id), Some("blocked"), &e.to_string());
            }
            TraceEvent::SubagentCompleted {
                run_id: run_id.clone(),
                status: "blocked".to_string(),
            }
            .emit();
            Err(e)
        }
    };

    drop(permit);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_arguments_requires_role_and_task() {
        let err = SpawnRequest::from_arguments(&serde_json::json!({}), "p".into(), "s".into())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn from_arguments_parses_optional_task_id() {
        let req = SpawnRequest::from_arguments(
            &serde_json::json!({"role": "frontend", "task": "build UI", "task_id": "t1"}),
            "p".into(),
            "s".into(),
        )
        .unwrap();
        assert_eq!(req.role, "frontend");
        assert_eq!(req.task_id, Some("t1".to_string()));
    }
}
