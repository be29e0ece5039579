//! Main Turn Runtime (C7) — the iterative LLM ↔ tool-call loop.
//!
//! [`Runtime`] aggregates every port the loop needs (sessions, skills,
//! tools, provider rotation, task tracker, role pool) so that a turn
//! and a subagent's child turn are the same code path: [`Runtime::run`]
//! is the public C7 entry point, and the subagent dispatcher (C9) calls
//! the crate-private [`Runtime::run_loop`] directly instead of holding
//! its own copy of the loop.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::Instrument;

use tl_domain::config::{AgentConfig, ToolPolicy, TurnConfig};
use tl_domain::ctx::Cancel;
use tl_domain::error::{Error, Result};
use tl_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall};
use tl_domain::trace::TraceEvent;

use tl_providers::{ChatRequest, ProviderRotation};
use tl_sessions::SessionStore;
use tl_skills::{LoadedSkills, SkillsRegistry};
use tl_tasks::TaskTracker;
use tl_tools::ToolRegistry;

use crate::context;
use crate::failure::FailureTracker;
use crate::role_pool::RolePool;

/// Tool name that loads a skill's full body into the session's context
/// for subsequent iterations.
pub const USE_SKILL_TOOL: &str = "use_skill";
/// Tool name that forwards to the subagent dispatcher (C9).
pub const SPAWN_SUBAGENT_TOOL: &str = "spawn_subagent";

const LOADED_SKILLS_METADATA_KEY: &str = "loaded_skills";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public request/response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TurnRequest {
    pub session_key: String,
    pub prompt: String,
    /// Overrides the configured persona for this turn only.
    pub system_prompt: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Result of a completed or cancelled turn.
///
/// Rust has no natural way to carry both a value and an error out of
/// one `Result`, so cancellation with partial output is modeled as
/// `Ok` with `canceled = true` rather than `Err` — a fatal provider or
/// tool-registry error is still a plain `Err`.
#[derive(Debug, Clone, Default)]
pub struct TurnOutcome {
    pub output: String,
    pub metadata: HashMap<String, String>,
    pub canceled: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Runtime — the aggregator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Runtime {
    pub(crate) sessions: Arc<SessionStore>,
    pub(crate) skills: Arc<SkillsRegistry>,
    pub(crate) tools: Arc<ToolRegistry>,
    pub(crate) providers: Arc<ProviderRotation>,
    pub(crate) tracker: Arc<TaskTracker>,
    pub(crate) role_pool: Arc<RolePool>,
    pub(crate) agents: HashMap<String, AgentConfig>,
    pub(crate) turn_config: TurnConfig,
    pub(crate) persona: String,
}

impl Runtime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<SessionStore>,
        skills: Arc<SkillsRegistry>,
        tools: Arc<ToolRegistry>,
        providers: Arc<ProviderRotation>,
        tracker: Arc<TaskTracker>,
        role_pool: Arc<RolePool>,
        agents: HashMap<String, AgentConfig>,
        turn_config: TurnConfig,
        persona: impl Into<String>,
    ) -> Self {
        Self {
            sessions,
            skills,
            tools,
            providers,
            tracker,
            role_pool,
            agents,
            turn_config: turn_config.clamped(),
            persona: persona.into(),
        }
    }

    pub fn agent_config(&self, role: &str) -> Option<&AgentConfig> {
        self.agents.get(role)
    }

    /// The public C7 contract: `Run(ctx, request) -> (response, error)`.
    pub async fn run(&self, cancel: &dyn Cancel, request: TurnRequest) -> Result<TurnOutcome> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("turn", run_id = %run_id, session_key = %request.session_key, "otel.kind" = "SERVER");

        self.run_loop(
            cancel,
            &run_id,
            &request.session_key,
            &request.prompt,
            request.system_prompt.as_deref(),
            self.turn_config.max_iterations,
            &ToolPolicy::default(),
            request.metadata,
        )
        .instrument(span)
        .await
    }

    /// Shared loop body for both top-level turns and subagent children.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn run_loop(
        &self,
        cancel: &dyn Cancel,
        run_id: &str,
        session_key: &str,
        prompt: &str,
        system_prompt: Option<&str>,
        max_iterations: usize,
        tool_policy: &ToolPolicy,
        metadata: HashMap<String, String>,
    ) -> Result<TurnOutcome> {
        self.sessions.append_message(session_key, Message::user(prompt));

        let mut loaded_skills = self
            .sessions
            .get_metadata(session_key, LOADED_SKILLS_METADATA_KEY)
            .map(|csv| parse_loaded_skills(&csv))
            .unwrap_or_default();
        let mut failures = FailureTracker::new();
        let persona = system_prompt.unwrap_or(&self.persona);

        let mut last_assistant_content = String::new();

        for iteration in 0..max_iterations {
            if cancel.is_canceled() {
                return Ok(cancel_outcome(last_assistant_content, metadata)?);
            }

            let history = self.sessions.window(session_key);
            let built = context::build(persona, &self.skills, &loaded_skills, &history, &self.tools);
            let mut messages = built.messages;

            if failures.should_inject_guidance(self.turn_config.guidance_threshold) {
                inject_error_guidance(&mut messages, failures.failing_tools());
            }

            let response = match self
                .providers
                .chat(
                    cancel,
                    ChatRequest {
                        messages,
                        tools: built.tool_defs,
                        ..Default::default()
                    },
                )
                .await
            {
                Ok(resp) => resp,
                Err(Error::Canceled) => return Ok(cancel_outcome(last_assistant_content, metadata)?),
                Err(e) => return Err(e),
            };

            if !response.content.is_empty() {
                last_assistant_content = response.content.clone();
            }

            TraceEvent::TurnIteration {
                run_id: run_id.to_string(),
                iteration,
                tool_calls: response.tool_calls.len(),
            }
            .emit();

            if response.tool_calls.is_empty() {
                return Ok(TurnOutcome {
                    output: response.content,
                    metadata,
                    canceled: false,
                });
            }

            self.sessions.append_message(
                session_key,
                assistant_message_with_tool_calls(&response.content, &response.tool_calls),
            );

            for call in &response.tool_calls {
                if cancel.is_canceled() {
                    self.sessions.append_message(
                        session_key,
                        Message::tool_result(call.call_id.as_str(), synthetic_cancellation_report(&call.tool_name)),
                    );
                    return Ok(cancel_outcome(last_assistant_content, metadata)?);
                }

                let result = self
                    .dispatch_tool_call(cancel, run_id, session_key, call, tool_policy, &mut loaded_skills)
                    .await;

                let content = match result {
                    Ok(text) => {
                        failures.record_success(&call.tool_name);
                        text
                    }
                    Err(Error::Canceled) => {
                        self.sessions.append_message(
                            session_key,
                            Message::tool_result(call.call_id.as_str(), synthetic_cancellation_report(&call.tool_name)),
                        );
                        return Ok(cancel_outcome(last_assistant_content, metadata)?);
                    }
                    Err(e) => {
                        failures.record_failure(&call.tool_name);
                        TraceEvent::ToolFailed {
                            run_id: run_id.to_string(),
                            tool: call.tool_name.clone(),
                            consecutive_failures: failures.total_failures(),
                        }
                        .emit();
                        format_tool_failure_report(
                            &call.tool_name,
                            &e.to_string(),
                            &self.tools.names_excluding(&call.tool_name),
                        )
                    }
                };

                self.sessions
                    .append_message(session_key, Message::tool_result(call.call_id.as_str(), content));
            }
        }

        TraceEvent::TurnMaxIterationsReached {
            run_id: run_id.to_string(),
            max_iterations,
        }
        .emit();
        tracing::warn!(run_id, max_iterations, "turn reached max iterations");

        Ok(TurnOutcome {
            output: last_assistant_content,
            metadata,
            canceled: false,
        })
    }

    async fn dispatch_tool_call(
        &self,
        cancel: &dyn Cancel,
        run_id: &str,
        session_key: &str,
        call: &ToolCall,
        tool_policy: &ToolPolicy,
        loaded_skills: &mut LoadedSkills,
    ) -> Result<String> {
        if !tool_policy.allows(&call.tool_name) {
            return Err(Error::InvalidArgument(format!(
                "tool '{}' is not permitted for this role",
                call.tool_name
            )));
        }

        if call.tool_name == USE_SKILL_TOOL {
            let skill_name = call
                .arguments
                .get("skill_name")
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::InvalidArgument("use_skill requires skill_name".into()))?;
            self.skills.resolve(skill_name)?;
            loaded_skills.mark_loaded(skill_name);
            self.sessions.set_metadata(
                session_key,
                LOADED_SKILLS_METADATA_KEY,
                &loaded_skills.names().join(","),
            );
            return Ok(format!("Loaded skill '{skill_name}'."));
        }

        if call.tool_name == SPAWN_SUBAGENT_TOOL {
            let req = crate::subagent::SpawnRequest::from_arguments(
                &call.arguments,
                run_id.to_string(),
                session_key.to_string(),
            )?;
            return crate::subagent::spawn(self, cancel, req).await;
        }

        self.tools.execute(&call.tool_name, call.arguments.clone(), cancel).await
    }
}

fn cancel_outcome(last_assistant_content: String, metadata: HashMap<String, String>) -> Result<TurnOutcome> {
    if last_assistant_content.is_empty() {
        return Err(Error::Canceled);
    }
    Ok(TurnOutcome {
        output: last_assistant_content,
        metadata,
        canceled: true,
    })
}

/// Synthetic tool-result content appended in place of a tool's real
/// output when cancellation interrupts dispatch itself — either
/// between calls, or because the tool observed `cancel` and returned
/// `Error::Canceled` mid-flight.
fn synthetic_cancellation_report(tool_name: &str) -> String {
    format!("Canceled: the turn was canceled while `{tool_name}` was in flight.")
}

fn parse_loaded_skills(csv: &str) -> LoadedSkills {
    let mut loaded = LoadedSkills::new();
    for name in csv.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        loaded.mark_loaded(name);
    }
    loaded
}

fn assistant_message_with_tool_calls(content: &str, tool_calls: &[ToolCall]) -> Message {
    let mut parts = Vec::with_capacity(tool_calls.len() + 1);
    if !content.is_empty() {
        parts.push(ContentPart::Text { text: content.to_string() });
    }
    for call in tool_calls {
        parts.push(ContentPart::ToolUse {
            id: call.call_id.clone(),
            name: call.tool_name.clone(),
            input: call.arguments.clone(),
        });
    }
    Message {
        role: Role::Assistant,
        content: MessageContent::Parts(parts),
    }
}

/// A markdown-shaped report naming the failing tool, its error, a
/// couple of suggested alternatives, and the other tools available.
fn format_tool_failure_report(tool_name: &str, error_text: &str, other_tools: &[String]) -> String {
    let mut report = format!("**Tool failed: `{tool_name}`**\n\nError: {error_text}\n");

    let suggestions = suggest_alternatives(tool_name);
    if !suggestions.is_empty() {
        report.push_str("\nSuggested alternatives:\n");
        for s in suggestions {
            report.push_str(&format!("- {s}\n"));
        }
    }

    if !other_tools.is_empty() {
        report.push_str(&format!("\nOther available tools: {}\n", other_tools.join(", ")));
    }

    report
}

fn suggest_alternatives(tool_name: &str) -> Vec<&'static str> {
    let name = tool_name.to_ascii_lowercase();
    let mut suggestions = Vec::new();
    if name.contains("write") {
        suggestions.push("try a relative path instead of an absolute one");
        suggestions.push("write to stdout instead of a file");
    }
    if name.contains("read") || name.contains("fetch") {
        suggestions.push("double-check the path or URL for typos");
    }
    suggestions
}

/// Append a short instructional addendum to the last user message
/// naming the currently failing tools, per the error-guidance rule.
fn inject_error_guidance(messages: &mut [Message], failing_tools: &[String]) {
    let Some(last_user) = messages.iter_mut().rev().find(|m| m.role == Role::User) else {
        return;
    };

    let addendum = format!(
        "\n\n[Note: the following tools have failed repeatedly: {}. \
         Re-examine your parameters or try a different approach.]",
        failing_tools.join(", ")
    );

    match &mut last_user.content {
        MessageContent::Text(text) => text.push_str(&addendum),
        MessageContent::Parts(parts) => parts.push(ContentPart::Text { text: addendum }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;
    use tempfile::tempdir;
    use tl_domain::ctx::NoCancel;
    use tl_providers::testing::ScriptedProvider;
    use tl_providers::{ChatResponse, ProviderProfile};

    fn runtime(dir: &std::path::Path, script: Vec<Result<ChatResponse>>) -> Runtime {
        let sessions = Arc::new(SessionStore::new(dir, 50).unwrap());
        let skills = Arc::new(SkillsRegistry::empty());
        let tools = Arc::new(ToolRegistry::new());
        let cfg = tl_domain::config::CircuitConfig {
            failure_threshold: 3,
            open_timeout_ms: 1000,
            half_open_successes: 1,
        };
        let provider = Arc::new(ScriptedProvider::new("test", script));
        let profile = ProviderProfile {
            name: "test".into(),
            priority: 1,
            circuit: ProviderRotation::breaker_for(&cfg, "test"),
            provider,
        };
        let providers = Arc::new(ProviderRotation::new(vec![profile]));
        let task_store = Arc::new(tl_tasks::TaskStore::new(&dir.join("tasks.json")).unwrap());
        let tracker = Arc::new(TaskTracker::new(task_store, &dir.join("tracker.json")).unwrap());
        let role_pool = Arc::new(RolePool::new(&tl_domain::config::RolePoolConfig::default()));

        Runtime::new(
            sessions,
            skills,
            tools,
            providers,
            tracker,
            role_pool,
            Map::new(),
            TurnConfig::default(),
            "you are a helpful assistant",
        )
    }

    fn ok_response(content: &str) -> Result<ChatResponse> {
        Ok(ChatResponse {
            content: content.into(),
            tool_calls: vec![],
            usage: None,
            model: "test".into(),
            finish_reason: Some("stop".into()),
        })
    }

    #[tokio::test]
    async fn single_iteration_with_no_tool_calls() {
        let dir = tempdir().unwrap();
        let rt = runtime(dir.path(), vec![ok_response("hi")]);
        let out = rt
            .run(
                &NoCancel,
                TurnRequest {
                    session_key: "s1".into(),
                    prompt: "say hi".into(),
                    system_prompt: None,
                    metadata: Map::new(),
                },
            )
            .await
            .unwrap();
        assert_eq!(out.output, "hi");
        assert!(!out.canceled);
    }

    #[tokio::test]
    async fn iterative_tool_use_then_final_answer() {
        let dir = tempdir().unwrap();
        let rt_tools = ToolRegistry::new();
        struct ReadFile;
        #[async_trait::async_trait]
        impl tl_tools::Tool for ReadFile {
            fn name(&self) -> &str {
                "read_file"
            }
            fn description(&self) -> &str {
                "reads a file"
            }
            fn parameters(&self) -> serde_json::Value {
                serde_json::json!({"type": "object"})
            }
            async fn invoke(&self, _params: serde_json::Value, _cancel: &dyn Cancel) -> Result<String> {
                Ok("contents".into())
            }
        }
        rt_tools.register(Arc::new(ReadFile)).unwrap();

        let mut rt = runtime(
            dir.path(),
            vec![
                Ok(ChatResponse {
                    content: String::new(),
                    tool_calls: vec![ToolCall {
                        call_id: "c1".into(),
                        tool_name: "read_file".into(),
                        arguments: serde_json::json!({"path": "x"}),
                    }],
                    usage: None,
                    model: "test".into(),
                    finish_reason: Some("tool_calls".into()),
                }),
                ok_response("x says contents"),
            ],
        );
        rt.tools = Arc::new(rt_tools);

        let out = rt
            .run(
                &NoCancel,
                TurnRequest {
                    session_key: "s2".into(),
                    prompt: "read x".into(),
                    system_prompt: None,
                    metadata: Map::new(),
                },
            )
            .await
            .unwrap();
        assert_eq!(out.output, "x says contents");

        let history = rt.sessions.window("s2");
        assert_eq!(history.len(), 4); // user, assistant+tool_call, tool, assistant
    }

    #[tokio::test]
    async fn repeated_tool_failure_injects_guidance() {
        let dir = tempdir().unwrap();
        let mut rt = runtime(
            dir.path(),
            vec![
                Ok(ChatResponse {
                    content: String::new(),
                    tool_calls: vec![ToolCall {
                        call_id: "c1".into(),
                        tool_name: "write_file".into(),
                        arguments: serde_json::json!({}),
                    }],
                    usage: None,
                    model: "test".into(),
                    finish_reason: Some("tool_calls".into()),
                }),
                Ok(ChatResponse {
                    content: String::new(),
                    tool_calls: vec![ToolCall {
                        call_id: "c2".into(),
                        tool_name: "write_file".into(),
                        arguments: serde_json::json!({}),
                    }],
                    usage: None,
                    model: "test".into(),
                    finish_reason: Some("tool_calls".into()),
                }),
                ok_response("done"),
            ],
        );
        rt.tools = Arc::new(ToolRegistry::new()); // write_file is unknown -> always fails

        let out = rt
            .run(
                &NoCancel,
                TurnRequest {
                    session_key: "s3".into(),
                    prompt: "write a file".into(),
                    system_prompt: None,
                    metadata: Map::new(),
                },
            )
            .await
            .unwrap();
        assert_eq!(out.output, "done");
    }

    #[tokio::test]
    async fn cancellation_before_any_content_is_an_error() {
        let dir = tempdir().unwrap();
        let rt = runtime(dir.path(), vec![ok_response("hi")]);
        struct AlwaysCanceled;
        impl Cancel for AlwaysCanceled {
            fn is_canceled(&self) -> bool {
                true
            }
        }
        let err = rt
            .run(
                &AlwaysCanceled,
                TurnRequest {
                    session_key: "s4".into(),
                    prompt: "say hi".into(),
                    system_prompt: None,
                    metadata: Map::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Canceled));
    }

    #[tokio::test]
    async fn tool_canceled_mid_flight_appends_synthetic_result_and_stops() {
        let dir = tempdir().unwrap();
        struct CancelingTool;
        #[async_trait::async_trait]
        impl tl_tools::Tool for CancelingTool {
            fn name(&self) -> &str {
                "slow_tool"
            }
            fn description(&self) -> &str {
                "observes cancellation mid-flight"
            }
            fn parameters(&self) -> serde_json::Value {
                serde_json::json!({"type": "object"})
            }
            async fn invoke(&self, _params: serde_json::Value, _cancel: &dyn Cancel) -> Result<String> {
                Err(Error::Canceled)
            }
        }
        let rt_tools = ToolRegistry::new();
        rt_tools.register(Arc::new(CancelingTool)).unwrap();

        let mut rt = runtime(
            dir.path(),
            vec![Ok(ChatResponse {
                content: "thinking...".into(),
                tool_calls: vec![ToolCall {
                    call_id: "c1".into(),
                    tool_name: "slow_tool".into(),
                    arguments: serde_json::json!({}),
                }],
                usage: None,
                model: "test".into(),
                finish_reason: Some("tool_calls".into()),
            })],
        );
        rt.tools = Arc::new(rt_tools);

        let out = rt
            .run(
                &NoCancel,
                TurnRequest {
                    session_key: "s5".into(),
                    prompt: "do something slow".into(),
                    system_prompt: None,
                    metadata: Map::new(),
                },
            )
            .await
            .unwrap();

        assert!(out.canceled);
        assert_eq!(out.output, "thinking...");

        let history = rt.sessions.window("s5");
        let tool_result = history.last().unwrap();
        match &tool_result.content {
            MessageContent::Parts(parts) => match &parts[0] {
                ContentPart::ToolResult { content, .. } => assert!(content.contains("Canceled")),
                other => panic!("expected a tool result part, got {other:?}"),
            },
            other => panic!("expected a parts message, got {other:?}"),
        }
    }

    #[test]
    fn use_skill_tool_name_constant() {
        assert_eq!(USE_SKILL_TOOL, "use_skill");
        assert_eq!(SPAWN_SUBAGENT_TOOL, "spawn_subagent");
    }
}
