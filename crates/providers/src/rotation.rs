//! Provider rotation (C1): picks a profile, attempts a call, classifies
//! failures, and fails over according to the circuit breaker state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tl_domain::capability::ToolSupport;
use tl_domain::config::CircuitConfig;
use tl_domain::ctx::Cancel;
use tl_domain::error::{Error, Result};

use crate::circuit::{CircuitBreaker, CircuitState};
use crate::traits::{ChatRequest, ChatResponse, LlmProvider};

/// One provider profile: a priority, a concrete client, and its own
/// circuit breaker.
pub struct ProviderProfile {
    pub name: String,
    pub priority: i32,
    pub provider: Arc<dyn LlmProvider>,
    pub circuit: CircuitBreaker,
}

/// Bounded same-profile retries for transport-level flakiness before a
/// failure is treated as profile-specific.
const SAME_PROFILE_RETRIES: usize = 2;

/// Orders provider profiles by priority, attempts each in turn, and
/// maintains per-profile circuit breaker state across calls.
pub struct ProviderRotation {
    /// Sorted descending by priority at construction time.
    profiles: Vec<ProviderProfile>,
    rr_cursor: AtomicUsize,
}

impl ProviderRotation {
    pub fn new(mut profiles: Vec<ProviderProfile>) -> Self {
        profiles.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self {
            profiles,
            rr_cursor: AtomicUsize::new(0),
        }
    }

    /// Build profile circuit breakers from a shared `CircuitConfig`.
    pub fn breaker_for(cfg: &CircuitConfig, name: &str) -> CircuitBreaker {
        CircuitBreaker::new(
            name,
            cfg.failure_threshold,
            Duration::from_millis(cfg.open_timeout_ms),
            cfg.half_open_successes,
        )
    }

    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }

    /// Candidate attempt order: descending priority; within equal
    /// priority, round-robin starting from the last served index.
    fn candidate_order(&self) -> Vec<usize> {
        let cursor = self.rr_cursor.fetch_add(1, Ordering::Relaxed);
        let mut order = Vec::with_capacity(self.profiles.len());
        let mut i = 0;
        while i < self.profiles.len() {
            let mut j = i;
            while j < self.profiles.len() && self.profiles[j].priority == self.profiles[i].priority {
                j += 1;
            }
            let group_len = j - i;
            for k in 0..group_len {
                order.push(i + (cursor + k) % group_len);
            }
            i = j;
        }
        order
    }

    pub async fn chat(&self, cancel: &dyn Cancel, req: ChatRequest) -> Result<ChatResponse> {
        if self.profiles.is_empty() {
            return Err(Error::ProviderExhausted("no provider profiles configured".into()));
        }

        let mut last_errors = Vec::new();

        for idx in self.candidate_order() {
            if cancel.is_canceled() {
                return Err(Error::Canceled);
            }

            let profile = &self.profiles[idx];
            if profile.circuit.state() == CircuitState::Open {
                last_errors.push(format!("{}: circuit open", profile.name));
                continue;
            }

            if !capabilities_satisfy(profile.provider.capabilities(), &req) {
                last_errors.push(format!("{}: missing required capability", profile.name));
                continue;
            }

            match self.attempt_with_retries(cancel, profile, &req).await {
                Ok(resp) => {
                    profile.circuit.record_success();
                    return Ok(resp);
                }
                Err(AttemptOutcome::Fatal(e)) => return Err(e),
                Err(AttemptOutcome::Canceled) => return Err(Error::Canceled),
                Err(AttemptOutcome::ProfileFault(e)) => {
                    profile.circuit.record_failure();
                    last_errors.push(format!("{}: {}", profile.name, e));
                }
            }
        }

        Err(Error::ProviderExhausted(last_errors.join("; ")))
    }

    async fn attempt_with_retries(
        &self,
        cancel: &dyn Cancel,
        profile: &ProviderProfile,
        req: &ChatRequest,
    ) -> std::result::Result<ChatResponse, AttemptOutcome> {
        let mut last_err = None;
        for attempt in 0..=SAME_PROFILE_RETRIES {
            if cancel.is_canceled() {
                return Err(AttemptOutcome::Canceled);
            }
            match profile.provider.chat(req.clone()).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if e.is_profile_fault() {
                        return Err(AttemptOutcome::ProfileFault(e));
                    }
                    if !e.is_retriable() {
                        return Err(AttemptOutcome::Fatal(e));
                    }
                    last_err = Some(e);
                    if attempt == SAME_PROFILE_RETRIES {
                        break;
                    }
                }
            }
        }
        Err(AttemptOutcome::ProfileFault(
            last_err.unwrap_or_else(|| Error::Other("exhausted retries".into())),
        ))
    }
}

enum AttemptOutcome {
    Fatal(Error),
    ProfileFault(Error),
    Canceled,
}

/// True if `caps` can serve `req` — it supports tool calling when the
/// request carries tool definitions, and JSON mode when requested.
fn capabilities_satisfy(caps: &tl_domain::capability::LlmCapabilities, req: &ChatRequest) -> bool {
    if !req.tools.is_empty() && caps.supports_tools == ToolSupport::None {
        return false;
    }
    if req.json_mode && !caps.supports_json_mode {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;
    use tl_domain::ctx::NoCancel;

    fn cfg() -> tl_domain::config::CircuitConfig {
        tl_domain::config::CircuitConfig {
            failure_threshold: 1,
            open_timeout_ms: 20,
            half_open_successes: 1,
        }
    }

    fn profile(name: &str, priority: i32, provider: Arc<dyn LlmProvider>) -> ProviderProfile {
        ProviderProfile {
            name: name.to_string(),
            priority,
            circuit: ProviderRotation::breaker_for(&cfg(), name),
            provider,
        }
    }

    #[tokio::test]
    async fn prefers_highest_priority_profile() {
        let a = Arc::new(ScriptedProvider::always_ok("a"));
        let b = Arc::new(ScriptedProvider::always_ok("b"));
        let rotation = ProviderRotation::new(vec![profile("a", 1, a), profile("b", 2, b)]);

        let resp = rotation.chat(&NoCancel, ChatRequest::default()).await.unwrap();
        assert_eq!(resp.model, "b");
    }

    #[tokio::test]
    async fn falls_over_to_next_profile_on_profile_fault() {
        let a = Arc::new(ScriptedProvider::always_fail(
            "a",
            Error::Provider {
                provider: "a".into(),
                message: "HTTP 401 unauthorized".into(),
            },
        ));
        let b = Arc::new(ScriptedProvider::always_ok("b"));
        let rotation = ProviderRotation::new(vec![profile("a", 2, a), profile("b", 1, b)]);

        let resp = rotation.chat(&NoCancel, ChatRequest::default()).await.unwrap();
        assert_eq!(resp.model, "b");
    }

    #[tokio::test]
    async fn fatal_error_returns_immediately_without_fallback() {
        let a = Arc::new(ScriptedProvider::always_fail(
            "a",
            Error::InvalidArgument("bad request".into()),
        ));
        let b = Arc::new(ScriptedProvider::always_ok("b"));
        let rotation = ProviderRotation::new(vec![profile("a", 2, a), profile("b", 1, b)]);

        let err = rotation.chat(&NoCancel, ChatRequest::default()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn tripped_circuit_is_skipped_until_timeout() {
        let a = Arc::new(ScriptedProvider::always_fail(
            "a",
            Error::Provider {
                provider: "a".into(),
                message: "HTTP 401 unauthorized".into(),
            },
        ));
        let b = Arc::new(ScriptedProvider::always_ok("b"));
        let rotation = ProviderRotation::new(vec![profile("a", 2, a), profile("b", 1, b)]);

        // First call trips a's circuit (threshold=1) and falls to b.
        rotation.chat(&NoCancel, ChatRequest::default()).await.unwrap();
        // Second call: a's circuit is open, should go straight to b.
        let resp = rotation.chat(&NoCancel, ChatRequest::default()).await.unwrap();
        assert_eq!(resp.model, "b");
    }

    #[tokio::test]
    async fn profile_missing_tool_support_is_skipped() {
        let a = Arc::new(ScriptedProvider::always_ok("a"));
        let b = Arc::new(
            ScriptedProvider::always_ok("b").with_capabilities(tl_domain::capability::LlmCapabilities {
                supports_tools: tl_domain::capability::ToolSupport::Basic,
                ..Default::default()
            }),
        );
        let rotation = ProviderRotation::new(vec![profile("a", 2, a), profile("b", 1, b)]);

        let req = ChatRequest {
            tools: vec![tl_domain::tool::ToolDefinition {
                name: "search".into(),
                description: "search the web".into(),
                parameters: serde_json::json!({}),
            }],
            ..Default::default()
        };
        let resp = rotation.chat(&NoCancel, req).await.unwrap();
        assert_eq!(resp.model, "b");
    }

    #[tokio::test]
    async fn exhausting_all_profiles_returns_combined_error() {
        let a = Arc::new(ScriptedProvider::always_fail(
            "a",
            Error::Provider {
                provider: "a".into(),
                message: "HTTP 401 unauthorized".into(),
            },
        ));
        let rotation = ProviderRotation::new(vec![profile("a", 1, a)]);
        let err = rotation.chat(&NoCancel, ChatRequest::default()).await.unwrap_err();
        assert!(matches!(err, Error::ProviderExhausted(_)));
    }
}
