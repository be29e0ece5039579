use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider rotation configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Top-level provider rotation configuration: which profiles exist,
/// their priority order, and circuit breaker thresholds.
///
/// This does not prescribe a wire protocol — `kind` is an opaque label
/// the caller uses to look up a concrete `LlmProvider` implementation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub profiles: Vec<ProfileConfig>,
    #[serde(default)]
    pub circuit: CircuitConfig,
}

/// One provider profile entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub name: String,
    /// Higher priority is preferred. Ties break round-robin.
    #[serde(default = "d_priority")]
    pub priority: i32,
    /// Opaque identifier the provider registry uses to build a client
    /// (e.g. `"openai-compat"`, `"anthropic"`, or a test double name).
    pub kind: String,
    #[serde(default)]
    pub model: Option<String>,
}

fn d_priority() -> i32 {
    0
}

/// Circuit breaker thresholds shared by every provider profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitConfig {
    /// Consecutive failures in `closed` state before tripping `open`.
    #[serde(default = "d_failure_threshold")]
    pub failure_threshold: u32,
    /// How long a circuit stays `open` before probing `half_open`.
    #[serde(default = "d_open_timeout_ms")]
    pub open_timeout_ms: u64,
    /// Consecutive successes in `half_open` required to close the circuit.
    #[serde(default = "d_half_open_successes")]
    pub half_open_successes: u32,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: d_failure_threshold(),
            open_timeout_ms: d_open_timeout_ms(),
            half_open_successes: d_half_open_successes(),
        }
    }
}

fn d_failure_threshold() -> u32 {
    5
}
fn d_open_timeout_ms() -> u64 {
    30_000
}
fn d_half_open_successes() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_config_defaults() {
        let cfg = CircuitConfig::default();
        assert_eq!(cfg.failure_threshold, 5);
        assert_eq!(cfg.open_timeout_ms, 30_000);
        assert_eq!(cfg.half_open_successes, 3);
    }

    #[test]
    fn providers_config_defaults_to_empty() {
        let cfg = ProvidersConfig::default();
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn profile_config_deserializes_with_default_priority() {
        let json = r#"{"name":"primary","kind":"test-double"}"#;
        let profile: ProfileConfig = serde_json::from_str(json).unwrap();
        assert_eq!(profile.priority, 0);
        assert_eq!(profile.model, None);
    }
}
