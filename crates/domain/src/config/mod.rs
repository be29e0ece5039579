mod agents;
mod providers;
mod role_pool;
mod sessions;
mod skills;
mod task_store;
mod turn;

pub use agents::*;
pub use providers::*;
pub use role_pool::*;
pub use sessions::*;
pub use skills::*;
pub use task_store::*;
pub use turn::*;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub skills: SkillsConfig,
    #[serde(default)]
    pub task_store: TaskStoreConfig,
    #[serde(default)]
    pub role_pool: RolePoolConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub turn: TurnConfig,
    /// Subagent role definitions (key = role name, e.g. "frontend").
    #[serde(default)]
    pub agents: HashMap<String, AgentConfig>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.providers.profiles.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "providers.profiles".into(),
                message: "no provider profiles configured".into(),
            });
        }

        let mut seen_names: HashSet<&str> = HashSet::new();
        for (i, profile) in self.providers.profiles.iter().enumerate() {
            if profile.name.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("providers.profiles[{i}].name"),
                    message: "profile name must not be empty".into(),
                });
            }
            if profile.kind.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("providers.profiles[{i}].kind"),
                    message: "profile kind must not be empty".into(),
                });
            }
            if !profile.name.is_empty() && !seen_names.insert(&profile.name) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("providers.profiles[{i}].name"),
                    message: format!("duplicate profile name \"{}\"", profile.name),
                });
            }
        }

        if self.providers.circuit.half_open_successes == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "providers.circuit.half_open_successes".into(),
                message: "half_open_successes must be greater than 0".into(),
            });
        }

        if self.role_pool.global_max_concurrent == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "role_pool.global_max_concurrent".into(),
                message: "global_max_concurrent must be greater than 0".into(),
            });
        }
        for (role, limit) in &self.role_pool.per_role_max_concurrent {
            if *limit > self.role_pool.global_max_concurrent {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("role_pool.per_role_max_concurrent.{role}"),
                    message: format!(
                        "per-role limit {limit} exceeds global_max_concurrent {} and will never bind",
                        self.role_pool.global_max_concurrent
                    ),
                });
            }
        }

        if self.turn.max_iterations == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "turn.max_iterations".into(),
                message: "max_iterations must be greater than 0".into(),
            });
        }

        for (role_name, agent) in &self.agents {
            if agent.limits.max_children_per_turn == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("agents.{role_name}.limits.max_children_per_turn"),
                    message: "role can never spawn a subagent with max_children_per_turn=0".into(),
                });
            }
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            providers: ProvidersConfig {
                profiles: vec![ProfileConfig {
                    name: "primary".into(),
                    priority: 1,
                    kind: "test-double".into(),
                    model: None,
                }],
                ..ProvidersConfig::default()
            },
            ..Config::default()
        }
    }

    fn find_issue<'a>(issues: &'a [ConfigError], field_prefix: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn valid_config_passes() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn no_profiles_is_warning() {
        let issues = Config::default().validate();
        let issue = find_issue(&issues, "providers.profiles").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn duplicate_profile_names_is_error() {
        let mut cfg = valid_config();
        cfg.providers.profiles.push(ProfileConfig {
            name: "primary".into(),
            priority: 0,
            kind: "test-double".into(),
            model: None,
        });
        let issues = cfg.validate();
        let issue = find_issue(&issues, "providers.profiles[1].name").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn zero_global_max_concurrent_is_error() {
        let mut cfg = valid_config();
        cfg.role_pool.global_max_concurrent = 0;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "role_pool.global_max_concurrent").is_some());
    }

    #[test]
    fn per_role_limit_above_global_is_warning() {
        let mut cfg = valid_config();
        cfg.role_pool.global_max_concurrent = 2;
        cfg.role_pool
            .per_role_max_concurrent
            .insert("frontend".into(), 5);
        let issues = cfg.validate();
        let issue = find_issue(&issues, "role_pool.per_role_max_concurrent.frontend").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn zero_max_iterations_is_error() {
        let mut cfg = valid_config();
        cfg.turn.max_iterations = 0;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "turn.max_iterations").is_some());
    }

    #[test]
    fn display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "turn.max_iterations".into(),
            message: "must be greater than 0".into(),
        };
        assert_eq!(err.to_string(), "[ERROR] turn.max_iterations: must be greater than 0");
    }
}
