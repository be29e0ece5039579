//! Shared error taxonomy used across every taskloom crate.
//!
//! Each variant corresponds to one of the error kinds in the core
//! error handling design: store/tracker failures, provider rotation
//! failures, and the generic IO/JSON/config failures every component
//! can hit.

/// Shared error type used across all taskloom crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("cycle detected: adding this dependency would create a cycle")]
    CycleDetected,

    #[error("conflict persisting state: {0}")]
    Conflict(String),

    #[error("unknown tool: {0}")]
    ToolUnknown(String),

    #[error("tool {tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("all providers exhausted: {0}")]
    ProviderExhausted(String),

    #[error("canceled")]
    Canceled,

    #[error("capacity exhausted: {0}")]
    CapacityExhausted(String),

    #[error("skill not found: {0}")]
    SkillNotFound(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for errors a caller may reasonably retry against the same
    /// provider profile (transport-level flakiness, timeouts, 5xx).
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::Timeout(_) => true,
            Error::Http(msg) => msg.contains("HTTP 5"),
            Error::Provider { message, .. } => {
                message.contains("HTTP 5") || message.contains("HTTP 429")
            }
            _ => false,
        }
    }

    /// True for errors that indicate the *profile itself* is unhealthy
    /// (auth, quota, model not found) rather than a transient blip —
    /// these should trip the circuit rather than being retried in place.
    pub fn is_profile_fault(&self) -> bool {
        match self {
            Error::Provider { message, .. } => {
                message.contains("HTTP 401")
                    || message.contains("HTTP 403")
                    || message.contains("HTTP 429")
                    || message.contains("quota")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_retriable() {
        assert!(Error::Timeout("slow".into()).is_retriable());
    }

    #[test]
    fn provider_5xx_is_retriable() {
        let e = Error::Provider {
            provider: "p".into(),
            message: "HTTP 503 service unavailable".into(),
        };
        assert!(e.is_retriable());
    }

    #[test]
    fn provider_401_is_profile_fault_not_retriable() {
        let e = Error::Provider {
            provider: "p".into(),
            message: "HTTP 401 unauthorized".into(),
        };
        assert!(e.is_profile_fault());
        assert!(!e.is_retriable());
    }

    #[test]
    fn not_found_is_neither() {
        let e = Error::NotFound("task-1".into());
        assert!(!e.is_retriable());
        assert!(!e.is_profile_fault());
    }
}
