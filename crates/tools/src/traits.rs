use tl_domain::ctx::Cancel;
use tl_domain::error::Result;
use tl_domain::tool::ToolDefinition;

/// A single invocable tool.
///
/// Implementations are provided by the caller (the demo binary, or a
/// test) — this crate ships only the trait and the registry that
/// dispatches by name; concrete tools (file access, shell execution,
/// web fetch, `spawn_subagent`) are an external concern.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for the tool's parameters.
    fn parameters(&self) -> serde_json::Value;

    /// Execute the tool and return its textual result.
    ///
    /// The registry does not retry, time out, or classify the error —
    /// that is the caller's concern (the main turn runtime wraps
    /// failures into a tool-failure report). `cancel` is the same
    /// signal threaded through provider calls and role-pool admission;
    /// a long-running implementation should poll it and return
    /// `Err(Error::Canceled)` once it observes cancellation.
    async fn invoke(&self, params: serde_json::Value, cancel: &dyn Cancel) -> Result<String>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}
