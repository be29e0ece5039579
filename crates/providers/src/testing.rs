//! A scripted `LlmProvider` test double.
//!
//! Production adapters talk to a live wire protocol, so there is
//! nothing in the teacher codebase to ground a test double on; this
//! is new, built in the idiom of the `async_trait`-based providers in
//! `traits.rs`.

use std::sync::atomic::{AtomicUsize, Ordering};

use tl_domain::capability::LlmCapabilities;
use tl_domain::error::{Error, Result};
use tl_domain::stream::{BoxStream, StreamEvent};

use crate::traits::{ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, LlmProvider};

/// Replays a fixed sequence of outcomes, one per call, repeating the
/// last entry once the script is exhausted.
pub struct ScriptedProvider {
    id: String,
    script: Vec<Result<ChatResponse>>,
    cursor: AtomicUsize,
    capabilities: LlmCapabilities,
}

impl ScriptedProvider {
    pub fn new(id: impl Into<String>, script: Vec<Result<ChatResponse>>) -> Self {
        Self {
            id: id.into(),
            script,
            cursor: AtomicUsize::new(0),
            capabilities: LlmCapabilities::default(),
        }
    }

    /// A provider that always succeeds with a fixed model name and
    /// empty content — convenient for rotation tests that only care
    /// about which profile answered.
    pub fn always_ok(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(
            id.clone(),
            vec![Ok(ChatResponse {
                content: String::new(),
                tool_calls: vec![],
                usage: None,
                model: id,
                finish_reason: Some("stop".into()),
            })],
        )
    }

    pub fn always_fail(id: impl Into<String>, err: Error) -> Self {
        Self::new(id, vec![Err(err)])
    }

    /// Override the advertised capabilities, for exercising
    /// capability-gated rotation.
    pub fn with_capabilities(mut self, capabilities: LlmCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    fn clone_result(r: &Result<ChatResponse>) -> Result<ChatResponse> {
        match r {
            Ok(resp) => Ok(resp.clone()),
            Err(e) => Err(clone_error(e)),
        }
    }
}

/// `Error` doesn't derive `Clone` (it wraps `std::io::Error`); scripted
/// test fixtures only ever need the variants below.
fn clone_error(e: &Error) -> Error {
    match e {
        Error::Provider { provider, message } => Error::Provider {
            provider: provider.clone(),
            message: message.clone(),
        },
        Error::InvalidArgument(m) => Error::InvalidArgument(m.clone()),
        Error::Timeout(m) => Error::Timeout(m.clone()),
        Error::Canceled => Error::Canceled,
        other => Error::Other(other.to_string()),
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse> {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        let idx = i.min(self.script.len().saturating_sub(1));
        Self::clone_result(&self.script[idx])
    }

    async fn chat_stream(&self, _req: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        Err(Error::Other("ScriptedProvider does not support streaming".into()))
    }

    async fn embeddings(&self, _req: EmbeddingsRequest) -> Result<EmbeddingsResponse> {
        Err(Error::Other("ScriptedProvider does not support embeddings".into()))
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}
