mod client;
mod mock;

pub use client::HttpLlmClient;
pub use mock::MockLlmClient;

use async_trait::async_trait;

use crate::domain::CallUsage;
use crate::error::OrchestratorError;

/// At most one of `guided_json` / `guided_regex` may be set on a request.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub endpoint: String,
    pub model_name: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub guided_json: Option<serde_json::Value>,
    pub guided_regex: Option<String>,
    /// Identifies the caller for structured logging only (§10.1); not
    /// sent over the wire.
    pub label: Option<&'static str>,
}

/// A completed generation: the first choice's text, trimmed, plus usage
/// exactly as reported by the endpoint (or zero-valued if absent).
#[derive(Debug, Clone, Default)]
pub struct GenerateResponse {
    pub text: String,
    pub usage: CallUsage,
}

/// The single interface between the rest of the crate and any
/// OpenAI-compatible completions endpoint (§4.1, §6).
///
/// # Contract
/// - Implementors MUST be `Send + Sync` (used behind `Arc<dyn LlmClient>`).
/// - Returns `Err` only for unrecoverable failures: transport failure,
///   non-2xx status, empty `choices`, or empty `text`. Callers — not this
///   trait — decide what to do about it (degrade to mock, retry, fall back).
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, OrchestratorError>;
}

/// Whether `model_name` names a LoRA adapter rather than a base model —
/// changes repetition penalty and stop sequences per §4.1. Adapter names
/// are opaque to the orchestrator; the only signal available is the
/// naming convention used by the fixture endpoints (`-lora` suffix).
pub(crate) fn is_adapter_model(model_name: &str) -> bool {
    model_name.ends_with("-lora") || model_name.contains("-lora-")
}

pub(crate) fn repetition_penalty_and_stop(model_name: &str) -> (f64, Vec<String>) {
    if is_adapter_model(model_name) {
        (1.1, vec!["\n\n\n".to_string(), "Task:".to_string(), "Response:".to_string()])
    } else {
        (1.0, vec!["\n\n\n".to_string()])
    }
}
