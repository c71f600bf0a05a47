use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{repetition_penalty_and_stop, GenerateRequest, GenerateResponse, LlmClient};
use crate::domain::CallUsage;
use crate::error::OrchestratorError;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f64,
    repetition_penalty: f64,
    stop: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    guided_json: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    guided_regex: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsageBody>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    text: String,
    #[allow(dead_code)]
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct UsageBody {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

/// HTTP client against OpenAI-compatible completion endpoints (§4.1, §6).
///
/// Long-lived and shares a single connection pool across calls, per §9's
/// "HTTP clients should be long-lived" guidance — `reqwest::Client` is
/// `Clone`-cheap and internally pools connections, so one instance is
/// built once and reused for the small and large endpoints alike.
pub struct HttpLlmClient {
    http: reqwest::Client,
}

impl HttpLlmClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client with static config must build");
        Self { http }
    }
}

impl Default for HttpLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, OrchestratorError> {
        let (repetition_penalty, stop) = repetition_penalty_and_stop(&request.model_name);

        let body = CompletionRequest {
            model: &request.model_name,
            prompt: &request.prompt,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            repetition_penalty,
            stop,
            guided_json: request.guided_json.as_ref(),
            guided_regex: request.guided_regex.as_deref(),
        };

        tracing::debug!(
            endpoint = %request.endpoint,
            model = %request.model_name,
            label = request.label.unwrap_or("unlabeled"),
            prompt_len = request.prompt.len(),
            "issuing completion request"
        );

        let url = format!("{}/completions", request.endpoint);
        let response = self.http.post(&url).json(&body).send().await.map_err(|e| {
            OrchestratorError::LlmTransport { endpoint: request.endpoint.clone(), source: e.to_string() }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(endpoint = %request.endpoint, %status, "completion endpoint returned non-2xx");
            return Err(OrchestratorError::LlmTransport {
                endpoint: request.endpoint.clone(),
                source: format!("HTTP {status}: {text}"),
            });
        }

        let parsed: CompletionResponse = response.json().await.map_err(|e| OrchestratorError::LlmTransport {
            endpoint: request.endpoint.clone(),
            source: format!("failed to parse response body: {e}"),
        })?;

        let first = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| OrchestratorError::LlmEmptyResponse { endpoint: request.endpoint.clone() })?;

        let text = first.text.trim().to_string();
        if text.is_empty() {
            return Err(OrchestratorError::LlmEmptyResponse { endpoint: request.endpoint.clone() });
        }

        let usage = parsed
            .usage
            .map(|u| CallUsage { prompt_tokens: u.prompt_tokens, completion_tokens: u.completion_tokens, total_tokens: u.total_tokens })
            .unwrap_or_default();

        tracing::info!(endpoint = %request.endpoint, total_tokens = usage.total_tokens, "completion request finished");

        Ok(GenerateResponse { text, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_models_get_higher_repetition_penalty_and_extra_stops() {
        let (penalty, stop) = repetition_penalty_and_stop("medical-1b-lora");
        assert_eq!(penalty, 1.1);
        assert_eq!(stop, vec!["\n\n\n", "Task:", "Response:"]);
    }

    #[test]
    fn base_models_get_default_penalty_and_single_stop() {
        let (penalty, stop) = repetition_penalty_and_stop("medical-8b");
        assert_eq!(penalty, 1.0);
        assert_eq!(stop, vec!["\n\n\n"]);
    }
}
