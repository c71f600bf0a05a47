use std::sync::Mutex;

use async_trait::async_trait;

use super::{GenerateRequest, GenerateResponse, LlmClient};
use crate::error::OrchestratorError;

/// A programmed queue of responses, consumed in order by `generate`.
/// Mirrors the shape of the teacher library's `MockLlmCaller`: a
/// `Mutex<Vec<_>>` response queue plus a call log for introspection, so
/// tests can drive the Decomposer/Synthesizer/Executor without any
/// network access (§10.4, §8 scenarios 5 and 6).
pub struct MockLlmClient {
    responses: Mutex<Vec<Result<GenerateResponse, OrchestratorError>>>,
    call_log: Mutex<Vec<GenerateRequest>>,
}

impl MockLlmClient {
    pub fn new(responses: Vec<Result<GenerateResponse, OrchestratorError>>) -> Self {
        Self { responses: Mutex::new(responses), call_log: Mutex::new(Vec::new()) }
    }

    pub fn ok(texts: Vec<&str>) -> Self {
        Self::new(
            texts
                .into_iter()
                .map(|t| Ok(GenerateResponse { text: t.to_string(), usage: Default::default() }))
                .collect(),
        )
    }

    pub fn call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<GenerateRequest> {
        self.call_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, OrchestratorError> {
        self.call_log.lock().unwrap().push(request.clone());

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(OrchestratorError::LlmTransport {
                endpoint: request.endpoint,
                source: "MockLlmClient: no more programmed responses".to_string(),
            });
        }
        responses.remove(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_programmed_responses_in_order() {
        let mock = MockLlmClient::ok(vec!["first", "second"]);
        let req = GenerateRequest { endpoint: "http://x".into(), model_name: "m".into(), ..Default::default() };

        let r1 = mock.generate(req.clone()).await.unwrap();
        assert_eq!(r1.text, "first");
        let r2 = mock.generate(req.clone()).await.unwrap();
        assert_eq!(r2.text, "second");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn errors_once_queue_is_exhausted() {
        let mock = MockLlmClient::ok(vec!["only"]);
        let req = GenerateRequest { endpoint: "http://x".into(), model_name: "m".into(), ..Default::default() };
        mock.generate(req.clone()).await.unwrap();
        assert!(mock.generate(req).await.is_err());
    }
}
