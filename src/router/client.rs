use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::RouterClient;
use crate::domain::{Domain, ModelSize, RouteDecision};

#[derive(Debug, Serialize)]
struct RouteRequestBody<'a> {
    task: &'a str,
    context: Option<&'a serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RouteResponseBody {
    prediction: String,
    probability: f64,
}

/// HTTP client against the routing-classifier service.
///
/// Probes `GET /health` once at construction; if the probe fails the
/// client latches into `disabled` mode for its entire lifetime and every
/// subsequent `route` call short-circuits to the conservative default
/// without attempting a request (§4.2). This mirrors the source's
/// constructor health-check pattern — the client does not re-probe, so a
/// router that recovers mid-run requires a fresh client.
pub struct HttpRouterClient {
    http: reqwest::Client,
    base_url: String,
    disabled: AtomicBool,
    /// Optional probability threshold a caller may supply to require
    /// before honoring a "large" verdict. `None` means honor the raw
    /// verdict, which is the default policy specified in §4.2 and §9.
    threshold: Option<f64>,
}

impl HttpRouterClient {
    pub async fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("reqwest client with static config must build");

        let disabled = match http.get(format!("{base_url}/health")).send().await {
            Ok(resp) if resp.status().is_success() => false,
            _ => true,
        };

        if disabled {
            tracing::warn!(%base_url, "router health probe failed — client is disabled for this run");
        }

        Self { http, base_url, disabled: AtomicBool::new(disabled), threshold: None }
    }

    /// Applies a probability threshold below which a "large" verdict is
    /// downgraded to "small" (§9's flagged alternative policy).
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    fn apply_threshold(&self, decision: RouteDecision) -> RouteDecision {
        match self.threshold {
            Some(t) if decision.size == ModelSize::Large && decision.probability < t => {
                RouteDecision { size: ModelSize::Small, probability: decision.probability }
            }
            _ => decision,
        }
    }
}

#[async_trait]
impl RouterClient for HttpRouterClient {
    async fn route(&self, domain: Domain, task: &str, context: Option<&serde_json::Value>) -> RouteDecision {
        if self.disabled.load(Ordering::Relaxed) {
            return RouteDecision::disabled_default();
        }

        let url = format!("{}/route/{}", self.base_url, domain.as_str());
        let body = RouteRequestBody { task, context };

        let result = self.http.post(&url).json(&body).send().await;
        let response = match result {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!(%url, status = %r.status(), "router returned non-2xx — defaulting to small");
                return RouteDecision::disabled_default();
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "router request failed — defaulting to small");
                return RouteDecision::disabled_default();
            }
        };

        let parsed: RouteResponseBody = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(%url, error = %e, "router response unparseable — defaulting to small");
                return RouteDecision::disabled_default();
            }
        };

        let size = match parsed.prediction.as_str() {
            "1b" => ModelSize::Small,
            "8b" => ModelSize::Large,
            other => {
                tracing::warn!(prediction = %other, "router returned unrecognized prediction — defaulting to small");
                return RouteDecision::disabled_default();
            }
        };

        self.apply_threshold(RouteDecision { size, probability: parsed.probability })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_downgrades_low_confidence_large_verdict() {
        let client = HttpRouterClient {
            http: reqwest::Client::new(),
            base_url: "http://unused".to_string(),
            disabled: AtomicBool::new(false),
            threshold: Some(0.8),
        };
        let downgraded = client.apply_threshold(RouteDecision { size: ModelSize::Large, probability: 0.5 });
        assert_eq!(downgraded.size, ModelSize::Small);
    }

    #[test]
    fn no_threshold_honors_raw_verdict() {
        let client = HttpRouterClient {
            http: reqwest::Client::new(),
            base_url: "http://unused".to_string(),
            disabled: AtomicBool::new(false),
            threshold: None,
        };
        let verdict = RouteDecision { size: ModelSize::Large, probability: 0.1 };
        assert_eq!(client.apply_threshold(verdict), verdict);
    }
}
