use std::collections::HashMap;

use crate::domain::{Domain, ModelSize};
use crate::error::OrchestratorError;

/// Static, per-domain configuration: keyword list, model identifiers,
/// prompt template, and default generation parameters. Immutable after
/// construction (§3).
#[derive(Debug, Clone)]
pub struct DomainConfig {
    pub keywords: Vec<&'static str>,
    pub small_model: String,
    pub large_model: String,
    pub prompt_template: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
}

/// Immutable in-memory table the rest of the crate is built against:
/// per-domain configuration, endpoint URLs, and the decomposer/synthesizer
/// model identifiers.
///
/// Built once per process (or once per test) via [`ConfigStore::from_env`]
/// or [`ConfigStore::with_defaults`], then wrapped in `Arc` and threaded
/// explicitly through the Orchestrator, Scheduler, and Executor — never
/// read from a process-wide global (§9).
#[derive(Debug, Clone)]
pub struct ConfigStore {
    pub small_endpoint: String,
    pub large_endpoint: String,
    pub router_url: String,
    pub decomposer_model: String,
    pub synthesizer_model: String,
    domains: HashMap<Domain, DomainConfig>,
}

impl ConfigStore {
    /// Builds a store purely from compiled-in defaults — useful for tests
    /// and local development against the default docker-compose stack.
    pub fn with_defaults() -> Self {
        Self {
            small_endpoint: "http://localhost:8001".to_string(),
            large_endpoint: "http://localhost:8002".to_string(),
            router_url: "http://localhost:8100".to_string(),
            decomposer_model: "decomposer-8b".to_string(),
            synthesizer_model: "synthesizer-8b".to_string(),
            domains: default_domains(),
        }
    }

    /// Builds a store from the environment variables named in §6,
    /// falling back to [`ConfigStore::with_defaults`] for anything unset.
    pub fn from_env() -> Self {
        let mut store = Self::with_defaults();

        if let Ok(v) = std::env::var("SMALL_LLM_ENDPOINT") {
            store.small_endpoint = v;
        }
        if let Ok(v) = std::env::var("LARGE_LLM_ENDPOINT") {
            store.large_endpoint = v;
        }
        if let Ok(v) = std::env::var("ROUTER_SERVICE_URL") {
            store.router_url = v;
        }
        if let Ok(v) = std::env::var("DECOMPOSER_MODEL") {
            store.decomposer_model = v;
        }
        if let Ok(v) = std::env::var("SYNTHESIZER_MODEL") {
            store.synthesizer_model = v;
        }

        for domain in Domain::ALL {
            let upper = domain.as_str().to_uppercase();
            if let Ok(v) = std::env::var(format!("{upper}_SMALL_MODEL")) {
                store.domains.get_mut(&domain).unwrap().small_model = v;
            }
            if let Ok(v) = std::env::var(format!("{upper}_LARGE_MODEL")) {
                store.domains.get_mut(&domain).unwrap().large_model = v;
            }
        }

        store
    }

    /// Like [`ConfigStore::from_env`], but rejects malformed endpoint URLs
    /// instead of carrying them silently into every downstream client call.
    pub fn from_env_checked() -> Result<Self, OrchestratorError> {
        let store = Self::from_env();
        for (name, url) in [
            ("SMALL_LLM_ENDPOINT", &store.small_endpoint),
            ("LARGE_LLM_ENDPOINT", &store.large_endpoint),
            ("ROUTER_SERVICE_URL", &store.router_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(OrchestratorError::Config(format!("{name} is not a valid http(s) URL: {url}")));
            }
        }
        Ok(store)
    }

    pub fn domain(&self, domain: Domain) -> &DomainConfig {
        self.domains.get(&domain).expect("all four domains are populated at construction")
    }

    /// Resolves `(endpoint_url, model_identifier)` for a (domain, size) pair.
    pub fn resolve(&self, domain: Domain, size: ModelSize) -> (&str, &str) {
        let cfg = self.domain(domain);
        match size {
            ModelSize::Small => (self.small_endpoint.as_str(), cfg.small_model.as_str()),
            ModelSize::Large => (self.large_endpoint.as_str(), cfg.large_model.as_str()),
        }
    }
}

fn default_domains() -> HashMap<Domain, DomainConfig> {
    let mut m = HashMap::new();
    m.insert(
        Domain::Commonsense,
        DomainConfig {
            keywords: vec!["explain", "why", "how", "general"],
            small_model: "commonsense-1b".to_string(),
            large_model: "commonsense-8b".to_string(),
            prompt_template: "You are a general-purpose reasoning assistant.".to_string(),
            temperature: 0.6,
            max_output_tokens: 512,
        },
    );
    m.insert(
        Domain::Medical,
        DomainConfig {
            keywords: vec!["patient", "diagnosis", "treatment", "symptom", "clinical"],
            small_model: "medical-1b".to_string(),
            large_model: "medical-8b".to_string(),
            prompt_template: "You are a clinical reasoning assistant.".to_string(),
            temperature: 0.3,
            max_output_tokens: 512,
        },
    );
    m.insert(
        Domain::Law,
        DomainConfig {
            keywords: vec!["consent", "policy", "regulation", "liability", "statute"],
            small_model: "law-1b".to_string(),
            large_model: "law-8b".to_string(),
            prompt_template: "You are a legal-policy reasoning assistant.".to_string(),
            temperature: 0.3,
            max_output_tokens: 512,
        },
    );
    m.insert(
        Domain::Math,
        DomainConfig {
            keywords: vec!["compute", "derivative", "evaluate", "solve", "equation"],
            small_model: "math-1b".to_string(),
            large_model: "math-8b".to_string(),
            prompt_template: "You are a precise mathematical reasoning assistant.".to_string(),
            temperature: 0.2,
            max_output_tokens: 512,
        },
    );
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_domains() {
        let store = ConfigStore::with_defaults();
        for d in Domain::ALL {
            let _ = store.domain(d);
        }
    }

    #[test]
    fn resolve_picks_endpoint_by_size() {
        let store = ConfigStore::with_defaults();
        let (endpoint, model) = store.resolve(Domain::Math, ModelSize::Small);
        assert_eq!(endpoint, store.small_endpoint);
        assert_eq!(model, "math-1b");

        let (endpoint, model) = store.resolve(Domain::Math, ModelSize::Large);
        assert_eq!(endpoint, store.large_endpoint);
        assert_eq!(model, "math-8b");
    }

    #[test]
    fn env_override_takes_precedence() {
        std::env::set_var("MATH_SMALL_MODEL", "math-1b-lora-test");
        let store = ConfigStore::from_env();
        assert_eq!(store.domain(Domain::Math).small_model, "math-1b-lora-test");
        std::env::remove_var("MATH_SMALL_MODEL");
    }

    #[test]
    fn from_env_checked_accepts_default_urls() {
        assert!(ConfigStore::from_env_checked().is_ok());
    }

    #[test]
    fn from_env_checked_rejects_malformed_endpoint() {
        std::env::set_var("ROUTER_SERVICE_URL", "not-a-url");
        let result = ConfigStore::from_env_checked();
        std::env::remove_var("ROUTER_SERVICE_URL");
        assert!(matches!(result, Err(OrchestratorError::Config(_))));
    }
}
