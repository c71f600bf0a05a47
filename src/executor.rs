use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ConfigStore;
use crate::domain::{CallUsage, ModelSize, SubTask, SubTaskResult, SubtaskStatus};
use crate::llm::{GenerateRequest, LlmClient};
use crate::metrics::{CallerClass, MetricsCollector};
use crate::router::RouterClient;

/// Keys dropped from the context block assembled in step 4 of §4.3 — they
/// are orchestrator bookkeeping, not subtask-relevant information.
const RESERVED_CONTEXT_KEYS: &[&str] = &["user_id"];

/// Resolved parameter count (billions) for a routed model size, used for
/// the worker-class FLOPs accounting in §4.8.
fn param_count_billions(size: ModelSize) -> f64 {
    match size {
        ModelSize::Small => 1.0,
        ModelSize::Large => 8.0,
    }
}

/// Filters a context map per §4.3 step 4: drops reserved keys and empty
/// values, then joins the rest as `key: value` lines.
fn build_context_block(context: &HashMap<String, String>) -> String {
    let mut lines: Vec<String> = context
        .iter()
        .filter(|(k, v)| !RESERVED_CONTEXT_KEYS.contains(&k.as_str()) && !v.is_empty())
        .map(|(k, v)| format!("{k}: {v}"))
        .collect();
    lines.sort();
    lines.join("\n")
}

/// Executes one `SubTask` to completion. Constructed once per run and
/// held behind `Arc`, not as a process-wide singleton (§9) — every field
/// is an explicit dependency passed in at construction.
pub struct SubtaskExecutor {
    config: Arc<ConfigStore>,
    llm: Arc<dyn LlmClient>,
    router: Arc<dyn RouterClient>,
    metrics: Arc<MetricsCollector>,
}

impl SubtaskExecutor {
    pub fn new(
        config: Arc<ConfigStore>,
        llm: Arc<dyn LlmClient>,
        router: Arc<dyn RouterClient>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self { config, llm, router, metrics }
    }

    /// Runs the §4.3 algorithm for a single node. Never returns `Err` —
    /// on any LLM failure it degrades to a `mock`-status result (step 7).
    pub async fn execute(&self, node: &SubTask, context: &HashMap<String, String>) -> SubTaskResult {
        let domain_cfg = self.config.domain(node.domain);
        let context_block = build_context_block(context);

        let context_value = (!context_block.is_empty()).then(|| serde_json::Value::String(context_block.clone()));
        let route = self.router.route(node.domain, &node.content, context_value.as_ref()).await;
        self.metrics.record(CallerClass::Routing, CallUsage::default());

        let (endpoint, model_name) = self.config.resolve(node.domain, route.size);

        let mut prompt = format!("{}\n\nTask: {}", domain_cfg.prompt_template, node.content);
        if !context_block.is_empty() {
            prompt.push_str(&format!("\n\nContext: {context_block}"));
        }
        prompt.push_str("\n\nResponse:");

        tracing::info!(node_id = %node.id, domain = %node.domain, size = route.size.as_str(), "dispatching subtask");

        let request = GenerateRequest {
            endpoint: endpoint.to_string(),
            model_name: model_name.to_string(),
            prompt,
            max_tokens: domain_cfg.max_output_tokens,
            temperature: domain_cfg.temperature,
            guided_json: None,
            guided_regex: None,
            label: Some("worker"),
        };

        match self.llm.generate(request).await {
            Ok(response) => {
                self.metrics.record_worker_call(param_count_billions(route.size), response.usage);
                SubTaskResult {
                    node_id: node.id.clone(),
                    domain: node.domain,
                    subtask_content: node.content.clone(),
                    text: response.text,
                    usage: response.usage,
                    model_size: route.size,
                    status: SubtaskStatus::Ok,
                }
            }
            Err(e) => {
                tracing::warn!(node_id = %node.id, error = %e, "subtask LLM call failed — degrading to mock result");
                SubTaskResult {
                    node_id: node.id.clone(),
                    domain: node.domain,
                    subtask_content: node.content.clone(),
                    text: format!("[MOCK RESPONSE for {}] {}", node.domain, truncate(&node.content, 50)),
                    usage: CallUsage::default(),
                    model_size: route.size,
                    status: SubtaskStatus::Mock,
                }
            }
        }
    }
}

fn truncate(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}
