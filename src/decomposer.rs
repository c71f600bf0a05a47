use std::sync::Arc;

use serde_json::json;

use crate::config::ConfigStore;
use crate::domain::TaskDag;
use crate::llm::{GenerateRequest, LlmClient};
use crate::metrics::{CallerClass, MetricsCollector};

const MAX_RETRY: u32 = 3;

const SYSTEM_PROMPT: &str = "\
You decompose a task into a dependency graph of subtasks. Rules:\n\
- Every subtask's domain must be one of: commonsense, medical, law, math.\n\
- Phrase every subtask content as an imperative instruction.\n\
- A subtask may only depend on subtasks that appear earlier in the list.\n\
- Respond with JSON only, matching the given schema.";

fn task_dag_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "tasks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string"},
                        "domain": {"type": "string", "enum": ["commonsense", "medical", "law", "math"]},
                        "content": {"type": "string"},
                        "dependencies": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["id", "domain", "content"]
                }
            }
        },
        "required": ["tasks"]
    })
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_leading = trimmed.strip_prefix("```json").or_else(|| trimmed.strip_prefix("```")).unwrap_or(trimmed);
    without_leading.strip_suffix("```").unwrap_or(without_leading).trim()
}

fn build_prompt(task: &str, feedback: Option<&str>, previous_merged: Option<&str>, last_errors: &[String]) -> String {
    let mut prompt = format!("{SYSTEM_PROMPT}\n\n");
    match (feedback, previous_merged) {
        (Some(feedback), Some(previous_merged)) => {
            prompt.push_str(&format!(
                "Refine the decomposition. Original Task: {task}\n\nPrevious merged output: {previous_merged}\n\nFeedback: {feedback}\n"
            ));
        }
        _ => {
            prompt.push_str(&format!("Original Task: {task}\n"));
        }
    }
    if !last_errors.is_empty() {
        prompt.push_str("\nThe previous attempt(s) failed validation with these errors:\n");
        for err in last_errors.iter().rev().take(2) {
            prompt.push_str(&format!("- {err}\n"));
        }
    }
    prompt
}

/// Turns a task (plus optional refinement feedback) into a validated
/// `TaskDag`, retrying against the model's own validation errors before
/// giving up and falling back to a single commonsense node (§4.5).
pub struct Decomposer {
    config: Arc<ConfigStore>,
    llm: Arc<dyn LlmClient>,
    metrics: Arc<MetricsCollector>,
}

impl Decomposer {
    pub fn new(config: Arc<ConfigStore>, llm: Arc<dyn LlmClient>, metrics: Arc<MetricsCollector>) -> Self {
        Self { config, llm, metrics }
    }

    pub async fn decompose(&self, task: &str, feedback: Option<&str>, previous_merged: Option<&str>) -> TaskDag {
        let mut errors: Vec<String> = Vec::new();

        for attempt in 1..=MAX_RETRY {
            let prompt = build_prompt(task, feedback, previous_merged, &errors);

            let request = GenerateRequest {
                endpoint: self.config.large_endpoint.clone(),
                model_name: self.config.decomposer_model.clone(),
                prompt,
                max_tokens: 1024,
                temperature: 0.7,
                guided_json: Some(task_dag_schema()),
                guided_regex: None,
                label: Some("decomposer"),
            };

            let response = match self.llm.generate(request).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "decomposer LLM call failed");
                    errors.push(e.to_string());
                    continue;
                }
            };
            self.metrics.record(CallerClass::Decomposer, response.usage);

            let cleaned = strip_code_fences(&response.text);
            let dag: TaskDag = match serde_json::from_str(cleaned) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "decomposer output failed to parse");
                    errors.push(format!("output did not parse as JSON: {e}"));
                    continue;
                }
            };

            match dag.validate() {
                Ok(()) => {
                    tracing::info!(attempt, nodes = dag.tasks.len(), "decomposer produced a valid DAG");
                    return dag;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "decomposer DAG failed validation");
                    errors.push(e.to_string());
                }
            }
        }

        tracing::warn!(task, "decomposer exhausted its retry budget — falling back to single-node DAG");
        TaskDag::fallback(task)
    }
}
