use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::config::ConfigStore;
use crate::domain::{SubTaskResult, SubtaskStatus, TaskDag};
use crate::llm::{GenerateRequest, LlmClient};
use crate::metrics::{CallerClass, MetricsCollector};

const MAX_RETRY: u32 = 3;
const MIN_ANSWER_LEN: usize = 20;

const PLACEHOLDER_ANSWERS: &[&str] = &[
    "no answer",
    "insufficient information",
    "unable to answer",
    "cannot answer",
    "[no result available]",
];

/// Outcome of one synthesis attempt (§4.6).
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisOutcome {
    Ok { answer: String },
    Insufficient { feedback: String },
}

#[derive(Debug, Deserialize)]
struct SynthesisBody {
    answer: String,
    #[serde(default)]
    #[allow(dead_code)]
    used_agents: Option<Vec<String>>,
}

fn synthesis_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "answer": {"type": "string"},
            "used_agents": {"type": "array", "items": {"type": "string"}}
        },
        "required": ["answer"]
    })
}

/// Best-effort repair of a truncated JSON object: trims a dangling
/// trailing quote and re-closes the object (§4.6 step 4).
fn repair_truncated_json(text: &str) -> String {
    let trimmed = text.trim_end();
    if trimmed.ends_with('}') {
        return trimmed.to_string();
    }
    let mut repaired = trimmed.trim_end_matches('"').to_string();
    repaired.push('"');
    repaired.push('}');
    repaired
}

fn build_structured_context(results: &[SubTaskResult], dag: &TaskDag) -> String {
    let by_id: std::collections::HashMap<&str, &crate::domain::SubTask> =
        dag.tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut blocks = Vec::new();
    for r in results {
        if r.status != SubtaskStatus::Ok {
            continue;
        }
        let deps = by_id.get(r.node_id.as_str()).map(|t| t.dependencies.join(", ")).unwrap_or_default();
        blocks.push(format!(
            "id: {}\ndomain: {}\ndependencies: {}\nsubtask: {}\nresponse: {}",
            r.node_id, r.domain, deps, r.subtask_content, r.text
        ));
    }
    blocks.join("\n\n")
}

fn is_placeholder(answer: &str) -> bool {
    let lower = answer.trim().to_lowercase();
    PLACEHOLDER_ANSWERS.contains(&lower.as_str())
}

/// Produces either a final answer or structured refinement feedback from
/// a completed DAG run (§4.6).
pub struct Synthesizer {
    config: Arc<ConfigStore>,
    llm: Arc<dyn LlmClient>,
    metrics: Arc<MetricsCollector>,
}

impl Synthesizer {
    pub fn new(config: Arc<ConfigStore>, llm: Arc<dyn LlmClient>, metrics: Arc<MetricsCollector>) -> Self {
        Self { config, llm, metrics }
    }

    pub async fn synthesize(
        &self,
        original_task: &str,
        results: &[SubTaskResult],
        dag: &TaskDag,
        iteration: u32,
        merged_for_display: &str,
    ) -> SynthesisOutcome {
        if iteration >= MAX_RETRY {
            tracing::info!(iteration, "retry budget exhausted — returning merged text verbatim");
            return SynthesisOutcome::Ok { answer: merged_for_display.to_string() };
        }

        let context = build_structured_context(results, dag);
        let prompt = format!(
            "Treat the agent results below as retrieved reference material; do not judge their quality. \
             Answer the original task directly. If the material is insufficient to answer, return an empty answer.\n\n\
             Original Task: {original_task}\n\nAgent Results:\n{context}"
        );

        let request = GenerateRequest {
            endpoint: self.config.large_endpoint.clone(),
            model_name: self.config.synthesizer_model.clone(),
            prompt,
            max_tokens: 2048,
            temperature: 0.5,
            guided_json: Some(synthesis_schema()),
            guided_regex: None,
            label: Some("synthesizer"),
        };

        let response = match self.llm.generate(request).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "synthesizer LLM call failed");
                return SynthesisOutcome::Insufficient { feedback: format!("synthesis call failed: {e}") };
            }
        };
        self.metrics.record(CallerClass::Synthesizer, response.usage);

        let body: SynthesisBody = match serde_json::from_str(&response.text) {
            Ok(b) => b,
            Err(_) => match serde_json::from_str(&repair_truncated_json(&response.text)) {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(error = %e, "synthesizer output failed to parse even after repair");
                    return SynthesisOutcome::Insufficient {
                        feedback: format!("synthesis output did not parse as JSON: {e}"),
                    };
                }
            },
        };

        let answer = body.answer.trim();
        if answer.is_empty() || answer.len() < MIN_ANSWER_LEN || is_placeholder(answer) {
            tracing::info!("synthesizer judged the available material insufficient");
            return SynthesisOutcome::Insufficient {
                feedback: "the agent results did not contain enough information to answer the task".to_string(),
            };
        }

        SynthesisOutcome::Ok { answer: answer.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Domain, ModelSize, SubTask};
    use crate::llm::MockLlmClient;

    fn synthesizer(llm: MockLlmClient) -> Synthesizer {
        Synthesizer::new(Arc::new(ConfigStore::with_defaults()), Arc::new(llm), Arc::new(MetricsCollector::new()))
    }

    fn dag() -> TaskDag {
        TaskDag {
            tasks: vec![SubTask {
                id: "task1".to_string(),
                domain: Domain::Math,
                content: "compute the derivative of the given function".to_string(),
                dependencies: vec![],
            }],
        }
    }

    fn ok_result(text: &str) -> SubTaskResult {
        SubTaskResult {
            node_id: "task1".to_string(),
            domain: Domain::Math,
            subtask_content: "compute the derivative".to_string(),
            text: text.to_string(),
            usage: Default::default(),
            model_size: ModelSize::Small,
            status: SubtaskStatus::Ok,
        }
    }

    #[tokio::test]
    async fn returns_ok_for_a_substantive_answer() {
        let body = r#"{"answer": "The derivative of x^2 is 2x, by the power rule."}"#;
        let s = synthesizer(MockLlmClient::ok(vec![body]));
        let results = vec![ok_result("2x")];
        let outcome = s.synthesize("differentiate x^2", &results, &dag(), 0, "").await;
        assert_eq!(outcome, SynthesisOutcome::Ok { answer: "The derivative of x^2 is 2x, by the power rule.".to_string() });
    }

    #[tokio::test]
    async fn placeholder_answer_is_classified_insufficient() {
        let body = r#"{"answer": "insufficient information"}"#;
        let s = synthesizer(MockLlmClient::ok(vec![body]));
        let results = vec![ok_result("2x")];
        let outcome = s.synthesize("differentiate x^2", &results, &dag(), 0, "").await;
        assert!(matches!(outcome, SynthesisOutcome::Insufficient { .. }));
    }

    #[tokio::test]
    async fn unparseable_output_is_insufficient_not_a_panic() {
        let s = synthesizer(MockLlmClient::ok(vec!["not json at all"]));
        let results = vec![ok_result("2x")];
        let outcome = s.synthesize("differentiate x^2", &results, &dag(), 0, "").await;
        assert!(matches!(outcome, SynthesisOutcome::Insufficient { .. }));
    }

    #[tokio::test]
    async fn retry_budget_exhaustion_bypasses_llm_and_returns_merged_verbatim() {
        let s = synthesizer(MockLlmClient::new(vec![]));
        let results = vec![ok_result("2x")];
        let outcome = s.synthesize("differentiate x^2", &results, &dag(), MAX_RETRY, "fallback merged text").await;
        assert_eq!(outcome, SynthesisOutcome::Ok { answer: "fallback merged text".to_string() });
    }

    #[test]
    fn mock_and_error_nodes_are_omitted_from_context() {
        let mut mock_result = ok_result("ignored");
        mock_result.status = SubtaskStatus::Mock;
        let mut error_result = ok_result("also ignored");
        error_result.node_id = "task2".to_string();
        error_result.status = SubtaskStatus::Error;
        let context = build_structured_context(&[mock_result, error_result], &dag());
        assert!(context.is_empty());
    }

    #[test]
    fn repair_closes_a_truncated_json_object() {
        let truncated = r#"{"answer": "the derivative is 2x and it follows from the power"#;
        let repaired = repair_truncated_json(truncated);
        let parsed: Result<SynthesisBody, _> = serde_json::from_str(&repaired);
        assert!(parsed.is_ok());
    }
}
