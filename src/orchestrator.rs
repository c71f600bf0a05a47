use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ConfigStore;
use crate::contradiction::check_contradictions;
use crate::decomposer::Decomposer;
use crate::domain::{Domain, SubTaskResult, SubtaskStatus};
use crate::executor::SubtaskExecutor;
use crate::facts::extract_immutable_facts;
use crate::llm::LlmClient;
use crate::metrics::{MetricsCollector, RunMetrics};
use crate::router::RouterClient;
use crate::scheduler::DagScheduler;
use crate::synthesizer::{SynthesisOutcome, Synthesizer};

const MAX_RETRY: u32 = 3;

/// Display-ordering priority for `merge_for_display` — lower sorts first.
/// Domains absent from this table sort last, in encounter order.
fn domain_priority(domain: Domain) -> u8 {
    match domain {
        Domain::Medical => 0,
        Domain::Law => 1,
        Domain::Math => 2,
        Domain::Commonsense => 3,
    }
}

/// Folds completed subtask results into a single human-readable block,
/// grouped by domain in priority order and rendered as `[DOMAIN]\ntext`
/// per domain group. Display-only — never fed back into a prompt as
/// structured input.
pub fn merge_for_display(results: &[SubTaskResult]) -> String {
    let mut by_domain: HashMap<Domain, Vec<&str>> = HashMap::new();
    for r in results {
        by_domain.entry(r.domain).or_default().push(r.text.as_str());
    }

    let mut domains: Vec<Domain> = by_domain.keys().copied().collect();
    domains.sort_by_key(|d| domain_priority(*d));

    domains
        .into_iter()
        .map(|d| {
            let text = by_domain[&d].join("\n");
            format!("[{}]\n{}", d.as_str().to_uppercase(), text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Final outcome of a full `process` run. Never carries an `Err` — every
/// failure mode this crate can encounter mid-run is folded into `reason`
/// and `success = false` instead of propagated as an exception (§7, §10.2).
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub success: bool,
    pub final_answer: String,
    pub iterations: u32,
    pub metrics: RunMetrics,
    pub reason: Option<String>,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Wires the Decomposer, Scheduler, and Synthesizer together behind the
/// outer refinement loop (§4.7). Constructed once per run; holds no
/// process-wide state beyond the one `MetricsCollector` it owns.
pub struct Orchestrator {
    decomposer: Decomposer,
    scheduler: DagScheduler,
    synthesizer: Synthesizer,
    metrics: Arc<MetricsCollector>,
}

impl Orchestrator {
    pub fn new(config: Arc<ConfigStore>, llm: Arc<dyn LlmClient>, router: Arc<dyn RouterClient>) -> Self {
        let metrics = Arc::new(MetricsCollector::new());
        let executor = Arc::new(SubtaskExecutor::new(config.clone(), llm.clone(), router, metrics.clone()));
        Self {
            decomposer: Decomposer::new(config.clone(), llm.clone(), metrics.clone()),
            scheduler: DagScheduler::new(executor),
            synthesizer: Synthesizer::new(config, llm, metrics.clone()),
            metrics,
        }
    }

    /// Runs the full decompose → execute → synthesize loop for `task`,
    /// re-decomposing only on the first iteration (§4.7) and bounding the
    /// number of refinement attempts at `MAX_RETRY`.
    pub async fn process(&self, task: &str, user_id: &str) -> ProcessOutcome {
        let run_id = uuid::Uuid::new_v4();
        let _span = tracing::info_span!("process", %run_id, user_id).entered();

        let facts = extract_immutable_facts(task);

        let mut iteration = 0u32;
        let mut feedback: Option<String> = None;
        let mut merged = String::new();
        let mut dag = None;

        while iteration < MAX_RETRY {
            if iteration == 0 {
                dag = Some(self.decomposer.decompose(task, None, None).await);
            }
            let dag_ref = dag.as_ref().expect("dag is decomposed on iteration 0 and reused thereafter");

            let mut initial_context = HashMap::new();
            initial_context.insert("user_id".to_string(), user_id.to_string());

            let mut results = self.scheduler.run(dag_ref, initial_context).await;

            let report = check_contradictions(&results, &facts);
            if report.has_contradictions() {
                tracing::warn!(iteration, report = %report.generate_report(), "contradiction check flagged agent output");
                for result in results.iter_mut() {
                    if report.discarded_node_ids.contains(&result.node_id) {
                        result.status = SubtaskStatus::Error;
                    }
                }
            }

            merged = merge_for_display(&results);

            let outcome = self
                .synthesizer
                .synthesize(task, &results, dag_ref, iteration, &merged)
                .await;

            match outcome {
                SynthesisOutcome::Ok { answer } => {
                    tracing::info!(iteration, "synthesis succeeded");
                    return ProcessOutcome {
                        success: true,
                        final_answer: answer,
                        iterations: iteration + 1,
                        metrics: self.metrics.snapshot(),
                        reason: None,
                        completed_at: chrono::Utc::now(),
                    };
                }
                SynthesisOutcome::Insufficient { feedback: fb } => {
                    tracing::info!(iteration, feedback = %fb, "synthesis insufficient — retrying");
                    feedback = Some(fb);
                }
            }

            iteration += 1;
        }

        tracing::warn!(task, "orchestrator exhausted its refinement budget");
        ProcessOutcome {
            success: false,
            final_answer: merged,
            iterations: MAX_RETRY,
            metrics: self.metrics.snapshot(),
            reason: feedback.or_else(|| Some("max retries reached".to_string())),
            completed_at: chrono::Utc::now(),
        }
    }
}
