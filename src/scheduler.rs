use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;

use crate::domain::{SubTaskResult, TaskDag};
use crate::executor::SubtaskExecutor;

/// Runs every node of a `TaskDag` to completion, respecting dependency
/// edges but dispatching all currently-ready nodes concurrently (§4.4).
///
/// Context propagation is deliberately the union of the initial context
/// and *every* already-completed node's result text, not just a node's
/// declared dependencies — a downstream node can read any upstream
/// sibling's output even if it never named it as a dependency. This is
/// load-bearing, not an oversight: it lets the Synthesizer's merged view
/// and a node's own prompt agree on what "already known" means.
pub struct DagScheduler {
    executor: Arc<SubtaskExecutor>,
}

impl DagScheduler {
    pub fn new(executor: Arc<SubtaskExecutor>) -> Self {
        Self { executor }
    }

    /// Executes `dag` to completion and returns one `SubTaskResult` per
    /// node, in no particular order. `initial_context` seeds the context
    /// map under reserved keys (e.g. `user_id`) that every node sees.
    pub async fn run(&self, dag: &TaskDag, initial_context: HashMap<String, String>) -> Vec<SubTaskResult> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for task in &dag.tasks {
            in_degree.entry(task.id.as_str()).or_insert(0);
            dependents.entry(task.id.as_str()).or_default();
        }
        for task in &dag.tasks {
            in_degree.insert(task.id.as_str(), task.dependencies.len());
            for dep in &task.dependencies {
                dependents.entry(dep.as_str()).or_default().push(task.id.as_str());
            }
        }

        let by_id: HashMap<&str, _> = dag.tasks.iter().map(|t| (t.id.as_str(), t)).collect();
        let mut context = initial_context;
        let mut results: Vec<SubTaskResult> = Vec::with_capacity(dag.tasks.len());

        let mut ready: Vec<&str> =
            in_degree.iter().filter(|(_, &deg)| deg == 0).map(|(id, _)| *id).collect();
        ready.sort();

        while !ready.is_empty() {
            let batch = std::mem::take(&mut ready);
            tracing::debug!(batch = ?batch, "dispatching ready DAG nodes");

            let snapshot = context.clone();
            let futures = batch.iter().map(|id| {
                let node = by_id[id];
                let ctx = snapshot.clone();
                async move { self.executor.execute(node, &ctx).await }
            });
            let batch_results = join_all(futures).await;

            for result in batch_results {
                context.insert(result.node_id.clone(), result.text.clone());
                if let Some(deps) = dependents.get(result.node_id.as_str()) {
                    for &dependent in deps {
                        let deg = in_degree.get_mut(dependent).unwrap();
                        *deg -= 1;
                        if *deg == 0 {
                            ready.push(dependent);
                        }
                    }
                }
                results.push(result);
            }
            ready.sort();
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigStore;
    use crate::domain::{Domain, SubTask};
    use crate::llm::MockLlmClient;
    use crate::metrics::MetricsCollector;
    use crate::router::MockRouterClient;

    fn scheduler(texts: Vec<&str>) -> DagScheduler {
        let executor = SubtaskExecutor::new(
            Arc::new(ConfigStore::with_defaults()),
            Arc::new(MockLlmClient::ok(texts)),
            Arc::new(MockRouterClient::disabled()),
            Arc::new(MetricsCollector::new()),
        );
        DagScheduler::new(Arc::new(executor))
    }

    fn node(id: &str, deps: &[&str]) -> SubTask {
        SubTask {
            id: id.to_string(),
            domain: Domain::Commonsense,
            content: "a sufficiently long placeholder task description here".to_string(),
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn runs_every_node_of_a_linear_chain() {
        let dag = TaskDag { tasks: vec![node("a", &[]), node("b", &["a"]), node("c", &["b"])] };
        let results = scheduler(vec!["ra", "rb", "rc"]).run(&dag, HashMap::new()).await;
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn disconnected_nodes_all_complete() {
        let dag = TaskDag { tasks: vec![node("a", &[]), node("b", &[])] };
        let results = scheduler(vec!["ra", "rb"]).run(&dag, HashMap::new()).await;
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn context_propagates_beyond_declared_dependencies() {
        // c depends only on b, but should still be able to see a's result
        // in its context, since propagation is a full union, not scoped
        // to declared deps.
        let dag = TaskDag { tasks: vec![node("a", &[]), node("b", &["a"]), node("c", &["b"])] };
        let llm = Arc::new(MockLlmClient::ok(vec!["result-a", "result-b", "result-c"]));
        let executor = SubtaskExecutor::new(
            Arc::new(ConfigStore::with_defaults()),
            llm.clone(),
            Arc::new(MockRouterClient::disabled()),
            Arc::new(MetricsCollector::new()),
        );
        let scheduler = DagScheduler::new(Arc::new(executor));
        let results = scheduler.run(&dag, HashMap::new()).await;
        assert_eq!(results.len(), 3);

        let calls = llm.calls();
        let c_call = calls.iter().find(|c| c.prompt.contains(&node("c", &[]).content)).unwrap();
        assert!(c_call.prompt.contains("result-a"));
        assert!(c_call.prompt.contains("result-b"));
    }
}
