use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One of the four subject-matter tags the orchestrator routes work to.
///
/// The set is closed — there is no `Domain::custom(name)` escape hatch.
/// Every prompt template, model pairing, and router endpoint is keyed
/// on one of these four values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Commonsense,
    Medical,
    Law,
    Math,
}

impl Domain {
    pub const ALL: [Domain; 4] = [Domain::Commonsense, Domain::Medical, Domain::Law, Domain::Math];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Commonsense => "commonsense",
            Domain::Medical => "medical",
            Domain::Law => "law",
            Domain::Math => "math",
        }
    }

    pub fn from_str(s: &str) -> Option<Domain> {
        match s {
            "commonsense" => Some(Domain::Commonsense),
            "medical" => Some(Domain::Medical),
            "law" => Some(Domain::Law),
            "math" => Some(Domain::Math),
            _ => None,
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which model family a subtask was routed to. Mapping to an actual
/// endpoint + model identifier is resolved through `ConfigStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Small,
    Large,
}

impl ModelSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::Small => "small",
            ModelSize::Large => "large",
        }
    }
}

/// Router Client verdict: a model size plus the classifier's confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub size: ModelSize,
    pub probability: f64,
}

impl RouteDecision {
    /// The conservative default used whenever the router is unreachable
    /// or disabled: small model, zero confidence.
    pub fn disabled_default() -> Self {
        Self { size: ModelSize::Small, probability: 0.0 }
    }
}

/// Token accounting for a single LLM call, as reported by the endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl CallUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self { prompt_tokens, completion_tokens, total_tokens: prompt_tokens + completion_tokens }
    }
}

/// A node in the task DAG, as emitted (and validated) by the Decomposer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTask {
    pub id: String,
    pub domain: Domain,
    pub content: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Validation failures a `TaskDAG` can carry. The `Display` text is fed
/// verbatim back into the next Decomposer retry prompt (§4.5 step 1).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DagValidationError {
    #[error("duplicate node id: {0}")]
    DuplicateId(String),
    #[error("node '{0}' depends on itself")]
    SelfDependency(String),
    #[error("node '{0}' depends on unknown node '{1}'")]
    UnknownDependency(String, String),
    #[error("dependency graph contains a cycle involving node '{0}'")]
    Cycle(String),
    #[error("node '{0}' content has fewer than ten words")]
    ContentTooShort(String),
    #[error("DAG has no nodes")]
    Empty,
}

/// A decomposed, validated set of subtasks and their dependency edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDag {
    pub tasks: Vec<SubTask>,
}

impl TaskDag {
    /// Builds the single-node fallback DAG used when the Decomposer
    /// exhausts its retry budget (§4.5).
    pub fn fallback(task: &str) -> Self {
        Self {
            tasks: vec![SubTask {
                id: "task1".to_string(),
                domain: Domain::Commonsense,
                content: task.to_string(),
                dependencies: Vec::new(),
            }],
        }
    }

    /// Validates the invariants from §3: unique ids, no self-dependency,
    /// dependencies resolve to real nodes, acyclic, content length.
    ///
    /// Returns the first violation found; the Decomposer only needs one
    /// human-readable error to feed back per retry attempt.
    pub fn validate(&self) -> Result<(), DagValidationError> {
        if self.tasks.is_empty() {
            return Err(DagValidationError::Empty);
        }

        let mut seen = HashSet::new();
        for t in &self.tasks {
            if !seen.insert(t.id.as_str()) {
                return Err(DagValidationError::DuplicateId(t.id.clone()));
            }
        }

        for t in &self.tasks {
            if t.content.split_whitespace().count() < 10 {
                return Err(DagValidationError::ContentTooShort(t.id.clone()));
            }
            for dep in &t.dependencies {
                if dep == &t.id {
                    return Err(DagValidationError::SelfDependency(t.id.clone()));
                }
                if !seen.contains(dep.as_str()) {
                    return Err(DagValidationError::UnknownDependency(t.id.clone(), dep.clone()));
                }
            }
        }

        self.check_acyclic()
    }

    fn check_acyclic(&self) -> Result<(), DagValidationError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        use std::collections::HashMap;
        let by_id: HashMap<&str, &SubTask> = self.tasks.iter().map(|t| (t.id.as_str(), t)).collect();
        let mut marks: HashMap<&str, Mark> = self.tasks.iter().map(|t| (t.id.as_str(), Mark::Unvisited)).collect();

        fn visit<'a>(
            id: &'a str,
            by_id: &HashMap<&'a str, &'a SubTask>,
            marks: &mut HashMap<&'a str, Mark>,
        ) -> Result<(), DagValidationError> {
            match marks.get(id).copied().unwrap_or(Mark::Unvisited) {
                Mark::Done => return Ok(()),
                Mark::InProgress => return Err(DagValidationError::Cycle(id.to_string())),
                Mark::Unvisited => {}
            }
            marks.insert(id, Mark::InProgress);
            let node = by_id[id];
            for dep in &node.dependencies {
                visit(dep.as_str(), by_id, marks)?;
            }
            marks.insert(id, Mark::Done);
            Ok(())
        }

        for t in &self.tasks {
            visit(t.id.as_str(), &by_id, &mut marks)?;
        }
        Ok(())
    }
}

/// Status of a completed (or degraded) subtask execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtaskStatus {
    Ok,
    Mock,
    Error,
}

/// The immutable outcome of executing one `SubTask`. Produced exactly
/// once per node per iteration by the Subtask Executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTaskResult {
    pub node_id: String,
    pub domain: Domain,
    pub subtask_content: String,
    pub text: String,
    pub usage: CallUsage,
    pub model_size: ModelSize,
    pub status: SubtaskStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, deps: &[&str]) -> SubTask {
        SubTask {
            id: id.to_string(),
            domain: Domain::Commonsense,
            content: "this is a sufficiently long imperative task description".to_string(),
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn valid_dag_passes() {
        let dag = TaskDag { tasks: vec![task("a", &[]), task("b", &["a"])] };
        assert!(dag.validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let dag = TaskDag { tasks: vec![task("a", &[]), task("a", &[])] };
        assert_eq!(dag.validate(), Err(DagValidationError::DuplicateId("a".to_string())));
    }

    #[test]
    fn rejects_self_dependency() {
        let dag = TaskDag { tasks: vec![task("a", &["a"])] };
        assert_eq!(dag.validate(), Err(DagValidationError::SelfDependency("a".to_string())));
    }

    #[test]
    fn rejects_unknown_dependency() {
        let dag = TaskDag { tasks: vec![task("a", &["ghost"])] };
        assert_eq!(
            dag.validate(),
            Err(DagValidationError::UnknownDependency("a".to_string(), "ghost".to_string()))
        );
    }

    #[test]
    fn rejects_cycle() {
        let dag = TaskDag { tasks: vec![task("a", &["b"]), task("b", &["a"])] };
        assert!(matches!(dag.validate(), Err(DagValidationError::Cycle(_))));
    }

    #[test]
    fn disconnected_nodes_are_legal() {
        let dag = TaskDag { tasks: vec![task("a", &[]), task("b", &[])] };
        assert!(dag.validate().is_ok());
    }

    #[test]
    fn fallback_is_single_node_commonsense() {
        let dag = TaskDag::fallback("do a thing");
        assert_eq!(dag.tasks.len(), 1);
        assert_eq!(dag.tasks[0].domain, Domain::Commonsense);
        assert!(dag.tasks[0].dependencies.is_empty());
    }
}
