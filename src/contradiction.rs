use crate::domain::{SubTaskResult, SubtaskStatus};
use crate::facts::{validate_agent_output, ImmutableFacts, Severity, ViolationKind};

#[derive(Debug, Clone, PartialEq)]
pub enum ContradictionKind {
    MockResponse,
    Violation(ViolationKind),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Contradiction {
    pub node_id: String,
    pub domain: crate::domain::Domain,
    pub kind: ContradictionKind,
    pub severity: Severity,
    pub description: String,
}

/// Result of checking a DAG run's outputs against the immutable facts
/// extracted from the original task (§4.3a).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContradictionReport {
    pub contradictions: Vec<Contradiction>,
    pub discarded_node_ids: Vec<String>,
}

impl ContradictionReport {
    pub fn has_contradictions(&self) -> bool {
        !self.contradictions.is_empty()
    }

    /// Human-readable summary, in the style of a build/test report rather
    /// than structured data — intended for `tracing::warn!` bodies, not
    /// for machine parsing.
    pub fn generate_report(&self) -> String {
        if !self.has_contradictions() {
            return "no contradictions detected".to_string();
        }
        let mut lines = vec![format!(
            "{} contradiction(s) detected, {} result(s) discarded",
            self.contradictions.len(),
            self.discarded_node_ids.len()
        )];
        for c in &self.contradictions {
            lines.push(format!("- [{:?}] {} agent ({}): {}", c.severity, c.domain, c.node_id, c.description));
        }
        lines.join("\n")
    }
}

/// Validates every completed (non-mock) `SubTaskResult` against
/// `facts`, flagging mock responses outright and any output that
/// contradicts an extracted ground-truth constraint (§4.3a). Results
/// named in `discarded_node_ids` must not be forwarded to the
/// Synthesizer.
pub fn check_contradictions(results: &[SubTaskResult], facts: &ImmutableFacts) -> ContradictionReport {
    let mut report = ContradictionReport::default();

    for result in results {
        if result.status != SubtaskStatus::Ok {
            continue;
        }
        if result.text.contains("[MOCK RESPONSE") {
            report.contradictions.push(Contradiction {
                node_id: result.node_id.clone(),
                domain: result.domain,
                kind: ContradictionKind::MockResponse,
                severity: Severity::Critical,
                description: "agent returned a mock/error response".to_string(),
            });
            report.discarded_node_ids.push(result.node_id.clone());
            continue;
        }

        let violations = validate_agent_output(&result.text, facts);
        if !violations.is_empty() {
            for v in violations {
                report.contradictions.push(Contradiction {
                    node_id: result.node_id.clone(),
                    domain: result.domain,
                    kind: ContradictionKind::Violation(v.kind),
                    severity: v.severity,
                    description: v.description,
                });
            }
            report.discarded_node_ids.push(result.node_id.clone());
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Domain, ModelSize};
    use crate::facts::extract_immutable_facts;

    fn result(node_id: &str, domain: Domain, text: &str) -> SubTaskResult {
        SubTaskResult {
            node_id: node_id.to_string(),
            domain,
            subtask_content: "c".to_string(),
            text: text.to_string(),
            usage: Default::default(),
            model_size: ModelSize::Small,
            status: SubtaskStatus::Ok,
        }
    }

    const SAMPLE_TASK: &str = "A 17-year-old patient needs non-emergency wound care; parent consent is required by policy. The wound is stable so a 5-day delay does not create a serious health risk.";

    #[test]
    fn contradicting_law_result_is_discarded() {
        let facts = extract_immutable_facts(SAMPLE_TASK);
        let results = vec![
            result("law1", Domain::Law, "No, there is no consent required for this service."),
            result("med1", Domain::Medical, "The wound remains stable and safe to delay."),
        ];
        let report = check_contradictions(&results, &facts);
        assert!(report.has_contradictions());
        assert_eq!(report.discarded_node_ids, vec!["law1".to_string()]);
    }

    #[test]
    fn clean_results_produce_no_contradictions() {
        let facts = extract_immutable_facts(SAMPLE_TASK);
        let results = vec![result("law1", Domain::Law, "No, the agency must wait for guardian consent.")];
        let report = check_contradictions(&results, &facts);
        assert!(!report.has_contradictions());
        assert!(report.discarded_node_ids.is_empty());
    }

    #[test]
    fn mock_responses_are_always_discarded() {
        let facts = extract_immutable_facts(SAMPLE_TASK);
        let results = vec![result("law1", Domain::Law, "[MOCK RESPONSE for law] ...")];
        let report = check_contradictions(&results, &facts);
        assert_eq!(report.discarded_node_ids, vec!["law1".to_string()]);
        assert_eq!(report.contradictions[0].kind, ContradictionKind::MockResponse);
    }

    #[test]
    fn report_text_mentions_discard_count() {
        let facts = extract_immutable_facts(SAMPLE_TASK);
        let results = vec![result("law1", Domain::Law, "No consent required here.")];
        let report = check_contradictions(&results, &facts);
        assert!(report.generate_report().contains("1 result(s) discarded"));
    }
}
