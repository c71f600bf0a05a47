use regex::Regex;

/// Ground-truth facts pulled out of the original task text. These are
/// treated as immutable for the duration of a run: no agent output is
/// allowed to contradict them (§4.3a).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImmutableFacts {
    pub patient_age: Option<u32>,
    pub is_minor: Option<bool>,
    pub consent_required: bool,
    pub medical_status_stable: bool,
    pub delay_is_safe: bool,
    pub is_emergency: Option<bool>,
    pub total_cost: Option<u32>,
    pub offered_payment: Option<u32>,
    pub timeline_days: Option<u32>,
    pub constraints: Vec<String>,
}

impl ImmutableFacts {
    /// Renders the extracted constraints as a prompt block warning agents
    /// away from contradicting them. Empty if nothing was extracted.
    pub fn format_for_prompt(&self) -> String {
        if self.constraints.is_empty() {
            return String::new();
        }
        let mut lines = vec![
            "IMMUTABLE FACTS FROM ORIGINAL TASK:".to_string(),
            "These are GROUND TRUTH and CANNOT be contradicted:".to_string(),
            String::new(),
        ];
        for (idx, constraint) in self.constraints.iter().enumerate() {
            lines.push(format!("{}. {constraint}", idx + 1));
        }
        lines.push(String::new());
        lines.push("ANY OUTPUT CONTRADICTING THESE FACTS WILL BE REJECTED.".to_string());
        lines.join("\n")
    }
}

/// Regex-based extraction of the fact categories the original system
/// checks: patient age/minority, consent requirements, medical stability,
/// delay safety, emergency status, cost figures, and timelines.
pub fn extract_immutable_facts(task: &str) -> ImmutableFacts {
    let mut facts = ImmutableFacts::default();
    let task_lower = task.to_lowercase();

    let age_re = Regex::new(r"(\d+)-year-old").unwrap();
    if let Some(caps) = age_re.captures(task) {
        let age: u32 = caps[1].parse().unwrap_or(0);
        let is_minor = age < 18;
        facts.patient_age = Some(age);
        facts.is_minor = Some(is_minor);
        if is_minor {
            facts.constraints.push(format!("Patient is a minor (age {age})"));
        }
    }

    if task_lower.contains("requires") && task_lower.contains("consent") && (task_lower.contains("parent") || task_lower.contains("guardian")) {
        facts.consent_required = true;
        facts.constraints.push("Parental/guardian consent is required by policy".to_string());
    }

    if task_lower.contains("stable") {
        facts.medical_status_stable = true;
        facts.constraints.push("Medical condition is documented as stable".to_string());
    }

    if task_lower.contains("does not create") && task_lower.contains("risk") {
        facts.delay_is_safe = true;
        facts.constraints.push("Delay does not create serious health risk".to_string());
    }

    if task_lower.contains("non-emergency") {
        facts.is_emergency = Some(false);
        facts.constraints.push("This is a non-emergency service".to_string());
    } else if task_lower.contains("emergency") {
        facts.is_emergency = Some(true);
    }

    let cost_re = Regex::new(r"\$(\d+(?:,\d+)?)").unwrap();
    let costs: Vec<u32> = cost_re
        .captures_iter(task)
        .map(|c| c[1].replace(',', "").parse().unwrap_or(0))
        .collect();
    if costs.len() >= 2 {
        let total = *costs.iter().max().unwrap();
        let offered = *costs.iter().min().unwrap();
        facts.total_cost = Some(total);
        facts.offered_payment = Some(offered);
        facts.constraints.push(format!("Total cost: ${total}, Offered: ${offered}"));
    }

    let day_re = Regex::new(r"(\d+)\s*days?").unwrap();
    if let Some(caps) = day_re.captures(&task_lower) {
        let days: u32 = caps[1].parse().unwrap_or(0);
        facts.timeline_days = Some(days);
        facts.constraints.push(format!("Timeline involves {days} days"));
    }

    facts
}

/// Severity of a detected contradiction. The source system only ever
/// produces "critical" — there is no lesser tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    ConsentRequirement,
    MedicalStatus,
    DelaySafety,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub description: String,
    pub severity: Severity,
}

const CONSENT_NEGATION_PATTERNS: &[&str] =
    &["does not require consent", "no consent required", "consent is not required", "don't need consent", "without consent"];

const DELAY_DANGER_PATTERNS: &[&str] = &["delay creates risk", "delay is dangerous", "delay poses risk"];

/// Checks one agent response against the extracted facts, returning every
/// detected contradiction (§4.3a). An agent output may trip more than one
/// check at once.
pub fn validate_agent_output(output: &str, facts: &ImmutableFacts) -> Vec<Violation> {
    let output_lower = output.to_lowercase();
    let mut violations = Vec::new();

    if facts.consent_required {
        let tripped = CONSENT_NEGATION_PATTERNS
            .iter()
            .any(|p| output_lower.contains(p) && !output_lower.contains("unless"));
        if tripped {
            violations.push(Violation {
                kind: ViolationKind::ConsentRequirement,
                description: "agent claims consent is not required, contradicting task policy".to_string(),
                severity: Severity::Critical,
            });
        }
    }

    if facts.medical_status_stable && (output_lower.contains("not stable") || output_lower.contains("unstable")) {
        violations.push(Violation {
            kind: ViolationKind::MedicalStatus,
            description: "agent claims condition is unstable, contradicting documented status".to_string(),
            severity: Severity::Critical,
        });
    }

    if facts.delay_is_safe && DELAY_DANGER_PATTERNS.iter().any(|p| output_lower.contains(p)) {
        violations.push(Violation {
            kind: ViolationKind::DelaySafety,
            description: "agent claims delay is dangerous, contradicting clinical documentation".to_string(),
            severity: Severity::Critical,
        });
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TASK: &str = "A home health agency is deciding whether to start next-day in-home wound-care visits for a 17-year-old after a minor surgery; the visits cost $250 per day for 4 days (total $1,000). Agency policy requires a parent or legal guardian to consent for non-emergency services for anyone under 18, and the clinician documents the wound is stable so a 5-day delay does not create a serious health risk.";

    #[test]
    fn extracts_minor_and_consent_and_stability_and_emergency_facts() {
        let facts = extract_immutable_facts(SAMPLE_TASK);
        assert_eq!(facts.patient_age, Some(17));
        assert_eq!(facts.is_minor, Some(true));
        assert!(facts.consent_required);
        assert!(facts.medical_status_stable);
        assert!(facts.delay_is_safe);
        assert_eq!(facts.is_emergency, Some(false));
        assert!(facts.constraints.len() >= 4);
    }

    #[test]
    fn format_for_prompt_is_empty_without_constraints() {
        let facts = extract_immutable_facts("a task with no extractable facts in it at all");
        assert_eq!(facts.format_for_prompt(), "");
    }

    #[test]
    fn format_for_prompt_lists_every_constraint() {
        let facts = extract_immutable_facts(SAMPLE_TASK);
        let prompt = facts.format_for_prompt();
        assert!(prompt.contains("IMMUTABLE FACTS"));
        assert!(prompt.contains("minor"));
    }

    #[test]
    fn detects_consent_requirement_violation() {
        let facts = extract_immutable_facts(SAMPLE_TASK);
        let violations = validate_agent_output(
            "No, there is no requirement for parental consent unless it's an emergency service.",
            &facts,
        );
        // "unless" appears in the text, so this phrasing should NOT trip the check
        assert!(violations.is_empty());

        let violations = validate_agent_output("No, there is no consent required for this service.", &facts);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::ConsentRequirement);
    }

    #[test]
    fn detects_medical_status_violation() {
        let facts = extract_immutable_facts(SAMPLE_TASK);
        let violations = validate_agent_output("The wound is unstable and needs immediate attention.", &facts);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::MedicalStatus);
    }

    #[test]
    fn clean_output_has_no_violations() {
        let facts = extract_immutable_facts(SAMPLE_TASK);
        let violations = validate_agent_output(
            "No, the agency should wait for guardian consent since this is a non-emergency service.",
            &facts,
        );
        assert!(violations.is_empty());
    }
}
