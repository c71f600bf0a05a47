use thiserror::Error;

/// Construction-time and transport-level failures.
///
/// Per the invariant in §7 ("no exception escapes `process`"), this type
/// is never returned from `Orchestrator::process` — failures encountered
/// mid-run are folded into `ProcessOutcome::reason` instead. It is
/// reserved for failures that happen before or outside a run: building a
/// client, loading configuration, or a caller-triggered `generate`/`route`
/// call made directly against a client (outside the orchestrator loop).
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("LLM transport error calling {endpoint}: {source}")]
    LlmTransport { endpoint: String, source: String },

    #[error("LLM endpoint {endpoint} returned an empty response")]
    LlmEmptyResponse { endpoint: String },

    #[error("configuration error: {0}")]
    Config(String),
}
