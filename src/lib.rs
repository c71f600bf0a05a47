//! Multi-agent LLM task orchestrator: DAG decomposition, routed subtask
//! execution, contradiction checking, and refinement synthesis.
//!
//! Initialize logging once, near the top of your binary's `main`, before
//! constructing an [`Orchestrator`]:
//!
//! ```no_run
//! tracing_subscriber::fmt()
//!     .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
//!     .init();
//! ```
//!
//! Every client call and scheduler transition in this crate logs through
//! `tracing`; run with `RUST_LOG=orchestrator=debug` for per-field detail.

pub mod config;
pub mod contradiction;
pub mod decomposer;
pub mod domain;
pub mod error;
pub mod executor;
pub mod facts;
pub mod llm;
pub mod metrics;
pub mod orchestrator;
pub mod router;
pub mod scheduler;
pub mod synthesizer;

// Convenience re-exports at crate root
pub use config::{ConfigStore, DomainConfig};
pub use contradiction::{check_contradictions, Contradiction, ContradictionKind, ContradictionReport};
pub use decomposer::Decomposer;
pub use domain::{CallUsage, DagValidationError, Domain, ModelSize, RouteDecision, SubTask, SubTaskResult, SubtaskStatus, TaskDag};
pub use error::OrchestratorError;
pub use executor::SubtaskExecutor;
pub use facts::{extract_immutable_facts, validate_agent_output, ImmutableFacts, Severity, Violation, ViolationKind};
pub use llm::{GenerateRequest, GenerateResponse, HttpLlmClient, LlmClient, MockLlmClient};
pub use metrics::{CallerClass, MetricsCollector, RunMetrics, RunMetricsClass};
pub use orchestrator::{merge_for_display, Orchestrator, ProcessOutcome};
pub use router::{HttpRouterClient, MockRouterClient, RouterClient};
pub use scheduler::DagScheduler;
pub use synthesizer::{SynthesisOutcome, Synthesizer};
