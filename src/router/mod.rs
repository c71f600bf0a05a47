mod client;
mod mock;

pub use client::HttpRouterClient;
pub use mock::MockRouterClient;

use async_trait::async_trait;

use crate::domain::{Domain, RouteDecision};

/// The single interface against the routing-classifier service (§4.2, §6).
///
/// Failure is never fatal to a run: every implementation degrades to
/// [`RouteDecision::disabled_default`] rather than returning an error —
/// there is deliberately no `Result` in this trait's signature.
#[async_trait]
pub trait RouterClient: Send + Sync {
    async fn route(&self, domain: Domain, task: &str, context: Option<&serde_json::Value>) -> RouteDecision;
}
