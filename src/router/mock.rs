use std::sync::Mutex;

use async_trait::async_trait;

use super::RouterClient;
use crate::domain::{Domain, RouteDecision};

/// A programmed queue of route decisions, consumed in order. Falls back
/// to [`RouteDecision::disabled_default`] once exhausted, matching how a
/// real disabled router behaves rather than panicking mid-test.
pub struct MockRouterClient {
    decisions: Mutex<Vec<RouteDecision>>,
    call_log: Mutex<Vec<(Domain, String)>>,
}

impl MockRouterClient {
    pub fn new(decisions: Vec<RouteDecision>) -> Self {
        Self { decisions: Mutex::new(decisions), call_log: Mutex::new(Vec::new()) }
    }

    /// A client that behaves exactly like a disabled router: every call
    /// returns the conservative small-model default.
    pub fn disabled() -> Self {
        Self::new(Vec::new())
    }

    pub fn call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }
}

#[async_trait]
impl RouterClient for MockRouterClient {
    async fn route(&self, domain: Domain, task: &str, _context: Option<&serde_json::Value>) -> RouteDecision {
        self.call_log.lock().unwrap().push((domain, task.to_string()));

        let mut decisions = self.decisions.lock().unwrap();
        if decisions.is_empty() {
            RouteDecision::disabled_default()
        } else {
            decisions.remove(0)
        }
    }
}
