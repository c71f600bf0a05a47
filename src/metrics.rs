use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::domain::CallUsage;

/// Which component issued a call, for per-class aggregation (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallerClass {
    Decomposer,
    Routing,
    Worker,
    Synthesizer,
}

impl CallerClass {
    /// Parameter count in billions, for the FLOPs formula in §4.8.
    fn param_count_billions(self) -> f64 {
        match self {
            CallerClass::Decomposer => 8.0,
            CallerClass::Routing => 1.0,
            CallerClass::Synthesizer => 8.0,
            // Worker is charged by the size it was actually routed to,
            // not a fixed per-class value — see `record_worker_call`.
            CallerClass::Worker => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct ClassTotals {
    calls: u64,
    usage: CallUsage,
    tflops: f64,
}

/// Accumulated counters for one run. Reset at the start of every `process`
/// call (§4.8); returned to the caller as part of `ProcessOutcome`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    pub decomposer: RunMetricsClass,
    pub routing: RunMetricsClass,
    pub worker: RunMetricsClass,
    pub synthesizer: RunMetricsClass,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunMetricsClass {
    pub calls: u64,
    pub total_tokens: u64,
    pub tflops: f64,
}

impl RunMetrics {
    pub fn total_tokens(&self) -> u64 {
        self.decomposer.total_tokens + self.routing.total_tokens + self.worker.total_tokens + self.synthesizer.total_tokens
    }

    pub fn total_tflops(&self) -> f64 {
        self.decomposer.tflops + self.routing.tflops + self.worker.tflops + self.synthesizer.tflops
    }
}

/// FLOPs = 2 × parameter_count_billions × 1e9 × total_tokens, reported in
/// TFLOPs (§4.8). Written from many concurrent DAG-scheduler tasks, so
/// every mutation goes through a single mutex — matches the "atomic adds
/// or a mutex" guidance in §5.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    decomposer: Mutex<ClassTotals>,
    routing: Mutex<ClassTotals>,
    worker: Mutex<ClassTotals>,
    synthesizer: Mutex<ClassTotals>,
}

fn flops_tflops(param_count_billions: f64, total_tokens: u32) -> f64 {
    (2.0 * param_count_billions * 1e9 * total_tokens as f64) / 1e12
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, class: CallerClass) -> &Mutex<ClassTotals> {
        match class {
            CallerClass::Decomposer => &self.decomposer,
            CallerClass::Routing => &self.routing,
            CallerClass::Worker => &self.worker,
            CallerClass::Synthesizer => &self.synthesizer,
        }
    }

    /// Records a call for decomposer/routing/synthesizer classes, whose
    /// parameter count is fixed.
    pub fn record(&self, class: CallerClass, usage: CallUsage) {
        let tflops = flops_tflops(class.param_count_billions(), usage.total_tokens);
        let mut bucket = self.bucket(class).lock().unwrap();
        bucket.calls += 1;
        bucket.usage.prompt_tokens += usage.prompt_tokens;
        bucket.usage.completion_tokens += usage.completion_tokens;
        bucket.usage.total_tokens += usage.total_tokens;
        bucket.tflops += tflops;
    }

    /// Records a worker call, whose parameter count depends on which
    /// model size the subtask was routed to.
    pub fn record_worker_call(&self, param_count_billions: f64, usage: CallUsage) {
        let tflops = flops_tflops(param_count_billions, usage.total_tokens);
        let mut bucket = self.worker.lock().unwrap();
        bucket.calls += 1;
        bucket.usage.prompt_tokens += usage.prompt_tokens;
        bucket.usage.completion_tokens += usage.completion_tokens;
        bucket.usage.total_tokens += usage.total_tokens;
        bucket.tflops += tflops;
    }

    pub fn snapshot(&self) -> RunMetrics {
        let to_class = |m: &Mutex<ClassTotals>| {
            let t = m.lock().unwrap();
            RunMetricsClass { calls: t.calls, total_tokens: t.usage.total_tokens as u64, tflops: t.tflops }
        };
        RunMetrics {
            decomposer: to_class(&self.decomposer),
            routing: to_class(&self.routing),
            worker: to_class(&self.worker),
            synthesizer: to_class(&self.synthesizer),
        }
    }
}
