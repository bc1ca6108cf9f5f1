use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use wavecore::{
    ExecutionPlan, OrchestrationResult, RunId, SkipReason, UnitErrorRecord, UnitExecution,
    UnitResult, Wave,
};

/// Per-wave tallies handed to `on_wave_complete`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveSummary {
    pub index: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
}

/// Caller-supplied lifecycle callbacks.
///
/// Callbacks run on the coordinating task and must return quickly. A panic
/// inside a callback is caught and logged; it never affects the run.
#[allow(unused_variables)]
pub trait OrchestrationObserver: Send + Sync {
    fn on_run_start(&self, run_id: RunId, plan: &ExecutionPlan) {}

    fn on_wave_start(&self, run_id: RunId, wave: &Wave) {}

    fn on_unit_start(&self, run_id: RunId, unit_id: &str, wave: usize) {}

    fn on_unit_complete(&self, run_id: RunId, result: &UnitResult, execution: &UnitExecution) {}

    fn on_unit_error(&self, run_id: RunId, error: &UnitErrorRecord) {}

    fn on_unit_skipped(&self, run_id: RunId, unit_id: &str, reason: &SkipReason) {}

    fn on_wave_complete(&self, run_id: RunId, summary: &WaveSummary) {}

    fn on_run_complete(&self, result: &OrchestrationResult) {}
}

/// Invoke a callback on every observer, containing panics
pub(crate) fn notify<F>(observers: &[Arc<dyn OrchestrationObserver>], callback: F)
where
    F: Fn(&dyn OrchestrationObserver),
{
    for observer in observers {
        if catch_unwind(AssertUnwindSafe(|| callback(observer.as_ref()))).is_err() {
            tracing::warn!("Orchestration observer panicked; ignoring");
        }
    }
}
