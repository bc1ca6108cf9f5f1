use crate::observer::{notify, OrchestrationObserver, WaveSummary};
use crate::planner::build_plan;
use crate::registry::UnitRegistry;
use crate::store::ResultStore;
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinError;
use tokio::time::{timeout_at, Duration};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use wavecore::{
    EventBus, ExecutionPlan, OrchestrationError, OrchestrationEvent, OrchestrationResult,
    OrchestratorConfig, PlanError, ResultSnapshot, RunId, RunStatus, SkipReason, Unit, UnitContext,
    UnitError, UnitErrorRecord, UnitExecution, UnitId, UnitResult, UnitStatus, WAVE_OPTION,
};

/// Everything needed to start one run
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub input: Value,
    pub run_id: RunId,
    pub options: HashMap<String, Value>,
    pub cancellation: CancellationToken,
}

impl RunRequest {
    pub fn new(input: Value) -> Self {
        Self {
            input,
            run_id: Uuid::new_v4(),
            options: HashMap::new(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    /// Extra option passed to every unit context. `"wave"` is reserved.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
}

/// Executes a unit registry wave by wave.
///
/// The plan is computed once at construction. Within a wave every runnable
/// unit is spawned at once and the wave is joined before the next one starts,
/// so a unit only ever sees results from earlier waves.
pub struct Orchestrator {
    registry: Arc<UnitRegistry>,
    plan: ExecutionPlan,
    config: OrchestratorConfig,
    observers: Vec<Arc<dyn OrchestrationObserver>>,
    event_bus: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(registry: UnitRegistry, config: OrchestratorConfig) -> Result<Self, PlanError> {
        Self::with_event_bus(Arc::new(registry), config, Arc::new(EventBus::default()))
    }

    pub fn with_event_bus(
        registry: Arc<UnitRegistry>,
        config: OrchestratorConfig,
        event_bus: Arc<EventBus>,
    ) -> Result<Self, PlanError> {
        if config.max_parallelism == Some(0) {
            return Err(PlanError::ZeroParallelism);
        }
        let plan = build_plan(&registry)?;

        for unit_id in config.unit_timeouts.keys() {
            if !registry.contains(unit_id) {
                tracing::warn!(unit_id = %unit_id, "Timeout override for unknown unit");
            }
        }

        Ok(Self {
            registry,
            plan,
            config,
            observers: Vec::new(),
            event_bus,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn OrchestrationObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn add_observer(&mut self, observer: Arc<dyn OrchestrationObserver>) {
        self.observers.push(observer);
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &UnitRegistry {
        &self.registry
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<OrchestrationEvent> {
        self.event_bus.subscribe()
    }

    /// Run every unit against `input`
    pub async fn execute(
        &self,
        input: Value,
        run_id: RunId,
    ) -> Result<OrchestrationResult, OrchestrationError> {
        self.execute_request(RunRequest::new(input).with_run_id(run_id))
            .await
    }

    /// Run with an external cancellation token.
    ///
    /// Cancellation stops scheduling at the next wave boundary; units already
    /// running are allowed to finish.
    pub async fn execute_with_cancellation(
        &self,
        input: Value,
        run_id: RunId,
        cancellation: CancellationToken,
    ) -> Result<OrchestrationResult, OrchestrationError> {
        self.execute_request(
            RunRequest::new(input)
                .with_run_id(run_id)
                .with_cancellation(cancellation),
        )
        .await
    }

    pub async fn execute_request(
        &self,
        request: RunRequest,
    ) -> Result<OrchestrationResult, OrchestrationError> {
        let RunRequest {
            input,
            run_id,
            options,
            cancellation,
        } = request;

        let started_at = Utc::now();
        let start_time = Instant::now();
        let input = Arc::new(input);
        let store = ResultStore::new();
        let mut state = RunState::new(&self.plan);
        let mut abort: Option<(UnitId, UnitError)> = None;
        let mut cancelled = false;

        tracing::info!(
            run_id = %run_id,
            units = self.registry.len(),
            waves = self.plan.len(),
            "Starting orchestration run"
        );
        self.event_bus.emit(OrchestrationEvent::RunStarted {
            run_id,
            unit_count: self.registry.len(),
            wave_count: self.plan.len(),
            timestamp: started_at,
        });
        notify(&self.observers, |o| o.on_run_start(run_id, &self.plan));

        for wave in self.plan.waves() {
            if cancellation.is_cancelled() {
                tracing::warn!(run_id = %run_id, wave = wave.index, "Run cancelled; no further waves scheduled");
                cancelled = true;
                break;
            }

            state.current_wave = wave.index;
            let wave_start = Instant::now();
            let before = state.tally();

            tracing::info!(run_id = %run_id, wave = wave.index, units = wave.len(), "Wave started");
            self.event_bus.emit(OrchestrationEvent::WaveStarted {
                run_id,
                wave: wave.index,
                units: wave.units.clone(),
                timestamp: Utc::now(),
            });
            notify(&self.observers, |o| o.on_wave_start(run_id, wave));

            // Partition into runnable units and units poisoned by an upstream failure
            let mut runnable: Vec<Arc<dyn Unit>> = Vec::new();
            for unit in wave.units.iter().filter_map(|id| self.registry.get(id)) {
                match state.blocking_dependency(unit.dependencies()) {
                    // Work dropped by the ceiling takes its dependants with it
                    Some(dependency) if state.capped.contains(dependency) => {
                        self.skip(&mut state, run_id, unit.id(), SkipReason::ParallelismLimit);
                    }
                    Some(dependency) => {
                        let reason = SkipReason::DependencyFailed {
                            dependency: dependency.clone(),
                        };
                        self.skip(&mut state, run_id, unit.id(), reason);
                    }
                    None => runnable.push(Arc::clone(unit)),
                }
            }

            // Excess units are dropped for this run rather than queued
            if let Some(max) = self.config.max_parallelism {
                if runnable.len() > max {
                    let excess = runnable.split_off(max);
                    tracing::warn!(
                        run_id = %run_id,
                        wave = wave.index,
                        max_parallelism = max,
                        skipped = excess.len(),
                        "Wave exceeds parallelism ceiling; skipping excess units"
                    );
                    for unit in excess {
                        self.skip(&mut state, run_id, unit.id(), SkipReason::ParallelismLimit);
                    }
                }
            }

            let snapshot = Arc::new(store.get_all_results());
            let mut in_flight = FuturesUnordered::new();

            for unit in runnable {
                let unit_id = unit.id().to_string();
                let ctx = self.build_context(run_id, &unit_id, &input, &snapshot, &options, wave.index);
                let timeout_ms = self.config.timeout_ms_for(&unit_id);

                state.mark_running(&unit_id);
                tracing::debug!(run_id = %run_id, unit_id = %unit_id, wave = wave.index, timeout_ms, "Unit started");
                self.event_bus.emit(OrchestrationEvent::UnitStarted {
                    run_id,
                    unit_id: unit_id.clone(),
                    wave: wave.index,
                    timestamp: Utc::now(),
                });
                notify(&self.observers, |o| o.on_unit_start(run_id, &unit_id, wave.index));

                in_flight.push(launch(unit, ctx, timeout_ms));
            }

            // Wave barrier: drain every launched unit before moving on
            while let Some(outcome) = in_flight.next().await {
                let UnitOutcome {
                    unit_id,
                    started_at,
                    duration_ms,
                    result,
                } = outcome;

                match result {
                    Ok(mut result) => {
                        result.metadata.execution_time_ms = duration_ms;
                        let execution = state.mark_completed(&unit_id, started_at, duration_ms);

                        tracing::info!("Unit {} completed in {}ms", unit_id, duration_ms);
                        self.event_bus.emit(OrchestrationEvent::UnitCompleted {
                            run_id,
                            unit_id: unit_id.clone(),
                            confidence: result.confidence,
                            duration_ms,
                            timestamp: Utc::now(),
                        });
                        notify(&self.observers, |o| o.on_unit_complete(run_id, &result, &execution));

                        if let Err(e) = store.set_result(unit_id, result) {
                            tracing::error!(run_id = %run_id, "Result store rejected write: {}", e);
                        }
                    }
                    Err(error) => {
                        let record = state.mark_failed(&unit_id, started_at, duration_ms, &error);

                        tracing::error!(run_id = %run_id, unit_id = %unit_id, wave = wave.index, "Unit failed: {}", error);
                        self.event_bus.emit(OrchestrationEvent::UnitFailed {
                            run_id,
                            unit_id: unit_id.clone(),
                            error: error.to_string(),
                            timed_out: error.is_timeout(),
                            timestamp: Utc::now(),
                        });
                        notify(&self.observers, |o| o.on_unit_error(run_id, &record));

                        if !self.config.continue_on_error && abort.is_none() {
                            abort = Some((unit_id, error));
                        }
                    }
                }
            }

            let after = state.tally();
            let summary = WaveSummary {
                index: wave.index,
                completed: after.0 - before.0,
                failed: after.1 - before.1,
                skipped: after.2 - before.2,
                duration_ms: wave_start.elapsed().as_millis() as u64,
            };
            tracing::info!(
                run_id = %run_id,
                wave = wave.index,
                completed = summary.completed,
                failed = summary.failed,
                skipped = summary.skipped,
                duration_ms = summary.duration_ms,
                "Wave settled"
            );
            self.event_bus.emit(OrchestrationEvent::WaveCompleted {
                run_id,
                wave: summary.index,
                completed: summary.completed,
                failed: summary.failed,
                skipped: summary.skipped,
                duration_ms: summary.duration_ms,
                timestamp: Utc::now(),
            });
            notify(&self.observers, |o| o.on_wave_complete(run_id, &summary));

            if abort.is_some() {
                break;
            }
        }

        // Anything still pending was never scheduled
        let leftover_reason = if abort.is_some() {
            SkipReason::Aborted
        } else {
            SkipReason::Cancelled
        };
        for unit_id in state.pending_units() {
            self.skip(&mut state, run_id, &unit_id, leftover_reason.clone());
        }

        let status = if abort.is_some() {
            RunStatus::Aborted
        } else if cancelled {
            RunStatus::Cancelled
        } else if state.failed.is_empty() {
            RunStatus::Succeeded
        } else {
            RunStatus::PartialFailure
        };

        let total_duration_ms = start_time.elapsed().as_millis() as u64;
        let result = OrchestrationResult {
            run_id,
            status,
            success: status == RunStatus::Succeeded,
            results: store
                .get_all_results()
                .into_iter()
                .map(|(id, result)| (id, Arc::unwrap_or_clone(result)))
                .collect(),
            completed_count: state.completed.len(),
            failed_count: state.failed.len(),
            skipped_count: state.skipped.len(),
            executions: state.executions,
            plan: self.plan.clone(),
            errors: state.errors,
            started_at,
            finished_at: Utc::now(),
            total_duration_ms,
        };

        tracing::info!(
            run_id = %run_id,
            status = ?status,
            completed = result.completed_count,
            failed = result.failed_count,
            skipped = result.skipped_count,
            duration_ms = total_duration_ms,
            "Orchestration run finished"
        );
        self.event_bus.emit(OrchestrationEvent::RunCompleted {
            run_id,
            status,
            duration_ms: total_duration_ms,
            timestamp: Utc::now(),
        });
        notify(&self.observers, |o| o.on_run_complete(&result));

        match abort {
            Some((unit_id, error)) => Err(OrchestrationError::Aborted {
                unit_id,
                error,
                partial: Box::new(result),
            }),
            None => Ok(result),
        }
    }

    fn build_context(
        &self,
        run_id: RunId,
        unit_id: &str,
        input: &Arc<Value>,
        snapshot: &Arc<ResultSnapshot>,
        options: &HashMap<String, Value>,
        wave: usize,
    ) -> UnitContext {
        let mut ctx = UnitContext::new(
            run_id,
            unit_id,
            Arc::clone(input),
            self.event_bus.create_emitter(run_id, unit_id.to_string()),
        )
        .with_results(Arc::clone(snapshot));
        ctx.options = options.clone();
        ctx.with_option(WAVE_OPTION, wave)
    }

    fn skip(&self, state: &mut RunState, run_id: RunId, unit_id: &str, reason: SkipReason) {
        tracing::debug!(run_id = %run_id, unit_id = %unit_id, reason = ?reason, "Unit skipped");
        state.mark_skipped(unit_id, reason.clone());
        self.event_bus.emit(OrchestrationEvent::UnitSkipped {
            run_id,
            unit_id: unit_id.to_string(),
            reason: reason.clone(),
            timestamp: Utc::now(),
        });
        notify(&self.observers, |o| o.on_unit_skipped(run_id, unit_id, &reason));
    }
}

/// Mutable bookkeeping for one run, owned by the coordinating task
struct RunState {
    completed: HashSet<UnitId>,
    failed: HashSet<UnitId>,
    skipped: HashSet<UnitId>,
    /// Skipped by the parallelism ceiling, directly or through a dependency
    capped: HashSet<UnitId>,
    errors: Vec<UnitErrorRecord>,
    executions: HashMap<UnitId, UnitExecution>,
    current_wave: usize,
}

impl RunState {
    fn new(plan: &ExecutionPlan) -> Self {
        let executions = plan
            .waves()
            .iter()
            .flat_map(|wave| {
                wave.units
                    .iter()
                    .map(move |id| (id.clone(), UnitExecution::pending(id.clone(), wave.index)))
            })
            .collect();

        Self {
            completed: HashSet::new(),
            failed: HashSet::new(),
            skipped: HashSet::new(),
            capped: HashSet::new(),
            errors: Vec::new(),
            executions,
            current_wave: 0,
        }
    }

    /// First dependency that did not complete, if any
    fn blocking_dependency<'a>(&self, dependencies: &'a [UnitId]) -> Option<&'a UnitId> {
        dependencies.iter().find(|d| !self.completed.contains(*d))
    }

    fn tally(&self) -> (usize, usize, usize) {
        (self.completed.len(), self.failed.len(), self.skipped.len())
    }

    /// Pending units in plan order
    fn pending_units(&self) -> Vec<UnitId> {
        let mut pending: Vec<&UnitExecution> = self
            .executions
            .values()
            .filter(|e| e.status == UnitStatus::Pending)
            .collect();
        pending.sort_by(|a, b| a.wave.cmp(&b.wave).then_with(|| a.unit_id.cmp(&b.unit_id)));
        pending.into_iter().map(|e| e.unit_id.clone()).collect()
    }

    fn execution_mut(&mut self, unit_id: &str) -> &mut UnitExecution {
        let wave = self.current_wave;
        self.executions
            .entry(unit_id.to_string())
            .or_insert_with(|| UnitExecution::pending(unit_id, wave))
    }

    fn mark_running(&mut self, unit_id: &str) {
        let execution = self.execution_mut(unit_id);
        execution.status = UnitStatus::Running;
        execution.started_at = Some(Utc::now());
    }

    fn mark_completed(&mut self, unit_id: &str, started_at: DateTime<Utc>, duration_ms: u64) -> UnitExecution {
        self.completed.insert(unit_id.to_string());
        let execution = self.execution_mut(unit_id);
        execution.status = UnitStatus::Completed;
        execution.started_at = Some(started_at);
        execution.finished_at = Some(Utc::now());
        execution.duration_ms = Some(duration_ms);
        execution.clone()
    }

    fn mark_failed(
        &mut self,
        unit_id: &str,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        error: &UnitError,
    ) -> UnitErrorRecord {
        self.failed.insert(unit_id.to_string());
        let execution = self.execution_mut(unit_id);
        execution.status = UnitStatus::Failed;
        execution.started_at = Some(started_at);
        execution.finished_at = Some(Utc::now());
        execution.duration_ms = Some(duration_ms);
        execution.error = Some(error.to_string());

        let record = UnitErrorRecord::new(unit_id, self.current_wave, error);
        self.errors.push(record.clone());
        record
    }

    fn mark_skipped(&mut self, unit_id: &str, reason: SkipReason) {
        self.skipped.insert(unit_id.to_string());
        if reason == SkipReason::ParallelismLimit {
            self.capped.insert(unit_id.to_string());
        }
        let execution = self.execution_mut(unit_id);
        execution.status = UnitStatus::Skipped;
        execution.skip_reason = Some(reason);
    }
}

struct UnitOutcome {
    unit_id: UnitId,
    started_at: DateTime<Utc>,
    duration_ms: u64,
    result: Result<UnitResult, UnitError>,
}

/// Spawn a unit and race it against its timeout.
///
/// The task is spawned immediately and the deadline fixed now. On timeout the
/// unit's cancellation token is cancelled and its task is detached: a unit
/// that ignores the token keeps running until it returns, but is no longer
/// awaited.
fn launch(unit: Arc<dyn Unit>, ctx: UnitContext, timeout_ms: u64) -> impl Future<Output = UnitOutcome> {
    let unit_id = unit.id().to_string();
    let cancellation = ctx.cancellation.clone();
    let started_at = Utc::now();
    let start = Instant::now();
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);

    let handle = tokio::spawn(async move {
        if !unit.can_handle(&ctx) {
            return Err(UnitError::ContextIncompatible(unit.id().to_string()));
        }
        unit.execute(ctx).await
    });

    async move {
        let result = match timeout_at(deadline, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(UnitError::Panicked(panic_message(join_error))),
            Err(_) => {
                cancellation.cancel();
                Err(UnitError::Timeout { timeout_ms })
            }
        };

        UnitOutcome {
            unit_id,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            result,
        }
    }
}

fn panic_message(error: JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    let payload = error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
