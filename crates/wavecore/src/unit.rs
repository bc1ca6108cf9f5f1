use crate::{events::EventEmitter, RunId, UnitError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub type UnitId = String;

/// Completed results visible to a unit, keyed by unit id.
pub type ResultSnapshot = HashMap<UnitId, Arc<UnitResult>>;

/// Option key under which the orchestrator publishes the current wave index.
pub const WAVE_OPTION: &str = "wave";

/// Core trait that every analysis unit implements
#[async_trait]
pub trait Unit: Send + Sync {
    /// Stable identifier, unique within a registry
    fn id(&self) -> &str;

    /// Ids of the units whose results this unit reads
    fn dependencies(&self) -> &[UnitId];

    /// Whether the unit can run against this context.
    ///
    /// Returning `false` fails the unit with `UnitError::ContextIncompatible`;
    /// it is not treated as a skip.
    fn can_handle(&self, _ctx: &UnitContext) -> bool {
        true
    }

    /// Run the unit
    async fn execute(&self, ctx: UnitContext) -> Result<UnitResult, UnitError>;
}

/// Read-only view handed to a unit at run time.
///
/// Built fresh for every invocation from the result store snapshot taken at
/// the start of the unit's wave.
#[derive(Clone)]
pub struct UnitContext {
    /// Correlation id for the whole run
    pub run_id: RunId,

    /// Id of the unit being invoked
    pub unit_id: UnitId,

    /// Input payload shared by every unit in the run
    pub input: Arc<Value>,

    /// Results of every unit completed in earlier waves
    pub results: Arc<ResultSnapshot>,

    /// Free-form per-run options (always contains `"wave"`)
    pub options: HashMap<String, Value>,

    /// Event emitter for unit-level progress updates
    pub events: EventEmitter,

    /// Cancelled by the orchestrator when the unit's timeout fires.
    /// Units that ignore it keep running detached until they return.
    pub cancellation: CancellationToken,
}

impl UnitContext {
    pub fn new(run_id: RunId, unit_id: impl Into<UnitId>, input: Arc<Value>, events: EventEmitter) -> Self {
        Self {
            run_id,
            unit_id: unit_id.into(),
            input,
            results: Arc::new(HashMap::new()),
            options: HashMap::new(),
            events,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_results(mut self, results: Arc<ResultSnapshot>) -> Self {
        self.results = results;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Result of a completed upstream unit
    pub fn result(&self, unit_id: &str) -> Option<&UnitResult> {
        self.results.get(unit_id).map(|r| r.as_ref())
    }

    /// Get an upstream result or return error
    pub fn require_result(&self, unit_id: &str) -> Result<&UnitResult, UnitError> {
        self.result(unit_id)
            .ok_or_else(|| UnitError::MissingDependency(unit_id.to_string()))
    }

    /// Top-level field of the input payload, if the payload is an object
    pub fn input_field(&self, name: &str) -> Option<&Value> {
        self.input.get(name)
    }

    /// Wave index this invocation belongs to
    pub fn wave(&self) -> Option<usize> {
        self.options
            .get(WAVE_OPTION)
            .and_then(|v| v.as_u64())
            .map(|w| w as usize)
    }
}

/// Output of a unit. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitResult {
    /// Quality indicator, conventionally within 0.0..=1.0
    pub confidence: f64,

    /// Opaque payload, never inspected by the orchestrator
    pub payload: Value,

    pub metadata: ResultMetadata,
}

impl UnitResult {
    pub fn new(confidence: f64) -> Self {
        Self {
            confidence,
            payload: Value::Null,
            metadata: ResultMetadata::default(),
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.custom.insert(key.into(), value.into());
        self
    }
}

/// Metadata about unit execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub execution_time_ms: u64,
    pub custom: HashMap<String, Value>,
}
