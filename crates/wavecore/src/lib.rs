//! Core abstractions for the wave orchestrator
//!
//! This crate provides the unit contract, the data model shared by the
//! planner and the orchestrator, and the event types. It does no scheduling.

mod error;
pub mod events;
mod manifest;
pub mod outcome;
mod plan;
mod unit;

pub use error::{OrchestrationError, PlanError, RegistryError, StoreError, UnitError};
pub use events::{EventBus, EventEmitter, OrchestrationEvent, UnitEvent};
pub use manifest::{Manifest, OrchestratorConfig, UnitSpec, DEFAULT_TIMEOUT_MS};
pub use outcome::{
    ErrorKind, OrchestrationResult, RunStatus, SkipReason, UnitErrorRecord, UnitExecution,
    UnitStatus,
};
pub use plan::{ExecutionPlan, Wave};
pub use unit::{ResultMetadata, ResultSnapshot, Unit, UnitContext, UnitId, UnitResult, WAVE_OPTION};

/// Correlation id for a single orchestration run
pub type RunId = uuid::Uuid;
