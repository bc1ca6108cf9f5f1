use crate::outcome::OrchestrationResult;
use crate::UnitId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestrationError {
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Run aborted after unit '{unit_id}' failed: {error}")]
    Aborted {
        unit_id: UnitId,
        error: UnitError,
        partial: Box<OrchestrationResult>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrchestrationError {
    /// Partial result attached to an aborted run, if any.
    pub fn partial_result(&self) -> Option<&OrchestrationResult> {
        match self {
            OrchestrationError::Aborted { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

/// Failure of a single unit during a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Unit '{0}' cannot handle the given context")]
    ContextIncompatible(UnitId),

    #[error("Missing result from dependency: {0}")]
    MissingDependency(UnitId),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unit panicked: {0}")]
    Panicked(String),
}

impl UnitError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, UnitError::Timeout { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Unit '{unit}' depends on unknown unit '{dependency}'")]
    UnknownDependency { unit: UnitId, dependency: UnitId },

    #[error("Cyclic dependency detected among units: {}", .units.join(", "))]
    CyclicDependency { units: Vec<UnitId> },

    #[error("Unit '{0}' appears more than once in the plan")]
    DuplicateUnit(UnitId),

    #[error("Unit '{0}' is registered but missing from the plan")]
    MissingUnit(UnitId),

    #[error("Unit '{unit}' is scheduled in wave {wave} but its dependency '{dependency}' is in wave {dependency_wave}")]
    InvalidOrdering {
        unit: UnitId,
        wave: usize,
        dependency: UnitId,
        dependency_wave: usize,
    },

    #[error("max_parallelism must be at least 1")]
    ZeroParallelism,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Unit already registered: {0}")]
    DuplicateUnit(UnitId),

    #[error("Unknown unit type: {0}")]
    UnknownUnitType(String),

    #[error("Failed to create unit '{unit}': {source}")]
    Creation {
        unit: UnitId,
        #[source]
        source: UnitError,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Result for unit '{0}' has already been stored")]
    AlreadySet(UnitId),
}
