//! Wave execution runtime
//!
//! This crate plans a unit registry into dependency waves and executes them
//! concurrently, sharing completed results through a write-once store.

mod executor;
mod observer;
mod planner;
mod registry;
mod runtime;
mod store;

pub use executor::{Orchestrator, RunRequest};
pub use observer::{OrchestrationObserver, WaveSummary};
pub use planner::{build_plan, build_plan_from, validate_plan};
pub use registry::{ConfigField, UnitCatalog, UnitFactory, UnitMetadata, UnitRegistry};
pub use runtime::{RuntimeConfig, WaveRuntime};
pub use store::ResultStore;
