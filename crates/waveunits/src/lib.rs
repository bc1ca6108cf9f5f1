//! Standard unit library
//!
//! Generic built-in units for driving the orchestrator from a manifest

mod aggregate;
mod config;
mod debug;
mod text;
mod time;

pub use aggregate::{ConfidenceAggregateUnit, ConfidenceAggregateUnitFactory};
pub use debug::{EchoUnit, EchoUnitFactory, FailUnit, FailUnitFactory};
pub use text::{KeywordUnit, KeywordUnitFactory};
pub use time::{DelayUnit, DelayUnitFactory};
use waveruntime::UnitCatalog;

use std::sync::Arc;

/// Register all standard units with a catalog
pub fn register_all(catalog: &mut UnitCatalog) {
    catalog.register(Arc::new(EchoUnitFactory));
    catalog.register(Arc::new(FailUnitFactory));
    catalog.register(Arc::new(DelayUnitFactory));
    catalog.register(Arc::new(KeywordUnitFactory));
    catalog.register(Arc::new(ConfidenceAggregateUnitFactory));
}

/// Catalog preloaded with every standard unit
pub fn standard_catalog() -> UnitCatalog {
    let mut catalog = UnitCatalog::new();
    register_all(&mut catalog);
    catalog
}
