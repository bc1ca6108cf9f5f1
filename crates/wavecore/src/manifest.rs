use crate::UnitId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Declarative description of a unit registry plus its run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub units: Vec<UnitSpec>,
    #[serde(default)]
    pub settings: OrchestratorConfig,
}

impl Manifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            units: Vec::new(),
            settings: OrchestratorConfig::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn add_unit(&mut self, unit: UnitSpec) -> &mut Self {
        self.units.push(unit);
        self
    }

    pub fn find_unit(&self, id: &str) -> Option<&UnitSpec> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Run settings with per-unit `timeout_ms` folded into `unit_timeouts`.
    /// Entries already present in `settings.unit_timeouts` win.
    pub fn effective_config(&self) -> OrchestratorConfig {
        let mut config = self.settings.clone();
        for unit in &self.units {
            if let Some(ms) = unit.timeout_ms {
                config.unit_timeouts.entry(unit.id.clone()).or_insert(ms);
            }
        }
        config
    }
}

/// One unit entry in a manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSpec {
    pub id: UnitId,
    #[serde(rename = "type")]
    pub unit_type: String,
    #[serde(default)]
    pub dependencies: Vec<UnitId>,
    #[serde(default)]
    pub config: HashMap<String, Value>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl UnitSpec {
    pub fn new(id: impl Into<UnitId>, unit_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            unit_type: unit_type.into(),
            dependencies: Vec::new(),
            config: HashMap::new(),
            timeout_ms: None,
        }
    }

    pub fn depends_on(mut self, dependency: impl Into<UnitId>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Settings governing a single orchestration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Per-unit ceiling applied when no override exists
    pub default_timeout_ms: u64,

    /// Record failures and keep going instead of aborting the run
    pub continue_on_error: bool,

    /// Maximum units launched per wave; `None` is unbounded.
    ///
    /// Runnable units beyond the ceiling are *skipped* for the run with
    /// `SkipReason::ParallelismLimit`, not queued for later, and their
    /// dependants are skipped with the same reason. `Some(0)` is rejected
    /// when the orchestrator is built.
    pub max_parallelism: Option<usize>,

    /// Timeout overrides keyed by unit id
    pub unit_timeouts: HashMap<UnitId, u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            continue_on_error: true,
            max_parallelism: None,
            unit_timeouts: HashMap::new(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_default_timeout(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_max_parallelism(mut self, max: usize) -> Self {
        self.max_parallelism = Some(max);
        self
    }

    pub fn with_unit_timeout(mut self, unit_id: impl Into<UnitId>, timeout_ms: u64) -> Self {
        self.unit_timeouts.insert(unit_id.into(), timeout_ms);
        self
    }

    pub fn timeout_ms_for(&self, unit_id: &str) -> u64 {
        self.unit_timeouts
            .get(unit_id)
            .copied()
            .unwrap_or(self.default_timeout_ms)
    }

    pub fn timeout_for(&self, unit_id: &str) -> Duration {
        Duration::from_millis(self.timeout_ms_for(unit_id))
    }
}
