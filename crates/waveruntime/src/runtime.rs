use crate::executor::{Orchestrator, RunRequest};
use crate::observer::OrchestrationObserver;
use crate::planner::validate_plan;
use crate::registry::{UnitCatalog, UnitRegistry};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wavecore::{
    EventBus, ExecutionPlan, Manifest, OrchestrationError, OrchestrationEvent, OrchestrationResult,
    OrchestratorConfig, RunId,
};

/// Main entry point: a registry, its plan and an event bus bundled together
pub struct WaveRuntime {
    name: String,
    orchestrator: Orchestrator,
}

impl WaveRuntime {
    /// Instantiate a manifest's units through the catalog and plan them
    pub fn from_manifest(manifest: &Manifest, catalog: &UnitCatalog) -> Result<Self, OrchestrationError> {
        let registry = catalog.build_registry(manifest)?;
        let mut runtime = Self::with_registry(registry, RuntimeConfig {
            orchestrator: manifest.effective_config(),
            ..RuntimeConfig::default()
        })?;
        runtime.name = manifest.name.clone();
        Ok(runtime)
    }

    /// Create a runtime over a pre-built registry
    pub fn with_registry(registry: UnitRegistry, config: RuntimeConfig) -> Result<Self, OrchestrationError> {
        let registry = Arc::new(registry);
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        let orchestrator = Orchestrator::with_event_bus(Arc::clone(&registry), config.orchestrator, event_bus)?;
        validate_plan(orchestrator.plan(), &registry)?;

        Ok(Self {
            name: "unnamed".to_string(),
            orchestrator,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_observer(mut self, observer: Arc<dyn OrchestrationObserver>) -> Self {
        self.orchestrator.add_observer(observer);
        self
    }

    pub fn plan(&self) -> &ExecutionPlan {
        self.orchestrator.plan()
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub async fn execute(&self, input: Value, run_id: RunId) -> Result<OrchestrationResult, OrchestrationError> {
        self.orchestrator.execute(input, run_id).await
    }

    pub async fn execute_with_cancellation(
        &self,
        input: Value,
        run_id: RunId,
        cancellation: CancellationToken,
    ) -> Result<OrchestrationResult, OrchestrationError> {
        self.orchestrator
            .execute_with_cancellation(input, run_id, cancellation)
            .await
    }

    pub async fn execute_request(&self, request: RunRequest) -> Result<OrchestrationResult, OrchestrationError> {
        self.orchestrator.execute_request(request).await
    }

    /// Subscribe to orchestration events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<OrchestrationEvent> {
        self.orchestrator.subscribe_events()
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub orchestrator: OrchestratorConfig,
    pub event_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            event_buffer_size: 1000,
        }
    }
}
