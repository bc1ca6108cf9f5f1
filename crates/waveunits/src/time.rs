use crate::config::u64_or;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use wavecore::{Unit, UnitContext, UnitError, UnitId, UnitResult, UnitSpec};
use waveruntime::{ConfigField, UnitFactory, UnitMetadata};

/// Waits for a fixed duration, stopping early when cancelled
pub struct DelayUnit {
    id: UnitId,
    dependencies: Vec<UnitId>,
    delay_ms: u64,
}

#[async_trait]
impl Unit for DelayUnit {
    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> &[UnitId] {
        &self.dependencies
    }

    async fn execute(&self, ctx: UnitContext) -> Result<UnitResult, UnitError> {
        ctx.events.info(format!("Delaying for {}ms", self.delay_ms));

        tokio::select! {
            _ = sleep(Duration::from_millis(self.delay_ms)) => {
                Ok(UnitResult::new(1.0).with_payload(json!({ "delayed_ms": self.delay_ms })))
            }
            _ = ctx.cancellation.cancelled() => {
                Err(UnitError::ExecutionFailed("delay cancelled".to_string()))
            }
        }
    }
}

pub struct DelayUnitFactory;

impl UnitFactory for DelayUnitFactory {
    fn create(&self, spec: &UnitSpec) -> Result<Arc<dyn Unit>, UnitError> {
        Ok(Arc::new(DelayUnit {
            id: spec.id.clone(),
            dependencies: spec.dependencies.clone(),
            delay_ms: u64_or(&spec.config, "delay_ms", 1000),
        }))
    }

    fn unit_type(&self) -> &str {
        "time.delay"
    }

    fn metadata(&self) -> UnitMetadata {
        UnitMetadata {
            description: "Delay for specified milliseconds".to_string(),
            category: "time".to_string(),
            config: vec![ConfigField::new("delay_ms", "Milliseconds to wait (default 1000)", false)],
        }
    }
}
