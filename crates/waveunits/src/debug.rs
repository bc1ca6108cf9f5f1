use crate::config::{f64_or, string_or};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use wavecore::{Unit, UnitContext, UnitError, UnitId, UnitResult, UnitSpec};
use waveruntime::{ConfigField, UnitFactory, UnitMetadata};

/// Returns the input payload, or one field of it
pub struct EchoUnit {
    id: UnitId,
    dependencies: Vec<UnitId>,
    field: Option<String>,
    confidence: f64,
}

#[async_trait]
impl Unit for EchoUnit {
    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> &[UnitId] {
        &self.dependencies
    }

    async fn execute(&self, ctx: UnitContext) -> Result<UnitResult, UnitError> {
        let payload = match &self.field {
            Some(field) => ctx.input_field(field).cloned().unwrap_or(Value::Null),
            None => ctx.input.as_ref().clone(),
        };

        ctx.events.info(format!("echo: {}", payload));

        Ok(UnitResult::new(self.confidence).with_payload(payload))
    }
}

pub struct EchoUnitFactory;

impl UnitFactory for EchoUnitFactory {
    fn create(&self, spec: &UnitSpec) -> Result<Arc<dyn Unit>, UnitError> {
        Ok(Arc::new(EchoUnit {
            id: spec.id.clone(),
            dependencies: spec.dependencies.clone(),
            field: spec.config.get("field").and_then(|v| v.as_str()).map(str::to_string),
            confidence: f64_or(&spec.config, "confidence", 1.0),
        }))
    }

    fn unit_type(&self) -> &str {
        "debug.echo"
    }

    fn metadata(&self) -> UnitMetadata {
        UnitMetadata {
            description: "Returns the input payload unchanged".to_string(),
            category: "debug".to_string(),
            config: vec![
                ConfigField::new("field", "Only echo this top-level input field", false),
                ConfigField::new("confidence", "Confidence to report (default 1.0)", false),
            ],
        }
    }
}

/// Always fails; handy for exercising failure propagation
pub struct FailUnit {
    id: UnitId,
    dependencies: Vec<UnitId>,
    message: String,
}

#[async_trait]
impl Unit for FailUnit {
    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> &[UnitId] {
        &self.dependencies
    }

    async fn execute(&self, _ctx: UnitContext) -> Result<UnitResult, UnitError> {
        Err(UnitError::ExecutionFailed(self.message.clone()))
    }
}

pub struct FailUnitFactory;

impl UnitFactory for FailUnitFactory {
    fn create(&self, spec: &UnitSpec) -> Result<Arc<dyn Unit>, UnitError> {
        Ok(Arc::new(FailUnit {
            id: spec.id.clone(),
            dependencies: spec.dependencies.clone(),
            message: string_or(&spec.config, "message", "forced failure"),
        }))
    }

    fn unit_type(&self) -> &str {
        "debug.fail"
    }

    fn metadata(&self) -> UnitMetadata {
        UnitMetadata {
            description: "Fails every time it runs".to_string(),
            category: "debug".to_string(),
            config: vec![ConfigField::new("message", "Error message to report", false)],
        }
    }
}
