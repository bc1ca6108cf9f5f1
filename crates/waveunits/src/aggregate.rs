use async_trait::async_trait;
use serde_json::{json, Map};
use std::sync::Arc;
use wavecore::{Unit, UnitContext, UnitError, UnitId, UnitResult, UnitSpec};
use waveruntime::{UnitFactory, UnitMetadata};

/// Averages the confidence of its dependencies
pub struct ConfidenceAggregateUnit {
    id: UnitId,
    dependencies: Vec<UnitId>,
}

#[async_trait]
impl Unit for ConfidenceAggregateUnit {
    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> &[UnitId] {
        &self.dependencies
    }

    fn can_handle(&self, ctx: &UnitContext) -> bool {
        self.dependencies.iter().all(|d| ctx.result(d).is_some())
    }

    async fn execute(&self, ctx: UnitContext) -> Result<UnitResult, UnitError> {
        let mut sources = Map::new();
        let mut total = 0.0;
        for dependency in &self.dependencies {
            let confidence = ctx.require_result(dependency)?.confidence;
            total += confidence;
            sources.insert(dependency.clone(), json!(confidence));
        }

        let average = total / self.dependencies.len() as f64;
        Ok(UnitResult::new(average).with_payload(json!({
            "sources": sources,
            "average": average,
        })))
    }
}

pub struct ConfidenceAggregateUnitFactory;

impl UnitFactory for ConfidenceAggregateUnitFactory {
    fn create(&self, spec: &UnitSpec) -> Result<Arc<dyn Unit>, UnitError> {
        if spec.dependencies.is_empty() {
            return Err(UnitError::Configuration(
                "aggregate.confidence needs at least one dependency".to_string(),
            ));
        }
        Ok(Arc::new(ConfidenceAggregateUnit {
            id: spec.id.clone(),
            dependencies: spec.dependencies.clone(),
        }))
    }

    fn unit_type(&self) -> &str {
        "aggregate.confidence"
    }

    fn metadata(&self) -> UnitMetadata {
        UnitMetadata {
            description: "Averages dependency confidence".to_string(),
            category: "aggregate".to_string(),
            config: vec![],
        }
    }
}
