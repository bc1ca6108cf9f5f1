use crate::config::{bool_or, string_list, string_or};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use wavecore::{Unit, UnitContext, UnitError, UnitId, UnitResult, UnitSpec};
use waveruntime::{ConfigField, UnitFactory, UnitMetadata};

/// Counts configured keywords in a text field of the input.
///
/// Confidence is the fraction of keywords found at least once.
pub struct KeywordUnit {
    id: UnitId,
    dependencies: Vec<UnitId>,
    field: String,
    keywords: Vec<String>,
    case_sensitive: bool,
}

impl KeywordUnit {
    fn count(&self, text: &str, keyword: &str) -> usize {
        if self.case_sensitive {
            text.matches(keyword).count()
        } else {
            text.to_lowercase().matches(&keyword.to_lowercase()).count()
        }
    }
}

#[async_trait]
impl Unit for KeywordUnit {
    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> &[UnitId] {
        &self.dependencies
    }

    fn can_handle(&self, ctx: &UnitContext) -> bool {
        ctx.input_field(&self.field).map_or(false, Value::is_string)
    }

    async fn execute(&self, ctx: UnitContext) -> Result<UnitResult, UnitError> {
        let text = ctx
            .input_field(&self.field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| UnitError::ContextIncompatible(self.id.clone()))?;

        let mut matches = Map::new();
        let mut matched = 0;
        for keyword in &self.keywords {
            let hits = self.count(text, keyword);
            if hits > 0 {
                matched += 1;
            }
            matches.insert(keyword.clone(), json!(hits));
        }

        let confidence = matched as f64 / self.keywords.len() as f64;
        ctx.events.progress(
            100.0,
            Some(format!("{}/{} keywords matched", matched, self.keywords.len())),
        );

        Ok(UnitResult::new(confidence).with_payload(json!({
            "matches": matches,
            "matched": matched,
            "total": self.keywords.len(),
        })))
    }
}

pub struct KeywordUnitFactory;

impl UnitFactory for KeywordUnitFactory {
    fn create(&self, spec: &UnitSpec) -> Result<Arc<dyn Unit>, UnitError> {
        Ok(Arc::new(KeywordUnit {
            id: spec.id.clone(),
            dependencies: spec.dependencies.clone(),
            field: string_or(&spec.config, "field", "text"),
            keywords: string_list(&spec.config, "keywords")?,
            case_sensitive: bool_or(&spec.config, "case_sensitive", false),
        }))
    }

    fn unit_type(&self) -> &str {
        "text.keywords"
    }

    fn metadata(&self) -> UnitMetadata {
        UnitMetadata {
            description: "Scores input text by keyword coverage".to_string(),
            category: "text".to_string(),
            config: vec![
                ConfigField::new("keywords", "Keywords to look for", true),
                ConfigField::new("field", "Input field holding the text (default \"text\")", false),
                ConfigField::new("case_sensitive", "Match case exactly (default false)", false),
            ],
        }
    }
}
