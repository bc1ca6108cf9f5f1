use serde_json::Value;
use std::collections::HashMap;
use wavecore::UnitError;

pub(crate) fn string_or(config: &HashMap<String, Value>, key: &str, default: &str) -> String {
    config
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or(default)
        .to_string()
}

pub(crate) fn u64_or(config: &HashMap<String, Value>, key: &str, default: u64) -> u64 {
    config.get(key).and_then(|v| v.as_u64()).unwrap_or(default)
}

pub(crate) fn f64_or(config: &HashMap<String, Value>, key: &str, default: f64) -> f64 {
    config.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
}

pub(crate) fn bool_or(config: &HashMap<String, Value>, key: &str, default: bool) -> bool {
    config.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

/// Required non-empty list of strings
pub(crate) fn string_list(config: &HashMap<String, Value>, key: &str) -> Result<Vec<String>, UnitError> {
    let items = config
        .get(key)
        .and_then(|v| v.as_array())
        .ok_or_else(|| UnitError::Configuration(format!("Missing config: {}", key)))?;

    let list = items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                UnitError::Configuration(format!("'{}' must contain only strings", key))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if list.is_empty() {
        return Err(UnitError::Configuration(format!("'{}' must not be empty", key)));
    }
    Ok(list)
}
