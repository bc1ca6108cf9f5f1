use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use wavecore::{ResultSnapshot, StoreError, UnitId, UnitResult};

/// Concurrency-safe map of completed unit results.
///
/// Entries are only ever added. Each unit id can be written once.
#[derive(Debug, Default)]
pub struct ResultStore {
    results: RwLock<HashMap<UnitId, Arc<UnitResult>>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_result(&self, unit_id: impl Into<UnitId>, result: UnitResult) -> Result<(), StoreError> {
        let unit_id = unit_id.into();
        let mut results = self.results.write();
        if results.contains_key(&unit_id) {
            return Err(StoreError::AlreadySet(unit_id));
        }
        results.insert(unit_id, Arc::new(result));
        Ok(())
    }

    pub fn get_result(&self, unit_id: &str) -> Option<Arc<UnitResult>> {
        self.results.read().get(unit_id).cloned()
    }

    /// Copy of the current contents; later writes do not show up in it
    pub fn get_all_results(&self) -> ResultSnapshot {
        self.results.read().clone()
    }

    pub fn are_dependencies_complete<S: AsRef<str>>(&self, unit_ids: &[S]) -> bool {
        let results = self.results.read();
        unit_ids.iter().all(|id| results.contains_key(id.as_ref()))
    }

    pub fn contains(&self, unit_id: &str) -> bool {
        self.results.read().contains_key(unit_id)
    }

    pub fn len(&self) -> usize {
        self.results.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_once() {
        let store = ResultStore::new();
        store.set_result("a", UnitResult::new(0.5)).unwrap();

        let err = store.set_result("a", UnitResult::new(0.9)).unwrap_err();
        assert_eq!(err, StoreError::AlreadySet("a".to_string()));
        assert_eq!(store.get_result("a").unwrap().confidence, 0.5);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = ResultStore::new();
        store
            .set_result("a", UnitResult::new(1.0).with_payload(json!({"k": 1})))
            .unwrap();

        let first = store.get_all_results();
        let second = store.get_all_results();
        assert_eq!(first, second);

        let mut mutated = store.get_all_results();
        mutated.remove("a");
        mutated.insert("b".to_string(), Arc::new(UnitResult::new(0.1)));
        assert!(store.contains("a"));
        assert!(!store.contains("b"));

        store.set_result("c", UnitResult::new(0.3)).unwrap();
        assert!(!first.contains_key("c"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_dependencies_complete() {
        let store = ResultStore::new();
        assert!(store.are_dependencies_complete::<&str>(&[]));

        store.set_result("a", UnitResult::new(1.0)).unwrap();
        assert!(store.are_dependencies_complete(&["a"]));
        assert!(!store.are_dependencies_complete(&["a", "b"]));
    }

    #[test]
    fn test_concurrent_writers() {
        let store = Arc::new(ResultStore::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .set_result(format!("unit-{}", i), UnitResult::new(i as f64 / 16.0))
                        .unwrap();
                    store.get_all_results().len()
                })
            })
            .collect();

        for handle in handles {
            let seen = handle.join().unwrap();
            assert!((1..=16).contains(&seen));
        }
        assert_eq!(store.len(), 16);
    }
}
