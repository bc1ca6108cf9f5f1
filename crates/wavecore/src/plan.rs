use crate::UnitId;
use serde::{Deserialize, Serialize};

/// Units that may run concurrently once every earlier wave has settled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wave {
    pub index: usize,
    pub units: Vec<UnitId>,
}

impl Wave {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn contains(&self, unit_id: &str) -> bool {
        self.units.iter().any(|u| u == unit_id)
    }
}

/// Ordered sequence of waves derived from a dependency graph.
///
/// Every unit appears in exactly one wave, and a unit's wave index is
/// strictly greater than that of each of its dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    waves: Vec<Wave>,
}

impl ExecutionPlan {
    pub fn from_waves(waves: Vec<Vec<UnitId>>) -> Self {
        Self {
            waves: waves
                .into_iter()
                .enumerate()
                .map(|(index, units)| Wave { index, units })
                .collect(),
        }
    }

    pub fn waves(&self) -> &[Wave] {
        &self.waves
    }

    pub fn wave(&self, index: usize) -> Option<&Wave> {
        self.waves.get(index)
    }

    /// Number of waves
    pub fn len(&self) -> usize {
        self.waves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    pub fn unit_count(&self) -> usize {
        self.waves.iter().map(Wave::len).sum()
    }

    pub fn wave_of(&self, unit_id: &str) -> Option<usize> {
        self.waves
            .iter()
            .find(|w| w.contains(unit_id))
            .map(|w| w.index)
    }

    /// Unit ids in execution order
    pub fn unit_ids(&self) -> impl Iterator<Item = &UnitId> {
        self.waves.iter().flat_map(|w| w.units.iter())
    }

    /// Wave contents as plain id lists
    pub fn as_lists(&self) -> Vec<Vec<UnitId>> {
        self.waves.iter().map(|w| w.units.clone()).collect()
    }
}
