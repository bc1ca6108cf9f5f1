use crate::registry::UnitRegistry;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};
use wavecore::{ExecutionPlan, PlanError, UnitId};

/// Compute the wave plan for every unit in the registry.
///
/// Kahn's algorithm with explicit wave boundaries: units with no pending
/// dependencies form the next wave, and completing a wave releases its
/// dependants. Within a wave units keep registration order.
pub fn build_plan(registry: &UnitRegistry) -> Result<ExecutionPlan, PlanError> {
    build_plan_from(registry.iter().map(|u| (u.id(), u.dependencies())))
}

/// Same as [`build_plan`] over raw `(id, dependencies)` pairs
pub fn build_plan_from<'a, I>(units: I) -> Result<ExecutionPlan, PlanError>
where
    I: IntoIterator<Item = (&'a str, &'a [UnitId])>,
{
    let units: Vec<(&str, &[UnitId])> = units.into_iter().collect();
    let graph = build_graph(&units)?;

    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|idx| graph.neighbors_directed(idx, Direction::Incoming).count())
        .collect();

    let mut current: Vec<NodeIndex> = graph
        .node_indices()
        .filter(|idx| in_degree[idx.index()] == 0)
        .collect();

    let mut waves: Vec<Vec<UnitId>> = Vec::new();
    let mut placed = 0;

    while !current.is_empty() {
        placed += current.len();

        let mut next = Vec::new();
        for &node in &current {
            for dependant in graph.neighbors_directed(node, Direction::Outgoing) {
                let degree = &mut in_degree[dependant.index()];
                *degree -= 1;
                if *degree == 0 {
                    next.push(dependant);
                }
            }
        }
        next.sort_by_key(|idx| idx.index());

        waves.push(current.iter().map(|idx| graph[*idx].clone()).collect());
        current = next;
    }

    if placed < graph.node_count() {
        let mut unresolved: Vec<UnitId> = graph
            .node_indices()
            .filter(|idx| in_degree[idx.index()] > 0)
            .map(|idx| graph[idx].clone())
            .collect();
        unresolved.sort();
        tracing::warn!(units = ?unresolved, "Dependency cycle prevents planning");
        return Err(PlanError::CyclicDependency { units: unresolved });
    }

    tracing::debug!(waves = waves.len(), units = placed, "Execution plan built");
    Ok(ExecutionPlan::from_waves(waves))
}

/// Dependency graph with an edge from each dependency to its dependant
fn build_graph(units: &[(&str, &[UnitId])]) -> Result<DiGraph<UnitId, ()>, PlanError> {
    let mut graph = DiGraph::new();
    let mut node_to_index = HashMap::new();

    for (id, _) in units {
        if node_to_index.contains_key(id) {
            return Err(PlanError::DuplicateUnit(id.to_string()));
        }
        let idx = graph.add_node(id.to_string());
        node_to_index.insert(*id, idx);
    }

    for (id, dependencies) in units {
        let to_idx = node_to_index[id];
        for dependency in dependencies.iter() {
            let from_idx = node_to_index.get(dependency.as_str()).ok_or_else(|| {
                PlanError::UnknownDependency {
                    unit: id.to_string(),
                    dependency: dependency.clone(),
                }
            })?;
            graph.add_edge(*from_idx, to_idx, ());
        }
    }

    Ok(graph)
}

/// Check a plan against the registry it was built for.
///
/// Not needed on the hot path; `build_plan` already guarantees these
/// properties for plans it produces.
pub fn validate_plan(plan: &ExecutionPlan, registry: &UnitRegistry) -> Result<(), PlanError> {
    let mut wave_of: HashMap<&str, usize> = HashMap::new();
    let mut seen = HashSet::new();

    for wave in plan.waves() {
        for unit in &wave.units {
            if !seen.insert(unit.as_str()) {
                return Err(PlanError::DuplicateUnit(unit.clone()));
            }
            wave_of.insert(unit.as_str(), wave.index);
        }
    }

    for unit in registry.iter() {
        let wave = *wave_of
            .get(unit.id())
            .ok_or_else(|| PlanError::MissingUnit(unit.id().to_string()))?;

        for dependency in unit.dependencies() {
            let dependency_wave = *wave_of.get(dependency.as_str()).ok_or_else(|| {
                PlanError::UnknownDependency {
                    unit: unit.id().to_string(),
                    dependency: dependency.clone(),
                }
            })?;
            if dependency_wave >= wave {
                return Err(PlanError::InvalidOrdering {
                    unit: unit.id().to_string(),
                    wave,
                    dependency: dependency.clone(),
                    dependency_wave,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(units: &[(&str, &[&str])]) -> Result<ExecutionPlan, PlanError> {
        let owned: Vec<(String, Vec<UnitId>)> = units
            .iter()
            .map(|(id, deps)| (id.to_string(), deps.iter().map(|d| d.to_string()).collect()))
            .collect();
        build_plan_from(owned.iter().map(|(id, deps)| (id.as_str(), deps.as_slice())))
    }

    #[test]
    fn test_persona_graph_waves() {
        let plan = plan(&[
            ("Tim", &[]),
            ("Daniel", &["Tim"]),
            ("Brene", &["Tim"]),
            ("Charlie", &["Daniel", "Brene"]),
        ])
        .unwrap();

        assert_eq!(
            plan.as_lists(),
            vec![
                vec!["Tim".to_string()],
                vec!["Daniel".to_string(), "Brene".to_string()],
                vec!["Charlie".to_string()],
            ]
        );
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.wave_of("Charlie"), Some(2));
    }

    #[test]
    fn test_empty_graph_has_no_waves() {
        let plan = plan(&[]).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.unit_count(), 0);
    }

    #[test]
    fn test_independent_units_share_wave_zero() {
        let plan = plan(&[("a", &[]), ("b", &[]), ("c", &[])]).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.waves()[0].units, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_wave_follows_longest_path() {
        // d depends on a directly and on c through b, so it must wait for c
        let plan = plan(&[
            ("a", &[]),
            ("b", &["a"]),
            ("c", &["b"]),
            ("d", &["a", "c"]),
        ])
        .unwrap();
        assert_eq!(plan.wave_of("d"), Some(3));
    }

    #[test]
    fn test_duplicate_dependency_entries() {
        let plan = plan(&[("a", &[]), ("b", &["a", "a"])]).unwrap();
        assert_eq!(plan.wave_of("b"), Some(1));
    }

    #[test]
    fn test_unknown_dependency() {
        let err = plan(&[("a", &[]), ("b", &["ghost"])]).unwrap_err();
        assert_eq!(
            err,
            PlanError::UnknownDependency {
                unit: "b".to_string(),
                dependency: "ghost".to_string(),
            }
        );
    }

    #[test]
    fn test_cycle_is_reported() {
        let err = plan(&[("a", &[]), ("b", &["a", "c"]), ("c", &["b"])]).unwrap_err();
        match err {
            PlanError::CyclicDependency { units } => {
                assert!(units.contains(&"b".to_string()));
                assert!(units.contains(&"c".to_string()));
                assert!(!units.contains(&"a".to_string()));
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let err = plan(&[("a", &["a"])]).unwrap_err();
        assert_eq!(
            err,
            PlanError::CyclicDependency {
                units: vec!["a".to_string()]
            }
        );
    }

    #[test]
    fn test_generated_dags_respect_ordering() {
        // Small LCG so the graphs are varied but reproducible
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) as usize
        };

        for size in 1..40 {
            let mut units: Vec<(String, Vec<UnitId>)> = Vec::new();
            for i in 0..size {
                let mut deps = Vec::new();
                for j in 0..i {
                    if next() % 4 == 0 {
                        deps.push(format!("u{}", j));
                    }
                }
                units.push((format!("u{}", i), deps));
            }

            let plan = build_plan_from(units.iter().map(|(id, d)| (id.as_str(), d.as_slice())))
                .unwrap();

            assert_eq!(plan.unit_count(), size);
            for (id, deps) in &units {
                let wave = plan.wave_of(id).unwrap();
                let max_dep = deps.iter().map(|d| plan.wave_of(d).unwrap()).max();
                match max_dep {
                    Some(m) => assert_eq!(wave, m + 1, "unit {} placed too late or early", id),
                    None => assert_eq!(wave, 0),
                }
            }
        }
    }
}
