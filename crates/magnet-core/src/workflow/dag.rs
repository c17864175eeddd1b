//! Dependency resolution: step list to grouped execution plan.
//!
//! Uses `petgraph` to model step dependencies as a directed graph. Topological
//! sort detects cycles, and level-based grouping produces execution groups
//! where every step in a group can run concurrently.

use std::collections::{BTreeSet, HashMap};

use magnet_types::job::ExecutionPlanSummary;
use magnet_types::workflow::WorkflowStep;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use super::error::WorkflowError;

// ---------------------------------------------------------------------------
// ExecutionPlan
// ---------------------------------------------------------------------------

/// Ordered execution groups of step orders.
///
/// Concatenating the groups yields every input `step_order` exactly once.
/// Within a group, step orders are ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    groups: Vec<Vec<u32>>,
    total_steps: usize,
}

impl ExecutionPlan {
    pub fn groups(&self) -> &[Vec<u32>] {
        &self.groups
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Index of the group containing `step_order`.
    pub fn group_index_of(&self, step_order: u32) -> Option<usize> {
        self.groups.iter().position(|g| g.contains(&step_order))
    }

    /// Serializable summary persisted on the job.
    pub fn summary(&self) -> ExecutionPlanSummary {
        ExecutionPlanSummary {
            execution_groups: self.groups.clone(),
            total_steps: self.total_steps,
            group_count: self.groups.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolved dependency set of `step`.
///
/// Explicit `depends_on` (even empty) is taken as-is. Without it, a step
/// depends on every step with a smaller `step_order`.
pub fn dependencies_of(step: &WorkflowStep, steps: &[WorkflowStep]) -> BTreeSet<u32> {
    match &step.depends_on {
        Some(explicit) => explicit.iter().copied().collect(),
        None => steps
            .iter()
            .map(|s| s.step_order)
            .filter(|order| *order < step.step_order)
            .collect(),
    }
}

/// Build an execution plan from workflow steps.
///
/// 1. Reject empty lists and duplicate `step_order`s.
/// 2. Build a `DiGraph` with an edge dependency -> dependent.
/// 3. `toposort` to reject cycles (self-dependencies included).
/// 4. Level = 0 without dependencies, else 1 + max level of dependencies.
/// 5. Group by level, ascending `step_order` inside a group.
pub fn resolve(steps: &[WorkflowStep]) -> Result<ExecutionPlan, WorkflowError> {
    if steps.is_empty() {
        return Err(WorkflowError::EmptyWorkflow);
    }

    let mut order_to_idx: HashMap<u32, usize> = HashMap::with_capacity(steps.len());
    for (idx, step) in steps.iter().enumerate() {
        if order_to_idx.insert(step.step_order, idx).is_some() {
            return Err(WorkflowError::DuplicateStepOrder(step.step_order));
        }
    }

    let deps: Vec<BTreeSet<u32>> = steps.iter().map(|s| dependencies_of(s, steps)).collect();

    let mut graph = DiGraph::<u32, ()>::new();
    let nodes: Vec<_> = steps.iter().map(|s| graph.add_node(s.step_order)).collect();

    for (idx, step) in steps.iter().enumerate() {
        for target in &deps[idx] {
            let from = order_to_idx
                .get(target)
                .ok_or(WorkflowError::UnknownDependency {
                    step: step.step_order,
                    target: *target,
                })?;
            graph.add_edge(nodes[*from], nodes[idx], ());
        }
    }

    let sorted = toposort(&graph, None).map_err(|cycle| WorkflowError::CyclicDependency {
        step: graph[cycle.node_id()],
    })?;

    let mut levels: HashMap<u32, usize> = HashMap::with_capacity(steps.len());
    for node in sorted {
        let order = graph[node];
        let level = deps[order_to_idx[&order]]
            .iter()
            .map(|dep| levels.get(dep).copied().unwrap_or(0) + 1)
            .max()
            .unwrap_or(0);
        levels.insert(order, level);
    }

    let max_level = levels.values().copied().max().unwrap_or(0);
    let mut groups: Vec<Vec<u32>> = vec![Vec::new(); max_level + 1];
    for (order, level) in &levels {
        groups[*level].push(*order);
    }
    for group in &mut groups {
        group.sort_unstable();
    }

    tracing::debug!(
        total_steps = steps.len(),
        groups = groups.len(),
        "resolved execution plan"
    );

    Ok(ExecutionPlan {
        groups,
        total_steps: steps.len(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn step(order: u32, depends_on: Option<Vec<u32>>) -> WorkflowStep {
        WorkflowStep {
            step_order: order,
            step_name: format!("step {order}"),
            depends_on,
            ..Default::default()
        }
    }

    #[test]
    fn test_implicit_dependencies_serialize_steps() {
        let steps = vec![step(1, None), step(2, None), step(3, None)];
        let plan = resolve(&steps).unwrap();
        assert_eq!(plan.groups(), &[vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn test_explicit_empty_depends_on_runs_in_first_group() {
        let steps = vec![step(1, Some(vec![])), step(2, Some(vec![])), step(3, Some(vec![]))];
        let plan = resolve(&steps).unwrap();
        assert_eq!(plan.groups(), &[vec![1, 2, 3]]);
        assert_eq!(plan.group_count(), 1);
    }

    #[test]
    fn test_fan_out_scenario() {
        let steps = vec![step(1, None), step(2, Some(vec![1])), step(3, Some(vec![1]))];
        let plan = resolve(&steps).unwrap();
        let summary = plan.summary();
        assert_eq!(summary.execution_groups, vec![vec![1], vec![2, 3]]);
        assert_eq!(summary.total_steps, 3);
        assert_eq!(summary.group_count, 2);
    }

    #[test]
    fn test_diamond_levels() {
        // 1 -> {2, 3} -> 4, plus independent 5
        let steps = vec![
            step(4, Some(vec![2, 3])),
            step(2, Some(vec![1])),
            step(5, Some(vec![])),
            step(1, Some(vec![])),
            step(3, Some(vec![1])),
        ];
        let plan = resolve(&steps).unwrap();
        assert_eq!(plan.groups(), &[vec![1, 5], vec![2, 3], vec![4]]);
        assert_eq!(plan.group_index_of(3), Some(1));
        assert_eq!(plan.group_index_of(9), None);
    }

    #[test]
    fn test_level_is_one_plus_max_dependency_level() {
        // 3 depends on 1 (level 0) and 2 (level 1) -> level 2
        let steps = vec![step(1, Some(vec![])), step(2, Some(vec![1])), step(3, Some(vec![1, 2]))];
        let plan = resolve(&steps).unwrap();
        assert_eq!(plan.groups(), &[vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn test_every_dependency_lands_in_earlier_group() {
        let steps = vec![
            step(1, Some(vec![])),
            step(2, None),
            step(3, Some(vec![1])),
            step(4, Some(vec![3])),
            step(5, Some(vec![2, 4])),
            step(6, Some(vec![])),
        ];
        let plan = resolve(&steps).unwrap();

        let mut seen: Vec<u32> = plan.groups().iter().flatten().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6]);

        for s in &steps {
            let own = plan.group_index_of(s.step_order).unwrap();
            for dep in dependencies_of(s, &steps) {
                assert!(plan.group_index_of(dep).unwrap() < own);
            }
        }
    }

    #[test]
    fn test_cycle_detected() {
        let steps = vec![step(1, Some(vec![2])), step(2, Some(vec![1]))];
        let err = resolve(&steps).unwrap_err();
        assert!(matches!(err, WorkflowError::CyclicDependency { .. }));
        assert_eq!(err.error_type(), "CyclicDependencyError");
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let steps = vec![step(1, Some(vec![1]))];
        let err = resolve(&steps).unwrap_err();
        assert_eq!(err, WorkflowError::CyclicDependency { step: 1 });
    }

    #[test]
    fn test_implicit_rule_can_close_a_cycle() {
        // 1 waits for 2, and 2 implicitly waits for 1.
        let steps = vec![step(1, Some(vec![2])), step(2, None)];
        assert!(matches!(
            resolve(&steps),
            Err(WorkflowError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn test_unknown_dependency() {
        let steps = vec![step(1, None), step(2, Some(vec![7]))];
        assert_eq!(
            resolve(&steps).unwrap_err(),
            WorkflowError::UnknownDependency { step: 2, target: 7 }
        );
    }

    #[test]
    fn test_empty_and_duplicate_rejected() {
        assert_eq!(resolve(&[]).unwrap_err(), WorkflowError::EmptyWorkflow);
        let steps = vec![step(1, None), step(1, None)];
        assert_eq!(
            resolve(&steps).unwrap_err(),
            WorkflowError::DuplicateStepOrder(1)
        );
    }

    #[test]
    fn test_dependencies_of_implicit_and_explicit() {
        let steps = vec![step(1, None), step(2, None), step(3, Some(vec![1]))];
        assert!(dependencies_of(&steps[0], &steps).is_empty());
        assert_eq!(
            dependencies_of(&steps[2], &steps).into_iter().collect::<Vec<_>>(),
            vec![1]
        );
        assert_eq!(
            dependencies_of(&steps[1], &steps).into_iter().collect::<Vec<_>>(),
            vec![1]
        );
    }
}
