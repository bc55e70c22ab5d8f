//! Dependency graph between recipe inputs and derived metrics.
//!
//! The graph is declared as an explicit edge list and validated once: metric
//! to metric edges must form a DAG. From the topological order each input
//! category gets a propagation plan, the metrics reachable from it in an order
//! that respects every edge.
//!
//! ```
//! use grain::{DependencyGraph, InputCategory, Metric};
//!
//! let graph = DependencyGraph::standard().unwrap();
//! assert_eq!(
//!     graph.plan(InputCategory::Hops),
//!     &[Metric::Ibu, Metric::Ratio, Metric::HopsMass]
//! );
//! ```

use std::fmt;

use crate::error::GraphError;

/// A cached value derived from recipe inputs.
///
/// Declaration order breaks ties between metrics that do not depend on each
/// other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    TargetBoilVolume,
    Og,
    Fg,
    Ibu,
    Abv,
    Srm,
    Ratio,
    FermentablesMass,
    HopsMass,
}

impl Metric {
    /// Every metric, in declaration order.
    pub const ALL: [Metric; 9] = [
        Metric::TargetBoilVolume,
        Metric::Og,
        Metric::Fg,
        Metric::Ibu,
        Metric::Abv,
        Metric::Srm,
        Metric::Ratio,
        Metric::FermentablesMass,
        Metric::HopsMass,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::TargetBoilVolume => "target boil volume",
            Metric::Og => "OG",
            Metric::Fg => "FG",
            Metric::Ibu => "IBU",
            Metric::Abv => "ABV",
            Metric::Srm => "SRM",
            Metric::Ratio => "ratio",
            Metric::FermentablesMass => "fermentables mass",
            Metric::HopsMass => "hops mass",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A group of recipe inputs that changes as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputCategory {
    Fermentables,
    Hops,
    Yeast,
    Equipment,
    Mash,
    TargetBatchVolume,
}

impl InputCategory {
    /// Every input category, in declaration order.
    pub const ALL: [InputCategory; 6] = [
        InputCategory::Fermentables,
        InputCategory::Hops,
        InputCategory::Yeast,
        InputCategory::Equipment,
        InputCategory::Mash,
        InputCategory::TargetBatchVolume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InputCategory::Fermentables => "fermentables",
            InputCategory::Hops => "hops",
            InputCategory::Yeast => "yeast",
            InputCategory::Equipment => "equipment",
            InputCategory::Mash => "mash",
            InputCategory::TargetBatchVolume => "target batch volume",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for InputCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The tail of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// A recipe input.
    Input(InputCategory),
    /// Another metric.
    Metric(Metric),
}

/// `(source, metric)`: `metric` reads `source`.
pub type Edge = (Source, Metric);

use InputCategory as In;
use Metric as M;

/// Edges of the standard recipe graph.
pub const STANDARD_EDGES: &[Edge] = &[
    (Source::Input(In::Fermentables), M::Og),
    (Source::Input(In::Fermentables), M::Srm),
    (Source::Input(In::Fermentables), M::FermentablesMass),
    (Source::Input(In::Hops), M::Ibu),
    (Source::Input(In::Hops), M::HopsMass),
    (Source::Input(In::Yeast), M::Fg),
    // efficiency, boil-off, kettle loss, hop formula and elevation
    (Source::Input(In::Equipment), M::TargetBoilVolume),
    (Source::Input(In::Equipment), M::Og),
    (Source::Input(In::Equipment), M::Ibu),
    (Source::Input(In::Mash), M::TargetBoilVolume),
    (Source::Input(In::TargetBatchVolume), M::TargetBoilVolume),
    (Source::Input(In::TargetBatchVolume), M::Og),
    (Source::Input(In::TargetBatchVolume), M::Ibu),
    (Source::Input(In::TargetBatchVolume), M::Srm),
    (Source::Metric(M::Og), M::Fg),
    (Source::Metric(M::Og), M::Ibu),
    (Source::Metric(M::Og), M::Abv),
    (Source::Metric(M::Fg), M::Abv),
    (Source::Metric(M::Og), M::Ratio),
    (Source::Metric(M::Ibu), M::Ratio),
    // garetz reads the boil volume
    (Source::Metric(M::TargetBoilVolume), M::Ibu),
];

/// A validated dependency graph with precomputed propagation plans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    /// Indexed by metric: metrics it reads.
    dependencies: Vec<Vec<Metric>>,
    /// Indexed by metric: metrics that read it.
    dependents: Vec<Vec<Metric>>,
    order: Vec<Metric>,
    /// Indexed by input category.
    plans: Vec<Vec<Metric>>,
}

impl DependencyGraph {
    /// Validate `edges` and build the propagation plans.
    pub fn new(edges: impl IntoIterator<Item = Edge>) -> Result<Self, GraphError> {
        let mut dependencies = vec![Vec::new(); Metric::ALL.len()];
        let mut dependents = vec![Vec::new(); Metric::ALL.len()];
        let mut direct = vec![Vec::new(); InputCategory::ALL.len()];

        for (source, metric) in edges {
            match source {
                Source::Metric(from) if from == metric => {
                    return Err(GraphError::SelfDependency(metric));
                }
                Source::Metric(from) => {
                    if !dependencies[metric.index()].contains(&from) {
                        dependencies[metric.index()].push(from);
                        dependents[from.index()].push(metric);
                    }
                }
                Source::Input(category) => {
                    if !direct[category.index()].contains(&metric) {
                        direct[category.index()].push(metric);
                    }
                }
            }
        }
        for list in dependencies.iter_mut().chain(dependents.iter_mut()) {
            list.sort();
        }

        let order = topological_order(&dependencies, &dependents)?;

        let plans = direct
            .iter()
            .map(|roots| {
                let mut reachable = ahash::HashSet::default();
                let mut stack: Vec<Metric> = roots.clone();
                while let Some(metric) = stack.pop() {
                    if reachable.insert(metric) {
                        stack.extend(dependents[metric.index()].iter().copied());
                    }
                }
                order
                    .iter()
                    .copied()
                    .filter(|metric| reachable.contains(metric))
                    .collect()
            })
            .collect();

        Ok(Self {
            dependencies,
            dependents,
            order,
            plans,
        })
    }

    /// The graph every recipe uses.
    pub fn standard() -> Result<Self, GraphError> {
        Self::new(STANDARD_EDGES.iter().copied())
    }

    /// Metrics to recompute after `category` changed, dependencies first.
    pub fn plan(&self, category: InputCategory) -> &[Metric] {
        &self.plans[category.index()]
    }

    /// Every metric, dependencies first.
    pub fn topological_order(&self) -> &[Metric] {
        &self.order
    }

    /// Metrics `metric` reads directly.
    pub fn dependencies(&self, metric: Metric) -> &[Metric] {
        &self.dependencies[metric.index()]
    }

    /// Metrics that read `metric` directly.
    pub fn dependents(&self, metric: Metric) -> &[Metric] {
        &self.dependents[metric.index()]
    }
}

/// Kahn's algorithm, always taking the lowest ready metric so the order is
/// deterministic.
fn topological_order(
    dependencies: &[Vec<Metric>],
    dependents: &[Vec<Metric>],
) -> Result<Vec<Metric>, GraphError> {
    let mut in_degree: Vec<usize> = dependencies.iter().map(Vec::len).collect();
    let mut done = vec![false; Metric::ALL.len()];
    let mut order = Vec::with_capacity(Metric::ALL.len());

    while let Some(next) = Metric::ALL
        .iter()
        .copied()
        .find(|m| !done[m.index()] && in_degree[m.index()] == 0)
    {
        done[next.index()] = true;
        order.push(next);
        for dependent in &dependents[next.index()] {
            in_degree[dependent.index()] -= 1;
        }
    }

    if order.len() == Metric::ALL.len() {
        return Ok(order);
    }
    let start = Metric::ALL
        .iter()
        .copied()
        .find(|m| !done[m.index()])
        .unwrap_or(Metric::TargetBoilVolume);
    let mut visited = ahash::HashSet::default();
    let mut path = Vec::new();
    let path = find_cycle(start, dependencies, &mut visited, &mut path).unwrap_or_default();
    Err(GraphError::Cycle { path })
}

/// Depth-first search over dependencies, returning the first cycle found with
/// its first metric repeated at the end.
fn find_cycle(
    metric: Metric,
    dependencies: &[Vec<Metric>],
    visited: &mut ahash::HashSet<Metric>,
    path: &mut Vec<Metric>,
) -> Option<Vec<Metric>> {
    if let Some(position) = path.iter().position(|m| *m == metric) {
        let mut cycle = path[position..].to_vec();
        cycle.push(metric);
        cycle.reverse();
        return Some(cycle);
    }
    if !visited.insert(metric) {
        return None;
    }
    path.push(metric);
    for dependency in &dependencies[metric.index()] {
        if let Some(cycle) = find_cycle(*dependency, dependencies, visited, path) {
            return Some(cycle);
        }
    }
    path.pop();
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(order: &[Metric], metric: Metric) -> usize {
        order.iter().position(|m| *m == metric).unwrap()
    }

    #[test]
    fn test_standard_graph_is_acyclic() {
        let graph = DependencyGraph::standard().unwrap();
        let order = graph.topological_order();
        assert_eq!(order.len(), Metric::ALL.len());
        for (source, metric) in STANDARD_EDGES {
            if let Source::Metric(from) = source {
                assert!(position(order, *from) < position(order, *metric));
            }
        }
    }

    #[test]
    fn test_fermentables_plan() {
        let graph = DependencyGraph::standard().unwrap();
        assert_eq!(
            graph.plan(InputCategory::Fermentables),
            &[M::Og, M::Fg, M::Ibu, M::Abv, M::Srm, M::Ratio, M::FermentablesMass]
        );
    }

    #[test]
    fn test_other_plans() {
        let graph = DependencyGraph::standard().unwrap();
        assert_eq!(graph.plan(In::Hops), &[M::Ibu, M::Ratio, M::HopsMass]);
        assert_eq!(graph.plan(In::Yeast), &[M::Fg, M::Abv]);
        assert_eq!(
            graph.plan(In::Equipment),
            &[M::TargetBoilVolume, M::Og, M::Fg, M::Ibu, M::Abv, M::Ratio]
        );
        assert_eq!(graph.plan(In::Mash), &[M::TargetBoilVolume, M::Ibu, M::Ratio]);
        assert_eq!(
            graph.plan(In::TargetBatchVolume),
            &[M::TargetBoilVolume, M::Og, M::Fg, M::Ibu, M::Abv, M::Srm, M::Ratio]
        );
    }

    #[test]
    fn test_dependencies_and_dependents() {
        let graph = DependencyGraph::standard().unwrap();
        assert_eq!(graph.dependencies(M::Abv), &[M::Og, M::Fg]);
        assert_eq!(graph.dependents(M::Og), &[M::Fg, M::Ibu, M::Abv, M::Ratio]);
        assert!(graph.dependents(M::HopsMass).is_empty());
    }

    #[test]
    fn test_rejects_cycle() {
        let edges = [
            (Source::Metric(M::Og), M::Fg),
            (Source::Metric(M::Fg), M::Abv),
            (Source::Metric(M::Abv), M::Og),
        ];
        match DependencyGraph::new(edges) {
            Err(GraphError::Cycle { path }) => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 4);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_self_dependency() {
        let edges = [(Source::Metric(M::Ibu), M::Ibu)];
        assert_eq!(
            DependencyGraph::new(edges),
            Err(GraphError::SelfDependency(M::Ibu))
        );
    }

    #[test]
    fn test_duplicate_edges_are_ignored() {
        let mut edges = STANDARD_EDGES.to_vec();
        edges.extend_from_slice(STANDARD_EDGES);
        assert_eq!(
            DependencyGraph::new(edges).unwrap(),
            DependencyGraph::standard().unwrap()
        );
    }
}
