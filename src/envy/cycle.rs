//! Cycle detection and elimination by bundle rotation.
//!
//! ## Algorithm
//!
//! 1. Depth-first search over agents in ascending key order, visiting
//!    envied agents in ascending key order
//! 2. The first back edge `u → v` closes the cycle `v → … → u → v`
//! 3. Elimination hands every agent on the cycle the bundle of the agent it
//!    envies; the last agent receives the first agent's original bundle
//!
//! Rotation only moves bundles, so the item multiset is unchanged and every
//! agent on the cycle ends up strictly better off.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{AgentId, Agents, Allocation, ValuationError};

use super::graph::EnvyGraph;

/// How a driver keeps its envy graph in sync after a rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphMaintenance {
    /// Rebuild the whole graph from the allocation.
    Rebuild,
    /// Recompute only the edges incident to the rotated agents.
    Incremental,
}

impl Default for GraphMaintenance {
    fn default() -> Self {
        Self::Rebuild
    }
}

/// A directed cycle `agents[0] → agents[1] → … → agents[k] → agents[0]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvyCycle {
    agents: Vec<AgentId>,
}

impl EnvyCycle {
    /// Create a cycle from its agents in edge order.
    pub fn new(agents: Vec<AgentId>) -> Self {
        Self { agents }
    }

    /// Agents in edge order.
    pub fn agents(&self) -> &[AgentId] {
        &self.agents
    }

    /// Number of agents (and edges) on the cycle.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the cycle is empty.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// The cycle's edges as `(envious, envied)` pairs, closing edge last.
    pub fn edges(&self) -> Vec<(AgentId, AgentId)> {
        let n = self.agents.len();
        (0..n)
            .map(|i| (self.agents[i], self.agents[(i + 1) % n]))
            .collect()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

impl EnvyGraph {
    /// Find a directed cycle, or `None` if the graph is acyclic.
    ///
    /// Deterministic: the same graph always yields the same cycle.
    pub fn find_cycle(&self) -> Option<EnvyCycle> {
        let mut marks: BTreeMap<AgentId, Mark> =
            self.nodes().map(|node| (node, Mark::Unvisited)).collect();

        for root in self.nodes() {
            if marks.get(&root) != Some(&Mark::Unvisited) {
                continue;
            }

            // (node, its envied agents, next neighbour index)
            let mut path: Vec<(AgentId, Vec<AgentId>, usize)> = Vec::new();
            marks.insert(root, Mark::OnPath);
            path.push((root, self.envied_by(root), 0));

            while let Some((node, neighbours, next)) = path.last_mut() {
                let Some(&neighbour) = neighbours.get(*next) else {
                    marks.insert(*node, Mark::Done);
                    path.pop();
                    continue;
                };
                *next += 1;

                match marks.get(&neighbour).copied().unwrap_or(Mark::Unvisited) {
                    Mark::OnPath => {
                        let start = path
                            .iter()
                            .position(|(n, _, _)| *n == neighbour)
                            .unwrap_or(0);
                        let agents = path[start..].iter().map(|(n, _, _)| *n).collect();
                        return Some(EnvyCycle::new(agents));
                    }
                    Mark::Unvisited => {
                        marks.insert(neighbour, Mark::OnPath);
                        path.push((neighbour, self.envied_by(neighbour), 0));
                    }
                    Mark::Done => {}
                }
            }
        }
        None
    }
}

/// Eliminate `cycle` by rotating bundles, then bring `graph` back in sync.
pub fn eliminate_cycle(
    agents: &Agents,
    allocation: &mut Allocation,
    graph: &mut EnvyGraph,
    cycle: &EnvyCycle,
    maintenance: GraphMaintenance,
) -> Result<(), ValuationError> {
    allocation.rotate(cycle.agents())?;
    tracing::trace!(cycle_len = cycle.len(), "rotated bundles along envy cycle");

    match maintenance {
        GraphMaintenance::Rebuild => *graph = EnvyGraph::build(agents, allocation)?,
        GraphMaintenance::Incremental => graph.refresh_agents(agents, allocation, cycle.agents())?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bundle, ItemId};

    fn a(key: u32) -> AgentId {
        AgentId::new(key)
    }

    #[test]
    fn test_acyclic_graph_has_no_cycle() {
        let mut graph = EnvyGraph::with_nodes([a(1), a(2), a(3)]);
        graph.add_edge(a(1), a(2));
        graph.add_edge(a(2), a(3));
        graph.add_edge(a(1), a(3));
        assert_eq!(graph.find_cycle(), None);
    }

    #[test]
    fn test_finds_cycle_behind_a_tail() {
        let mut graph = EnvyGraph::with_nodes([a(1), a(2), a(3), a(4)]);
        graph.add_edge(a(1), a(2));
        graph.add_edge(a(2), a(3));
        graph.add_edge(a(3), a(4));
        graph.add_edge(a(4), a(2));

        let cycle = graph.find_cycle().unwrap();
        assert_eq!(cycle.agents(), &[a(2), a(3), a(4)]);
        for (from, to) in cycle.edges() {
            assert!(graph.has_edge(from, to));
        }
    }

    #[test]
    fn test_three_cycle_rotation() {
        // a envies b, b envies c, c envies a
        let agents = Agents::from_matrix(&[vec![1, 5, 0], vec![0, 1, 5], vec![5, 0, 1]]);
        let mut allocation = Allocation::new(&agents);
        for key in 1..=3 {
            allocation.allocate(a(key), ItemId::new(key));
        }
        let before = allocation.clone();
        let mut graph = EnvyGraph::build(&agents, &allocation).unwrap();
        let cycle = graph.find_cycle().unwrap();
        assert_eq!(cycle.agents(), &[a(1), a(2), a(3)]);

        eliminate_cycle(&agents, &mut allocation, &mut graph, &cycle, GraphMaintenance::Rebuild)
            .unwrap();

        assert_eq!(allocation.for_agent(a(1)).unwrap(), before.for_agent(a(2)).unwrap());
        assert_eq!(allocation.for_agent(a(2)).unwrap(), before.for_agent(a(3)).unwrap());
        assert_eq!(allocation.for_agent(a(3)).unwrap(), before.for_agent(a(1)).unwrap());
        assert_eq!(allocation.allocated_items(), before.allocated_items());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_incremental_maintenance_matches_rebuild() {
        let agents = Agents::from_matrix(&[
            vec![1, 5, 0, 3],
            vec![0, 1, 5, 3],
            vec![5, 0, 1, 3],
            vec![2, 2, 2, 1],
        ]);
        let mut allocation = Allocation::new(&agents);
        for key in 1..=4 {
            allocation.allocate(a(key), ItemId::new(key));
        }
        let mut graph = EnvyGraph::build(&agents, &allocation).unwrap();
        let cycle = graph.find_cycle().unwrap();

        eliminate_cycle(&agents, &mut allocation, &mut graph, &cycle, GraphMaintenance::Incremental)
            .unwrap();
        assert_eq!(graph, EnvyGraph::build(&agents, &allocation).unwrap());
    }

    #[test]
    fn test_no_agent_envies_received_bundle() {
        let agents = Agents::from_matrix(&[vec![1, 5, 0], vec![0, 1, 5], vec![5, 0, 1]]);
        let mut allocation = Allocation::new(&agents);
        for key in 1..=3 {
            allocation.allocate(a(key), ItemId::new(key));
        }
        let mut graph = EnvyGraph::build(&agents, &allocation).unwrap();
        let cycle = graph.find_cycle().unwrap();
        let previous: Vec<Bundle> = cycle
            .agents()
            .iter()
            .map(|&id| allocation.for_agent(id).unwrap().clone())
            .collect();

        eliminate_cycle(&agents, &mut allocation, &mut graph, &cycle, GraphMaintenance::Rebuild)
            .unwrap();

        for (i, &id) in cycle.agents().iter().enumerate() {
            let agent = agents.get(&id).unwrap();
            let own = agent.value_of(allocation.for_agent(id).unwrap()).unwrap();
            let given_up = agent.value_of(&previous[i]).unwrap();
            assert!(own > given_up);
        }
    }
}
