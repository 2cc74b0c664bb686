//! Envy graph over agents.
//!
//! Nodes are agents; an edge `i → j` means agent `i` envies agent `j` at the
//! current allocation. Only agents with non-empty bundles are edge targets.
//!
//! The graph is an explicit adjacency structure owned by a single driver run.
//! Both directions are stored so in-degree queries and patching of edges
//! into an agent are O(log n).

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{AgentId, Agents, Allocation, ValuationError};

/// Directed envy graph with BTree-backed adjacency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvyGraph {
    /// Agent → agents it envies.
    outgoing: BTreeMap<AgentId, BTreeSet<AgentId>>,
    /// Agent → agents envying it.
    incoming: BTreeMap<AgentId, BTreeSet<AgentId>>,
}

impl EnvyGraph {
    /// Create a graph with the given nodes and no edges.
    pub fn with_nodes<I: IntoIterator<Item = AgentId>>(nodes: I) -> Self {
        let mut graph = Self::default();
        for node in nodes {
            graph.outgoing.entry(node).or_default();
            graph.incoming.entry(node).or_default();
        }
        graph
    }

    /// Build the envy graph for `allocation` from scratch.
    ///
    /// Tests every ordered pair `(i, j)`, `i ≠ j`, where `j` owns a non-empty
    /// bundle.
    pub fn build(agents: &Agents, allocation: &Allocation) -> Result<Self, ValuationError> {
        let mut graph = Self::with_nodes(agents.ids());
        let targets = envy_targets(agents, allocation)?;

        for agent in agents.iter() {
            for &target in &targets {
                if target != agent.id && agent.envies(target, allocation)? {
                    graph.add_edge(agent.id, target);
                }
            }
        }
        Ok(graph)
    }

    /// Patch the graph after `endowed` received a new item.
    ///
    /// `endowed` values its own bundle more, so some of its outgoing edges may
    /// no longer be justified; other agents value `endowed`'s bundle more, so
    /// new edges into `endowed` may appear. The result equals a full rebuild.
    pub fn update_after_allocation(
        &mut self,
        agents: &Agents,
        allocation: &Allocation,
        endowed: AgentId,
    ) -> Result<(), ValuationError> {
        let endowed_agent = agents.get(&endowed).ok_or(ValuationError::NoBundle(endowed))?;

        // drop envy the endowed agent no longer feels
        for previously_envied in self.envied_by(endowed) {
            if !endowed_agent.envies(previously_envied, allocation)? {
                self.remove_edge(endowed, previously_envied);
            }
        }

        // add envy towards the endowed agent
        if !allocation.for_agent(endowed)?.is_empty() {
            for agent in agents.iter() {
                if agent.id != endowed && agent.envies(endowed, allocation)? {
                    self.add_edge(agent.id, endowed);
                }
            }
        }
        Ok(())
    }

    /// Recompute every edge incident to the `touched` agents.
    ///
    /// Edges between two untouched agents depend only on their own bundles and
    /// are left alone, so after any change confined to the touched agents'
    /// bundles the result equals a full rebuild.
    pub fn refresh_agents(
        &mut self,
        agents: &Agents,
        allocation: &Allocation,
        touched: &[AgentId],
    ) -> Result<(), ValuationError> {
        for &agent_id in touched {
            for envied in self.envied_by(agent_id) {
                self.remove_edge(agent_id, envied);
            }
            for envier in self.enviers_of(agent_id) {
                self.remove_edge(envier, agent_id);
            }
        }

        let targets = envy_targets(agents, allocation)?;
        for &agent_id in touched {
            let agent = agents.get(&agent_id).ok_or(ValuationError::NoBundle(agent_id))?;
            for &target in &targets {
                if target != agent_id && agent.envies(target, allocation)? {
                    self.add_edge(agent_id, target);
                }
            }
            if !targets.contains(&agent_id) {
                continue;
            }
            for other in agents.iter() {
                if other.id != agent_id && other.envies(agent_id, allocation)? {
                    self.add_edge(other.id, agent_id);
                }
            }
        }
        Ok(())
    }

    /// Add the edge `from → to`.
    pub fn add_edge(&mut self, from: AgentId, to: AgentId) {
        self.outgoing.entry(from).or_default().insert(to);
        self.incoming.entry(to).or_default().insert(from);
        self.outgoing.entry(to).or_default();
        self.incoming.entry(from).or_default();
    }

    /// Remove the edge `from → to` if present.
    pub fn remove_edge(&mut self, from: AgentId, to: AgentId) {
        if let Some(targets) = self.outgoing.get_mut(&from) {
            targets.remove(&to);
        }
        if let Some(sources) = self.incoming.get_mut(&to) {
            sources.remove(&from);
        }
    }

    /// Whether `from` envies `to`.
    pub fn has_edge(&self, from: AgentId, to: AgentId) -> bool {
        self.outgoing.get(&from).is_some_and(|t| t.contains(&to))
    }

    /// Number of agents envying `agent`.
    pub fn in_degree(&self, agent: AgentId) -> usize {
        self.incoming.get(&agent).map_or(0, BTreeSet::len)
    }

    /// Agents that `agent` envies, ascending.
    pub fn envied_by(&self, agent: AgentId) -> Vec<AgentId> {
        self.outgoing
            .get(&agent)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Agents envying `agent`, ascending.
    pub fn enviers_of(&self, agent: AgentId) -> Vec<AgentId> {
        self.incoming
            .get(&agent)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// All nodes in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.outgoing.keys().copied()
    }

    /// All edges, ordered by `(from, to)`.
    pub fn edges(&self) -> Vec<(AgentId, AgentId)> {
        self.outgoing
            .iter()
            .flat_map(|(&from, targets)| targets.iter().map(move |&to| (from, to)))
            .collect()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(BTreeSet::len).sum()
    }

    /// Find an unenvied agent (in-degree 0).
    ///
    /// Among unenvied agents, one with an empty bundle wins; otherwise the
    /// lowest key. The empty-bundle preference is what gives envy-cycle
    /// elimination its 1/2-EFX guarantee.
    pub fn unenvied_agent(&self, allocation: &Allocation) -> Result<Option<AgentId>, ValuationError> {
        let mut unenvied = None;
        for agent in self.nodes() {
            if self.in_degree(agent) != 0 {
                continue;
            }
            if allocation.for_agent(agent)?.is_empty() {
                return Ok(Some(agent));
            }
            unenvied.get_or_insert(agent);
        }
        Ok(unenvied)
    }
}

/// Agents owning non-empty bundles; only these can be envied.
pub(crate) fn envy_targets(
    agents: &Agents,
    allocation: &Allocation,
) -> Result<BTreeSet<AgentId>, ValuationError> {
    let mut targets = BTreeSet::new();
    for agent in agents.iter() {
        if !allocation.for_agent(agent.id)?.is_empty() {
            targets.insert(agent.id);
        }
    }
    Ok(targets)
}
