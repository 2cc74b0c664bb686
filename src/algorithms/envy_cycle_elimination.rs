//! Envy-cycle elimination.
//!
//! ## Algorithm
//!
//! ```text
//! while items remain:
//!     while no unenvied agent:
//!         rotate bundles along an envy cycle
//!     unenvied agent (empty bundle preferred) takes its favourite item
//!     patch the envy graph
//! ```
//!
//! The plain variant rebuilds the graph after every rotation and scans the
//! pool for favourites. The fast variant patches the graph around the rotated
//! agents and keeps a ranked preference list per agent.

use std::collections::BTreeMap;

use crate::envy::{eliminate_cycle, EnvyGraph, GraphMaintenance};
use crate::types::{AgentId, Agents, Allocation, ItemId, Items, ValuationError};

use super::AllocationError;

/// Run envy-cycle elimination on `items`, extending `allocation`.
///
/// Guarantees EF1 when the starting allocation is EF1 (in particular when it
/// is empty).
pub fn envy_cycle_elimination(
    agents: &Agents,
    items: &Items,
    allocation: Allocation,
) -> Result<Allocation, AllocationError> {
    run(agents, items, allocation, GraphMaintenance::Rebuild)
}

/// Envy-cycle elimination with incremental graph maintenance and ranked
/// preference lists. Produces exactly the allocation of
/// [`envy_cycle_elimination`].
pub fn fast_envy_cycle_elimination(
    agents: &Agents,
    items: &Items,
    allocation: Allocation,
) -> Result<Allocation, AllocationError> {
    run(agents, items, allocation, GraphMaintenance::Incremental)
}

fn run(
    agents: &Agents,
    items: &Items,
    mut allocation: Allocation,
    maintenance: GraphMaintenance,
) -> Result<Allocation, AllocationError> {
    tracing::debug!(
        agents = agents.len(),
        items = items.len(),
        ?maintenance,
        "envy-cycle elimination started"
    );

    let mut items_left = items.clone();
    let mut graph = EnvyGraph::build(agents, &allocation)?;
    let mut preferences = match maintenance {
        GraphMaintenance::Rebuild => None,
        GraphMaintenance::Incremental => Some(PreferenceLists::new(agents, items)?),
    };
    let mut rotations = 0usize;

    while !items_left.is_empty() {
        let unenvied = loop {
            if let Some(agent) = graph.unenvied_agent(&allocation)? {
                break agent;
            }
            let cycle = graph.find_cycle().ok_or_else(|| {
                AllocationError::InvariantViolation(
                    "acyclic envy graph in which every agent is envied".to_string(),
                )
            })?;
            eliminate_cycle(agents, &mut allocation, &mut graph, &cycle, maintenance)?;
            rotations += 1;
        };

        let agent = agents
            .get(&unenvied)
            .ok_or(AllocationError::UnknownAgent(unenvied))?;
        let favorite = match preferences.as_mut() {
            Some(lists) => lists.favorite(unenvied, &items_left)?,
            None => agent.favorite_item(&items_left)?,
        };

        allocation.allocate(unenvied, favorite);
        items_left.remove(&favorite);
        tracing::trace!(agent = %unenvied, item = %favorite, "unenvied agent picked");

        graph.update_after_allocation(agents, &allocation, unenvied)?;
    }

    tracing::debug!(rotations, "envy-cycle elimination finished");
    Ok(allocation)
}

/// Per-agent items ranked by decreasing value, ties by ascending key.
///
/// Each list keeps a cursor to its current favourite. Items leave the pool
/// for every agent at once, so a list never has to be edited: the cursor just
/// skips entries that are no longer in the pool.
#[derive(Debug, Clone)]
pub struct PreferenceLists {
    ranked: BTreeMap<AgentId, Vec<ItemId>>,
    cursors: BTreeMap<AgentId, usize>,
}

impl PreferenceLists {
    /// Rank `items` for every agent.
    pub fn new(agents: &Agents, items: &Items) -> Result<Self, ValuationError> {
        let mut ranked = BTreeMap::new();
        for agent in agents.iter() {
            let mut valued = Vec::with_capacity(items.len());
            for item in items {
                valued.push((agent.value(item)?, item));
            }
            // stable sort keeps ascending keys among equal values
            valued.sort_by(|a, b| b.0.cmp(&a.0));
            ranked.insert(agent.id, valued.into_iter().map(|(_, item)| item).collect());
        }
        let cursors = ranked.keys().map(|&id| (id, 0)).collect();
        Ok(Self { ranked, cursors })
    }

    /// `agent`'s favourite among `items_left`.
    ///
    /// Same answer as `Agent::favorite_item` as long as `items_left` is a
    /// subset of the ranked items and only ever shrinks.
    pub fn favorite(&mut self, agent: AgentId, items_left: &Items) -> Result<ItemId, ValuationError> {
        let ranked = self.ranked.get(&agent).ok_or(ValuationError::NoBundle(agent))?;
        let cursor = self.cursors.entry(agent).or_insert(0);

        while let Some(item) = ranked.get(*cursor) {
            if items_left.contains(item) {
                return Ok(*item);
            }
            *cursor += 1;
        }
        Err(ValuationError::EmptyPool(agent))
    }
}
