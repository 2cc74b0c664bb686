//! Envy-cycle elimination over the EFX-aware envy graph.
//!
//! Same loop as plain envy-cycle elimination, but the graph is rebuilt from
//! the EFX-aware test before every pick. An unenvied agent in that graph can
//! take any item without breaking EFX.
//!
//! EFX-aware edges do not imply plain envy, so a rotation need not make
//! anyone strictly better off. Allocation states already visited during the
//! current pick are remembered, and revisiting one ends the run with
//! [`AllocationError::NoUnenviedAgent`].

use std::collections::BTreeSet;

use crate::canonical::canonical_hash;
use crate::envy::EnvyGraph;
use crate::types::{Agents, Allocation, Items};

use super::AllocationError;

/// Allocate `items` from scratch using the EFX-aware envy graph.
pub fn efx_envy_cycle_elimination(agents: &Agents, items: &Items) -> Result<Allocation, AllocationError> {
    tracing::debug!(agents = agents.len(), items = items.len(), "EFX envy-cycle elimination started");

    let mut allocation = Allocation::new(agents);
    let mut items_left = items.clone();

    while !items_left.is_empty() {
        let mut graph = EnvyGraph::build_efx_aware(agents, &allocation, &items_left)?;
        let mut visited = BTreeSet::from([canonical_hash(&allocation)]);

        let unenvied = loop {
            if let Some(agent) = graph.unenvied_agent(&allocation)? {
                break agent;
            }
            let cycle = graph.find_cycle().ok_or(AllocationError::NoUnenviedAgent)?;
            allocation.rotate(cycle.agents())?;
            tracing::trace!(cycle_len = cycle.len(), "rotated bundles along EFX-aware cycle");

            if !visited.insert(canonical_hash(&allocation)) {
                return Err(AllocationError::NoUnenviedAgent);
            }
            graph = EnvyGraph::build_efx_aware(agents, &allocation, &items_left)?;
        };

        let agent = agents
            .get(&unenvied)
            .ok_or(AllocationError::UnknownAgent(unenvied))?;
        let favorite = agent.favorite_item(&items_left)?;
        allocation.allocate(unenvied, favorite);
        items_left.remove(&favorite);
        tracing::trace!(agent = %unenvied, item = %favorite, "EFX-safe pick");
    }

    tracing::debug!("EFX envy-cycle elimination finished");
    Ok(allocation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::{is_efx, Verdict};
    use crate::types::AgentId;

    #[test]
    fn test_identical_agents_get_efx_allocation() {
        let agents = Agents::from_matrix(&[vec![4, 3, 2, 1], vec![4, 3, 2, 1]]);
        let items = Items::range(1, 4);
        let allocation = efx_envy_cycle_elimination(&agents, &items).unwrap();

        assert_eq!(allocation.allocated_items(), items);
        assert_eq!(is_efx(&agents, &allocation).unwrap(), Verdict::Satisfied);
    }

    #[test]
    fn test_first_picks_go_to_empty_bundles() {
        let agents = Agents::from_matrix(&[vec![5, 1], vec![1, 5]]);
        let allocation = efx_envy_cycle_elimination(&agents, &Items::range(1, 2)).unwrap();
        assert_eq!(allocation.for_agent(AgentId::new(1)).unwrap().len(), 1);
        assert_eq!(allocation.for_agent(AgentId::new(2)).unwrap().len(), 1);
        assert!(allocation.for_agent(AgentId::new(1)).unwrap().contains(&crate::types::ItemId::new(1)));
    }
}
