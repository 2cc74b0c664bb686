//! EFX-aware envy test.
//!
//! Agent `i` is threatened by `j` if, after `j` hypothetically receives the
//! unallocated item `i` likes best and then loses the item of its bundle `i`
//! likes least, `i` would still prefer `j`'s bundle:
//!
//! ```text
//! projected = v_i(B_j) + max_{g unallocated} v_i(g) - min_{g in B_j} v_i(g)
//! edge(i, j) iff max(projected, v_i(B_j)) > v_i(B_i)
//! ```
//!
//! The test is strictly more conservative than plain envy. Giving any item to
//! an agent that no one threatens keeps an EFX allocation EFX.

use crate::types::{Agent, AgentId, Agents, Allocation, Items, Valuation, ValuationError};

use super::graph::{envy_targets, EnvyGraph};

/// Whether `agent` could lose EFX towards `other` once `other` gets any
/// remaining item.
///
/// Returns `false` when `other` owns an empty bundle or is `agent` itself.
/// An empty pool contributes a best unallocated value of zero.
pub fn efx_threatens(
    agent: &Agent,
    other: AgentId,
    allocation: &Allocation,
    items_left: &Items,
) -> Result<bool, ValuationError> {
    if other == agent.id {
        return Ok(false);
    }
    let their_bundle = allocation.for_agent(other)?;
    let Some(worst_in_theirs) = agent.least_valued_in(their_bundle)? else {
        return Ok(false);
    };

    let own = agent.value_of(allocation.for_agent(agent.id)?)?;
    let theirs = agent.value_of(their_bundle)?;
    let best_unallocated = best_unallocated_value(agent, items_left)?;

    // worst_in_theirs <= theirs, so the subtraction cannot underflow
    let projected = (theirs - worst_in_theirs)
        .checked_add(best_unallocated)
        .ok_or(ValuationError::Overflow { agent: agent.id })?;
    Ok(projected.max(theirs) > own)
}

fn best_unallocated_value(agent: &Agent, items_left: &Items) -> Result<Valuation, ValuationError> {
    if items_left.is_empty() {
        return Ok(0);
    }
    agent.value(agent.favorite_item(items_left)?)
}

impl EnvyGraph {
    /// Build the EFX-aware envy graph: edge `i → j` iff `efx_threatens(i, j)`.
    pub fn build_efx_aware(
        agents: &Agents,
        allocation: &Allocation,
        items_left: &Items,
    ) -> Result<Self, ValuationError> {
        let mut graph = Self::with_nodes(agents.ids());
        let targets = envy_targets(agents, allocation)?;

        for agent in agents.iter() {
            for &target in &targets {
                if efx_threatens(agent, target, allocation, items_left)? {
                    graph.add_edge(agent.id, target);
                }
            }
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemId;

    fn a(key: u32) -> AgentId {
        AgentId::new(key)
    }

    #[test]
    fn test_threat_uses_best_unallocated_and_worst_owned() {
        // agent 1: owns item 1 (5); agent 2 owns items 2 (3) and 3 (1); item 4 (4) unallocated
        let agents = Agents::from_matrix(&[vec![5, 3, 1, 4], vec![0, 0, 0, 0]]);
        let mut allocation = Allocation::new(&agents);
        allocation.allocate(a(1), ItemId::new(1));
        allocation.allocate(a(2), ItemId::new(2));
        allocation.allocate(a(2), ItemId::new(3));
        let items_left: Items = [ItemId::new(4)].into_iter().collect();

        let agent1 = agents.get(&a(1)).unwrap();
        // projected = 4 - 1 + 4 = 7 > 5
        assert!(efx_threatens(agent1, a(2), &allocation, &items_left).unwrap());
        // plain envy: 4 < 5
        assert!(!agent1.envies(a(2), &allocation).unwrap());
        // with nothing left, projected = 3 and v(B_2) = 4; neither beats 5
        assert!(!efx_threatens(agent1, a(2), &allocation, &Items::new()).unwrap());
    }

    #[test]
    fn test_empty_bundle_never_threatens() {
        let agents = Agents::from_matrix(&[vec![0, 9], vec![9, 9]]);
        let allocation = Allocation::new(&agents);
        let items_left = Items::range(1, 2);
        let agent1 = agents.get(&a(1)).unwrap();
        assert!(!efx_threatens(agent1, a(2), &allocation, &items_left).unwrap());
        assert!(!efx_threatens(agent1, a(1), &allocation, &items_left).unwrap());
    }

    #[test]
    fn test_efx_aware_graph_contains_envy_graph() {
        let agents = Agents::from_matrix(&[vec![1, 9, 4], vec![9, 1, 4], vec![2, 2, 7]]);
        let mut allocation = Allocation::new(&agents);
        allocation.allocate(a(1), ItemId::new(1));
        allocation.allocate(a(2), ItemId::new(2));
        let items_left: Items = [ItemId::new(3)].into_iter().collect();

        let envy = EnvyGraph::build(&agents, &allocation).unwrap();
        let aware = EnvyGraph::build_efx_aware(&agents, &allocation, &items_left).unwrap();
        for (from, to) in envy.edges() {
            assert!(aware.has_edge(from, to));
        }
        // agent 3 values item 3 at 7 but owns nothing, and threatens both owners
        assert!(aware.has_edge(a(3), a(1)));
    }
}
