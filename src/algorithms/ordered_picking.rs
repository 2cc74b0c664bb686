//! Ordered picking.
//!
//! 1. Build the ordered instance: `m` fresh items where every agent's
//!    valuations are its original valuations sorted in non-increasing order
//! 2. Run envy-cycle elimination on the ordered instance
//! 3. Read the picking sequence off the result: the owner of the first
//!    ordered item picks first, the owner of the second picks second, and so on
//! 4. Replay the sequence on the original items, each picker taking its
//!    favourite remaining item
//!
//! The result is EEFX and 2/3-MMS for additive valuations.

use crate::types::{Agent, AgentId, Agents, Allocation, Items};

use super::envy_cycle_elimination::envy_cycle_elimination;
use super::AllocationError;

/// Allocate `items` by ordered picking.
pub fn ordered_picking(agents: &Agents, items: &Items) -> Result<Allocation, AllocationError> {
    tracing::debug!(agents = agents.len(), items = items.len(), "ordered picking started");

    let (ordered_agents, ordered_items) = ordered_instance(agents, items)?;
    let ordered_allocation =
        envy_cycle_elimination(&ordered_agents, &ordered_items, Allocation::new(&ordered_agents))?;

    let sequence = picking_sequence(&ordered_items, &ordered_allocation)?;
    let allocation = pick_items(agents, items, &sequence)?;

    tracing::debug!(picks = sequence.len(), "ordered picking finished");
    Ok(allocation)
}

/// Fresh items keyed after the largest original key, valued in sorted order.
fn ordered_instance(agents: &Agents, items: &Items) -> Result<(Agents, Items), AllocationError> {
    let start = items.iter().last().map_or(1, |item| item.key() + 1);
    let ordered_items = Items::range(start, items.len());

    let mut ordered_agents = Agents::new();
    for agent in agents.iter() {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            values.push(agent.value(item)?);
        }
        values.sort_unstable_by(|a, b| b.cmp(a));

        let mut ordered = Agent::new(agent.id);
        for (item, value) in ordered_items.iter().zip(values) {
            ordered.assign_valuation(item, value);
        }
        ordered_agents.insert(ordered);
    }
    Ok((ordered_agents, ordered_items))
}

fn picking_sequence(
    ordered_items: &Items,
    ordered_allocation: &Allocation,
) -> Result<Vec<AgentId>, AllocationError> {
    ordered_items
        .iter()
        .map(|item| {
            ordered_allocation.owner_of(&item).ok_or_else(|| {
                AllocationError::InvariantViolation(format!("ordered {item} was not allocated"))
            })
        })
        .collect()
}

fn pick_items(agents: &Agents, items: &Items, sequence: &[AgentId]) -> Result<Allocation, AllocationError> {
    let mut allocation = Allocation::new(agents);
    let mut items_left = items.clone();

    for &picker in sequence {
        let agent = agents.get(&picker).ok_or(AllocationError::UnknownAgent(picker))?;
        let favorite = agent.favorite_item(&items_left)?;
        allocation.allocate(picker, favorite);
        items_left.remove(&favorite);
    }
    Ok(allocation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::highest_mms_approximation;
    use crate::types::ItemId;

    #[test]
    fn test_ordered_instance_sorts_valuations() {
        let agents = Agents::from_matrix(&[vec![1, 7, 3]]);
        let (ordered_agents, ordered_items) = ordered_instance(&agents, &Items::range(1, 3)).unwrap();

        assert_eq!(ordered_items.keys(), vec![4, 5, 6]);
        let agent = ordered_agents.get(&AgentId::new(1)).unwrap();
        assert_eq!(agent.value(ItemId::new(4)).unwrap(), 7);
        assert_eq!(agent.value(ItemId::new(5)).unwrap(), 3);
        assert_eq!(agent.value(ItemId::new(6)).unwrap(), 1);
    }

    #[test]
    fn test_allocates_every_original_item() {
        let agents = Agents::from_matrix(&[vec![4, 8, 1, 3, 5], vec![6, 1, 7, 2, 2], vec![3, 3, 3, 3, 3]]);
        let items = Items::range(1, 5);
        let allocation = ordered_picking(&agents, &items).unwrap();

        assert_eq!(allocation.allocated_items(), items);
        assert!(highest_mms_approximation(&agents, &items, &allocation).unwrap() >= 0.666);
    }
}
