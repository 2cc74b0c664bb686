//! Draft-and-eliminate: two drafts, then envy-cycle elimination.
//!
//! ## Preprocessing
//!
//! Agents pick in ascending key order. An agent that values some already
//! drafted item more than φ times its favourite undrafted item is *quite
//! happy*: it takes that drafted item, and the previous owner goes back into
//! the queue. Each agent ends with at most one item and a timestamp.
//!
//! The ordering is the quite-happy agents in the order they became so, then
//! the remaining drafters by timestamp.
//!
//! ## Drafts
//!
//! 1. Round robin over the ordering, one item per agent
//! 2. Round robin over the reversed ordering, skipping the quite-happy agents
//! 3. Envy-cycle elimination on what is left
//!
//! The result is EF1 and φ-1-EFX (φ - 1 ≈ 0.618) for additive valuations.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{AgentId, Agents, Allocation, ItemId, Items, Valuation};

use super::envy_cycle_elimination::envy_cycle_elimination;
use super::round_robin::{round_robin, Steps};
use super::AllocationError;

/// The golden ratio.
pub const PHI: f64 = 1.618_033_988_749_895;

/// Output of the preprocessing phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    /// Picking order for the first draft.
    pub ordering: Vec<AgentId>,
    /// How many agents at the front of `ordering` are quite happy.
    pub quite_happy: usize,
}

/// Determine the draft ordering and the number of quite-happy agents.
pub fn preprocessing(agents: &Agents, items: &Items) -> Result<Draft, AllocationError> {
    let total = items.len();

    let mut agents_left: BTreeSet<AgentId> = agents.ids().into_iter().collect();
    let mut items_left = items.clone();
    let mut assigned = Items::new();
    let mut owners: BTreeMap<ItemId, AgentId> = BTreeMap::new();
    let mut processed: BTreeSet<AgentId> = BTreeSet::new();
    let mut timestamps: BTreeMap<AgentId, usize> = BTreeMap::new();
    let mut ordering = Vec::new();

    while !items_left.is_empty() {
        let Some(agent_id) = agents_left.pop_first() else {
            break;
        };
        let agent = agents
            .get(&agent_id)
            .ok_or(AllocationError::UnknownAgent(agent_id))?;
        let timestamp = total - items_left.len() + 1;

        let favorite_unassigned = agent.favorite_item(&items_left)?;
        let favorite_assigned = if assigned.is_empty() {
            None
        } else {
            Some(agent.favorite_item(&assigned)?)
        };

        match favorite_assigned {
            Some(item)
                if extremely_envious(agent.value(item)?, agent.value(favorite_unassigned)?) =>
            {
                let previous_owner = owners.remove(&item).ok_or_else(|| {
                    AllocationError::InvariantViolation(format!("drafted {item} has no owner"))
                })?;
                processed.remove(&previous_owner);
                assigned.remove(&item);
                agents_left.insert(previous_owner);
                ordering.push(agent_id);
                tracing::trace!(agent = %agent_id, item = %item, from = %previous_owner, "quite happy");
            }
            _ => {
                processed.insert(agent_id);
                assigned.insert(favorite_unassigned);
                owners.insert(favorite_unassigned, agent_id);
                items_left.remove(&favorite_unassigned);
            }
        }
        timestamps.insert(agent_id, timestamp);
    }

    let quite_happy = ordering.len();
    let mut drafters: Vec<AgentId> = processed.into_iter().collect();
    drafters.sort_by_key(|agent| timestamps.get(agent).copied().unwrap_or(0));
    ordering.extend(drafters);

    Ok(Draft { ordering, quite_happy })
}

fn extremely_envious(favorite_assigned: Valuation, favorite_unassigned: Valuation) -> bool {
    favorite_assigned as f64 > PHI * favorite_unassigned as f64
}

/// Allocate `items` with draft-and-eliminate.
pub fn draft_and_eliminate(agents: &Agents, items: &Items) -> Result<Allocation, AllocationError> {
    tracing::debug!(agents = agents.len(), items = items.len(), "draft-and-eliminate started");

    let n = agents.len();
    let draft = preprocessing(agents, items)?;

    let (allocation, items_left) = round_robin(
        agents,
        Allocation::new(agents),
        items,
        &draft.ordering,
        Steps::Limit(n),
    )?;

    let reversed: Vec<AgentId> = draft.ordering.iter().rev().copied().collect();
    let (allocation, items_left) = round_robin(
        agents,
        allocation,
        &items_left,
        &reversed,
        Steps::Limit(n.saturating_sub(draft.quite_happy)),
    )?;

    let allocation = envy_cycle_elimination(agents, &items_left, allocation)?;
    tracing::debug!(quite_happy = draft.quite_happy, "draft-and-eliminate finished");
    Ok(allocation)
}
