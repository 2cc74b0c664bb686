//! Round robin picking.
//!
//! Agents take turns in a fixed order, each taking their favourite remaining
//! item, until the pool is empty or the step budget is spent.

use serde::{Deserialize, Serialize};

use crate::types::{AgentId, Agents, Allocation, Items};

use super::AllocationError;

/// Step budget for round robin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Steps {
    /// Pick until the pool is empty.
    Unbounded,
    /// Pick at most this many items.
    Limit(usize),
}

impl Steps {
    fn allows(&self, step: usize) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Limit(limit) => step < *limit,
        }
    }
}

/// Extend `allocation` by letting agents pick from `items` in `ordering`.
///
/// The ordering repeats cyclically. Returns the extended allocation and the
/// items left unpicked.
pub fn round_robin(
    agents: &Agents,
    mut allocation: Allocation,
    items: &Items,
    ordering: &[AgentId],
    steps: Steps,
) -> Result<(Allocation, Items), AllocationError> {
    let mut items_left = items.clone();
    if items_left.is_empty() || !steps.allows(0) {
        return Ok((allocation, items_left));
    }
    if ordering.is_empty() {
        return Err(AllocationError::EmptyOrdering);
    }

    let mut step = 0;
    while !items_left.is_empty() && steps.allows(step) {
        let agent_id = ordering[step % ordering.len()];
        let agent = agents.get(&agent_id).ok_or(AllocationError::UnknownAgent(agent_id))?;

        let favorite = agent.favorite_item(&items_left)?;
        allocation.allocate(agent_id, favorite);
        items_left.remove(&favorite);
        tracing::trace!(agent = %agent_id, item = %favorite, step, "round robin pick");

        step += 1;
    }

    Ok((allocation, items_left))
}
