//! The allocation store: a total map from agents to bundles.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::agent::{AgentId, Agents, ValuationError};
use super::bundle::Bundle;
use super::item::{ItemId, Items};
use crate::canonical::canonical_hash_hex;

/// Mapping from every agent to exactly one bundle.
///
/// ## Invariants
///
/// - Every agent of the instance has a slot, initially an empty bundle
/// - Bundles are disjoint; their union is the set of items allocated so far
/// - Bundle moves never create or destroy items: `take_bundle` leaves an
///   empty slot behind and `rotate` is a cyclic permutation of ownership
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    bundles: BTreeMap<AgentId, Bundle>,
}

impl Allocation {
    /// Create an allocation giving every agent an empty bundle.
    pub fn new(agents: &Agents) -> Self {
        Self::for_ids(agents.ids())
    }

    /// Create an allocation with empty bundles for the given agent keys.
    pub fn for_ids<I: IntoIterator<Item = AgentId>>(ids: I) -> Self {
        Self {
            bundles: ids.into_iter().map(|id| (id, Bundle::new())).collect(),
        }
    }

    /// Add a single item to `agent`'s bundle.
    ///
    /// An agent without a slot gets one.
    pub fn allocate(&mut self, agent: AgentId, item: ItemId) {
        self.bundles.entry(agent).or_default().add_item(item);
    }

    /// Replace `agent`'s bundle wholesale, returning the bundle it held.
    pub fn allocate_bundle(&mut self, agent: AgentId, bundle: Bundle) -> Bundle {
        self.bundles.insert(agent, bundle).unwrap_or_default()
    }

    /// Remove `agent`'s bundle, leaving an empty bundle in its slot.
    pub fn take_bundle(&mut self, agent: AgentId) -> Result<Bundle, ValuationError> {
        self.bundles
            .get_mut(&agent)
            .map(std::mem::take)
            .ok_or(ValuationError::NoBundle(agent))
    }

    /// Rotate bundles along `cycle`: each agent receives the bundle of the
    /// agent after it, and the last agent receives the first agent's bundle.
    ///
    /// Fails without mutating anything if an agent has no slot.
    pub fn rotate(&mut self, cycle: &[AgentId]) -> Result<(), ValuationError> {
        if let Some(missing) = cycle.iter().find(|a| !self.bundles.contains_key(a)) {
            return Err(ValuationError::NoBundle(*missing));
        }
        let mut taken = Vec::with_capacity(cycle.len());
        for &agent in cycle {
            taken.push(self.take_bundle(agent)?);
        }
        taken.rotate_left(1);
        for (&agent, bundle) in cycle.iter().zip(taken) {
            self.allocate_bundle(agent, bundle);
        }
        Ok(())
    }

    /// The bundle owned by `agent`.
    pub fn for_agent(&self, agent: AgentId) -> Result<&Bundle, ValuationError> {
        self.bundles.get(&agent).ok_or(ValuationError::NoBundle(agent))
    }

    /// Iterate `(agent, bundle)` pairs in ascending agent order.
    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &Bundle)> + '_ {
        self.bundles.iter().map(|(&id, bundle)| (id, bundle))
    }

    /// Agent keys in ascending order.
    pub fn agents(&self) -> Vec<AgentId> {
        self.bundles.keys().copied().collect()
    }

    /// All allocated items.
    pub fn allocated_items(&self) -> Items {
        self.bundles.values().flat_map(|b| b.iter()).collect()
    }

    /// Total number of allocated items, counted per bundle.
    pub fn item_count(&self) -> usize {
        self.bundles.values().map(Bundle::len).sum()
    }

    /// The agent holding `item`, if any.
    pub fn owner_of(&self, item: &ItemId) -> Option<AgentId> {
        self.iter()
            .find(|(_, bundle)| bundle.contains(item))
            .map(|(id, _)| id)
    }

    /// Deterministic fingerprint of the agent→bundle mapping.
    pub fn fingerprint(&self) -> String {
        canonical_hash_hex(self)
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (agent, bundle) in self.iter() {
            writeln!(f, "{}: {}", agent, bundle)?;
        }
        Ok(())
    }
}
