//! Agent types and the additive valuation model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::allocation::Allocation;
use super::bundle::Bundle;
use super::item::{ItemId, Items};

/// Non-negative integer valuation of an item or bundle.
pub type Valuation = u64;

/// Unique identifier for an agent.
///
/// Agents are compared, ordered and hashed by this key only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(u32);

impl AgentId {
    /// Create a new AgentId from its integer key.
    pub fn new(key: u32) -> Self {
        Self(key)
    }

    /// Get the integer key.
    pub fn key(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Agent({})", self.0)
    }
}

impl From<u32> for AgentId {
    fn from(key: u32) -> Self {
        Self(key)
    }
}

/// Error raised when the valuation model is queried outside its contract.
///
/// These are internal invariant violations: every agent must value every item
/// of the instance and own a (possibly empty) bundle before a driver runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValuationError {
    /// The agent has no valuation for the item.
    #[error("{agent} has no valuation for {item}")]
    MissingValuation {
        /// Agent that was queried.
        agent: AgentId,
        /// Item without a valuation.
        item: ItemId,
    },
    /// The allocation holds no bundle slot for the agent.
    #[error("{0} has no bundle in the allocation")]
    NoBundle(AgentId),
    /// A favourite item was requested from an empty pool.
    #[error("{0} cannot pick a favorite item from an empty pool")]
    EmptyPool(AgentId),
    /// A bundle value does not fit in a [`Valuation`].
    #[error("{agent}'s valuation of a bundle overflows")]
    Overflow {
        /// Agent whose values were summed.
        agent: AgentId,
    },
}

/// A participant with additive valuations over items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Agent key.
    pub id: AgentId,
    valuations: BTreeMap<ItemId, Valuation>,
}

impl Agent {
    /// Create an agent with no valuations.
    pub fn new(id: AgentId) -> Self {
        Self {
            id,
            valuations: BTreeMap::new(),
        }
    }

    /// Create an agent valuing items `1..=values.len()` in order.
    pub fn with_values(id: AgentId, values: &[Valuation]) -> Self {
        let mut agent = Self::new(id);
        for (offset, &value) in values.iter().enumerate() {
            agent.assign_valuation(ItemId::new(offset as u32 + 1), value);
        }
        agent
    }

    /// Set the valuation of a single item.
    pub fn assign_valuation(&mut self, item: ItemId, valuation: Valuation) {
        self.valuations.insert(item, valuation);
    }

    /// Whether the agent has a valuation for `item`.
    pub fn has_valuation(&self, item: &ItemId) -> bool {
        self.valuations.contains_key(item)
    }

    /// Valuation of a single item.
    pub fn value(&self, item: ItemId) -> Result<Valuation, ValuationError> {
        self.valuations
            .get(&item)
            .copied()
            .ok_or(ValuationError::MissingValuation { agent: self.id, item })
    }

    /// Additive valuation of a bundle.
    pub fn value_of(&self, bundle: &Bundle) -> Result<Valuation, ValuationError> {
        self.value_of_items(bundle.iter())
    }

    /// Additive valuation of any sequence of items.
    ///
    /// Fails with [`ValuationError::Overflow`] if the sum leaves `u64`.
    pub fn value_of_items<I>(&self, items: I) -> Result<Valuation, ValuationError>
    where
        I: IntoIterator<Item = ItemId>,
    {
        items.into_iter().try_fold(0, |total: Valuation, item| {
            total
                .checked_add(self.value(item)?)
                .ok_or(ValuationError::Overflow { agent: self.id })
        })
    }

    /// Highest-valued item of `items`; ties go to the lowest item key.
    pub fn favorite_item(&self, items: &Items) -> Result<ItemId, ValuationError> {
        let mut favorite: Option<(ItemId, Valuation)> = None;
        for item in items {
            let value = self.value(item)?;
            match favorite {
                Some((_, best)) if value <= best => {}
                _ => favorite = Some((item, value)),
            }
        }
        favorite
            .map(|(item, _)| item)
            .ok_or(ValuationError::EmptyPool(self.id))
    }

    /// Lowest valuation among `bundle`'s items, `None` for an empty bundle.
    pub fn least_valued_in(&self, bundle: &Bundle) -> Result<Option<Valuation>, ValuationError> {
        let mut lowest: Option<Valuation> = None;
        for item in bundle.iter() {
            let value = self.value(item)?;
            lowest = Some(lowest.map_or(value, |current| current.min(value)));
        }
        Ok(lowest)
    }

    /// Whether this agent strictly prefers `other`'s bundle to its own.
    pub fn envies(&self, other: AgentId, allocation: &Allocation) -> Result<bool, ValuationError> {
        let own = self.value_of(allocation.for_agent(self.id)?)?;
        let theirs = self.value_of(allocation.for_agent(other)?)?;
        Ok(theirs > own)
    }
}

impl PartialEq for Agent {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Agent {}

/// Ordered collection of agents keyed by `AgentId`.
///
/// Uses a BTreeMap for deterministic iteration order: round robin, tie-break
/// derivation and the envy graph all rely on ascending agent order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Agents {
    agents: BTreeMap<AgentId, Agent>,
}

impl Agents {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build agents `1..=n` from a valuation matrix, row `i` for agent `i + 1`.
    pub fn from_matrix(rows: &[Vec<Valuation>]) -> Self {
        rows.iter()
            .enumerate()
            .map(|(i, row)| Agent::with_values(AgentId::new(i as u32 + 1), row))
            .collect()
    }

    /// Add or replace an agent.
    pub fn insert(&mut self, agent: Agent) {
        self.agents.insert(agent.id, agent);
    }

    /// Look up an agent.
    pub fn get(&self, id: &AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// Look up an agent mutably.
    pub fn get_mut(&mut self, id: &AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(id)
    }

    /// Whether the collection contains `id`.
    pub fn contains(&self, id: &AgentId) -> bool {
        self.agents.contains_key(id)
    }

    /// Number of agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether there are no agents.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Iterate agents in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = &Agent> + '_ {
        self.agents.values()
    }

    /// Agent keys in ascending order.
    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    /// Check that every agent values every item of `items` and that each
    /// agent's value for all of `items` fits in a [`Valuation`].
    ///
    /// Every bundle and every partial sum a driver or check computes is
    /// bounded by that total.
    pub fn ensure_valuations(&self, items: &Items) -> Result<(), ValuationError> {
        for agent in self.iter() {
            agent.value_of_items(items)?;
        }
        Ok(())
    }
}

impl FromIterator<Agent> for Agents {
    fn from_iter<T: IntoIterator<Item = Agent>>(iter: T) -> Self {
        Self {
            agents: iter.into_iter().map(|agent| (agent.id, agent)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_additive_bundle_value() {
        let agent = Agent::with_values(AgentId::new(1), &[3, 5, 7]);
        let bundle: Bundle = [1, 3].into_iter().map(ItemId::new).collect();
        assert_eq!(agent.value_of(&bundle).unwrap(), 10);
        assert_eq!(agent.value_of(&bundle.without(&ItemId::new(3))).unwrap(), 3);
    }

    #[test]
    fn test_missing_valuation_is_an_error() {
        let agent = Agent::with_values(AgentId::new(1), &[3]);
        let err = agent.value(ItemId::new(2)).unwrap_err();
        assert_eq!(
            err,
            ValuationError::MissingValuation { agent: AgentId::new(1), item: ItemId::new(2) }
        );
    }

    #[test]
    fn test_favorite_item_breaks_ties_by_lowest_key() {
        let agent = Agent::with_values(AgentId::new(1), &[4, 9, 9, 1]);
        assert_eq!(agent.favorite_item(&Items::range(1, 4)).unwrap(), ItemId::new(2));
        assert_eq!(
            agent.favorite_item(&Items::new()).unwrap_err(),
            ValuationError::EmptyPool(AgentId::new(1))
        );
    }

    #[test]
    fn test_least_valued_in() {
        let agent = Agent::with_values(AgentId::new(1), &[4, 2, 9]);
        let bundle: Bundle = [1, 2, 3].into_iter().map(ItemId::new).collect();
        assert_eq!(agent.least_valued_in(&bundle).unwrap(), Some(2));
        assert_eq!(agent.least_valued_in(&Bundle::new()).unwrap(), None);
    }

    #[test]
    fn test_envies() {
        let agents = Agents::from_matrix(&[vec![1, 5], vec![5, 1]]);
        let mut allocation = Allocation::new(&agents);
        allocation.allocate(AgentId::new(1), ItemId::new(1));
        allocation.allocate(AgentId::new(2), ItemId::new(2));

        let a1 = agents.get(&AgentId::new(1)).unwrap();
        let a2 = agents.get(&AgentId::new(2)).unwrap();
        assert!(a1.envies(AgentId::new(2), &allocation).unwrap());
        assert!(a2.envies(AgentId::new(1), &allocation).unwrap());
        assert!(!a1.envies(AgentId::new(1), &allocation).unwrap());
    }

    #[test]
    fn test_ensure_valuations() {
        let agents = Agents::from_matrix(&[vec![1, 2], vec![3]]);
        assert!(agents.ensure_valuations(&Items::range(1, 1)).is_ok());
        assert!(agents.ensure_valuations(&Items::range(1, 2)).is_err());
    }

    #[test]
    fn test_bundle_value_overflow_is_an_error() {
        let agent = Agent::with_values(AgentId::new(1), &[u64::MAX, 1]);
        assert_eq!(agent.value_of_items([ItemId::new(1)]).unwrap(), u64::MAX);
        assert_eq!(
            agent.value_of_items(Items::range(1, 2).iter()),
            Err(ValuationError::Overflow { agent: AgentId::new(1) })
        );

        let agents = Agents::from_matrix(&[vec![u64::MAX, 1]]);
        assert_eq!(
            agents.ensure_valuations(&Items::range(1, 2)),
            Err(ValuationError::Overflow { agent: AgentId::new(1) })
        );
    }
}
