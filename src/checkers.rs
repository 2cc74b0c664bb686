//! Fairness oracle: independent checks of envy-based (EF, EF1, EF2, EFX,
//! EEFX) and share-based (PROP, PROP1, MMS) properties.
//!
//! Checks never look at how an allocation was produced. Each returns a
//! [`Verdict`] naming a counterexample, and the `highest_*_approximation`
//! functions return the largest `α ∈ [0, 1]` for which the α-relaxed property
//! holds, rounded to three decimal places.
//!
//! Agents with empty bundles are never envied, so pairs `(i, j)` with an
//! empty `B_j` are skipped throughout.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{
    Agent, AgentId, Agents, Allocation, Bundle, ItemId, Items, Valuation, ValuationError,
};

/// Outcome of a fairness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// The property holds.
    Satisfied,
    /// `envious` is not satisfied towards `envied`.
    Envy {
        /// Agent whose requirement fails.
        envious: AgentId,
        /// Agent whose bundle it prefers.
        envied: AgentId,
    },
    /// `agent`'s own bundle is below its threshold.
    Unsatisfied {
        /// Agent whose requirement fails.
        agent: AgentId,
    },
}

impl Verdict {
    /// Whether the property holds.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Every `(agent_i, id_j, B_j)` with `i ≠ j` and `B_j` non-empty.
fn envy_pairs<'a>(
    agents: &'a Agents,
    allocation: &'a Allocation,
) -> impl Iterator<Item = (&'a Agent, AgentId, &'a Bundle)> + 'a {
    agents.iter().flat_map(move |agent| {
        allocation
            .iter()
            .filter(move |(other, bundle)| *other != agent.id && !bundle.is_empty())
            .map(move |(other, bundle)| (agent, other, bundle))
    })
}

fn own_value(agent: &Agent, allocation: &Allocation) -> Result<Valuation, ValuationError> {
    agent.value_of(allocation.for_agent(agent.id)?)
}

/// Values `agent` assigns to `bundle` minus each single item, with that
/// item's own value. Additive, so `v(B \ g) = v(B) - v(g)`.
fn values_without_one(agent: &Agent, bundle: &Bundle) -> Result<Vec<(Valuation, Valuation)>, ValuationError> {
    let whole = agent.value_of(bundle)?;
    bundle
        .iter()
        .map(|item| {
            let value = agent.value(item)?;
            Ok::<_, ValuationError>((value, whole - value))
        })
        .collect()
}

/// Envy-freeness: nobody strictly prefers another bundle.
pub fn is_ef(agents: &Agents, allocation: &Allocation) -> Result<Verdict, ValuationError> {
    for (agent, other, bundle) in envy_pairs(agents, allocation) {
        if agent.value_of(bundle)? > own_value(agent, allocation)? {
            return Ok(Verdict::Envy { envious: agent.id, envied: other });
        }
    }
    Ok(Verdict::Satisfied)
}

/// EF1: for every pair some single removal from `B_j` removes the envy.
pub fn is_ef1(agents: &Agents, allocation: &Allocation) -> Result<Verdict, ValuationError> {
    for (agent, other, bundle) in envy_pairs(agents, allocation) {
        let own = own_value(agent, allocation)?;
        let removals = values_without_one(agent, bundle)?;
        if !removals.iter().any(|(_, rest)| *rest <= own) {
            return Ok(Verdict::Envy { envious: agent.id, envied: other });
        }
    }
    Ok(Verdict::Satisfied)
}

/// EFX: for every pair every removal of a positively valued item from `B_j`
/// removes the envy.
pub fn is_efx(agents: &Agents, allocation: &Allocation) -> Result<Verdict, ValuationError> {
    for (agent, other, bundle) in envy_pairs(agents, allocation) {
        let own = own_value(agent, allocation)?;
        let removals = values_without_one(agent, bundle)?;
        if removals.iter().any(|(value, rest)| *value > 0 && *rest > own) {
            return Ok(Verdict::Envy { envious: agent.id, envied: other });
        }
    }
    Ok(Verdict::Satisfied)
}

/// EF2: for every pair removing the two items `i` values most in `B_j`
/// removes the envy.
pub fn is_ef2(agents: &Agents, allocation: &Allocation) -> Result<Verdict, ValuationError> {
    for (agent, other, bundle) in envy_pairs(agents, allocation) {
        let own = own_value(agent, allocation)?;
        let mut values = bundle
            .iter()
            .map(|item| agent.value(item))
            .collect::<Result<Vec<_>, _>>()?;
        values.sort_unstable_by(|x, y| y.cmp(x));
        let rest = agent.value_of(bundle)? - values.iter().take(2).sum::<Valuation>();
        if rest > own {
            return Ok(Verdict::Envy { envious: agent.id, envied: other });
        }
    }
    Ok(Verdict::Satisfied)
}

/// Whether `agent`, holding a bundle it values at `own`, is EFX-satisfied
/// towards every other non-empty bundle of `allocation`.
fn efx_satisfied(agent: &Agent, own: Valuation, allocation: &Allocation) -> Result<bool, ValuationError> {
    for (other, bundle) in allocation.iter() {
        if other == agent.id || bundle.is_empty() {
            continue;
        }
        if values_without_one(agent, bundle)?
            .iter()
            .any(|(value, rest)| *value > 0 && *rest > own)
        {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Epistemic EFX: for every agent `i` there is some way of sharing the items
/// outside `B_i` among the other agents under which `i` is EFX-satisfied.
///
/// Brute force over [`all_allocations`]; exponential in the item count.
/// An agent alone with items left outside its bundle fails, since nobody can
/// hold them.
pub fn is_eefx(agents: &Agents, items: &Items, allocation: &Allocation) -> Result<Verdict, ValuationError> {
    for agent in agents.iter() {
        let bundle = allocation.for_agent(agent.id)?;
        let own = agent.value_of(bundle)?;
        let outside: Items = items.iter().filter(|item| !bundle.contains(item)).collect();
        let others: Vec<AgentId> = agents.ids().into_iter().filter(|id| *id != agent.id).collect();

        let mut witnessed = false;
        for candidate in all_allocations(&others, &outside) {
            if efx_satisfied(agent, own, &candidate)? {
                witnessed = true;
                break;
            }
        }
        if !witnessed {
            return Ok(Verdict::Unsatisfied { agent: agent.id });
        }
    }
    Ok(Verdict::Satisfied)
}

/// Proportionality: everyone gets at least `1/n` of their value for `items`.
pub fn is_prop(agents: &Agents, items: &Items, allocation: &Allocation) -> Result<Verdict, ValuationError> {
    let n = agents.len() as u128;
    for agent in agents.iter() {
        let own = own_value(agent, allocation)? as u128;
        let total = agent.value_of_items(items)? as u128;
        if own * n < total {
            return Ok(Verdict::Unsatisfied { agent: agent.id });
        }
    }
    Ok(Verdict::Satisfied)
}

/// PROP1: everyone reaches `1/n` of their value for `items` once given their
/// favorite item from outside their bundle.
pub fn is_prop1(agents: &Agents, items: &Items, allocation: &Allocation) -> Result<Verdict, ValuationError> {
    let n = agents.len() as u128;
    for agent in agents.iter() {
        let bundle = allocation.for_agent(agent.id)?;
        let own = agent.value_of(bundle)? as u128;
        let mut best_outside: Valuation = 0;
        for item in items.iter().filter(|item| !bundle.contains(item)) {
            best_outside = best_outside.max(agent.value(item)?);
        }
        let total = agent.value_of_items(items)? as u128;
        if (own + best_outside as u128) * n < total {
            return Ok(Verdict::Unsatisfied { agent: agent.id });
        }
    }
    Ok(Verdict::Satisfied)
}

/// The best worst-bundle value `agent` can guarantee by splitting `items`
/// into `parts` bundles.
///
/// Exact branch-and-bound search; exponential in the number of items.
pub fn maximin_share(agent: &Agent, items: &Items, parts: usize) -> Result<Valuation, ValuationError> {
    if parts == 0 {
        return Ok(0);
    }
    let mut values = items
        .iter()
        .map(|item| agent.value(item))
        .collect::<Result<Vec<_>, _>>()?;
    values.sort_unstable_by(|a, b| b.cmp(a));

    // bounds every bin and suffix sum below
    let total = agent.value_of_items(items)?;
    let mut suffix = vec![0; values.len() + 1];
    for i in (0..values.len()).rev() {
        suffix[i] = suffix[i + 1] + values[i];
    }

    let mut search = PartitionSearch {
        values: &values,
        suffix: &suffix,
        bins: vec![0; parts],
        best: 0,
        bound: total / parts as Valuation,
    };
    search.place(0);
    Ok(search.best)
}

struct PartitionSearch<'a> {
    values: &'a [Valuation],
    suffix: &'a [Valuation],
    bins: Vec<Valuation>,
    best: Valuation,
    bound: Valuation,
}

impl PartitionSearch<'_> {
    fn place(&mut self, next: usize) {
        if self.best >= self.bound {
            return;
        }
        if next == self.values.len() {
            let worst = self.bins.iter().copied().min().unwrap_or(0);
            self.best = self.best.max(worst);
            return;
        }
        // the worst bin can at best absorb everything still unplaced
        let lowest = self.bins.iter().copied().min().unwrap_or(0);
        if lowest + self.suffix[next] <= self.best {
            return;
        }

        let mut tried_empty = false;
        for bin in 0..self.bins.len() {
            if self.bins[bin] == 0 {
                // empty bins are interchangeable
                if tried_empty {
                    continue;
                }
                tried_empty = true;
            }
            self.bins[bin] += self.values[next];
            self.place(next + 1);
            self.bins[bin] -= self.values[next];
        }
    }
}

/// Maximin share of every agent for `items` split among all agents.
pub fn maximin_shares(agents: &Agents, items: &Items) -> Result<BTreeMap<AgentId, Valuation>, ValuationError> {
    agents
        .iter()
        .map(|agent| Ok::<_, ValuationError>((agent.id, maximin_share(agent, items, agents.len())?)))
        .collect()
}

/// MMS fairness: everyone gets at least their maximin share.
pub fn is_mms(agents: &Agents, items: &Items, allocation: &Allocation) -> Result<Verdict, ValuationError> {
    let shares = maximin_shares(agents, items)?;
    for agent in agents.iter() {
        let share = shares.get(&agent.id).copied().unwrap_or(0);
        if own_value(agent, allocation)? < share {
            return Ok(Verdict::Unsatisfied { agent: agent.id });
        }
    }
    Ok(Verdict::Satisfied)
}

/// Largest `α` such that the allocation is α-EF1.
pub fn highest_ef1_approximation(agents: &Agents, allocation: &Allocation) -> Result<f64, ValuationError> {
    let mut alpha = 1.0f64;
    for (agent, _, bundle) in envy_pairs(agents, allocation) {
        let own = own_value(agent, allocation)?;
        let removals = values_without_one(agent, bundle)?;
        if removals.iter().any(|(_, rest)| *rest <= own) {
            continue;
        }
        // every rest > own >= 0 here
        let best = removals
            .iter()
            .map(|(_, rest)| own as f64 / *rest as f64)
            .fold(0.0, f64::max);
        alpha = alpha.min(best);
    }
    Ok(round3(alpha))
}

/// Largest `α` such that the allocation is α-EFX.
pub fn highest_efx_approximation(agents: &Agents, allocation: &Allocation) -> Result<f64, ValuationError> {
    let mut alpha = 1.0f64;
    for (agent, _, bundle) in envy_pairs(agents, allocation) {
        let own = own_value(agent, allocation)?;
        for (value, rest) in values_without_one(agent, bundle)? {
            if value > 0 && rest > own {
                alpha = alpha.min(own as f64 / rest as f64);
            }
        }
    }
    Ok(round3(alpha))
}

/// Largest `α` such that the allocation is α-PROP.
pub fn highest_prop_approximation(
    agents: &Agents,
    items: &Items,
    allocation: &Allocation,
) -> Result<f64, ValuationError> {
    let n = agents.len() as f64;
    let mut alpha = 1.0f64;
    for agent in agents.iter() {
        let own = own_value(agent, allocation)? as f64;
        let fair_share = agent.value_of_items(items)? as f64 / n;
        if own < fair_share {
            alpha = alpha.min(own / fair_share);
        }
    }
    Ok(round3(alpha))
}

/// Largest `α` such that the allocation is α-MMS.
pub fn highest_mms_approximation(
    agents: &Agents,
    items: &Items,
    allocation: &Allocation,
) -> Result<f64, ValuationError> {
    let shares = maximin_shares(agents, items)?;
    let mut alpha = 1.0f64;
    for agent in agents.iter() {
        let share = shares.get(&agent.id).copied().unwrap_or(0);
        let own = own_value(agent, allocation)?;
        if own < share {
            alpha = alpha.min(own as f64 / share as f64);
        }
    }
    Ok(round3(alpha))
}

/// Fraction of agents that are EFX-satisfied towards everyone.
pub fn efx_satisfied_fraction(agents: &Agents, allocation: &Allocation) -> Result<f64, ValuationError> {
    if agents.is_empty() {
        return Ok(1.0);
    }
    let mut satisfied = 0usize;
    for agent in agents.iter() {
        if efx_satisfied(agent, own_value(agent, allocation)?, allocation)? {
            satisfied += 1;
        }
    }
    Ok(round3(satisfied as f64 / agents.len() as f64))
}

/// Iterator over every way of giving each item to one agent.
///
/// Allocations are enumerated as base-`n` numbers with one digit per item,
/// the first item being the least significant digit.
#[derive(Debug, Clone)]
pub struct AllAllocations {
    ids: Vec<AgentId>,
    items: Vec<ItemId>,
    digits: Vec<usize>,
    done: bool,
}

impl Iterator for AllAllocations {
    type Item = Allocation;

    fn next(&mut self) -> Option<Allocation> {
        if self.done {
            return None;
        }
        let mut allocation = Allocation::for_ids(self.ids.iter().copied());
        for (&item, &digit) in self.items.iter().zip(&self.digits) {
            allocation.allocate(self.ids[digit], item);
        }

        self.done = true;
        for digit in &mut self.digits {
            *digit += 1;
            if *digit < self.ids.len() {
                self.done = false;
                break;
            }
            *digit = 0;
        }
        Some(allocation)
    }
}

/// All `n^m` allocations of `items` to `ids`.
///
/// With no items this is the single empty allocation; with items but no
/// agents it is empty.
pub fn all_allocations(ids: &[AgentId], items: &Items) -> AllAllocations {
    let items: Vec<ItemId> = items.iter().collect();
    AllAllocations {
        done: ids.is_empty() && !items.is_empty(),
        digits: vec![0; items.len()],
        ids: ids.to_vec(),
        items,
    }
}
