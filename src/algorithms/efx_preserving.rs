//! EFX-preserving cycle elimination with tie-break backtracking.
//!
//! ## Attempt
//!
//! One attempt runs under a fixed tie-break order of all agents:
//!
//! 1. Select an agent that can take any item without breaking EFX
//!    ([`select_efx_preserving_agent`])
//! 2. If there is none, rotate bundles along a cycle of the plain envy graph
//!    and select again
//! 3. If the envy graph is acyclic the attempt is stuck
//! 4. Otherwise the selected agent takes its favourite item
//!
//! ## Search
//!
//! A stuck attempt is abandoned and the next tie-break order is tried from an
//! empty allocation. Running out of orders is [`AllocationError::SearchExhausted`],
//! which says nothing about whether an EFX allocation exists.
//!
//! - `Exhaustive` walks indices `0, 1, 2, …` up to `n!` (or a cap)
//! - `Randomized` tries a bounded number of seeded random orders
//! - [`efx_preserving_parallel`] splits the exhaustive walk across threads and
//!   returns the same certificate as the sequential walk

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::envy::{efx_threatens, EnvyGraph};
use crate::tie_break::{encode, factorial, tie_break_order, TieBreakCursor, MAX_TIE_BREAK_AGENTS};
use crate::types::{AgentId, Agents, Allocation, Items};

use super::AllocationError;

/// How the backtracking driver enumerates tie-break orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum TieBreakSearch {
    /// Indices in increasing order, optionally capped.
    Exhaustive {
        /// Stop after this many attempts; `None` tries all `n!` orders.
        max_attempts: Option<u64>,
    },
    /// Seeded random orders.
    Randomized {
        /// Number of orders to try.
        attempts: u64,
        /// RNG seed.
        seed: u64,
    },
}

impl Default for TieBreakSearch {
    fn default() -> Self {
        Self::Exhaustive { max_attempts: None }
    }
}

/// A successful search: an allocation plus the order that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EfxCertificate {
    /// The allocation; EFX for additive valuations.
    pub allocation: Allocation,
    /// Tie-break order of the successful attempt.
    pub tie_break_order: Vec<AgentId>,
    /// Index of that order, when `n!` fits in a `u64`.
    pub tie_break_index: Option<u64>,
    /// Attempts made, including the successful one.
    pub attempts: u64,
}

/// Result of a single attempt under one tie-break order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Every item was placed.
    Complete(Allocation),
    /// No EFX-preserving agent and no envy cycle.
    Stuck {
        /// Allocation at the point of failure.
        allocation: Allocation,
        /// Items that could not be placed.
        items_left: Items,
    },
}

/// Find an agent that can receive any remaining item without breaking EFX.
///
/// Agents with an empty bundle qualify trivially; the earliest one in
/// `tie_break_order` is returned. Otherwise every agent threatened by someone
/// under the EFX-aware test is disqualified, and the earliest survivor in
/// `tie_break_order` is returned. `None` if nobody survives.
pub fn select_efx_preserving_agent(
    agents: &Agents,
    items_left: &Items,
    tie_break_order: &[AgentId],
    allocation: &Allocation,
) -> Result<Option<AgentId>, AllocationError> {
    for &agent in tie_break_order {
        if allocation.for_agent(agent)?.is_empty() {
            return Ok(Some(agent));
        }
    }

    let mut survivors: BTreeSet<AgentId> = agents.ids().into_iter().collect();
    for agent in agents.iter() {
        for other in agents.ids() {
            if survivors.contains(&other) && efx_threatens(agent, other, allocation, items_left)? {
                survivors.remove(&other);
            }
        }
    }

    if survivors.len() <= 1 {
        return Ok(survivors.into_iter().next());
    }
    Ok(tie_break_order
        .iter()
        .copied()
        .find(|agent| survivors.contains(agent))
        .or_else(|| survivors.into_iter().next()))
}

/// Run one attempt from an empty allocation under `tie_break_order`.
pub fn run_attempt(
    agents: &Agents,
    items: &Items,
    tie_break_order: &[AgentId],
) -> Result<AttemptOutcome, AllocationError> {
    let mut allocation = Allocation::new(agents);
    let mut items_left = items.clone();

    while !items_left.is_empty() {
        let selected = loop {
            if let Some(agent) =
                select_efx_preserving_agent(agents, &items_left, tie_break_order, &allocation)?
            {
                break Some(agent);
            }
            // each rotation strictly improves every rotated agent, so this
            // loop ends
            match EnvyGraph::build(agents, &allocation)?.find_cycle() {
                Some(cycle) => {
                    allocation.rotate(cycle.agents())?;
                    tracing::trace!(cycle_len = cycle.len(), "rotated bundles along envy cycle");
                }
                None => break None,
            }
        };

        let Some(agent_id) = selected else {
            return Ok(AttemptOutcome::Stuck { allocation, items_left });
        };
        let agent = agents
            .get(&agent_id)
            .ok_or(AllocationError::UnknownAgent(agent_id))?;
        let favorite = agent.favorite_item(&items_left)?;
        allocation.allocate(agent_id, favorite);
        items_left.remove(&favorite);
        tracing::trace!(agent = %agent_id, item = %favorite, "EFX-preserving pick");
    }

    Ok(AttemptOutcome::Complete(allocation))
}

/// Search tie-break orders until an attempt completes.
pub fn efx_preserving_cycle_elimination(
    agents: &Agents,
    items: &Items,
    search: &TieBreakSearch,
) -> Result<EfxCertificate, AllocationError> {
    tracing::debug!(agents = agents.len(), items = items.len(), ?search, "EFX-preserving search started");

    let result = match *search {
        TieBreakSearch::Exhaustive { max_attempts } => exhaustive(agents, items, max_attempts),
        TieBreakSearch::Randomized { attempts, seed } => randomized(agents, items, attempts, seed),
    };

    match &result {
        Ok(certificate) => tracing::debug!(
            attempts = certificate.attempts,
            tie_break_index = ?certificate.tie_break_index,
            "EFX-preserving search finished"
        ),
        Err(AllocationError::SearchExhausted { attempts }) => tracing::warn!(
            attempts,
            agents = agents.len(),
            items = items.len(),
            "EFX-preserving search exhausted without a certificate"
        ),
        Err(_) => {}
    }
    result
}

fn exhaustive(
    agents: &Agents,
    items: &Items,
    max_attempts: Option<u64>,
) -> Result<EfxCertificate, AllocationError> {
    let ids = agents.ids();
    let mut cursor = TieBreakCursor::new(ids.len())?;
    let mut attempts = 0u64;

    loop {
        if max_attempts.is_some_and(|cap| attempts >= cap) {
            return Err(AllocationError::SearchExhausted { attempts });
        }

        let index = cursor.current();
        let order = tie_break_order(&ids, index)?;
        attempts += 1;

        match run_attempt(agents, items, &order)? {
            AttemptOutcome::Complete(allocation) => {
                return Ok(EfxCertificate {
                    allocation,
                    tie_break_order: order,
                    tie_break_index: Some(index),
                    attempts,
                })
            }
            AttemptOutcome::Stuck { items_left, .. } => {
                tracing::debug!(index, items_left = items_left.len(), "attempt stuck");
            }
        }

        if cursor.advance().is_none() {
            return Err(AllocationError::SearchExhausted { attempts });
        }
    }
}

fn randomized(
    agents: &Agents,
    items: &Items,
    attempts: u64,
    seed: u64,
) -> Result<EfxCertificate, AllocationError> {
    let ids = agents.ids();
    let mut rng = StdRng::seed_from_u64(seed);

    for attempt in 1..=attempts {
        let mut order = ids.clone();
        order.shuffle(&mut rng);

        match run_attempt(agents, items, &order)? {
            AttemptOutcome::Complete(allocation) => {
                let tie_break_index = index_of_order(&ids, &order)?;
                return Ok(EfxCertificate {
                    allocation,
                    tie_break_order: order,
                    tie_break_index,
                    attempts: attempt,
                });
            }
            AttemptOutcome::Stuck { items_left, .. } => {
                tracing::debug!(attempt, items_left = items_left.len(), "randomized attempt stuck");
            }
        }
    }
    Err(AllocationError::SearchExhausted { attempts })
}

/// Index of `order` relative to the ascending agent keys `ids`.
fn index_of_order(ids: &[AgentId], order: &[AgentId]) -> Result<Option<u64>, AllocationError> {
    if ids.len() > MAX_TIE_BREAK_AGENTS {
        return Ok(None);
    }
    let lexical = order
        .iter()
        .map(|agent| ids.binary_search(agent).map_err(|_| AllocationError::UnknownAgent(*agent)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(encode(&lexical)?))
}

/// Exhaustive search split across `workers` threads.
///
/// Workers claim indices from a shared counter in increasing order and stop
/// once a lower index has already succeeded, so the certificate (allocation
/// and index) is the one the sequential search finds. `attempts` counts every
/// attempt actually run, which can exceed the sequential count.
pub fn efx_preserving_parallel(
    agents: &Agents,
    items: &Items,
    max_attempts: Option<u64>,
    workers: usize,
) -> Result<EfxCertificate, AllocationError> {
    let ids = agents.ids();
    let total = factorial(ids.len())?;
    let limit = max_attempts.map_or(total, |cap| cap.min(total));
    let workers = workers.max(1);

    tracing::debug!(agents = ids.len(), limit, workers, "parallel EFX-preserving search started");

    let next_index = AtomicU64::new(0);
    let attempts = AtomicU64::new(0);
    let best: Mutex<Option<(u64, Vec<AgentId>, Allocation)>> = Mutex::new(None);
    let failure: Mutex<Option<AllocationError>> = Mutex::new(None);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let index = next_index.fetch_add(1, Ordering::SeqCst);
                if index >= limit || failure.lock().is_some() {
                    break;
                }
                if best.lock().as_ref().is_some_and(|(found, _, _)| *found < index) {
                    break;
                }

                attempts.fetch_add(1, Ordering::SeqCst);
                let outcome = tie_break_order(&ids, index)
                    .map_err(AllocationError::from)
                    .and_then(|order| Ok((run_attempt(agents, items, &order)?, order)));

                match outcome {
                    Ok((AttemptOutcome::Complete(allocation), order)) => {
                        let mut best = best.lock();
                        if best.as_ref().map_or(true, |(found, _, _)| index < *found) {
                            *best = Some((index, order, allocation));
                        }
                    }
                    Ok((AttemptOutcome::Stuck { .. }, _)) => {
                        tracing::debug!(index, "parallel attempt stuck");
                    }
                    Err(error) => {
                        failure.lock().get_or_insert(error);
                        break;
                    }
                }
            });
        }
    });

    if let Some(error) = failure.into_inner() {
        return Err(error);
    }

    let attempts = attempts.into_inner();
    match best.into_inner() {
        Some((index, order, allocation)) => Ok(EfxCertificate {
            allocation,
            tie_break_order: order,
            tie_break_index: Some(index),
            attempts,
        }),
        None => {
            tracing::warn!(attempts, "parallel EFX-preserving search exhausted without a certificate");
            Err(AllocationError::SearchExhausted { attempts })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::{is_efx, Verdict};
    use crate::types::ItemId;

    fn a(key: u32) -> AgentId {
        AgentId::new(key)
    }

    #[test]
    fn test_empty_bundles_follow_tie_break_order() {
        let agents = Agents::from_matrix(&[vec![1, 1], vec![1, 1]]);
        let allocation = Allocation::new(&agents);
        let items = Items::range(1, 2);

        assert_eq!(
            select_efx_preserving_agent(&agents, &items, &[a(2), a(1)], &allocation).unwrap(),
            Some(a(2))
        );
        assert_eq!(
            select_efx_preserving_agent(&agents, &items, &[a(1), a(2)], &allocation).unwrap(),
            Some(a(1))
        );
    }

    #[test]
    fn test_threatened_agents_are_disqualified() {
        // agent 1 holds item 1 and agent 2 holds item 2; agent 2 would be
        // threatened by agent 1 once it gets item 3
        let agents = Agents::from_matrix(&[vec![2, 3, 3], vec![1, 1, 1]]);
        let mut allocation = Allocation::new(&agents);
        allocation.allocate(a(1), ItemId::new(1));
        allocation.allocate(a(2), ItemId::new(2));
        let items_left: Items = [ItemId::new(3)].into_iter().collect();

        assert_eq!(
            select_efx_preserving_agent(&agents, &items_left, &[a(2), a(1)], &allocation).unwrap(),
            Some(a(1))
        );
    }

    #[test]
    fn test_single_attempt_completes_for_identical_agents() {
        let agents = Agents::from_matrix(&[vec![6, 4, 3, 1], vec![6, 4, 3, 1], vec![6, 4, 3, 1]]);
        let items = Items::range(1, 4);
        let certificate =
            efx_preserving_cycle_elimination(&agents, &items, &TieBreakSearch::default()).unwrap();

        assert_eq!(certificate.allocation.allocated_items(), items);
        assert_eq!(is_efx(&agents, &certificate.allocation).unwrap(), Verdict::Satisfied);
        assert_eq!(certificate.tie_break_index, Some(0));
        assert_eq!(certificate.attempts, 1);
    }

    #[test]
    fn test_attempt_cap_reports_exhaustion() {
        let agents = Agents::from_matrix(&[vec![1, 1], vec![1, 1]]);
        let result = efx_preserving_cycle_elimination(
            &agents,
            &Items::range(1, 2),
            &TieBreakSearch::Exhaustive { max_attempts: Some(0) },
        );
        assert_eq!(result, Err(AllocationError::SearchExhausted { attempts: 0 }));
    }

    #[test]
    fn test_randomized_search_is_reproducible() {
        // identical valuations never get stuck: the poorest agent always survives
        let agents = Agents::from_matrix(&[vec![5, 2, 7, 1, 3], vec![5, 2, 7, 1, 3], vec![5, 2, 7, 1, 3]]);
        let items = Items::range(1, 5);
        let search = TieBreakSearch::Randomized { attempts: 10, seed: 7 };

        let first = efx_preserving_cycle_elimination(&agents, &items, &search).unwrap();
        let second = efx_preserving_cycle_elimination(&agents, &items, &search).unwrap();
        assert_eq!(first, second);

        let index = first.tie_break_index.unwrap();
        assert_eq!(tie_break_order(&agents.ids(), index).unwrap(), first.tie_break_order);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let agents = Agents::from_matrix(&[
            vec![9, 1, 4, 4, 2, 7],
            vec![1, 9, 4, 4, 7, 2],
            vec![5, 5, 1, 8, 3, 3],
            vec![2, 2, 9, 1, 6, 6],
        ]);
        let items = Items::range(1, 6);
        let sequential = efx_preserving_cycle_elimination(&agents, &items, &TieBreakSearch::default())
            .map(|c| (c.allocation, c.tie_break_index));
        let parallel = efx_preserving_parallel(&agents, &items, None, 4)
            .map(|c| (c.allocation, c.tie_break_index));

        assert_eq!(parallel, sequential);
    }
}
