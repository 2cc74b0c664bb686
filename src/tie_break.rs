//! Tie-break orders: a bijection between `[0, n!)` and permutations of agents.
//!
//! ## Encoding
//!
//! Agents are placed in ascending key order. The first agent has `n` free
//! slots, so `[0, n!)` is split into `n` equal blocks of `(n-1)!` and the
//! block containing the index picks its slot. The remainder then picks one of
//! the `n-1` free slots for the second agent, and so on:
//!
//! ```text
//! base = n!
//! for k in 0..n:
//!     base /= n - k
//!     order[(t / base)-th free slot] = agent k
//!     t %= base
//! ```
//!
//! Index 0 is the identity order; index `n! - 1` is the reversed order.
//!
//! ## Advance order
//!
//! `TieBreakCursor` walks indices in plain increasing order. Every one of the
//! `n!` permutations is reached exactly once and the first certified order is
//! the one with the lowest index.

use serde::{Deserialize, Serialize};

use crate::types::AgentId;

/// Largest agent count whose factorial fits in a `u64`.
pub const MAX_TIE_BREAK_AGENTS: usize = 20;

/// Error type for tie-break encoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TieBreakError {
    /// Index is not below `n!`.
    #[error("tie-break index {index} out of range for {count} orders")]
    IndexOutOfRange {
        /// Requested index.
        index: u64,
        /// Number of orders (`n!`).
        count: u64,
    },
    /// `n!` does not fit in a `u64`.
    #[error("{agents} agents exceed the tie-break limit of 20")]
    TooManyAgents {
        /// Requested agent count.
        agents: usize,
    },
    /// The slice is not a permutation of `0..n`.
    #[error("order is not a permutation of 0..{0}")]
    NotAPermutation(usize),
}

/// `n!`, or an error if it overflows.
pub fn factorial(n: usize) -> Result<u64, TieBreakError> {
    if n > MAX_TIE_BREAK_AGENTS {
        return Err(TieBreakError::TooManyAgents { agents: n });
    }
    Ok((1..=n as u64).product())
}

/// Decode `index` into a permutation: `order[position] = lexical agent index`.
pub fn decode(index: u64, n: usize) -> Result<Vec<usize>, TieBreakError> {
    let count = factorial(n)?;
    if index >= count {
        return Err(TieBreakError::IndexOutOfRange { index, count });
    }

    let mut slots: Vec<Option<usize>> = vec![None; n];
    let mut base = count;
    let mut remainder = index;

    for agent in 0..n {
        base /= (n - agent) as u64;
        let skip = (remainder / base) as usize;
        remainder %= base;

        // skip-th free slot in increasing position order; always exists
        // because exactly n - agent slots are still free and skip < n - agent
        let slot = slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_none())
            .nth(skip)
            .map(|(position, _)| position)
            .ok_or(TieBreakError::IndexOutOfRange { index, count })?;
        slots[slot] = Some(agent);
    }

    slots
        .into_iter()
        .collect::<Option<Vec<usize>>>()
        .ok_or(TieBreakError::NotAPermutation(n))
}

/// Encode a permutation back into its index. Inverse of [`decode`].
pub fn encode(order: &[usize]) -> Result<u64, TieBreakError> {
    let n = order.len();
    let mut positions = vec![usize::MAX; n];
    for (position, &agent) in order.iter().enumerate() {
        if agent >= n || positions[agent] != usize::MAX {
            return Err(TieBreakError::NotAPermutation(n));
        }
        positions[agent] = position;
    }

    let mut occupied = vec![false; n];
    let mut base = factorial(n)?;
    let mut index = 0u64;

    for (agent, &position) in positions.iter().enumerate() {
        base /= (n - agent) as u64;
        let free_before = occupied[..position].iter().filter(|&&taken| !taken).count() as u64;
        index += free_before * base;
        occupied[position] = true;
    }
    Ok(index)
}

/// The tie-break order of `agents` (ascending keys) for `index`.
pub fn tie_break_order(agents: &[AgentId], index: u64) -> Result<Vec<AgentId>, TieBreakError> {
    Ok(decode(index, agents.len())?
        .into_iter()
        .map(|lexical| agents[lexical])
        .collect())
}

/// Cursor over tie-break indices for the backtracking search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieBreakCursor {
    index: u64,
    count: u64,
}

impl TieBreakCursor {
    /// Start at index 0 of `n!` orders.
    pub fn new(agents: usize) -> Result<Self, TieBreakError> {
        Ok(Self {
            index: 0,
            count: factorial(agents)?,
        })
    }

    /// The current index.
    pub fn current(&self) -> u64 {
        self.index
    }

    /// Total number of orders.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Move to the next index; `None` once the last index has been tried.
    pub fn advance(&mut self) -> Option<u64> {
        if self.index + 1 >= self.count {
            return None;
        }
        self.index += 1;
        Some(self.index)
    }
}
