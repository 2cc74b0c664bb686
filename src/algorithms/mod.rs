//! Allocation drivers.
//!
//! Every driver is a pure function of its inputs: same agents, items and
//! parameters always give the same allocation.
//!
//! | Driver | Guarantee (additive valuations) |
//! |--------|---------------------------------|
//! | `round_robin` | EF1 |
//! | `envy_cycle_elimination` | EF1, 1/2-EFX, 1/2-MMS |
//! | `fast_envy_cycle_elimination` | same as above, incremental graph |
//! | `efx_envy_cycle_elimination` | EFX-aware graph, fails if stuck |
//! | `efx_preserving_cycle_elimination` | EFX when a certificate is found |
//! | `draft_and_eliminate` | EF1, φ-1-EFX |
//! | `ordered_picking` | EEFX, 2/3-MMS |

pub mod round_robin;
pub mod envy_cycle_elimination;
pub mod efx_envy_cycle_elimination;
pub mod efx_preserving;
pub mod draft_and_eliminate;
pub mod ordered_picking;

use crate::tie_break::TieBreakError;
use crate::types::{AgentId, ValuationError};

pub use round_robin::{round_robin, Steps};
pub use envy_cycle_elimination::{envy_cycle_elimination, fast_envy_cycle_elimination, PreferenceLists};
pub use efx_envy_cycle_elimination::efx_envy_cycle_elimination;
pub use efx_preserving::{
    efx_preserving_cycle_elimination, efx_preserving_parallel, select_efx_preserving_agent,
    run_attempt, AttemptOutcome, EfxCertificate, TieBreakSearch,
};
pub use draft_and_eliminate::{draft_and_eliminate, preprocessing, Draft};
pub use ordered_picking::ordered_picking;

/// Error type for allocation drivers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    /// The valuation model was queried outside its contract.
    #[error("Valuation invariant violated: {0}")]
    Valuation(#[from] ValuationError),
    /// Tie-break encoding failed.
    #[error("Tie-break error: {0}")]
    TieBreak(#[from] TieBreakError),
    /// A driver reached a state its correctness argument rules out.
    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),
    /// The EFX-aware envy graph has neither an unenvied agent nor a cycle.
    #[error("EFX-aware envy graph has no unenvied agent and no cycle")]
    NoUnenviedAgent,
    /// The EFX-preserving search ran out of tie-break orders.
    ///
    /// This does not mean no EFX allocation exists.
    #[error("No EFX certificate found within {attempts} tie-break attempts")]
    SearchExhausted {
        /// Number of tie-break orders tried.
        attempts: u64,
    },
    /// A picking order names an agent that is not part of the instance.
    #[error("Unknown agent in ordering: {0}")]
    UnknownAgent(AgentId),
    /// Items remain to be picked but the picking order is empty.
    #[error("Picking order is empty")]
    EmptyOrdering,
}
