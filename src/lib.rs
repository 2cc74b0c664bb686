//! # fairdiv-kernel
//!
//! Envy-graph allocation engine for fair division of indivisible goods.
//!
//! The kernel answers one question:
//!
//! > Given agents with additive valuations, how should the items be split so
//! > that the result is **provably fair**?
//!
//! ## Core Contract
//!
//! 1. Every driver is a pure function of agents, items and parameters
//! 2. Every allocation can be re-checked by an independent oracle
//! 3. Every run produces a fingerprinted, serializable report
//!
//! ## Architecture
//!
//! ```text
//! Instance → Driver → Allocation → Oracle → AllocationReport
//!              ↓
//!   EnvyGraph ⇄ Cycle rotation
//!              ↓
//!   TieBreakCursor (EFX-preserving backtracking)
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Agents and items iterate in ascending key order everywhere
//! - Favourite-item ties go to the lowest item key
//! - Unenvied-agent ties go to an empty bundle, then the lowest agent key
//! - Tie-break indices decode to the same order on every platform

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod envy;
pub mod tie_break;
pub mod algorithms;
pub mod checkers;
pub mod instance;
pub mod generator;
pub mod config;
pub mod runner;
pub mod canonical;

// Re-exports
pub use types::{Agent, AgentId, Agents, Allocation, Bundle, ItemId, Items, Valuation, ValuationError};
pub use envy::{efx_threatens, eliminate_cycle, EnvyCycle, EnvyGraph, GraphMaintenance};
pub use tie_break::{decode, encode, factorial, tie_break_order, TieBreakCursor, TieBreakError};
pub use algorithms::{
    draft_and_eliminate, efx_envy_cycle_elimination, efx_preserving_cycle_elimination,
    efx_preserving_parallel, envy_cycle_elimination, fast_envy_cycle_elimination, ordered_picking,
    round_robin, select_efx_preserving_agent, AllocationError, EfxCertificate, Steps,
    TieBreakSearch,
};
pub use checkers::Verdict;
pub use instance::{ImportError, Instance, Restriction};
pub use generator::{AdditiveGenerator, GeneratorError};
pub use config::{Algorithm, ConfigError, RunConfig};
pub use runner::{run, AllocationReport, FairnessRatios, REPORT_SCHEMA_VERSION};
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};
