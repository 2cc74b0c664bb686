//! Core value types: items, agents, bundles and allocations.

pub mod item;
pub mod agent;
pub mod bundle;
pub mod allocation;

pub use item::{ItemId, Items};
pub use agent::{Agent, AgentId, Agents, Valuation, ValuationError};
pub use bundle::Bundle;
pub use allocation::Allocation;
