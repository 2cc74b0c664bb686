//! Envy graph construction, maintenance and cycle elimination.

pub mod graph;
pub mod efx;
pub mod cycle;

pub use graph::EnvyGraph;
pub use efx::efx_threatens;
pub use cycle::{eliminate_cycle, EnvyCycle, GraphMaintenance};
