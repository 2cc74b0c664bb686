//! Random additive instances.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::instance::{Instance, Restriction};
use crate::types::{Agent, AgentId, Agents, Items, Valuation};

/// Error type for instance generation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeneratorError {
    /// `min` exceeds `max`.
    #[error("Empty valuation range [{min}, {max}]")]
    EmptyRange {
        /// Lower bound.
        min: Valuation,
        /// Upper bound.
        max: Valuation,
    },
}

/// Draws additive valuations uniformly from `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditiveGenerator {
    min: Valuation,
    max: Valuation,
}

impl Default for AdditiveGenerator {
    fn default() -> Self {
        Self { min: 0, max: 100 }
    }
}

impl AdditiveGenerator {
    /// Generator over the inclusive range `[min, max]`.
    pub fn new(min: Valuation, max: Valuation) -> Result<Self, GeneratorError> {
        if min > max {
            return Err(GeneratorError::EmptyRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Instance with `agents` agents and `items` items drawn from `rng`.
    pub fn generate<R: Rng + ?Sized>(&self, agents: usize, items: usize, rng: &mut R) -> Instance {
        let pool = Items::range(1, items);
        let agents: Agents = (1..=agents as u32)
            .map(|key| {
                let mut agent = Agent::new(AgentId::new(key));
                for item in &pool {
                    agent.assign_valuation(item, rng.random_range(self.min..=self.max));
                }
                agent
            })
            .collect();

        Instance {
            agents,
            items: pool,
            restrictions: vec![Restriction::Additive],
        }
    }

    /// Reproducible instance from a seed.
    pub fn generate_seeded(&self, agents: usize, items: usize, seed: u64) -> Instance {
        let mut rng = StdRng::seed_from_u64(seed);
        self.generate(agents, items, &mut rng)
    }
}
