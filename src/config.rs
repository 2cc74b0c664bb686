//! Run configuration.
//!
//! Environment variables:
//! - `FAIRDIV_ALGORITHM`: driver name (default: `envy_cycle_elimination`)
//! - `FAIRDIV_MAX_ATTEMPTS`: cap on exhaustive tie-break attempts (default: all `n!`)
//! - `FAIRDIV_MMS_ITEM_LIMIT`: largest item count for which reports compute
//!   the maximin share ratio (default: 20)
//! - `FAIRDIV_RANDOM_ATTEMPTS`: switch to a randomized tie-break search with
//!   this many attempts
//! - `FAIRDIV_SEED`: seed for the randomized search, read only together with
//!   `FAIRDIV_RANDOM_ATTEMPTS` (default: 0)
//! - `FAIRDIV_WORKERS`: threads for the exhaustive search (default: 1)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::algorithms::TieBreakSearch;
use crate::canonical::canonical_hash_hex;

/// Default for [`RunConfig::mms_item_limit`].
pub const DEFAULT_MMS_ITEM_LIMIT: usize = 20;

/// Error type for configuration loading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The algorithm name is not recognised.
    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),
    /// A numeric variable could not be parsed.
    #[error("Invalid value {value:?} for {variable}")]
    InvalidNumber {
        /// Variable name.
        variable: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Available allocation drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Round robin in ascending key order.
    RoundRobin,
    /// Envy-cycle elimination, graph rebuilt after rotations.
    EnvyCycleElimination,
    /// Envy-cycle elimination with incremental maintenance.
    FastEnvyCycleElimination,
    /// Envy-cycle elimination over the EFX-aware graph.
    EfxEnvyCycleElimination,
    /// EFX-preserving selection with tie-break backtracking.
    EfxPreserving,
    /// Golden-ratio drafts followed by envy-cycle elimination.
    DraftAndEliminate,
    /// Picking sequence from the ordered instance.
    OrderedPicking,
}

impl Algorithm {
    /// Every algorithm, in declaration order.
    pub const ALL: [Algorithm; 7] = [
        Self::RoundRobin,
        Self::EnvyCycleElimination,
        Self::FastEnvyCycleElimination,
        Self::EfxEnvyCycleElimination,
        Self::EfxPreserving,
        Self::DraftAndEliminate,
        Self::OrderedPicking,
    ];

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::EnvyCycleElimination => "envy_cycle_elimination",
            Self::FastEnvyCycleElimination => "fast_envy_cycle_elimination",
            Self::EfxEnvyCycleElimination => "efx_envy_cycle_elimination",
            Self::EfxPreserving => "efx_preserving",
            Self::DraftAndEliminate => "draft_and_eliminate",
            Self::OrderedPicking => "ordered_picking",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.name() == name)
            .ok_or_else(|| ConfigError::UnknownAlgorithm(s.to_string()))
    }
}

/// Parameters of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Driver to run.
    pub algorithm: Algorithm,
    /// Tie-break search for the EFX-preserving driver.
    pub tie_break: TieBreakSearch,
    /// Threads for the exhaustive tie-break search (1 = sequential).
    pub workers: usize,
    /// Maximin shares take exponential time in the item count, so reports
    /// leave the MMS ratio out above this many items.
    pub mms_item_limit: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::EnvyCycleElimination,
            tie_break: TieBreakSearch::default(),
            workers: 1,
            mms_item_limit: DEFAULT_MMS_ITEM_LIMIT,
        }
    }
}

impl RunConfig {
    /// Load from `FAIRDIV_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|variable| std::env::var(variable).ok())
    }

    /// Load from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let algorithm = match lookup("FAIRDIV_ALGORITHM") {
            Some(name) => name.parse()?,
            None => defaults.algorithm,
        };
        let workers = parse_number(&lookup, "FAIRDIV_WORKERS")?.unwrap_or(defaults.workers);
        let mms_item_limit =
            parse_number(&lookup, "FAIRDIV_MMS_ITEM_LIMIT")?.unwrap_or(defaults.mms_item_limit);

        let tie_break = match parse_number(&lookup, "FAIRDIV_RANDOM_ATTEMPTS")? {
            Some(attempts) => TieBreakSearch::Randomized {
                attempts,
                seed: parse_number(&lookup, "FAIRDIV_SEED")?.unwrap_or(0),
            },
            None => TieBreakSearch::Exhaustive {
                max_attempts: parse_number(&lookup, "FAIRDIV_MAX_ATTEMPTS")?,
            },
        };

        Ok(Self {
            algorithm,
            tie_break,
            workers: workers.max(1),
            mms_item_limit,
        })
    }

    /// Canonical hash of the parameters.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(self)
    }
}

fn parse_number<F, T>(lookup: &F, variable: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(variable)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber { variable, value })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RunConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, RunConfig::default());
    }

    #[test]
    fn test_algorithm_names_round_trip() {
        for algorithm in Algorithm::ALL {
            assert_eq!(algorithm.to_string().parse::<Algorithm>().unwrap(), algorithm);
        }
        assert_eq!("EFX_Preserving".parse::<Algorithm>().unwrap(), Algorithm::EfxPreserving);
        assert_eq!(
            "greedy".parse::<Algorithm>(),
            Err(ConfigError::UnknownAlgorithm("greedy".to_string()))
        );
    }

    #[test]
    fn test_randomized_search_from_env() {
        let config = RunConfig::from_lookup(lookup(&[
            ("FAIRDIV_ALGORITHM", "efx_preserving"),
            ("FAIRDIV_RANDOM_ATTEMPTS", "50"),
            ("FAIRDIV_SEED", "9"),
            ("FAIRDIV_WORKERS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.algorithm, Algorithm::EfxPreserving);
        assert_eq!(config.tie_break, TieBreakSearch::Randomized { attempts: 50, seed: 9 });
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn test_seed_only_reaches_the_randomized_search() {
        let exhaustive = RunConfig::from_lookup(lookup(&[("FAIRDIV_SEED", "9")])).unwrap();
        assert_eq!(exhaustive, RunConfig::default());
        assert_eq!(exhaustive.params_hash(), RunConfig::default().params_hash());

        let unseeded =
            RunConfig::from_lookup(lookup(&[("FAIRDIV_RANDOM_ATTEMPTS", "5")])).unwrap();
        assert_eq!(unseeded.tie_break, TieBreakSearch::Randomized { attempts: 5, seed: 0 });
    }

    #[test]
    fn test_mms_item_limit_from_env() {
        assert_eq!(RunConfig::default().mms_item_limit, DEFAULT_MMS_ITEM_LIMIT);

        let config =
            RunConfig::from_lookup(lookup(&[("FAIRDIV_MMS_ITEM_LIMIT", "8")])).unwrap();
        assert_eq!(config.mms_item_limit, 8);
        assert_ne!(config.params_hash(), RunConfig::default().params_hash());
    }

    #[test]
    fn test_capped_exhaustive_search() {
        let config = RunConfig::from_lookup(lookup(&[("FAIRDIV_MAX_ATTEMPTS", "120")])).unwrap();
        assert_eq!(config.tie_break, TieBreakSearch::Exhaustive { max_attempts: Some(120) });
    }

    #[test]
    fn test_invalid_number() {
        let err = RunConfig::from_lookup(lookup(&[("FAIRDIV_WORKERS", "many")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNumber { variable: "FAIRDIV_WORKERS", value: "many".to_string() }
        );
    }

    #[test]
    fn test_params_hash_tracks_parameters() {
        let base = RunConfig::default();
        let mut other = base.clone();
        other.algorithm = Algorithm::RoundRobin;

        assert_eq!(base.params_hash(), RunConfig::default().params_hash());
        assert_ne!(base.params_hash(), other.params_hash());
        assert_eq!(base.params_hash().len(), 16);
    }
}
