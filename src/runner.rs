//! Run a configured driver on an instance and certify the result.
//!
//! The report carries everything needed to reproduce and audit a run: the
//! parameters hash, the allocation and its fingerprint, and the oracle's
//! approximation ratios computed independently of the driver.

use serde::{Deserialize, Serialize};

use crate::algorithms::{
    draft_and_eliminate, efx_envy_cycle_elimination, efx_preserving_cycle_elimination,
    efx_preserving_parallel, envy_cycle_elimination, fast_envy_cycle_elimination, ordered_picking,
    round_robin, AllocationError, Steps, TieBreakSearch,
};
use crate::checkers::{
    efx_satisfied_fraction, highest_ef1_approximation, highest_efx_approximation,
    highest_mms_approximation, highest_prop_approximation,
};
use crate::config::{Algorithm, RunConfig};
use crate::instance::Instance;
use crate::types::{Allocation, Items};

/// Report schema version.
pub const REPORT_SCHEMA_VERSION: &str = "1.0.0";

/// Oracle ratios, each in `[0, 1]` and rounded to three decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FairnessRatios {
    /// Largest α for α-EF1.
    pub ef1: f64,
    /// Largest α for α-EFX.
    pub efx: f64,
    /// Largest α for α-PROP.
    pub prop: f64,
    /// Largest α for α-MMS, or `None` when the instance has more items than
    /// [`RunConfig::mms_item_limit`].
    pub mms: Option<f64>,
    /// Fraction of EFX-satisfied agents.
    pub efx_satisfied_fraction: f64,
}

/// Result of [`run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationReport {
    /// Report schema version.
    pub schema_version: String,
    /// Driver that produced the allocation.
    pub algorithm: Algorithm,
    /// Canonical hash of the run configuration.
    pub params_hash: String,
    /// The allocation.
    pub allocation: Allocation,
    /// Canonical hash of the allocation.
    pub fingerprint: String,
    /// Items the driver left unallocated.
    pub leftover_items: Items,
    /// Oracle ratios.
    pub ratios: FairnessRatios,
    /// Tie-break index certifying an EFX-preserving run.
    pub tie_break_index: Option<u64>,
    /// Tie-break attempts made by an EFX-preserving run.
    pub attempts: Option<u64>,
    /// When the report was produced.
    pub generated_at_unix_ms: i64,
}

/// Run `config.algorithm` on `instance`.
pub fn run(config: &RunConfig, instance: &Instance) -> Result<AllocationReport, AllocationError> {
    instance.validate()?;
    let agents = &instance.agents;
    let items = &instance.items;

    tracing::info!(
        algorithm = %config.algorithm,
        agents = agents.len(),
        items = items.len(),
        "running allocation"
    );

    let mut tie_break_index = None;
    let mut attempts = None;

    let allocation = match config.algorithm {
        Algorithm::RoundRobin => {
            let (allocation, _) = round_robin(
                agents,
                Allocation::new(agents),
                items,
                &agents.ids(),
                Steps::Unbounded,
            )?;
            allocation
        }
        Algorithm::EnvyCycleElimination => envy_cycle_elimination(agents, items, Allocation::new(agents))?,
        Algorithm::FastEnvyCycleElimination => {
            fast_envy_cycle_elimination(agents, items, Allocation::new(agents))?
        }
        Algorithm::EfxEnvyCycleElimination => efx_envy_cycle_elimination(agents, items)?,
        Algorithm::EfxPreserving => {
            let certificate = match config.tie_break {
                TieBreakSearch::Exhaustive { max_attempts } if config.workers > 1 => {
                    efx_preserving_parallel(agents, items, max_attempts, config.workers)?
                }
                search => efx_preserving_cycle_elimination(agents, items, &search)?,
            };
            tie_break_index = certificate.tie_break_index;
            attempts = Some(certificate.attempts);
            certificate.allocation
        }
        Algorithm::DraftAndEliminate => draft_and_eliminate(agents, items)?,
        Algorithm::OrderedPicking => ordered_picking(agents, items)?,
    };

    let allocated = allocation.allocated_items();
    let leftover_items: Items = items.iter().filter(|item| !allocated.contains(item)).collect();

    let ratios = FairnessRatios {
        ef1: highest_ef1_approximation(agents, &allocation)?,
        efx: highest_efx_approximation(agents, &allocation)?,
        prop: highest_prop_approximation(agents, items, &allocation)?,
        mms: if items.len() <= config.mms_item_limit {
            Some(highest_mms_approximation(agents, items, &allocation)?)
        } else {
            tracing::debug!(
                items = items.len(),
                limit = config.mms_item_limit,
                "skipping maximin shares"
            );
            None
        },
        efx_satisfied_fraction: efx_satisfied_fraction(agents, &allocation)?,
    };

    let report = AllocationReport {
        schema_version: REPORT_SCHEMA_VERSION.to_string(),
        algorithm: config.algorithm,
        params_hash: config.params_hash(),
        fingerprint: allocation.fingerprint(),
        allocation,
        leftover_items,
        ratios,
        tie_break_index,
        attempts,
        generated_at_unix_ms: chrono::Utc::now().timestamp_millis(),
    };

    tracing::info!(
        algorithm = %report.algorithm,
        fingerprint = %report.fingerprint,
        ef1 = report.ratios.ef1,
        efx = report.ratios.efx,
        "allocation complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentId, ValuationError};

    fn sample() -> Instance {
        Instance::from_matrix(&[vec![8, 6, 4, 2], vec![2, 4, 6, 8], vec![5, 5, 5, 5]])
    }

    #[test]
    fn test_every_algorithm_allocates_everything() {
        let instance = sample();
        for algorithm in Algorithm::ALL {
            let config = RunConfig { algorithm, ..RunConfig::default() };
            let report = run(&config, &instance).unwrap();

            assert_eq!(report.algorithm, algorithm);
            assert!(report.leftover_items.is_empty(), "{algorithm} left items");
            assert_eq!(report.allocation.allocated_items(), instance.items);
            assert_eq!(report.fingerprint, report.allocation.fingerprint());
            assert_eq!(report.params_hash, config.params_hash());
        }
    }

    #[test]
    fn test_efx_preserving_report_carries_certificate() {
        let config = RunConfig { algorithm: Algorithm::EfxPreserving, ..RunConfig::default() };
        let report = run(&config, &sample()).unwrap();

        assert!(report.tie_break_index.is_some());
        assert!(report.attempts.unwrap() >= 1);
        assert_eq!(report.ratios.efx, 1.0);
    }

    #[test]
    fn test_mms_ratio_respects_item_limit() {
        let report = run(&RunConfig::default(), &sample()).unwrap();
        assert!(report.ratios.mms.is_some());

        let config = RunConfig { mms_item_limit: 3, ..RunConfig::default() };
        let report = run(&config, &sample()).unwrap();
        assert_eq!(report.ratios.mms, None);
        assert!(report.ratios.ef1 > 0.0);
    }

    #[test]
    fn test_overflowing_bundle_value_is_an_error() {
        let instance = Instance::parse(&format!("additive\n1 2\n{} 1\n", u64::MAX)).unwrap();
        assert_eq!(
            run(&RunConfig::default(), &instance).unwrap_err(),
            AllocationError::Valuation(ValuationError::Overflow { agent: AgentId::new(1) })
        );
    }

    #[test]
    fn test_report_serializes() {
        let report = run(&RunConfig::default(), &sample()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["algorithm"], "envy_cycle_elimination");
        assert_eq!(json["schema_version"], REPORT_SCHEMA_VERSION);
    }

    #[test]
    fn test_invalid_instance_is_rejected() {
        let mut instance = sample();
        instance.items.insert(crate::types::ItemId::new(9));
        assert!(matches!(
            run(&RunConfig::default(), &instance),
            Err(AllocationError::Valuation(_))
        ));
    }
}
