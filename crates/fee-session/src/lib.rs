#![deny(warnings)]

//! Session-scoped scenario state: apply, inspect, reset, compare.
//!
//! A session holds at most one applied scenario. Applying is all-or-nothing:
//! the assignment is simulated first and stored only when the simulation
//! succeeds, so the session never holds a scenario without a valid result.
//! Nothing here outlives the process.

use chrono::Utc;
use fee_core::{Catalog, FeeAssignment, Scenario};
use fee_sim::{simulate, SimError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Holds the session's applied scenario, if any.
#[derive(Debug, Default)]
pub struct ScenarioManager {
    slot: Option<Scenario>,
    applied: u64,
}

impl ScenarioManager {
    /// Fresh session with no scenario applied.
    pub fn new() -> Self {
        ScenarioManager::default()
    }

    /// Simulate `assignment` against `catalog` and, on success, store it as
    /// the session's scenario, replacing any previous one.
    ///
    /// On error the session state is untouched, including the ordinal
    /// counter. Reapplying identical inputs yields an identical result with
    /// a fresh ordinal and timestamp.
    pub fn apply(
        &mut self,
        name: impl Into<String>,
        catalog: &Catalog,
        assignment: FeeAssignment,
        elasticity: f32,
    ) -> Result<&Scenario, SimError> {
        let result = simulate(catalog, &assignment, elasticity)?;
        self.applied += 1;
        let scenario = Scenario {
            name: name.into(),
            assignment,
            elasticity,
            ordinal: self.applied,
            created_at: Utc::now(),
            result,
        };
        info!(
            name = %scenario.name,
            ordinal = scenario.ordinal,
            revenue = %scenario.result.new_revenue_total,
            "scenario applied"
        );
        Ok(self.slot.insert(scenario))
    }

    /// Drop the applied scenario, returning the session to baseline.
    pub fn reset(&mut self) {
        if let Some(scenario) = self.slot.take() {
            info!(name = %scenario.name, "scenario reset");
        }
    }

    /// The applied scenario, if any.
    pub fn current(&self) -> Option<&Scenario> {
        self.slot.as_ref()
    }

    /// The catalog as the session sees it: fees overridden by the applied
    /// scenario, demand figures untouched. Without a scenario this is the
    /// baseline catalog itself.
    pub fn effective_catalog(&self, catalog: &Catalog) -> Catalog {
        match &self.slot {
            Some(scenario) => catalog.with_fees(&scenario.assignment),
            None => catalog.clone(),
        }
    }
}

/// One line of the scenario comparison table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    /// Scenario name; the first row is always "baseline".
    pub name: String,
    /// Projected catalog revenue.
    pub total_revenue: Decimal,
    /// Revenue difference to the baseline row.
    pub revenue_delta: Decimal,
    /// Difference in percent, zero for a zero baseline.
    pub delta_pct: Decimal,
    /// Services the scenario's assignment touched.
    pub services_modified: usize,
}

/// Build the comparison table for a set of scenarios over one catalog.
///
/// The baseline row comes first; scenario rows keep the order given.
pub fn compare(catalog: &Catalog, scenarios: &[Scenario]) -> Vec<ComparisonRow> {
    let baseline = catalog.total_revenue();
    let mut rows = vec![ComparisonRow {
        name: "baseline".to_string(),
        total_revenue: baseline,
        revenue_delta: Decimal::ZERO,
        delta_pct: Decimal::ZERO,
        services_modified: 0,
    }];
    for scenario in scenarios {
        let total = scenario.result.new_revenue_total;
        let delta = total - baseline;
        let delta_pct = if baseline.is_zero() {
            Decimal::ZERO
        } else {
            delta / baseline * Decimal::ONE_HUNDRED
        };
        rows.push(ComparisonRow {
            name: scenario.name.clone(),
            total_revenue: total,
            revenue_delta: delta,
            delta_pct,
            services_modified: scenario.result.services_modified,
        });
    }
    rows
}
