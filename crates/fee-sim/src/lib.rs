#![deny(warnings)]

//! Demand model, simulation engine, and target optimizer.
//!
//! This crate provides:
//! - Constant-elasticity demand adjustment with the zero-fee edge cases
//! - Catalog-wide revenue simulation for a fee assignment
//! - A greedy optimizer searching for a fee assignment that reaches a
//!   target revenue under a maximum-fee constraint
//!
//! All revenue arithmetic is exact decimal arithmetic; repeated calls with
//! identical inputs return bit-identical results.

use fee_core::{Catalog, FeeAssignment, Service, ServiceImpact, SimulationResult};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use thiserror::Error;
use tracing::debug;

/// Errors produced by the simulation entry points.
#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    /// Elasticity must be a finite number.
    #[error("invalid elasticity: {0}")]
    InvalidElasticity(f32),
    /// Simulation and optimization require elasticity within [-1, 0].
    #[error("elasticity {0} outside the supported range [-1, 0]")]
    ElasticityOutOfRange(f32),
    /// Fee values passed to the demand model must be non-negative.
    #[error("negative fee value")]
    NegativeFee,
    /// Assignment fees must be non-negative.
    #[error("negative fee for service {0}")]
    NegativeAssignmentFee(String),
    /// Noise fraction must be within [0, 1).
    #[error("noise fraction must be within [0, 1)")]
    InvalidNoise,
    /// The optimizer's fee cap must be positive.
    #[error("maximum fee must be positive")]
    NonPositiveMaxFee,
    /// Numeric conversion failed.
    #[error("non-finite numeric conversion")]
    NonFinite,
}

/// Demand after a fee change under a constant-elasticity assumption.
///
/// Edge cases: both fees zero leaves demand unchanged; introducing a fee
/// where none existed counts as a full (100%) price increase; otherwise
/// the relative price change applies. Demand is floored at zero and not
/// capped above (a fee cut may raise demand). The model is mechanical:
/// any finite elasticity is accepted, range policy belongs to the
/// simulation boundary.
///
/// Example:
/// let d = adjusted_demand(Decimal::ZERO, Decimal::new(50, 0), 1000, -0.3).unwrap();
/// assert_eq!(d, Decimal::new(700, 0));
pub fn adjusted_demand(
    old_fee: Decimal,
    new_fee: Decimal,
    old_demand: u64,
    elasticity: f32,
) -> Result<Decimal, SimError> {
    if !elasticity.is_finite() {
        return Err(SimError::InvalidElasticity(elasticity));
    }
    if old_fee < Decimal::ZERO || new_fee < Decimal::ZERO {
        return Err(SimError::NegativeFee);
    }
    let old = Decimal::from(old_demand);
    if old_fee.is_zero() && new_fee.is_zero() {
        return Ok(old);
    }
    let e = Decimal::from_f32(elasticity).ok_or(SimError::NonFinite)?;
    let price_change = if old_fee.is_zero() {
        Decimal::ONE
    } else {
        (new_fee - old_fee) / old_fee
    };
    let demand = old * (Decimal::ONE + e * price_change);
    Ok(demand.max(Decimal::ZERO))
}

/// [`adjusted_demand`] with a multiplicative uniform noise factor in
/// [1 - noise_frac, 1 + noise_frac], seeded for reproducibility.
///
/// Used for sensitivity runs; `noise_frac` must be in [0, 1).
pub fn adjusted_demand_with_noise(
    old_fee: Decimal,
    new_fee: Decimal,
    old_demand: u64,
    elasticity: f32,
    noise_frac: f32,
    seed: u64,
) -> Result<Decimal, SimError> {
    if !(0.0..1.0).contains(&noise_frac) || !noise_frac.is_finite() {
        return Err(SimError::InvalidNoise);
    }
    let base = adjusted_demand(old_fee, new_fee, old_demand, elasticity)?;
    if noise_frac == 0.0 {
        return Ok(base);
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let u: f32 = rng.gen_range(-noise_frac..=noise_frac);
    let factor = Decimal::from_f32(1.0 + u).ok_or(SimError::NonFinite)?;
    Ok((base * factor).max(Decimal::ZERO))
}

fn simulate_with_sampler(
    catalog: &Catalog,
    assignment: &FeeAssignment,
    elasticity: f32,
    mut noise_factor: impl FnMut() -> Decimal,
) -> Result<SimulationResult, SimError> {
    if !elasticity.is_finite() {
        return Err(SimError::InvalidElasticity(elasticity));
    }
    if !(-1.0..=0.0).contains(&elasticity) {
        return Err(SimError::ElasticityOutOfRange(elasticity));
    }
    for (key, fee) in assignment.iter() {
        if *fee < Decimal::ZERO {
            return Err(SimError::NegativeAssignmentFee(key.0.clone()));
        }
    }
    let mut old_revenue_total = Decimal::ZERO;
    let mut new_revenue_total = Decimal::ZERO;
    let mut old_request_total: u64 = 0;
    let mut new_request_total = Decimal::ZERO;
    let mut services = Vec::new();
    let mut modified = 0usize;
    for service in &catalog.services {
        let old_revenue = service.annual_revenue();
        old_revenue_total += old_revenue;
        old_request_total += service.total_requests;
        match assignment.get(&service.key) {
            Some(new_fee) => {
                let base =
                    adjusted_demand(service.fee, new_fee, service.total_requests, elasticity)?;
                let new_requests = (base * noise_factor()).max(Decimal::ZERO);
                let new_revenue = new_fee * new_requests;
                new_revenue_total += new_revenue;
                new_request_total += new_requests;
                services.push(ServiceImpact {
                    key: service.key.clone(),
                    old_fee: service.fee,
                    new_fee,
                    old_requests: service.total_requests,
                    new_requests,
                    old_revenue,
                    new_revenue,
                });
                modified += 1;
            }
            None => {
                new_revenue_total += old_revenue;
                new_request_total += Decimal::from(service.total_requests);
            }
        }
    }
    Ok(SimulationResult {
        old_revenue_total,
        new_revenue_total,
        old_request_total,
        new_request_total,
        services,
        services_modified: modified,
        unmatched_keys: assignment.len() - modified,
    })
}

/// Simulate a fee assignment over a catalog.
///
/// Revenue and request totals always cover the entire catalog so results
/// with different assignments stay comparable; the per-service breakdown
/// lists assigned services only. Assignment keys that match no service
/// are ignored but reported through `unmatched_keys`. The catalog is
/// never mutated, and identical inputs yield bit-identical results.
///
/// Boundary validation: elasticity must be finite and within [-1, 0],
/// assignment fees non-negative.
pub fn simulate(
    catalog: &Catalog,
    assignment: &FeeAssignment,
    elasticity: f32,
) -> Result<SimulationResult, SimError> {
    simulate_with_sampler(catalog, assignment, elasticity, || Decimal::ONE)
}

/// [`simulate`] with seeded demand noise on every assigned service.
///
/// One noise stream drives the whole run in catalog order, so a fixed
/// seed reproduces the result exactly. Zero `noise_frac` is identical to
/// the plain simulation.
pub fn simulate_with_noise(
    catalog: &Catalog,
    assignment: &FeeAssignment,
    elasticity: f32,
    noise_frac: f32,
    seed: u64,
) -> Result<SimulationResult, SimError> {
    if !(0.0..1.0).contains(&noise_frac) || !noise_frac.is_finite() {
        return Err(SimError::InvalidNoise);
    }
    if noise_frac == 0.0 {
        return simulate(catalog, assignment, elasticity);
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    simulate_with_sampler(catalog, assignment, elasticity, move || {
        let u: f32 = rng.gen_range(-noise_frac..=noise_frac);
        Decimal::from_f32(1.0 + u).unwrap_or(Decimal::ONE)
    })
}

/// Outcome of a target-revenue search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizeOutcome {
    /// The fees the optimizer settled on (empty when the target was
    /// already met).
    pub assignment: FeeAssignment,
    /// Simulation of that assignment.
    pub result: SimulationResult,
    /// The revenue goal that was asked for.
    pub target_revenue: Decimal,
    /// How far the goal was missed; zero when reached.
    pub shortfall: Decimal,
}

impl OptimizeOutcome {
    /// Whether the target revenue was reached.
    pub fn reached(&self) -> bool {
        self.shortfall.is_zero()
    }
}

/// Search for a fee assignment reaching `target_revenue`.
///
/// Eligible services are the currently unpriced ones, ranked by request
/// volume descending with the original catalog order as a stable
/// tie-break. The ranked list gets `max_fee` one service at a time,
/// re-simulating after each addition, until projected revenue reaches the
/// target or the list is exhausted. An unreachable target is not an
/// error: the full assignment comes back with a positive shortfall.
///
/// Greedy by design: volume is a proxy for revenue efficiency, and the
/// uniform fee cap keeps the true objective non-separable per service.
pub fn optimize(
    catalog: &Catalog,
    target_revenue: Decimal,
    max_fee: Decimal,
    elasticity: f32,
) -> Result<OptimizeOutcome, SimError> {
    if max_fee <= Decimal::ZERO {
        return Err(SimError::NonPositiveMaxFee);
    }
    let baseline = simulate(catalog, &FeeAssignment::new(), elasticity)?;
    if baseline.new_revenue_total >= target_revenue {
        return Ok(OptimizeOutcome {
            assignment: FeeAssignment::new(),
            result: baseline,
            target_revenue,
            shortfall: Decimal::ZERO,
        });
    }
    let mut candidates: Vec<&Service> =
        catalog.services.iter().filter(|s| !s.is_priced()).collect();
    candidates.sort_by_key(|s| Reverse(s.total_requests));
    let mut assignment = FeeAssignment::new();
    let mut result = baseline;
    for service in candidates {
        assignment.insert(service.key.clone(), max_fee);
        result = simulate(catalog, &assignment, elasticity)?;
        debug!(
            service = %service.key.0,
            projected = %result.new_revenue_total,
            "optimizer step"
        );
        if result.new_revenue_total >= target_revenue {
            break;
        }
    }
    let shortfall = (target_revenue - result.new_revenue_total).max(Decimal::ZERO);
    Ok(OptimizeOutcome {
        assignment,
        result,
        target_revenue,
        shortfall,
    })
}
