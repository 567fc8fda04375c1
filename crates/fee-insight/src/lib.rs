#![deny(warnings)]

//! Derived analytics over a catalog and its extracted suggestions.
//!
//! Everything here is a pure function of its inputs: opportunity ranking,
//! suggestion overview and gap tables, Pareto analysis, volume/revenue
//! quadrants, per-category performance, and a linear request forecast.
//! Nothing mutates the catalog.

use fee_core::{Catalog, FeeStructure, Service, ServiceCategory, ServiceKey, SuggestionSet};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fees at or below this are treated as "effectively unpriced" when
/// scanning for revenue opportunities.
pub const LOW_FEE_CEILING: Decimal = Decimal::from_parts(20, 0, 0, false, 0);

/// Confidence at or above which a suggestion counts as high confidence.
pub const HIGH_CONFIDENCE: f32 = 0.8;

/// A high-volume, low-fee service ranked by what a candidate fee would earn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub key: ServiceKey,
    pub category: ServiceCategory,
    pub total_requests: u64,
    pub current_fee: Decimal,
    /// Revenue under the candidate fee at unchanged demand.
    pub potential_revenue: Decimal,
    /// Potential minus current annual revenue.
    pub revenue_gain: Decimal,
}

/// Rank services at or below the low-fee ceiling by the revenue gain a
/// uniform `candidate_fee` would bring, largest first.
///
/// Demand is held constant here; elasticity belongs to the simulation, this
/// is a screening view.
pub fn top_opportunities(catalog: &Catalog, candidate_fee: Decimal, top_n: usize) -> Vec<Opportunity> {
    let mut rows: Vec<Opportunity> = catalog
        .services
        .iter()
        .filter(|s| s.fee <= LOW_FEE_CEILING)
        .map(|s| {
            let potential = candidate_fee * Decimal::from(s.total_requests);
            Opportunity {
                key: s.key.clone(),
                category: s.category,
                total_requests: s.total_requests,
                current_fee: s.fee,
                potential_revenue: potential,
                revenue_gain: potential - s.annual_revenue(),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.revenue_gain.cmp(&a.revenue_gain));
    rows.truncate(top_n);
    rows
}

/// Headline figures over a suggestion set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuggestionOverview {
    /// Services whose note yielded a suggestion.
    pub services_with_suggestions: usize,
    /// Suggestions at or above [`HIGH_CONFIDENCE`].
    pub high_confidence: usize,
    /// Unpriced services that have a suggestion ready to apply.
    pub quick_wins: usize,
    /// Sum over suggested services of primary amount times volume minus
    /// current revenue.
    pub total_revenue_gap: Decimal,
    /// Count per recognized structure; `Unrecognized` counts services whose
    /// note is non-empty but yielded nothing.
    pub structures: BTreeMap<FeeStructure, usize>,
}

/// Summarize a suggestion set against its catalog.
pub fn suggestion_overview(catalog: &Catalog, set: &SuggestionSet) -> SuggestionOverview {
    let mut overview = SuggestionOverview {
        services_with_suggestions: 0,
        high_confidence: 0,
        quick_wins: 0,
        total_revenue_gap: Decimal::ZERO,
        structures: BTreeMap::new(),
    };
    for service in &catalog.services {
        match set.get(&service.key) {
            Some(Some(suggestion)) => {
                overview.services_with_suggestions += 1;
                if suggestion.confidence >= HIGH_CONFIDENCE {
                    overview.high_confidence += 1;
                }
                if !service.is_priced() {
                    overview.quick_wins += 1;
                }
                let potential =
                    suggestion.primary_amount() * Decimal::from(service.total_requests);
                overview.total_revenue_gap += potential - service.annual_revenue();
                *overview.structures.entry(suggestion.structure).or_insert(0) += 1;
            }
            _ => {
                if service.has_note() {
                    *overview
                        .structures
                        .entry(FeeStructure::Unrecognized)
                        .or_insert(0) += 1;
                }
            }
        }
    }
    overview
}

/// Current-versus-suggested figures for one service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuggestionGap {
    pub key: ServiceKey,
    pub structure: FeeStructure,
    pub confidence: f32,
    pub total_requests: u64,
    pub current_fee: Decimal,
    pub suggested_fee: Decimal,
    pub current_revenue: Decimal,
    pub potential_revenue: Decimal,
    /// Potential minus current revenue.
    pub revenue_gap: Decimal,
    /// Fee change percentage; `None` when the service is unpriced (no
    /// meaningful base).
    pub fee_change_pct: Option<Decimal>,
}

fn gap_row(service: &Service, set: &SuggestionSet) -> Option<SuggestionGap> {
    let suggestion = set.get(&service.key)?.as_ref()?;
    let suggested = suggestion.primary_amount();
    let current_revenue = service.annual_revenue();
    let potential = suggested * Decimal::from(service.total_requests);
    let fee_change_pct = if service.is_priced() {
        Some((suggested - service.fee) / service.fee * Decimal::ONE_HUNDRED)
    } else {
        None
    };
    Some(SuggestionGap {
        key: service.key.clone(),
        structure: suggestion.structure,
        confidence: suggestion.confidence,
        total_requests: service.total_requests,
        current_fee: service.fee,
        suggested_fee: suggested,
        current_revenue,
        potential_revenue: potential,
        revenue_gap: potential - current_revenue,
        fee_change_pct,
    })
}

/// One row per service with a suggestion, sorted by revenue gap descending.
pub fn suggestion_gaps(catalog: &Catalog, set: &SuggestionSet) -> Vec<SuggestionGap> {
    let mut rows: Vec<SuggestionGap> = catalog
        .services
        .iter()
        .filter_map(|s| gap_row(s, set))
        .collect();
    rows.sort_by(|a, b| b.revenue_gap.cmp(&a.revenue_gap));
    rows
}

/// Unpriced services with a suggestion and at least `min_requests` volume,
/// sorted by revenue gap descending, at most `top_n` rows.
pub fn quick_wins(
    catalog: &Catalog,
    set: &SuggestionSet,
    min_requests: u64,
    top_n: usize,
) -> Vec<SuggestionGap> {
    let mut rows: Vec<SuggestionGap> = catalog
        .services
        .iter()
        .filter(|s| !s.is_priced() && s.total_requests >= min_requests)
        .filter_map(|s| gap_row(s, set))
        .collect();
    rows.sort_by(|a, b| b.revenue_gap.cmp(&a.revenue_gap));
    rows.truncate(top_n);
    rows
}

/// Aggregate effect of adopting the suggestions for a chosen set of services.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImplementationImpact {
    /// Services in the selection that actually carry a suggestion.
    pub services: usize,
    /// Sum of their revenue gaps.
    pub revenue_increase: Decimal,
    /// Catalog revenue before adoption.
    pub current_total: Decimal,
    /// Catalog revenue after adoption.
    pub projected_total: Decimal,
    /// Increase over the current total, zero when the baseline is zero.
    pub percent_increase: Decimal,
}

/// Sum the suggestion gaps for `keys`; keys without a service or without a
/// suggestion contribute nothing.
pub fn implementation_impact(
    catalog: &Catalog,
    set: &SuggestionSet,
    keys: &[ServiceKey],
) -> ImplementationImpact {
    let mut services = 0usize;
    let mut revenue_increase = Decimal::ZERO;
    for key in keys {
        let Some(service) = catalog.get(key) else {
            continue;
        };
        if let Some(row) = gap_row(service, set) {
            services += 1;
            revenue_increase += row.revenue_gap;
        }
    }
    let current_total = catalog.total_revenue();
    let percent_increase = if current_total.is_zero() {
        Decimal::ZERO
    } else {
        revenue_increase / current_total * Decimal::ONE_HUNDRED
    };
    ImplementationImpact {
        services,
        revenue_increase,
        current_total,
        projected_total: current_total + revenue_increase,
        percent_increase,
    }
}

/// One service in the volume-ranked cumulative view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParetoRow {
    pub key: ServiceKey,
    pub total_requests: u64,
    pub annual_revenue: Decimal,
    /// Requests of this and all higher-ranked services.
    pub cumulative_requests: u64,
    /// Cumulative requests as a percentage of the catalog total.
    pub cumulative_share_pct: Decimal,
    /// 1-based position in the ranking.
    pub rank: usize,
    /// Rank as a percentage of the service count.
    pub service_share_pct: Decimal,
}

/// Services ranked by request volume with cumulative shares, for the usual
/// "which few services carry most of the traffic" question.
///
/// Ties keep catalog order. A catalog with zero total requests reports zero
/// cumulative shares.
pub fn pareto(catalog: &Catalog) -> Vec<ParetoRow> {
    let mut services: Vec<&Service> = catalog.services.iter().collect();
    services.sort_by(|a, b| b.total_requests.cmp(&a.total_requests));
    let total = catalog.total_requests();
    let count = services.len();
    let mut cumulative = 0u64;
    services
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            cumulative += s.total_requests;
            let cumulative_share_pct = if total == 0 {
                Decimal::ZERO
            } else {
                Decimal::from(cumulative) / Decimal::from(total) * Decimal::ONE_HUNDRED
            };
            ParetoRow {
                key: s.key.clone(),
                total_requests: s.total_requests,
                annual_revenue: s.annual_revenue(),
                cumulative_requests: cumulative,
                cumulative_share_pct,
                rank: i + 1,
                service_share_pct: Decimal::from((i + 1) as u64) / Decimal::from(count as u64)
                    * Decimal::ONE_HUNDRED,
            }
        })
        .collect()
}

/// Median-split classification of a service by volume and revenue.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Quadrant {
    HighVolumeHighRevenue,
    HighVolumeLowRevenue,
    LowVolumeHighRevenue,
    LowVolumeLowRevenue,
}

impl Quadrant {
    /// Report label.
    pub fn label(&self) -> &'static str {
        match self {
            Quadrant::HighVolumeHighRevenue => "High Volume, High Revenue",
            Quadrant::HighVolumeLowRevenue => "High Volume, Low Revenue",
            Quadrant::LowVolumeHighRevenue => "Low Volume, High Revenue",
            Quadrant::LowVolumeLowRevenue => "Low Volume, Low Revenue",
        }
    }
}

/// A service with its quadrant assignment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuadrantRow {
    pub key: ServiceKey,
    pub total_requests: u64,
    pub annual_revenue: Decimal,
    pub quadrant: Quadrant,
}

fn median(mut values: Vec<Decimal>) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.sort();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / Decimal::TWO
    }
}

/// Classify every service against the median request volume and median
/// revenue; at-or-above the median counts as high.
pub fn quadrants(catalog: &Catalog) -> Vec<QuadrantRow> {
    let median_requests = median(
        catalog
            .services
            .iter()
            .map(|s| Decimal::from(s.total_requests))
            .collect(),
    );
    let median_revenue = median(catalog.services.iter().map(|s| s.annual_revenue()).collect());
    catalog
        .services
        .iter()
        .map(|s| {
            let high_volume = Decimal::from(s.total_requests) >= median_requests;
            let high_revenue = s.annual_revenue() >= median_revenue;
            let quadrant = match (high_volume, high_revenue) {
                (true, true) => Quadrant::HighVolumeHighRevenue,
                (true, false) => Quadrant::HighVolumeLowRevenue,
                (false, true) => Quadrant::LowVolumeHighRevenue,
                (false, false) => Quadrant::LowVolumeLowRevenue,
            };
            QuadrantRow {
                key: s.key.clone(),
                total_requests: s.total_requests,
                annual_revenue: s.annual_revenue(),
                quadrant,
            }
        })
        .collect()
}

/// Per-category rollup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryPerformance {
    pub category: ServiceCategory,
    pub services: usize,
    pub total_requests: u64,
    pub total_revenue: Decimal,
    pub avg_requests_per_service: Decimal,
    pub priced_services: usize,
    /// Share of the category's services that charge a fee.
    pub fee_coverage_pct: Decimal,
}

/// Roll the catalog up by category, ordered by request volume descending.
pub fn category_performance(catalog: &Catalog) -> Vec<CategoryPerformance> {
    let mut groups: BTreeMap<ServiceCategory, Vec<&Service>> = BTreeMap::new();
    for service in &catalog.services {
        groups.entry(service.category).or_default().push(service);
    }
    let mut rows: Vec<CategoryPerformance> = groups
        .into_iter()
        .map(|(category, services)| {
            let count = services.len();
            let total_requests: u64 = services.iter().map(|s| s.total_requests).sum();
            let total_revenue: Decimal = services.iter().map(|s| s.annual_revenue()).sum();
            let priced = services.iter().filter(|s| s.is_priced()).count();
            CategoryPerformance {
                category,
                services: count,
                total_requests,
                total_revenue,
                avg_requests_per_service: Decimal::from(total_requests)
                    / Decimal::from(count as u64),
                priced_services: priced,
                fee_coverage_pct: Decimal::from(priced as u64) / Decimal::from(count as u64)
                    * Decimal::ONE_HUNDRED,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.total_requests.cmp(&a.total_requests));
    rows
}

/// Forecast request counts for the years after the service's history.
///
/// Least-squares line over the years with positive counts; with fewer than
/// two such years the average per active year is repeated instead. Forecasts
/// are floored at zero.
pub fn forecast_requests(service: &Service, years_ahead: usize) -> Vec<Decimal> {
    let points: Vec<(Decimal, Decimal)> = service
        .years
        .iter()
        .filter(|(_, &count)| count > 0)
        .map(|(&year, &count)| (Decimal::from(year), Decimal::from(count)))
        .collect();
    if points.len() < 2 {
        return vec![service.avg_requests_per_year(); years_ahead];
    }
    let n = Decimal::from(points.len() as u64);
    let sum_x: Decimal = points.iter().map(|(x, _)| *x).sum();
    let sum_y: Decimal = points.iter().map(|(_, y)| *y).sum();
    let sum_xy: Decimal = points.iter().map(|(x, y)| *x * *y).sum();
    let sum_xx: Decimal = points.iter().map(|(x, _)| *x * *x).sum();
    let denom = n * sum_xx - sum_x * sum_x;
    if denom.is_zero() {
        return vec![service.avg_requests_per_year(); years_ahead];
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;
    let last_year = points
        .last()
        .map(|(x, _)| *x)
        .unwrap_or(Decimal::ZERO);
    (1..=years_ahead)
        .map(|i| {
            let year = last_year + Decimal::from(i as u64);
            (slope * year + intercept).max(Decimal::ZERO)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fee_core::{FeeAmount, FeeSuggestion};
    use proptest::prelude::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn svc(
        key: &str,
        category: ServiceCategory,
        fee: i64,
        requests: u64,
        note: &str,
    ) -> Service {
        Service::new(
            ServiceKey(key.to_string()),
            category,
            dec(fee),
            BTreeMap::from([(2024, requests)]),
            note,
        )
    }

    fn suggestion(structure: FeeStructure, amount: i64, confidence: f32) -> FeeSuggestion {
        FeeSuggestion {
            structure,
            amounts: vec![FeeAmount::new("primary", dec(amount))],
            confidence,
            matched: String::new(),
            condition: None,
        }
    }

    /// Five services with mixed pricing and suggestion coverage.
    fn sample() -> (Catalog, SuggestionSet) {
        let catalog = Catalog::new(vec![
            svc("s1", ServiceCategory::WorkPermits, 0, 50_000, "مئة ريال عن كل شخص"),
            svc("s2", ServiceCategory::Certificates, 10, 30_000, "خمسون ريال"),
            svc("s3", ServiceCategory::WorkPermits, 0, 15_000, "عشرون ريال عن كل شهر"),
            svc("s4", ServiceCategory::Other, 20, 10_000, "قيد المراجعة"),
            svc("s5", ServiceCategory::Certificates, 0, 5_000, "عشرة في حال شركة خاصة"),
        ]);
        let set = SuggestionSet::from([
            (
                ServiceKey("s1".to_string()),
                Some(suggestion(FeeStructure::PerPerson, 100, 0.9)),
            ),
            (
                ServiceKey("s2".to_string()),
                Some(suggestion(FeeStructure::Flat, 50, 0.85)),
            ),
            (
                ServiceKey("s3".to_string()),
                Some(suggestion(FeeStructure::PerMonth, 20, 0.75)),
            ),
            (ServiceKey("s4".to_string()), None),
            (
                ServiceKey("s5".to_string()),
                Some(suggestion(FeeStructure::Conditional, 10, 0.8)),
            ),
        ]);
        (catalog, set)
    }

    #[test]
    fn overview_counts_and_gap() {
        let (catalog, set) = sample();
        let overview = suggestion_overview(&catalog, &set);
        assert_eq!(overview.services_with_suggestions, 4);
        assert_eq!(overview.total_revenue_gap, dec(6_550_000));
        assert_eq!(overview.quick_wins, 3);
        assert_eq!(overview.high_confidence, 3);
        assert_eq!(overview.structures.get(&FeeStructure::PerPerson), Some(&1));
        assert_eq!(
            overview.structures.get(&FeeStructure::Unrecognized),
            Some(&1)
        );
    }

    #[test]
    fn overview_of_empty_catalog_is_zero() {
        let overview = suggestion_overview(&Catalog::new(vec![]), &SuggestionSet::new());
        assert_eq!(overview.services_with_suggestions, 0);
        assert_eq!(overview.total_revenue_gap, Decimal::ZERO);
        assert!(overview.structures.is_empty());
    }

    #[test]
    fn gaps_are_sorted_descending() {
        let (catalog, set) = sample();
        let rows = suggestion_gaps(&catalog, &set);
        assert_eq!(rows.len(), 4);
        let gaps: Vec<Decimal> = rows.iter().map(|r| r.revenue_gap).collect();
        assert_eq!(gaps, vec![dec(5_000_000), dec(1_200_000), dec(300_000), dec(50_000)]);
        // s2 goes from 10 to 50, a 400% change; unpriced s1 has no base.
        assert_eq!(rows[1].fee_change_pct, Some(dec(400)));
        assert_eq!(rows[0].fee_change_pct, None);
    }

    #[test]
    fn quick_wins_respect_volume_floor() {
        let (catalog, set) = sample();
        let rows = quick_wins(&catalog, &set, 10_000, 10);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, ServiceKey("s1".to_string()));
        assert_eq!(rows[1].key, ServiceKey("s3".to_string()));
        assert!(rows[0].revenue_gap >= rows[1].revenue_gap);
    }

    #[test]
    fn quick_wins_high_floor_yields_nothing() {
        let (catalog, set) = sample();
        assert!(quick_wins(&catalog, &set, 100_000, 10).is_empty());
    }

    #[test]
    fn quick_wins_honor_top_n() {
        let (catalog, set) = sample();
        let rows = quick_wins(&catalog, &set, 1_000, 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, ServiceKey("s1".to_string()));
    }

    #[test]
    fn impact_for_one_service() {
        let (catalog, set) = sample();
        let impact =
            implementation_impact(&catalog, &set, &[ServiceKey("s1".to_string())]);
        assert_eq!(impact.services, 1);
        assert_eq!(impact.revenue_increase, dec(5_000_000));
        // Baseline is 500,000 so the increase is tenfold.
        assert_eq!(impact.current_total, dec(500_000));
        assert_eq!(impact.percent_increase, dec(1_000));
    }

    #[test]
    fn impact_for_two_services() {
        let (catalog, set) = sample();
        let impact = implementation_impact(
            &catalog,
            &set,
            &[ServiceKey("s1".to_string()), ServiceKey("s3".to_string())],
        );
        assert_eq!(impact.services, 2);
        assert_eq!(impact.revenue_increase, dec(5_300_000));
        assert_eq!(impact.projected_total, dec(5_800_000));
    }

    #[test]
    fn impact_of_empty_selection_is_zero() {
        let (catalog, set) = sample();
        let impact = implementation_impact(&catalog, &set, &[]);
        assert_eq!(impact.services, 0);
        assert_eq!(impact.revenue_increase, Decimal::ZERO);
    }

    #[test]
    fn impact_ignores_unknown_and_suggestionless_keys() {
        let (catalog, set) = sample();
        let impact = implementation_impact(
            &catalog,
            &set,
            &[ServiceKey("ghost".to_string()), ServiceKey("s4".to_string())],
        );
        assert_eq!(impact.services, 0);
        assert_eq!(impact.revenue_increase, Decimal::ZERO);
    }

    #[test]
    fn opportunities_rank_by_gain() {
        let (catalog, _) = sample();
        let rows = top_opportunities(&catalog, dec(10), 3);
        // s2 gains nothing at 10 (already priced there) and s4 would lose.
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].key, ServiceKey("s1".to_string()));
        assert_eq!(rows[0].revenue_gain, dec(500_000));
        assert_eq!(rows[1].key, ServiceKey("s3".to_string()));
        assert_eq!(rows[2].key, ServiceKey("s5".to_string()));
    }

    #[test]
    fn opportunities_skip_fees_above_ceiling() {
        let catalog = Catalog::new(vec![
            svc("cheap", ServiceCategory::Other, 5, 1_000, ""),
            svc("expensive", ServiceCategory::Other, 200, 9_000, ""),
        ]);
        let rows = top_opportunities(&catalog, dec(50), 10);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, ServiceKey("cheap".to_string()));
    }

    #[test]
    fn pareto_accumulates_to_full_share() {
        let (catalog, _) = sample();
        let rows = pareto(&catalog);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].total_requests, 50_000);
        assert_eq!(rows[0].cumulative_requests, 50_000);
        assert_eq!(rows[4].cumulative_requests, 110_000);
        assert_eq!(rows[4].cumulative_share_pct, dec(100));
        assert_eq!(rows[0].service_share_pct, dec(20));
        for pair in rows.windows(2) {
            assert!(pair[0].cumulative_share_pct <= pair[1].cumulative_share_pct);
        }
    }

    #[test]
    fn pareto_of_zero_traffic_catalog() {
        let catalog = Catalog::new(vec![svc("idle", ServiceCategory::Other, 0, 0, "")]);
        let rows = pareto(&catalog);
        assert_eq!(rows[0].cumulative_share_pct, Decimal::ZERO);
    }

    #[test]
    fn quadrants_split_on_medians() {
        let catalog = Catalog::new(vec![
            svc("a", ServiceCategory::Other, 10, 100, ""),
            svc("b", ServiceCategory::Other, 20, 200, ""),
            svc("c", ServiceCategory::Other, 7, 300, ""),
            svc("d", ServiceCategory::Other, 8, 400, ""),
        ]);
        // Median volume 250, median revenue (2100 + 3200) / 2 = 2650.
        let rows = quadrants(&catalog);
        assert_eq!(rows[0].quadrant, Quadrant::LowVolumeLowRevenue);
        assert_eq!(rows[1].quadrant, Quadrant::LowVolumeHighRevenue);
        assert_eq!(rows[2].quadrant, Quadrant::HighVolumeLowRevenue);
        assert_eq!(rows[3].quadrant, Quadrant::HighVolumeHighRevenue);
    }

    #[test]
    fn category_rollup() {
        let (catalog, _) = sample();
        let rows = category_performance(&catalog);
        assert_eq!(rows.len(), 3);
        // Work permits carry the most volume.
        assert_eq!(rows[0].category, ServiceCategory::WorkPermits);
        assert_eq!(rows[0].services, 2);
        assert_eq!(rows[0].total_requests, 65_000);
        assert_eq!(rows[0].priced_services, 0);
        assert_eq!(rows[0].fee_coverage_pct, Decimal::ZERO);
        assert_eq!(rows[0].avg_requests_per_service, dec(32_500));
        let certificates = rows
            .iter()
            .find(|r| r.category == ServiceCategory::Certificates)
            .unwrap();
        assert_eq!(certificates.fee_coverage_pct, dec(50));
        assert_eq!(certificates.total_revenue, dec(300_000));
    }

    #[test]
    fn forecast_extends_a_linear_trend() {
        let service = Service::new(
            ServiceKey("grows".to_string()),
            ServiceCategory::Other,
            Decimal::ZERO,
            BTreeMap::from([(2022, 100), (2023, 200), (2024, 300)]),
            "",
        );
        assert_eq!(forecast_requests(&service, 2), vec![dec(400), dec(500)]);
    }

    #[test]
    fn forecast_skips_zero_years() {
        let service = Service::new(
            ServiceKey("late".to_string()),
            ServiceCategory::Other,
            Decimal::ZERO,
            BTreeMap::from([(2022, 0), (2023, 100), (2024, 200)]),
            "",
        );
        assert_eq!(forecast_requests(&service, 1), vec![dec(300)]);
    }

    #[test]
    fn forecast_falls_back_to_average() {
        let service = Service::new(
            ServiceKey("sparse".to_string()),
            ServiceCategory::Other,
            Decimal::ZERO,
            BTreeMap::from([(2024, 80)]),
            "",
        );
        assert_eq!(forecast_requests(&service, 2), vec![dec(80), dec(80)]);
    }

    #[test]
    fn forecast_floors_a_falling_trend_at_zero() {
        let service = Service::new(
            ServiceKey("falls".to_string()),
            ServiceCategory::Other,
            Decimal::ZERO,
            BTreeMap::from([(2023, 200), (2024, 100)]),
            "",
        );
        assert_eq!(
            forecast_requests(&service, 2),
            vec![Decimal::ZERO, Decimal::ZERO]
        );
    }

    proptest! {
        #[test]
        fn pareto_rows_cover_every_service(
            volumes in proptest::collection::vec(0u64..100_000, 0..12),
        ) {
            let services: Vec<Service> = volumes
                .iter()
                .enumerate()
                .map(|(i, &v)| svc(&format!("s{i}"), ServiceCategory::Other, 0, v, ""))
                .collect();
            let catalog = Catalog::new(services);
            let rows = pareto(&catalog);
            prop_assert_eq!(rows.len(), catalog.len());
            let mut prev = u64::MAX;
            for row in &rows {
                prop_assert!(row.total_requests <= prev);
                prev = row.total_requests;
            }
            if let Some(last) = rows.last() {
                prop_assert_eq!(last.cumulative_requests, catalog.total_requests());
            }
        }

        #[test]
        fn forecast_is_never_negative(
            counts in proptest::collection::vec(0u64..1_000_000, 1..6),
            years_ahead in 0usize..4,
        ) {
            let years: BTreeMap<i32, u64> = counts
                .iter()
                .enumerate()
                .map(|(i, &c)| (2020 + i as i32, c))
                .collect();
            let service = Service::new(
                ServiceKey("any".to_string()),
                ServiceCategory::Other,
                Decimal::ZERO,
                years,
                "",
            );
            let forecast = forecast_requests(&service, years_ahead);
            prop_assert_eq!(forecast.len(), years_ahead);
            for value in forecast {
                prop_assert!(value >= Decimal::ZERO);
            }
        }
    }
}
