#![deny(warnings)]

//! Core domain models and invariants for the fee scenario engine.
//!
//! This crate defines the serializable types shared by the suggestion
//! parser, the simulation engine, and the session layer, with validation
//! helpers to guarantee basic catalog invariants.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Stable identifier for a catalog service, e.g. "work-permit-issue".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceKey(pub String);

/// Fixed service taxonomy used for category-wide fee changes and reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ServiceCategory {
    /// Recruitment approvals and work permits.
    WorkPermits,
    /// License issue and renewal.
    LicenseRenewal,
    /// Employment contract certification.
    ContractCertification,
    /// Certificates and attestations.
    Certificates,
    /// Establishment and registry records.
    EstablishmentRegistration,
    /// Employer/profession change requests.
    EmploymentChanges,
    /// Worker loan (secondment) approvals.
    WorkLoans,
    /// Contract termination filings.
    ContractTermination,
    /// Everything else.
    Other,
}

impl ServiceCategory {
    /// Classify a service by keywords in its (Arabic or English) name.
    ///
    /// The keyword list mirrors the source catalog's naming conventions;
    /// unknown names fall into `Other`.
    pub fn classify(service_name: &str) -> Self {
        let name = service_name.to_lowercase();
        if name.contains("استقدام") || name.contains("موافقة") || name.contains("recruit") {
            ServiceCategory::WorkPermits
        } else if name.contains("ترخيص") || name.contains("تجديد") || name.contains("licen") {
            ServiceCategory::LicenseRenewal
        } else if name.contains("عقد") || name.contains("تصديق") || name.contains("contract cert") {
            ServiceCategory::ContractCertification
        } else if name.contains("شهادة") || name.contains("certificate") {
            ServiceCategory::Certificates
        } else if name.contains("سجل") || name.contains("منشأة") || name.contains("establishment") {
            ServiceCategory::EstablishmentRegistration
        } else if name.contains("تغيير") || name.contains("نقل") || name.contains("transfer") {
            ServiceCategory::EmploymentChanges
        } else if name.contains("اعارة") || name.contains("إعارة") || name.contains("loan") {
            ServiceCategory::WorkLoans
        } else if name.contains("انهاء") || name.contains("إنهاء") || name.contains("terminat") {
            ServiceCategory::ContractTermination
        } else {
            ServiceCategory::Other
        }
    }

    /// Human-readable English label for reports.
    pub fn label(&self) -> &'static str {
        match self {
            ServiceCategory::WorkPermits => "Work Permits & Recruitment",
            ServiceCategory::LicenseRenewal => "License Renewal",
            ServiceCategory::ContractCertification => "Contract Certification",
            ServiceCategory::Certificates => "Certificates",
            ServiceCategory::EstablishmentRegistration => "Establishment Registration",
            ServiceCategory::EmploymentChanges => "Employment Changes",
            ServiceCategory::WorkLoans => "Work Loans",
            ServiceCategory::ContractTermination => "Contract Termination",
            ServiceCategory::Other => "Other Services",
        }
    }
}

/// One administrative service with its request history and current fee.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Stable key, unique within a catalog.
    pub key: ServiceKey,
    /// Service category.
    pub category: ServiceCategory,
    /// Current fee per request; zero means the service is unpriced.
    pub fee: Decimal,
    /// Request counts per calendar year; missing years count as zero.
    pub years: BTreeMap<i32, u64>,
    /// Total requests across all years (>= the largest single year).
    pub total_requests: u64,
    /// Raw operator note, possibly empty, possibly bilingual.
    pub note: String,
}

impl Service {
    /// Build a service deriving `total_requests` from the year counts.
    pub fn new(
        key: ServiceKey,
        category: ServiceCategory,
        fee: Decimal,
        years: BTreeMap<i32, u64>,
        note: impl Into<String>,
    ) -> Self {
        let total_requests = years.values().sum();
        Service {
            key,
            category,
            fee,
            years,
            total_requests,
            note: note.into(),
        }
    }

    /// Request count for one year, zero when the year is absent.
    pub fn requests_in(&self, year: i32) -> u64 {
        self.years.get(&year).copied().unwrap_or(0)
    }

    /// Most recent year present in the history, if any.
    pub fn latest_year(&self) -> Option<i32> {
        self.years.keys().next_back().copied()
    }

    /// Current annual revenue: fee times total requests.
    pub fn annual_revenue(&self) -> Decimal {
        self.fee * Decimal::from(self.total_requests)
    }

    /// Number of years with a non-zero request count.
    pub fn years_active(&self) -> usize {
        self.years.values().filter(|&&n| n > 0).count()
    }

    /// Average requests per active year, zero when no year saw traffic.
    pub fn avg_requests_per_year(&self) -> Decimal {
        let active = self.years_active();
        if active == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.total_requests) / Decimal::from(active as u64)
    }

    /// Percentage growth of request volume between two years.
    ///
    /// Zero when the base year has no traffic (no meaningful rate).
    pub fn growth_rate(&self, from: i32, to: i32) -> Decimal {
        let base = self.requests_in(from);
        if base == 0 {
            return Decimal::ZERO;
        }
        let base = Decimal::from(base);
        let next = Decimal::from(self.requests_in(to));
        (next - base) / base * Decimal::ONE_HUNDRED
    }

    /// Whether the service currently charges a fee.
    pub fn is_priced(&self) -> bool {
        self.fee > Decimal::ZERO
    }

    /// Whether the operator note carries any text.
    pub fn has_note(&self) -> bool {
        !self.note.trim().is_empty()
    }
}

/// Immutable catalog of services, in load order.
///
/// Load order is meaningful: the optimizer's tie-break for equal request
/// volumes is the original catalog position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Services in load order.
    pub services: Vec<Service>,
}

impl Catalog {
    /// Wrap a service list as a catalog.
    pub fn new(services: Vec<Service>) -> Self {
        Catalog { services }
    }

    /// Look up a service by key.
    pub fn get(&self, key: &ServiceKey) -> Option<&Service> {
        self.services.iter().find(|s| &s.key == key)
    }

    /// Number of services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Sum of request totals across the catalog.
    pub fn total_requests(&self) -> u64 {
        self.services.iter().map(|s| s.total_requests).sum()
    }

    /// Sum of current annual revenue across the catalog.
    pub fn total_revenue(&self) -> Decimal {
        self.services.iter().map(|s| s.annual_revenue()).sum()
    }

    /// Sum of request counts for a single year.
    pub fn requests_in(&self, year: i32) -> u64 {
        self.services.iter().map(|s| s.requests_in(year)).sum()
    }

    /// Derived view with fees overridden by an assignment.
    ///
    /// Demand figures are untouched; unlisted services keep their fee.
    /// Keys in the assignment that match no service have no effect here.
    pub fn with_fees(&self, assignment: &FeeAssignment) -> Catalog {
        let services = self
            .services
            .iter()
            .map(|s| {
                let mut s = s.clone();
                if let Some(fee) = assignment.get(&s.key) {
                    s.fee = fee;
                }
                s
            })
            .collect();
        Catalog { services }
    }

    /// Headline figures for reporting.
    pub fn summary(&self) -> CatalogSummary {
        let priced = self.services.iter().filter(|s| s.is_priced()).count();
        let latest_year = self.services.iter().filter_map(|s| s.latest_year()).max();
        let avg_requests_per_service = if self.services.is_empty() {
            Decimal::ZERO
        } else {
            Decimal::from(self.total_requests()) / Decimal::from(self.services.len() as u64)
        };
        CatalogSummary {
            total_services: self.services.len(),
            priced_services: priced,
            unpriced_services: self.services.len() - priced,
            services_with_notes: self.services.iter().filter(|s| s.has_note()).count(),
            total_requests: self.total_requests(),
            total_revenue: self.total_revenue(),
            avg_requests_per_service,
            latest_year,
            latest_year_requests: latest_year.map(|y| self.requests_in(y)).unwrap_or(0),
        }
    }
}

/// Catalog-level headline figures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogSummary {
    /// Number of services.
    pub total_services: usize,
    /// Services with a non-zero fee.
    pub priced_services: usize,
    /// Services with a zero fee.
    pub unpriced_services: usize,
    /// Services carrying any note text.
    pub services_with_notes: usize,
    /// Total requests across all services and years.
    pub total_requests: u64,
    /// Current annual revenue across all services.
    pub total_revenue: Decimal,
    /// Mean request total per service.
    pub avg_requests_per_service: Decimal,
    /// Most recent year present anywhere in the catalog.
    pub latest_year: Option<i32>,
    /// Request total for that year.
    pub latest_year_requests: u64,
}

/// Fee structures the suggestion parser can recognize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FeeStructure {
    /// Single amount per request.
    Flat,
    /// Amount charged per person/worker.
    PerPerson,
    /// Amount charged per month.
    PerMonth,
    /// Amount charged per modification/amendment.
    PerModification,
    /// Different amounts per sub-category of the service.
    Tiered,
    /// Different amounts depending on the requester's attributes.
    Conditional,
    /// The note records a past change; the suggestion is the revised amount.
    HistoricalChange,
    /// Non-empty note with no extractable quantity.
    Unrecognized,
}

/// One labeled amount inside a suggestion, e.g. {"specialized": 5}.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeeAmount {
    /// Branch or unit label ("flat", "per person", "specialized", ...).
    pub label: String,
    /// The amount itself.
    pub amount: Decimal,
}

impl FeeAmount {
    /// Convenience constructor.
    pub fn new(label: impl Into<String>, amount: Decimal) -> Self {
        FeeAmount {
            label: label.into(),
            amount,
        }
    }
}

/// A structured fee recommendation extracted from one note.
///
/// Advisory, not authoritative: recomputed fresh on every parse and never
/// mutated in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeeSuggestion {
    /// Recognized structure.
    pub structure: FeeStructure,
    /// One or more labeled amounts, the headline amount first.
    pub amounts: Vec<FeeAmount>,
    /// Match specificity in [0, 1].
    pub confidence: f32,
    /// Substring of the original note that produced the match.
    pub matched: String,
    /// Optional condition description, e.g. "private sector only".
    pub condition: Option<String>,
}

impl FeeSuggestion {
    /// Headline amount (first entry), zero for an empty amount list.
    pub fn primary_amount(&self) -> Decimal {
        self.amounts
            .first()
            .map(|a| a.amount)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Parse output for a whole catalog: one entry per service, `None` when the
/// note yielded no extractable suggestion.
pub type SuggestionSet = BTreeMap<ServiceKey, Option<FeeSuggestion>>;

/// A past fee change recorded in a note ("was X, changed to Y").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoricalChange {
    /// Amount before the change, when stated.
    pub previous: Option<Decimal>,
    /// Amount after the change, when stated.
    pub revised: Option<Decimal>,
    /// The note records a fee cancellation.
    pub cancelled: bool,
    /// Month number the change took effect, when stated.
    pub effective_month: Option<u32>,
    /// The note substring describing the change.
    pub description: String,
}

/// Proposed new fees keyed by service; unlisted services keep their fee.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeAssignment(pub BTreeMap<ServiceKey, Decimal>);

impl FeeAssignment {
    /// Empty assignment.
    pub fn new() -> Self {
        FeeAssignment(BTreeMap::new())
    }

    /// Assignment changing a single service.
    pub fn single(key: ServiceKey, fee: Decimal) -> Self {
        let mut map = BTreeMap::new();
        map.insert(key, fee);
        FeeAssignment(map)
    }

    /// Assignment from explicit (key, fee) pairs.
    pub fn explicit(entries: impl IntoIterator<Item = (ServiceKey, Decimal)>) -> Self {
        FeeAssignment(entries.into_iter().collect())
    }

    /// Uniform fee for every service in a category.
    ///
    /// With `only_unpriced` set, services that already charge a fee are
    /// left out.
    pub fn for_category(
        catalog: &Catalog,
        category: ServiceCategory,
        fee: Decimal,
        only_unpriced: bool,
    ) -> Self {
        let map = catalog
            .services
            .iter()
            .filter(|s| s.category == category)
            .filter(|s| !only_unpriced || !s.is_priced())
            .map(|s| (s.key.clone(), fee))
            .collect();
        FeeAssignment(map)
    }

    /// Volume-banded fees for currently unpriced services.
    ///
    /// Services at or above `high_volume_threshold` total requests get
    /// `high`, those at or above a quarter of it get `medium`, the rest
    /// get `low`. Priced services are never touched.
    pub fn tiered_by_volume(
        catalog: &Catalog,
        high_volume_threshold: u64,
        high: Decimal,
        medium: Decimal,
        low: Decimal,
    ) -> Self {
        let map = catalog
            .services
            .iter()
            .filter(|s| !s.is_priced())
            .map(|s| {
                let fee = if s.total_requests >= high_volume_threshold {
                    high
                } else if s.total_requests >= high_volume_threshold / 4 {
                    medium
                } else {
                    low
                };
                (s.key.clone(), fee)
            })
            .collect();
        FeeAssignment(map)
    }

    /// Seed an assignment from parsed suggestions.
    ///
    /// Services whose note produced a suggestion at or above the
    /// confidence floor receive its headline amount.
    pub fn from_suggestions(set: &SuggestionSet, min_confidence: f32) -> Self {
        let map = set
            .iter()
            .filter_map(|(key, suggestion)| {
                suggestion
                    .as_ref()
                    .filter(|s| s.confidence >= min_confidence)
                    .map(|s| (key.clone(), s.primary_amount()))
            })
            .collect();
        FeeAssignment(map)
    }

    /// Proposed fee for a key, if listed.
    pub fn get(&self, key: &ServiceKey) -> Option<Decimal> {
        self.0.get(key).copied()
    }

    /// Add or replace one entry.
    pub fn insert(&mut self, key: ServiceKey, fee: Decimal) {
        self.0.insert(key, fee);
    }

    /// Number of listed services.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no service is listed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate listed (key, fee) pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&ServiceKey, &Decimal)> {
        self.0.iter()
    }
}

/// Per-service outcome of one simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceImpact {
    /// Service key.
    pub key: ServiceKey,
    /// Fee before the assignment.
    pub old_fee: Decimal,
    /// Fee under the assignment.
    pub new_fee: Decimal,
    /// Baseline request volume.
    pub old_requests: u64,
    /// Demand-adjusted request volume (fractional, floored at zero).
    pub new_requests: Decimal,
    /// Revenue before the assignment.
    pub old_revenue: Decimal,
    /// Revenue under the assignment.
    pub new_revenue: Decimal,
}

impl ServiceImpact {
    /// Revenue change for this service.
    pub fn revenue_delta(&self) -> Decimal {
        self.new_revenue - self.old_revenue
    }
}

/// Aggregate outcome of one simulation over a catalog.
///
/// Totals cover the entire catalog so results with different assignments
/// stay comparable; the breakdown lists assigned services only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Revenue total before the assignment.
    pub old_revenue_total: Decimal,
    /// Revenue total under the assignment.
    pub new_revenue_total: Decimal,
    /// Request total before the assignment.
    pub old_request_total: u64,
    /// Demand-adjusted request total under the assignment.
    pub new_request_total: Decimal,
    /// Per-service breakdown for services named by the assignment.
    pub services: Vec<ServiceImpact>,
    /// Assignment entries that matched a catalog service.
    pub services_modified: usize,
    /// Assignment entries that matched nothing (reported, not fatal).
    pub unmatched_keys: usize,
}

impl SimulationResult {
    /// Total revenue change.
    pub fn revenue_delta(&self) -> Decimal {
        self.new_revenue_total - self.old_revenue_total
    }

    /// Total revenue change in percent, zero for a zero baseline.
    pub fn revenue_delta_pct(&self) -> Decimal {
        if self.old_revenue_total.is_zero() {
            return Decimal::ZERO;
        }
        self.revenue_delta() / self.old_revenue_total * Decimal::ONE_HUNDRED
    }
}

/// A named, applied set of fee overrides plus its simulation result.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    /// User-facing label.
    pub name: String,
    /// The fee overrides this scenario encodes.
    pub assignment: FeeAssignment,
    /// Elasticity parameter the result was computed with.
    pub elasticity: f32,
    /// Ordering within the session (1-based, monotonic).
    pub ordinal: u64,
    /// Wall-clock creation time.
    pub created_at: DateTime<Utc>,
    /// Last-computed simulation result.
    pub result: SimulationResult,
}

/// Validation errors for catalog invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Service key must carry text.
    #[error("service key must not be empty")]
    EmptyKey,
    /// Keys must be unique within a catalog.
    #[error("duplicate service key: {0}")]
    DuplicateKey(String),
    /// Fees are non-negative; zero means unpriced.
    #[error("negative fee on service {0}")]
    NegativeFee(String),
    /// The total must cover the largest single-year count.
    #[error("total requests {total} below peak year count {peak} for service {key}")]
    TotalBelowPeak {
        /// Offending service key.
        key: String,
        /// Declared total.
        total: u64,
        /// Largest single-year count.
        peak: u64,
    },
    /// Year keys outside the supported range.
    #[error("year {year} out of supported range [2000, 2100] for service {key}")]
    YearOutOfRange {
        /// Offending service key.
        key: String,
        /// Offending year.
        year: i32,
    },
}

/// Validate a single service.
pub fn validate_service(service: &Service) -> Result<(), ValidationError> {
    if service.key.0.trim().is_empty() {
        return Err(ValidationError::EmptyKey);
    }
    if service.fee < Decimal::ZERO {
        return Err(ValidationError::NegativeFee(service.key.0.clone()));
    }
    for year in service.years.keys() {
        if !(2000..=2100).contains(year) {
            return Err(ValidationError::YearOutOfRange {
                key: service.key.0.clone(),
                year: *year,
            });
        }
    }
    let peak = service.years.values().copied().max().unwrap_or(0);
    if service.total_requests < peak {
        return Err(ValidationError::TotalBelowPeak {
            key: service.key.0.clone(),
            total: service.total_requests,
            peak,
        });
    }
    Ok(())
}

/// Validate a whole catalog, including key uniqueness.
pub fn validate_catalog(catalog: &Catalog) -> Result<(), ValidationError> {
    let mut keys: BTreeSet<&ServiceKey> = BTreeSet::new();
    for service in &catalog.services {
        validate_service(service)?;
        if !keys.insert(&service.key) {
            return Err(ValidationError::DuplicateKey(service.key.0.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn svc(key: &str, fee: i64, years: &[(i32, u64)]) -> Service {
        Service::new(
            ServiceKey(key.to_string()),
            ServiceCategory::Other,
            Decimal::new(fee, 0),
            years.iter().copied().collect(),
            "",
        )
    }

    #[test]
    fn serde_roundtrip_service() {
        let mut s = svc("work-permit", 100, &[(2023, 1_000), (2024, 1_500)]);
        s.note = "رسوم مقترحة 150 ريال".to_string();
        let json = serde_json::to_string(&s).unwrap();
        let back: Service = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
        assert_eq!(back.total_requests, 2_500);
    }

    #[test]
    fn derived_fields() {
        let s = svc("a", 50, &[(2022, 0), (2023, 100), (2024, 150)]);
        assert_eq!(s.total_requests, 250);
        assert_eq!(s.years_active(), 2);
        assert_eq!(s.avg_requests_per_year(), Decimal::new(125, 0));
        assert_eq!(s.annual_revenue(), Decimal::new(12_500, 0));
        assert_eq!(s.growth_rate(2023, 2024), Decimal::new(50, 0));
        assert_eq!(s.growth_rate(2022, 2023), Decimal::ZERO);
        assert_eq!(s.latest_year(), Some(2024));
    }

    #[test]
    fn catalog_summary_counts() {
        let mut priced = svc("a", 100, &[(2024, 10)]);
        priced.note = "note".to_string();
        let unpriced = svc("b", 0, &[(2024, 30)]);
        let catalog = Catalog::new(vec![priced, unpriced]);
        let summary = catalog.summary();
        assert_eq!(summary.total_services, 2);
        assert_eq!(summary.priced_services, 1);
        assert_eq!(summary.unpriced_services, 1);
        assert_eq!(summary.services_with_notes, 1);
        assert_eq!(summary.total_requests, 40);
        assert_eq!(summary.total_revenue, Decimal::new(1_000, 0));
        assert_eq!(summary.avg_requests_per_service, Decimal::new(20, 0));
        assert_eq!(summary.latest_year, Some(2024));
        assert_eq!(summary.latest_year_requests, 40);
    }

    #[test]
    fn validate_rejects_duplicate_keys() {
        let catalog = Catalog::new(vec![svc("a", 0, &[(2024, 1)]), svc("a", 0, &[(2024, 2)])]);
        assert_eq!(
            validate_catalog(&catalog),
            Err(ValidationError::DuplicateKey("a".to_string()))
        );
    }

    #[test]
    fn validate_rejects_total_below_peak() {
        let mut s = svc("a", 0, &[(2023, 100), (2024, 200)]);
        s.total_requests = 150;
        assert_eq!(
            validate_service(&s),
            Err(ValidationError::TotalBelowPeak {
                key: "a".to_string(),
                total: 150,
                peak: 200,
            })
        );
    }

    #[test]
    fn validate_rejects_negative_fee() {
        let s = svc("a", -5, &[(2024, 1)]);
        assert_eq!(
            validate_service(&s),
            Err(ValidationError::NegativeFee("a".to_string()))
        );
    }

    #[test]
    fn validate_rejects_out_of_range_year() {
        let s = svc("a", 0, &[(1999, 1)]);
        assert!(matches!(
            validate_service(&s),
            Err(ValidationError::YearOutOfRange { year: 1999, .. })
        ));
    }

    #[test]
    fn with_fees_overrides_only_listed_services() {
        let catalog = Catalog::new(vec![svc("a", 0, &[(2024, 10)]), svc("b", 40, &[(2024, 20)])]);
        let assignment = FeeAssignment::explicit([
            (ServiceKey("a".to_string()), Decimal::new(100, 0)),
            (ServiceKey("ghost".to_string()), Decimal::new(7, 0)),
        ]);
        let view = catalog.with_fees(&assignment);
        assert_eq!(view.get(&ServiceKey("a".to_string())).unwrap().fee, Decimal::new(100, 0));
        assert_eq!(view.get(&ServiceKey("b".to_string())).unwrap().fee, Decimal::new(40, 0));
        // Demand figures never move.
        assert_eq!(view.total_requests(), catalog.total_requests());
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn category_assignment_respects_unpriced_filter() {
        let mut a = svc("a", 0, &[(2024, 10)]);
        a.category = ServiceCategory::Certificates;
        let mut b = svc("b", 40, &[(2024, 20)]);
        b.category = ServiceCategory::Certificates;
        let c = svc("c", 0, &[(2024, 30)]);
        let catalog = Catalog::new(vec![a, b, c]);

        let only_unpriced = FeeAssignment::for_category(
            &catalog,
            ServiceCategory::Certificates,
            Decimal::new(25, 0),
            true,
        );
        assert_eq!(only_unpriced.len(), 1);
        assert_eq!(only_unpriced.get(&ServiceKey("a".to_string())), Some(Decimal::new(25, 0)));

        let whole_category = FeeAssignment::for_category(
            &catalog,
            ServiceCategory::Certificates,
            Decimal::new(25, 0),
            false,
        );
        assert_eq!(whole_category.len(), 2);
    }

    #[test]
    fn volume_tiers_split_at_quarter_threshold() {
        let catalog = Catalog::new(vec![
            svc("high", 0, &[(2024, 12_000)]),
            svc("medium", 0, &[(2024, 3_000)]),
            svc("low", 0, &[(2024, 500)]),
            svc("priced", 99, &[(2024, 50_000)]),
        ]);
        let assignment = FeeAssignment::tiered_by_volume(
            &catalog,
            10_000,
            Decimal::new(100, 0),
            Decimal::new(50, 0),
            Decimal::new(20, 0),
        );
        assert_eq!(assignment.get(&ServiceKey("high".to_string())), Some(Decimal::new(100, 0)));
        assert_eq!(assignment.get(&ServiceKey("medium".to_string())), Some(Decimal::new(50, 0)));
        assert_eq!(assignment.get(&ServiceKey("low".to_string())), Some(Decimal::new(20, 0)));
        assert_eq!(assignment.get(&ServiceKey("priced".to_string())), None);
    }

    #[test]
    fn suggestion_seeding_respects_confidence_floor() {
        let mut set = SuggestionSet::new();
        set.insert(
            ServiceKey("sure".to_string()),
            Some(FeeSuggestion {
                structure: FeeStructure::Flat,
                amounts: vec![FeeAmount::new("flat", Decimal::new(150, 0))],
                confidence: 0.8,
                matched: "150 ريال".to_string(),
                condition: None,
            }),
        );
        set.insert(
            ServiceKey("vague".to_string()),
            Some(FeeSuggestion {
                structure: FeeStructure::Flat,
                amounts: vec![FeeAmount::new("flat", Decimal::new(9, 0))],
                confidence: 0.5,
                matched: "9".to_string(),
                condition: None,
            }),
        );
        set.insert(ServiceKey("silent".to_string()), None);

        let assignment = FeeAssignment::from_suggestions(&set, 0.8);
        assert_eq!(assignment.len(), 1);
        assert_eq!(assignment.get(&ServiceKey("sure".to_string())), Some(Decimal::new(150, 0)));
    }

    #[test]
    fn classify_matches_known_names() {
        assert_eq!(
            ServiceCategory::classify("طلب استقدام عمالة"),
            ServiceCategory::WorkPermits
        );
        assert_eq!(
            ServiceCategory::classify("تجديد ترخيص مكتب استخدام"),
            ServiceCategory::LicenseRenewal
        );
        assert_eq!(
            ServiceCategory::classify("تصديق عقد عمل"),
            ServiceCategory::ContractCertification
        );
        assert_eq!(ServiceCategory::classify("شهادة لمن يهمه الامر"), ServiceCategory::Certificates);
        assert_eq!(
            ServiceCategory::classify("نقل عامل الى صاحب عمل اخر"),
            ServiceCategory::EmploymentChanges
        );
        assert_eq!(ServiceCategory::classify("اعارة عامل"), ServiceCategory::WorkLoans);
        assert_eq!(
            ServiceCategory::classify("انهاء خدمات عامل"),
            ServiceCategory::ContractTermination
        );
        assert_eq!(ServiceCategory::classify("خدمة غير معروفة"), ServiceCategory::Other);
    }

    #[test]
    fn suggestion_primary_amount() {
        let s = FeeSuggestion {
            structure: FeeStructure::Tiered,
            amounts: vec![
                FeeAmount::new("specialized", Decimal::new(5, 0)),
                FeeAmount::new("non_specialized", Decimal::new(2, 0)),
            ],
            confidence: 0.9,
            matched: "5 دنانير".to_string(),
            condition: None,
        };
        assert_eq!(s.primary_amount(), Decimal::new(5, 0));
    }

    proptest! {
        #[test]
        fn consistent_service_always_validates(
            fee in 0i64..10_000_000,
            counts in proptest::collection::vec(0u64..1_000_000, 1..5),
        ) {
            let years: BTreeMap<i32, u64> = counts
                .iter()
                .enumerate()
                .map(|(i, &n)| (2022 + i as i32, n))
                .collect();
            let s = Service::new(
                ServiceKey("svc".to_string()),
                ServiceCategory::Other,
                Decimal::new(fee, 0),
                years,
                "",
            );
            prop_assert!(validate_service(&s).is_ok());
        }

        #[test]
        fn with_fees_never_changes_demand(fee in 0i64..100_000) {
            let catalog = Catalog::new(vec![svc("a", 10, &[(2024, 500)])]);
            let assignment = FeeAssignment::single(ServiceKey("a".to_string()), Decimal::new(fee, 0));
            let view = catalog.with_fees(&assignment);
            prop_assert_eq!(view.total_requests(), catalog.total_requests());
            prop_assert_eq!(view.services[0].years.clone(), catalog.services[0].years.clone());
        }
    }
}
