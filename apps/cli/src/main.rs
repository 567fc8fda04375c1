#![deny(warnings)]

//! Headless shell: load a catalog, extract fee suggestions, apply a
//! scenario, optionally search for a target revenue, and print the
//! comparison.

use anyhow::{Context, Result};
use fee_core::*;
use fee_session::{compare, ScenarioManager};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::info;
use tracing_subscriber::EnvFilter;

struct Args {
    catalog: Option<String>,
    elasticity: f32,
    target: Option<Decimal>,
    max_fee: Decimal,
    top: usize,
}

fn parse_args() -> Args {
    let mut args = Args {
        catalog: None,
        elasticity: -0.1,
        target: None,
        max_fee: Decimal::ONE_HUNDRED,
        top: 5,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--catalog" => args.catalog = it.next(),
            "--elasticity" => {
                if let Some(v) = it.next().and_then(|s| s.parse().ok()) {
                    args.elasticity = v;
                }
            }
            "--target" => args.target = it.next().and_then(|s| s.parse().ok()),
            "--max-fee" => {
                if let Some(v) = it.next().and_then(|s| s.parse().ok()) {
                    args.max_fee = v;
                }
            }
            "--top" => {
                if let Some(v) = it.next().and_then(|s| s.parse().ok()) {
                    args.top = v;
                }
            }
            _ => {}
        }
    }
    args
}

/// One service row as written in a catalog file. The category is derived
/// from the name, the request total from the year counts.
#[derive(Debug, Deserialize)]
struct ServiceRecord {
    name: String,
    #[serde(default)]
    fee: Decimal,
    #[serde(default)]
    years: BTreeMap<i32, u64>,
    #[serde(default)]
    note: String,
}

impl ServiceRecord {
    fn into_service(self) -> Service {
        let category = ServiceCategory::classify(&self.name);
        Service::new(ServiceKey(self.name), category, self.fee, self.years, self.note)
    }
}

fn load_catalog(path: &str) -> Result<Catalog> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading catalog file {path}"))?;
    let records: Vec<ServiceRecord> = if path.ends_with(".yaml") || path.ends_with(".yml") {
        serde_yaml::from_str(&text).with_context(|| format!("parsing YAML catalog {path}"))?
    } else {
        serde_json::from_str(&text).with_context(|| format!("parsing JSON catalog {path}"))?
    };
    Ok(Catalog::new(
        records.into_iter().map(ServiceRecord::into_service).collect(),
    ))
}

fn demo_catalog() -> Catalog {
    let svc = |name: &str, fee: i64, years: BTreeMap<i32, u64>, note: &str| {
        Service::new(
            ServiceKey(name.to_string()),
            ServiceCategory::classify(name),
            Decimal::new(fee, 0),
            years,
            note,
        )
    };
    Catalog::new(vec![
        svc(
            "تصريح استقدام عمالة",
            0,
            BTreeMap::from([(2022, 150_000), (2023, 170_000), (2024, 190_000)]),
            "عشرة ريال عن كل شخص",
        ),
        svc(
            "تجديد ترخيص منشأة",
            0,
            BTreeMap::from([(2022, 80_000), (2023, 90_000), (2024, 100_000)]),
            "مئة ريال عن كل شهر",
        ),
        svc(
            "تصديق عقد عمل",
            10,
            BTreeMap::from([(2022, 200_000), (2023, 210_000), (2024, 230_000)]),
            "خمسة ريال لكل مهنة تخصصية , اثنين ريال لكل مهنة غير تخصصية",
        ),
        svc(
            "شهادة بيانات وظيفية",
            0,
            BTreeMap::from([(2022, 30_000), (2023, 35_000), (2024, 40_000)]),
            "مئة ريال في حال الجهة الجديدة شركة خاصة",
        ),
        svc(
            "قيد منشأة في السجل",
            30,
            BTreeMap::from([(2022, 20_000), (2023, 22_000), (2024, 25_000)]),
            "كانت 500 و تم تعديل القيمة الى 100 ببداية شهر 9",
        ),
        svc(
            "نقل خدمات عامل",
            0,
            BTreeMap::from([(2022, 60_000), (2023, 75_000), (2024, 85_000)]),
            "١٥٠ ريال",
        ),
        svc(
            "اعارة عامل",
            25,
            BTreeMap::from([(2022, 5_000), (2023, 6_000), (2024, 7_000)]),
            "تم الغاء الرسوم",
        ),
        svc(
            "انهاء خدمات عامل",
            0,
            BTreeMap::from([(2022, 40_000), (2023, 42_000), (2024, 45_000)]),
            "",
        ),
        svc(
            "طلب بيانات احصائية",
            15,
            BTreeMap::from([(2024, 12_000)]),
            "قيد المراجعة",
        ),
    ])
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args();
    info!(
        git = env!("GIT_SHA"),
        built = env!("BUILD_DATE"),
        catalog = args.catalog.as_deref().unwrap_or("built-in demo"),
        elasticity = args.elasticity,
        "starting fee studio"
    );

    let catalog = match &args.catalog {
        Some(path) => load_catalog(path)?,
        None => demo_catalog(),
    };
    validate_catalog(&catalog)?;

    let summary = catalog.summary();
    println!(
        "Catalog OK | services: {} | priced: {} | unpriced: {} | requests: {} | revenue: {}",
        summary.total_services,
        summary.priced_services,
        summary.unpriced_services,
        summary.total_requests,
        summary.total_revenue
    );
    for row in fee_insight::category_performance(&catalog) {
        println!(
            "Category | {} | services: {} | requests: {} | revenue: {} | fee coverage: {}%",
            row.category.label(),
            row.services,
            row.total_requests,
            row.total_revenue,
            row.fee_coverage_pct.round_dp(0)
        );
    }

    let suggestions = fee_parse::parse_all(&catalog);
    let overview = fee_insight::suggestion_overview(&catalog, &suggestions);
    println!(
        "Suggestions | parsed: {} | high confidence: {} | quick wins: {} | revenue gap: {}",
        overview.services_with_suggestions,
        overview.high_confidence,
        overview.quick_wins,
        overview.total_revenue_gap
    );
    for (structure, count) in &overview.structures {
        println!("Structure | {structure:?}: {count}");
    }
    for row in fee_insight::suggestion_gaps(&catalog, &suggestions)
        .into_iter()
        .take(args.top)
    {
        println!(
            "Gap | {} | current: {} | suggested: {} | confidence: {:.2} | gap: {}",
            row.key.0, row.current_fee, row.suggested_fee, row.confidence, row.revenue_gap
        );
    }

    let mut manager = ScenarioManager::new();
    let mut scenarios = Vec::new();
    let seeded = FeeAssignment::from_suggestions(&suggestions, 0.7);
    if seeded.is_empty() {
        println!("Scenario | no suggestion at or above confidence 0.7, nothing to apply");
    } else {
        let scenario = manager.apply("suggested-fees", &catalog, seeded, args.elasticity)?;
        println!(
            "Scenario | {} | revenue: {} -> {} | delta: {} ({}%) | modified: {}",
            scenario.name,
            scenario.result.old_revenue_total,
            scenario.result.new_revenue_total,
            scenario.result.revenue_delta(),
            scenario.result.revenue_delta_pct().round_dp(1),
            scenario.result.services_modified
        );
        scenarios.push(scenario.clone());
    }

    if let Some(target) = args.target {
        let outcome = fee_sim::optimize(&catalog, target, args.max_fee, args.elasticity)?;
        let status = if outcome.reached() {
            "target reached".to_string()
        } else {
            format!("short by {}", outcome.shortfall)
        };
        println!(
            "Optimizer | target: {} | projected: {} | {} | services assigned: {}",
            target,
            outcome.result.new_revenue_total,
            status,
            outcome.assignment.len()
        );
        for (key, fee) in outcome.assignment.iter().take(args.top) {
            println!("Assign | {} -> {}", key.0, fee);
        }
        if !outcome.assignment.is_empty() {
            let scenario =
                manager.apply("optimized", &catalog, outcome.assignment.clone(), args.elasticity)?;
            scenarios.push(scenario.clone());
        }
    }

    for row in compare(&catalog, &scenarios) {
        println!(
            "Compare | {} | revenue: {} | delta: {} ({}%) | modified: {}",
            row.name,
            row.total_revenue,
            row.revenue_delta,
            row.delta_pct.round_dp(1),
            row.services_modified
        );
    }

    Ok(())
}
