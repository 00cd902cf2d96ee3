// tests/validator_thresholds.rs
//
// Row-count boundaries, the NA override and KPI ratio via extract + validate.

use iati_dashboard::dataset::{disbursement_ratio, Kpi, NamedAmount};
use iati_dashboard::extract::extract_tables;
use iati_dashboard::orchestrator::{assess, Assessment, MISSING_MARKER_REASON};
use iati_dashboard::validate::{
    derive_top_from_sectors, validate, ExtractionOutcome, Thresholds, INCOMPLETE_REASON,
};

/// Build a reply with the given number of data rows per table.
fn reply(trend: usize, sectors: usize, mix: usize) -> String {
    let mut s = String::from(
        "## Dashboard Narrative\n- Synthetic.\n\n\
         ### KPI\n| metric | value | note |\n|---|---|---|\n\
         | Total commitments | 1000 | USD |\n\
         | Total disbursements | 400 | USD |\n\
         | Projects | 12 | |\n\n\
         ### Trend\n| period | commitments | disbursements |\n|---|---|---|\n",
    );
    for i in 0..trend {
        s.push_str(&format!("| 2024-Q{} | {} | {} |\n", i + 1, 100 + i, 40 + i));
    }
    s.push_str("\n### Sectors\n| sector | amount |\n|---|---|\n");
    for i in 0..sectors {
        s.push_str(&format!("| Sector {i} | {} |\n", 300 - i * 10));
    }
    s.push_str("\n### Mix\n| category | amount |\n|---|---|\n");
    for i in 0..mix {
        s.push_str(&format!("| Mix {i} | {} |\n", 200 - i * 10));
    }
    s
}

fn outcome(text: &str) -> ExtractionOutcome {
    let tables = extract_tables(text).expect("sections present");
    validate(&tables, &Thresholds::default())
}

#[test]
fn trend_boundary_is_four_rows() {
    assert_eq!(
        outcome(&reply(3, 3, 3)),
        ExtractionOutcome::Rejected(INCOMPLETE_REASON.into())
    );
    assert!(outcome(&reply(4, 3, 3)).is_accepted());
}

#[test]
fn sector_and_mix_boundary_is_three_rows() {
    assert!(!outcome(&reply(4, 2, 3)).is_accepted());
    assert!(!outcome(&reply(4, 3, 2)).is_accepted());
    assert!(outcome(&reply(4, 3, 3)).is_accepted());
}

#[test]
fn accepted_dataset_carries_parsed_values() {
    let ExtractionOutcome::Accepted(d) = outcome(&reply(5, 4, 3)) else {
        panic!("expected accepted");
    };
    assert_eq!(d.kpi, Kpi::new(1000.0, 400.0, 12));
    assert_eq!(d.trend.len(), 5);
    assert_eq!(d.trend[4].period, "2024-Q5");
    assert_eq!(d.trend[4].commitments, 104.0);
    assert_eq!(d.sectors[1], NamedAmount::new("Sector 1", 290.0));
    assert_eq!(d.top, derive_top_from_sectors(&d.sectors));
    assert_eq!(d.mix.len(), 3);
}

#[test]
fn thresholds_are_configurable() {
    let tables = extract_tables(&reply(2, 1, 1)).unwrap();
    let lenient = Thresholds {
        min_trend_rows: 2,
        min_sector_rows: 1,
        min_mix_rows: 1,
    };
    assert!(validate(&tables, &lenient).is_accepted());
    assert!(!validate(&tables, &Thresholds::default()).is_accepted());
}

#[test]
fn na_marker_overrides_numeric_completeness() {
    let text = reply(4, 3, 3).replace("| Projects | 12 | |", "| Projects | 12 | Na |");
    let tables = extract_tables(&text).unwrap();
    assert!(tables.has_missing_marker);
    assert!(validate(&tables, &Thresholds::default()).is_accepted());
    assert_eq!(
        assess(&text, &Thresholds::default()),
        Assessment::Demo(MISSING_MARKER_REASON.into())
    );
}

#[test]
fn na_in_a_total_is_incomplete() {
    let text = reply(4, 3, 3).replace("| Total disbursements | 400 |", "| Total disbursements | NA |");
    assert_eq!(
        assess(&text, &Thresholds::default()),
        Assessment::Demo(INCOMPLETE_REASON.into())
    );
}

#[test]
fn ratio_handles_zero_commitments() {
    assert_eq!(disbursement_ratio(0.0, 50.0), 0.0);
    assert_eq!(disbursement_ratio(100.0, 40.0), 0.4);
    assert_eq!(Kpi::new(0.0, 0.0, 0).disbursement_ratio(), 0.0);
}

#[test]
fn top_is_scaled_from_sectors() {
    let top = derive_top_from_sectors(&[
        NamedAmount::new("Health", 100.0),
        NamedAmount::new("Education", 80.0),
    ]);
    assert_eq!(top[0], NamedAmount::new("Health", 60.0));
    assert_eq!(top[1].name, "Education");
    assert!((top[1].amount - 52.0).abs() < 1e-9);
}

const SAMPLE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/fixtures/dashboard_reply.md"
));

#[test]
fn neighbouring_metrics_are_not_published_as_totals() {
    let text = SAMPLE
        .replace("| Total disbursements | 62500000 |", "| Disbursement rate | 48 |")
        .replace("| Projects | 31 |", "| Projects closed | 4 |");
    assert_ne!(text, SAMPLE);
    assert_eq!(
        assess(&text, &Thresholds::default()),
        Assessment::Demo(INCOMPLETE_REASON.into())
    );

    let text = SAMPLE.replace("| Total commitments | 125000000 |", "| Commitments pipeline | 900 |");
    assert_eq!(
        assess(&text, &Thresholds::default()),
        Assessment::Demo(INCOMPLETE_REASON.into())
    );
}

#[test]
fn project_count_beyond_u32_is_incomplete() {
    let text = reply(4, 3, 3).replace("| Projects | 12 | |", "| Projects | 5000000000 | |");
    assert_eq!(
        outcome(&text),
        ExtractionOutcome::Rejected(INCOMPLETE_REASON.into())
    );
    let text = reply(4, 3, 3).replace("| Projects | 12 | |", "| Projects | 4294967295 | |");
    let ExtractionOutcome::Accepted(d) = outcome(&text) else {
        panic!("u32::MAX itself fits");
    };
    assert_eq!(d.kpi.projects, u32::MAX);
}
