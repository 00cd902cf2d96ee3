//! # Dataset validation
//! Decides whether extracted tables are complete enough to publish as live data.
//!
//! Pure and synchronous: `ExtractedTables` in, `ExtractionOutcome` out. The `NA`
//! flag is not judged here; the orchestrator treats it as a fallback trigger on
//! its own.

use serde::Deserialize;

use crate::dataset::{Dataset, Kpi, NamedAmount, TrendPoint};
use crate::extract::{AmountRow, ExtractedTables, KpiMetric};

pub const INCOMPLETE_REASON: &str = "Tables parsed but metrics are incomplete";

/// How many sector rows feed the derived top list.
const TOP_LEN: usize = 6;
const TOP_NAME_MAX_CHARS: usize = 22;

/// Minimum row counts for acceptance. Heuristic tuning, not a contract with the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub min_trend_rows: usize,
    pub min_sector_rows: usize,
    pub min_mix_rows: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_trend_rows: 4,
            min_sector_rows: 3,
            min_mix_rows: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Accepted(Dataset),
    Rejected(String),
}

impl ExtractionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ExtractionOutcome::Accepted(_))
    }
}

/// Check completeness and build the dataset.
pub fn validate(tables: &ExtractedTables, thresholds: &Thresholds) -> ExtractionOutcome {
    let total = |m| tables.kpi.resolve(m).and_then(|c| c.value());
    let (Some(commitments), Some(disbursements), Some(projects)) = (
        total(KpiMetric::Commitments),
        total(KpiMetric::Disbursements),
        total(KpiMetric::Projects),
    ) else {
        return rejected();
    };
    if commitments < 0.0 || disbursements < 0.0 || projects < 0.0 {
        return rejected();
    }
    // A count that does not fit is not published clamped.
    let projects = round_half_up(projects);
    if projects > f64::from(u32::MAX) {
        return rejected();
    }

    let Some(trend) = tables
        .trend
        .iter()
        .map(|r| {
            Some(TrendPoint {
                period: r.period.clone(),
                commitments: amount(r.commitments.value())?,
                disbursements: amount(r.disbursements.value())?,
            })
        })
        .collect::<Option<Vec<_>>>()
    else {
        return rejected();
    };
    let (Some(sectors), Some(mix)) = (named_amounts(&tables.sectors), named_amounts(&tables.mix))
    else {
        return rejected();
    };

    if trend.len() < thresholds.min_trend_rows
        || sectors.len() < thresholds.min_sector_rows
        || mix.len() < thresholds.min_mix_rows
    {
        return rejected();
    }

    let top = derive_top_from_sectors(&sectors);
    ExtractionOutcome::Accepted(Dataset {
        kpi: Kpi::new(commitments, disbursements, projects as u32),
        trend,
        sectors,
        top,
        mix,
    })
}

fn rejected() -> ExtractionOutcome {
    ExtractionOutcome::Rejected(INCOMPLETE_REASON.to_string())
}

fn amount(v: Option<f64>) -> Option<f64> {
    v.filter(|x| *x >= 0.0)
}

fn named_amounts(rows: &[AmountRow]) -> Option<Vec<NamedAmount>> {
    rows.iter()
        .map(|r| Some(NamedAmount::new(r.name.clone(), amount(r.amount.value())?)))
        .collect()
}

fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Stand-in for a "top" chart while the agent returns no such table.
///
/// First six sectors, the i-th scaled by `0.6 + i * 0.05`, names cut to 22
/// characters plus an ellipsis. Presentation filler, not an independent metric.
pub fn derive_top_from_sectors(sectors: &[NamedAmount]) -> Vec<NamedAmount> {
    sectors
        .iter()
        .take(TOP_LEN)
        .enumerate()
        .map(|(i, s)| NamedAmount::new(shorten(&s.name), s.amount * (0.6 + i as f64 * 0.05)))
        .collect()
}

fn shorten(name: &str) -> String {
    if name.chars().count() > TOP_NAME_MAX_CHARS {
        let mut out: String = name.chars().take(TOP_NAME_MAX_CHARS).collect();
        out.push('…');
        out
    } else {
        name.to_string()
    }
}
