//! # Placeholder data
//! Synthetic but plausible dashboard numbers, a pure function of the request context.
//!
//! Used as the initial dashboard state and whenever the agent's tables are
//! unusable. The same context always yields the same numbers, so repeated
//! refreshes look stable while filter changes visibly move the charts.
//! There is no error path.

use crate::dataset::{Dataset, Kpi, NamedAmount, RequestContext, TrendPoint};

const FNV_OFFSET: u32 = 2_166_136_261;
const FNV_PRIME: i32 = 16_777_619;

const PERIODS: [&str; 8] = [
    "2023-Q1", "2023-Q2", "2023-Q3", "2023-Q4", "2024-Q1", "2024-Q2", "2024-Q3", "2024-Q4",
];
const WAVE_AMPLITUDE: f64 = 0.08;
/// Disbursements follow the commitment wave at reduced amplitude.
const DISBURSEMENT_WAVE_DAMPING: f64 = 0.6;

const DEFAULT_SECTORS: [&str; 6] = [
    "Public Administration",
    "Transport",
    "Health",
    "Education",
    "Energy",
    "Water",
];
const SECTORS_AFTER_FILTER: [&str; 5] = [
    "Public Administration",
    "Health",
    "Education",
    "Transport",
    "Water",
];

const TOP_SHARES: [(&str, f64); 5] = [
    ("Project A", 0.18),
    ("Project B", 0.14),
    ("Project C", 0.11),
    ("Project D", 0.09),
    ("Project E", 0.07),
];
const MIX_SHARES: [(&str, f64); 4] = [
    ("Investment", 0.48),
    ("Technical Assistance", 0.22),
    ("Policy / Reform", 0.18),
    ("Other", 0.12),
];

/// FNV-1a style 32-bit hash over UTF-16 code units, absolute value of the signed result.
pub fn pseudo_hash(s: &str) -> u64 {
    let mut units = s.encode_utf16().peekable();
    if units.peek().is_none() {
        return u64::from(FNV_OFFSET);
    }
    let mut h = FNV_OFFSET as i32;
    for unit in units {
        h ^= i32::from(unit);
        h = h.wrapping_mul(FNV_PRIME);
    }
    u64::from(h.unsigned_abs())
}

/// Round to cents.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Build the placeholder dataset for `ctx`.
pub fn generate(ctx: &RequestContext) -> Dataset {
    let n = pseudo_hash(&ctx.seed());

    let base_c = 90_000_000.0 + (n % 70_000_000) as f64;
    let base_d = base_c * (0.35 + (n % 30) as f64 / 100.0);
    let projects = 12 + (n % 38) as u32;

    let per_period = PERIODS.len() as f64;
    let trend = PERIODS
        .iter()
        .enumerate()
        .map(|(i, period)| {
            let wave = ((i + 1) as f64 * 0.9).sin() * WAVE_AMPLITUDE;
            TrendPoint {
                period: (*period).to_string(),
                commitments: round2((base_c / per_period * (1.0 + wave)).max(0.0)),
                disbursements: round2(
                    (base_d / per_period * (1.0 + wave * DISBURSEMENT_WAVE_DAMPING)).max(0.0),
                ),
            }
        })
        .collect();

    let offset = (n % 7_000_000) as f64;
    let sectors = sector_names(ctx)
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let amt = base_d * (0.26 - i as f64 * 0.03) + offset;
            NamedAmount::new(name, round2(amt.max(0.0)))
        })
        .collect();

    let shares = |table: &[(&str, f64)]| {
        table
            .iter()
            .map(|(name, share)| NamedAmount::new(*name, round2(base_d * share)))
            .collect::<Vec<_>>()
    };

    Dataset {
        kpi: Kpi::new(round2(base_c), round2(base_d), projects),
        trend,
        sectors,
        top: shares(&TOP_SHARES),
        mix: shares(&MIX_SHARES),
    }
}

/// A filtered sector leads the list; otherwise the default ranking.
fn sector_names(ctx: &RequestContext) -> Vec<String> {
    if ctx.has_sector_filter() {
        std::iter::once(ctx.sector.clone())
            .chain(SECTORS_AFTER_FILTER.iter().map(|s| s.to_string()))
            .collect()
    } else {
        DEFAULT_SECTORS.iter().map(|s| s.to_string()).collect()
    }
}
