//! dataset.rs: shapes handed to the dashboard UI.
//!
//! A `Dataset` is always fully populated when published, whether it came from
//! the agent's tables or from the placeholder generator. Each refresh builds a
//! new one; nothing here is mutated after construction.

use serde::{Deserialize, Serialize};

pub const ALL_COUNTRIES: &str = "GLOBAL";
pub const ALL_SECTORS: &str = "ALL";
pub const DEFAULT_YEARS: &str = "2021-2024";

/// Filter scope of one dashboard refresh.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_years")]
    pub years: String,
    #[serde(default = "default_sector")]
    pub sector: String,
}

fn default_country() -> String {
    ALL_COUNTRIES.to_string()
}
fn default_years() -> String {
    DEFAULT_YEARS.to_string()
}
fn default_sector() -> String {
    ALL_SECTORS.to_string()
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            country: default_country(),
            years: default_years(),
            sector: default_sector(),
        }
    }
}

impl RequestContext {
    pub fn new(
        country: impl Into<String>,
        years: impl Into<String>,
        sector: impl Into<String>,
    ) -> Self {
        Self {
            country: country.into(),
            years: years.into(),
            sector: sector.into(),
        }
    }

    /// Whether a specific sector filter is set.
    pub fn has_sector_filter(&self) -> bool {
        self.sector != ALL_SECTORS
    }

    /// Human label, e.g. `Global · 2021-2024 · All sectors`.
    pub fn label(&self) -> String {
        let country = if self.country == ALL_COUNTRIES {
            "Global"
        } else {
            self.country.as_str()
        };
        let sector = if self.has_sector_filter() {
            self.sector.as_str()
        } else {
            "All sectors"
        };
        format!("{} · {} · {}", country, self.years, sector)
    }

    /// Seed string for the placeholder hash.
    pub fn seed(&self) -> String {
        format!("{}|{}|{}", self.country, self.years, self.sector)
    }
}

/// Headline figures. The ratio is always derived from the two totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub commitments: f64,
    pub disbursements: f64,
    pub projects: u32,
    disbursement_ratio: f64,
}

impl Kpi {
    pub fn new(commitments: f64, disbursements: f64, projects: u32) -> Self {
        Self {
            commitments,
            disbursements,
            projects,
            disbursement_ratio: disbursement_ratio(commitments, disbursements),
        }
    }

    pub fn disbursement_ratio(&self) -> f64 {
        self.disbursement_ratio
    }
}

/// `disbursements / commitments`, or 0 when nothing was committed.
pub fn disbursement_ratio(commitments: f64, disbursements: f64) -> f64 {
    if commitments > 0.0 {
        disbursements / commitments
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub period: String,
    pub commitments: f64,
    pub disbursements: f64,
}

/// One bar / slice: sectors, top list and mix all share this shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedAmount {
    pub name: String,
    pub amount: f64,
}

impl NamedAmount {
    pub fn new(name: impl Into<String>, amount: f64) -> Self {
        Self {
            name: name.into(),
            amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub kpi: Kpi,
    pub trend: Vec<TrendPoint>,
    pub sectors: Vec<NamedAmount>,
    /// Approximation derived from `sectors`, not an independent source.
    pub top: Vec<NamedAmount>,
    pub mix: Vec<NamedAmount>,
}

/// UI label for where the numbers came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataMode {
    pub is_demo: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

impl DataMode {
    pub fn live() -> Self {
        Self {
            is_demo: false,
            reason: String::new(),
        }
    }

    pub fn demo(reason: impl Into<String>) -> Self {
        Self {
            is_demo: true,
            reason: reason.into(),
        }
    }
}
