//! # Table extraction
//! Finds the four appendix tables (`### KPI`, `### Trend`, `### Sectors`, `### Mix`)
//! in free-form agent text and turns their rows into typed records.
//!
//! The parser tokenizes the text into lines, classifies each line as a level-3
//! heading, a pipe-table row or prose, then folds rows into the section opened by
//! the most recent heading. A section ends at the next level-3 heading or at the
//! end of the text.
//!
//! Wire contract: the agent is asked to emit the four sections in the order above.
//! The order is not enforced here; only the first section with each title counts.
//! A heading names a section when its title starts with the section name (any
//! ASCII case) followed by a non-word character or the end: `### KPI (USD)` and
//! `### Mix of instruments` qualify, `### Mixed` does not.
//! Escaped pipes inside cells are not supported.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::numeric::{is_missing_marker, Cell};

pub const KPI_SECTION: &str = "KPI";
pub const TREND_SECTION: &str = "Trend";
pub const SECTORS_SECTION: &str = "Sectors";
pub const MIX_SECTION: &str = "Mix";

pub const REQUIRED_SECTIONS: [&str; 4] = [KPI_SECTION, TREND_SECTION, SECTORS_SECTION, MIX_SECTION];

/// Header + separator rows every markdown table starts with.
const TABLE_SCAFFOLD_ROWS: usize = 2;

const FUZZY_KEY_MIN: f64 = 0.93;
const FUZZY_LEN_SLACK: usize = 2;

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s{0,3}###\s+(.*?)\s*$").expect("heading regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("Missing required tables")]
    MissingTables { missing: Vec<&'static str> },
}

/// Intermediate record handed to the validator.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedTables {
    pub kpi: KpiTable,
    pub trend: Vec<TrendRow>,
    pub sectors: Vec<AmountRow>,
    pub mix: Vec<AmountRow>,
    /// Some data cell in any of the four tables is an explicit `NA`.
    pub has_missing_marker: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendRow {
    pub period: String,
    pub commitments: Cell,
    pub disbursements: Cell,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmountRow {
    pub name: String,
    pub amount: Cell,
}

/// KPI headline metrics the dashboard needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KpiMetric {
    Commitments,
    Disbursements,
    Projects,
}

impl KpiMetric {
    /// Exact keys, in lookup order.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            KpiMetric::Commitments => &["total commitments", "commitments", "total_commitments"],
            KpiMetric::Disbursements => {
                &["total disbursements", "disbursements", "total_disbursements"]
            }
            KpiMetric::Projects => &["projects", "project count", "count"],
        }
    }

    /// Single-word normalized key compared approximately, for misspellings only.
    fn fuzzy_target(self) -> &'static str {
        match self {
            KpiMetric::Commitments => "commitments",
            KpiMetric::Disbursements => "disbursements",
            KpiMetric::Projects => "projects",
        }
    }
}

/// `metric -> value` mapping from the KPI table; metric names are lowercased.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KpiTable {
    entries: BTreeMap<String, String>,
}

impl KpiTable {
    fn insert(&mut self, metric: &str, value: &str) {
        let key = metric.trim().to_lowercase();
        if !key.is_empty() {
            self.entries.insert(key, value.trim().to_string());
        }
    }

    pub fn get(&self, metric: &str) -> Option<&str> {
        self.entries
            .get(&metric.trim().to_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the value for a headline metric, or `None` when no row names it.
    ///
    /// Exact aliases win, then normalized names (`Total commitments (USD)`,
    /// `number_of_projects`), then close misspellings. Ratio rows never match.
    pub fn resolve(&self, metric: KpiMetric) -> Option<Cell> {
        let non_empty = |v: &&String| !v.is_empty();

        for alias in metric.aliases() {
            if let Some(v) = self.entries.get(*alias).filter(non_empty) {
                return Some(Cell::parse(v));
            }
        }

        let candidates = || {
            self.entries
                .iter()
                .filter(|(k, v)| !v.is_empty() && !k.contains("ratio") && !k.contains('%'))
        };

        let wanted: Vec<String> = metric.aliases().iter().map(|a| normalize_key(a)).collect();
        if let Some((_, v)) = candidates().find(|(k, _)| wanted.contains(&normalize_key(k))) {
            return Some(Cell::parse(v));
        }

        // Multi-word keys such as `Disbursement rate` name other metrics, and
        // Jaro-Winkler rewards the shared prefix; only near-equal single words qualify.
        let target = metric.fuzzy_target();
        let mut best: Option<(f64, &String)> = None;
        for (k, v) in candidates() {
            let key = normalize_key(k);
            if key.contains(' ') || key.len().abs_diff(target.len()) > FUZZY_LEN_SLACK {
                continue;
            }
            let score = strsim::jaro_winkler(&key, target);
            if score >= FUZZY_KEY_MIN && best.map_or(true, |(b, _)| score > b) {
                best = Some((score, v));
            }
        }
        best.map(|(_, v)| Cell::parse(v))
    }
}

/// `Total Commitments (USD)` -> `commitments`, `number_of_projects` -> `projects`.
fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut depth = 0usize;
    for ch in key.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            '_' | '-' => out.push(' '),
            c => out.extend(c.to_lowercase()),
        }
    }
    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut rest = collapsed.as_str();
    for prefix in ["total ", "number of "] {
        rest = rest.strip_prefix(prefix).unwrap_or(rest);
    }
    rest.to_string()
}

#[derive(Debug, Clone, PartialEq)]
enum Line<'a> {
    Heading(&'a str),
    Row(Vec<&'a str>),
    Prose,
}

fn classify(line: &str) -> Line<'_> {
    if let Some(caps) = HEADING.captures(line) {
        return Line::Heading(caps.get(1).map_or("", |m| m.as_str()));
    }
    let t = line.trim();
    if t.len() >= 2 && t.starts_with('|') && t.ends_with('|') {
        return Line::Row(split_row(t));
    }
    Line::Prose
}

/// Split on pipes, trimming cells; the bounding pipes contribute no cells.
fn split_row(row: &str) -> Vec<&str> {
    row[1..row.len() - 1].split('|').map(str::trim).collect()
}

#[derive(Debug)]
struct Section<'a> {
    title: &'a str,
    rows: Vec<Vec<&'a str>>,
}

impl<'a> Section<'a> {
    fn data_rows(&self) -> &[Vec<&'a str>] {
        self.rows.get(TABLE_SCAFFOLD_ROWS..).unwrap_or(&[])
    }
}

fn fold_sections(text: &str) -> Vec<Section<'_>> {
    let mut sections: Vec<Section<'_>> = Vec::new();
    for line in text.lines() {
        match classify(line) {
            Line::Heading(title) => sections.push(Section {
                title,
                rows: Vec::new(),
            }),
            Line::Row(cells) => {
                if let Some(current) = sections.last_mut() {
                    current.rows.push(cells);
                }
            }
            Line::Prose => {}
        }
    }
    sections
}

fn find_section<'s, 'a>(sections: &'s [Section<'a>], name: &str) -> Option<&'s Section<'a>> {
    sections.iter().find(|s| title_names(s.title, name))
}

/// `KPI (USD)` and `Mix of instruments` name their sections; `Mixed` does not.
fn title_names(title: &str, name: &str) -> bool {
    let head = title.get(..name.len()).is_some_and(|p| p.eq_ignore_ascii_case(name));
    head && title[name.len()..]
        .chars()
        .next()
        .map_or(true, |c| !c.is_alphanumeric())
}

/// Parse the four appendix tables out of `text`.
pub fn extract_tables(text: &str) -> Result<ExtractedTables, ExtractError> {
    let sections = fold_sections(text);

    let missing: Vec<&'static str> = REQUIRED_SECTIONS
        .iter()
        .copied()
        .filter(|title| find_section(&sections, title).is_none())
        .collect();
    let (Some(kpi), Some(trend), Some(sectors), Some(mix)) = (
        find_section(&sections, KPI_SECTION),
        find_section(&sections, TREND_SECTION),
        find_section(&sections, SECTORS_SECTION),
        find_section(&sections, MIX_SECTION),
    ) else {
        return Err(ExtractError::MissingTables { missing });
    };

    let has_missing_marker = [kpi, trend, sectors, mix].iter().any(|s| {
        s.data_rows()
            .iter()
            .flatten()
            .any(|cell| is_missing_marker(cell))
    });

    let mut kpi_table = KpiTable::default();
    for row in kpi.data_rows() {
        if let Some(metric) = row.first() {
            kpi_table.insert(metric, row.get(1).copied().unwrap_or(""));
        }
    }

    let trend_rows = trend
        .data_rows()
        .iter()
        .filter(|r| r.len() >= 3)
        .map(|r| TrendRow {
            period: r[0].to_string(),
            commitments: Cell::parse(r[1]),
            disbursements: Cell::parse(r[2]),
        })
        .filter(|p| !p.period.is_empty())
        .collect();

    Ok(ExtractedTables {
        kpi: kpi_table,
        trend: trend_rows,
        sectors: amount_rows(sectors),
        mix: amount_rows(mix),
        has_missing_marker,
    })
}

fn amount_rows(section: &Section<'_>) -> Vec<AmountRow> {
    section
        .data_rows()
        .iter()
        .filter(|r| r.len() >= 2)
        .map(|r| AmountRow {
            name: r[0].to_string(),
            amount: Cell::parse(r[1]),
        })
        .filter(|a| !a.name.is_empty())
        .collect()
}

/// Prose that precedes the `### KPI` appendix; the whole text when there is none.
pub fn narrative_brief(text: &str) -> &str {
    let mut offset = 0usize;
    for line in text.split_inclusive('\n') {
        if let Line::Heading(title) = classify(line.trim_end_matches(['\r', '\n'])) {
            if title_names(title, KPI_SECTION) {
                return text[..offset].trim();
            }
        }
        offset += line.len();
    }
    text.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_separates_headings_rows_and_prose() {
        assert_eq!(classify("### Trend"), Line::Heading("Trend"));
        assert_eq!(classify("   ###   Mix  "), Line::Heading("Mix"));
        assert_eq!(classify("#### Detail"), Line::Prose);
        assert_eq!(classify("###Trend"), Line::Prose);
        assert_eq!(classify(" | a | b | "), Line::Row(vec!["a", "b"]));
        assert_eq!(classify("|"), Line::Prose);
        assert_eq!(classify("| open row"), Line::Prose);
        assert_eq!(classify("- bullet"), Line::Prose);
    }

    #[test]
    fn titles_match_by_leading_word() {
        assert!(title_names("KPI", "KPI"));
        assert!(title_names("kpi (USD)", "KPI"));
        assert!(title_names("Trend: quarterly", "Trend"));
        assert!(title_names("Mix of instruments", "Mix"));
        assert!(!title_names("Mixed", "Mix"));
        assert!(!title_names("Mi", "Mix"));
        assert!(!title_names("KPIs", "KPI"));
    }

    #[test]
    fn split_keeps_inner_empty_cells_in_position() {
        assert_eq!(split_row("| 2024-Q1 |  | 400 |"), vec!["2024-Q1", "", "400"]);
    }

    #[test]
    fn sections_stop_at_next_level_three_heading() {
        let text = "### KPI\n| m | v |\n|---|---|\n| projects | 4 |\n#### note\n| count | 9 |\n### Trend\n| x |\n";
        let sections = fold_sections(text);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "KPI");
        assert_eq!(sections[0].data_rows().len(), 2);
        assert!(sections[1].data_rows().is_empty());
    }

    #[test]
    fn kpi_keys_accept_naming_variants() {
        let mut t = KpiTable::default();
        t.insert("Total Commitments (USD)", "100");
        t.insert("total_disbursments", "40");
        t.insert("Number of projects", "12");
        t.insert("Disbursement ratio", "0.4");
        assert_eq!(t.resolve(KpiMetric::Commitments), Some(Cell::Number(100.0)));
        assert_eq!(t.resolve(KpiMetric::Disbursements), Some(Cell::Number(40.0)));
        assert_eq!(t.resolve(KpiMetric::Projects), Some(Cell::Number(12.0)));
    }

    #[test]
    fn other_metrics_sharing_a_prefix_are_not_totals() {
        let mut t = KpiTable::default();
        t.insert("Disbursement rate", "48");
        t.insert("Projects closed", "4");
        t.insert("Commitments pipeline", "900");
        t.insert("Comitments", "7");
        assert_eq!(t.resolve(KpiMetric::Disbursements), None);
        assert_eq!(t.resolve(KpiMetric::Projects), None);
        // Only the near-equal single word qualifies.
        assert_eq!(t.resolve(KpiMetric::Commitments), Some(Cell::Number(7.0)));
    }

    #[test]
    fn exact_alias_beats_variant_and_empty_values_are_skipped() {
        let mut t = KpiTable::default();
        t.insert("Total commitments", "");
        t.insert("Commitments", "250");
        t.insert("Total commitments (EUR)", "999");
        assert_eq!(t.resolve(KpiMetric::Commitments), Some(Cell::Number(250.0)));
        assert_eq!(t.resolve(KpiMetric::Projects), None);
    }

    #[test]
    fn country_row_is_not_mistaken_for_project_count() {
        let mut t = KpiTable::default();
        t.insert("Country", "Kenya");
        assert_eq!(t.resolve(KpiMetric::Projects), None);
    }

    #[test]
    fn brief_stops_before_appendix() {
        let text = "## Dashboard Narrative\n- strong pipeline\n\n### KPI\n| a | b |\n";
        assert_eq!(narrative_brief(text), "## Dashboard Narrative\n- strong pipeline");
        assert_eq!(narrative_brief("  just prose \n"), "just prose");
    }
}
