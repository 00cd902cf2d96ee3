//! # Numeric coercion
//! Turns free-form table cells into numbers without ever raising.
//!
//! `None` is the NOT_A_NUMBER channel: callers must test for it explicitly,
//! it is never folded into zero.

/// Markers the agent writes when the knowledge base has no value for a cell.
const MISSING_MARKERS: [&str; 2] = ["NA", "N/A"];

/// Parse a token as a plain decimal. Empty, absent, garbage or non-finite input yields `None`.
///
/// Thousands separators are not accepted; `"1,200"` is not a number.
pub fn to_number(token: Option<&str>) -> Option<f64> {
    let s = token?.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// True when the cell is an explicit missing-value marker (any case).
pub fn is_missing_marker(cell: &str) -> bool {
    let c = cell.trim();
    MISSING_MARKERS.iter().any(|m| c.eq_ignore_ascii_case(m))
}

/// Tri-state numeric cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
    Number(f64),
    /// The agent said "no data" (`NA`).
    Missing,
    /// Empty or not a number.
    Unparseable,
}

impl Cell {
    pub fn parse(raw: &str) -> Self {
        if is_missing_marker(raw) {
            return Cell::Missing;
        }
        match to_number(Some(raw)) {
            Some(v) => Cell::Number(v),
            None => Cell::Unparseable,
        }
    }

    /// The finite value, if any.
    pub fn value(self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(v),
            Cell::Missing | Cell::Unparseable => None,
        }
    }
}
