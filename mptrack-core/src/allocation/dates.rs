//! Rebalance date labels.
//!
//! Allocation sheets label each weight column with its rebalance date. Labels
//! arrive as real dates, Excel serial numbers, or day-first text.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use super::grid::GridCell;

const DAY_FIRST_FORMATS: &[&str] = &[
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d-%B-%Y",
    "%d %B %Y",
    "%d/%m/%y",
    "%d-%b-%y",
    "%Y-%m-%d",
    "%Y/%m/%d",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M:%S"];

/// Largest serial Excel can represent (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Convert an Excel serial day number (1900 date system) to a date.
pub fn from_excel_serial(serial: f64) -> Option<NaiveDate> {
    if !(1.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

/// Parse a text label day-first.
pub fn parse_day_first(label: &str) -> Option<NaiveDate> {
    let s = label.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DAY_FIRST_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    s.parse::<f64>().ok().and_then(from_excel_serial)
}

/// Resolve a header cell to a rebalance date.
pub fn label_to_date(cell: &GridCell) -> Option<NaiveDate> {
    match cell {
        GridCell::Date(d) => Some(*d),
        GridCell::Number(n) => from_excel_serial(*n),
        GridCell::Text(s) => parse_day_first(s),
        GridCell::Empty => None,
    }
}
