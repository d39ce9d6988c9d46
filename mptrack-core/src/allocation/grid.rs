//! In-memory sheet representation handed over by the workbook readers.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub enum GridCell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl GridCell {
    /// Text form of the cell, as a spreadsheet would show it.
    pub fn as_text(&self) -> String {
        match self {
            GridCell::Empty => String::new(),
            GridCell::Text(s) => s.clone(),
            GridCell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            GridCell::Number(n) => n.to_string(),
            GridCell::Date(d) => d.to_string(),
        }
    }

    /// Numeric value, if the cell holds one. Text such as `12.5` or `12.5%`
    /// is accepted; a percent sign divides by 100.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            GridCell::Number(n) if n.is_finite() => Some(*n),
            GridCell::Text(s) => {
                let s = s.trim().replace(',', "");
                if let Some(pct) = s.strip_suffix('%') {
                    pct.trim().parse::<f64>().ok().map(|v| v / 100.0)
                } else {
                    s.parse::<f64>().ok()
                }
                .filter(|v| v.is_finite())
            }
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            GridCell::Empty => true,
            GridCell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// A rectangular sheet: one header row plus data rows. Rows may be shorter
/// than the header; missing cells read as `Empty`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    pub header: Vec<GridCell>,
    pub rows: Vec<Vec<GridCell>>,
}

impl Grid {
    pub fn new(header: Vec<GridCell>, rows: Vec<Vec<GridCell>>) -> Self {
        Self { header, rows }
    }

    /// Index of the header cell whose text equals `name` (surrounding
    /// whitespace ignored).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header
            .iter()
            .position(|c| c.as_text().trim() == name)
    }

    pub fn cell(&self, row: usize, col: usize) -> &GridCell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&GridCell::Empty)
    }
}
