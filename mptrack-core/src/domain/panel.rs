//! Date × ticker panel.
//!
//! Warehouse queries return long rows (`ticker, date, value`). A panel pivots
//! them onto the union of all dates, one column per ticker. Missing cells are
//! NaN; `forward_fill` carries the last quote down, and `align_asof` resamples
//! onto another date axis by taking the latest row on or before each date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One long-format warehouse row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub ticker: String,
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, ticker: impl Into<String>, value: f64) -> Self {
        Self {
            date,
            ticker: ticker.into(),
            value,
        }
    }
}

/// How duplicate `(date, ticker)` observations collapse into one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Arithmetic mean (prices).
    Mean,
    /// Last observation in input order (market caps).
    Last,
}

/// Column-major date × ticker matrix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Panel {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    columns: Vec<Vec<f64>>,
    lookup: HashMap<String, usize>,
}

impl Panel {
    /// Build a panel from explicit columns. Every column must have `dates.len()` rows.
    pub fn from_columns(dates: Vec<NaiveDate>, columns: Vec<(String, Vec<f64>)>) -> Self {
        let mut tickers = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        for (ticker, mut column) in columns {
            column.resize(dates.len(), f64::NAN);
            tickers.push(ticker);
            values.push(column);
        }
        let lookup = tickers
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        Self {
            dates,
            tickers,
            columns: values,
            lookup,
        }
    }

    /// Pivot long observations. Non-finite values are skipped; dates and
    /// tickers come out sorted ascending.
    pub fn from_observations(observations: &[Observation], aggregation: Aggregation) -> Self {
        let mut cells: BTreeMap<&str, HashMap<NaiveDate, (f64, usize)>> = BTreeMap::new();
        let mut all_dates = BTreeSet::new();

        for obs in observations {
            if !obs.value.is_finite() {
                continue;
            }
            all_dates.insert(obs.date);
            let cell = cells
                .entry(obs.ticker.as_str())
                .or_default()
                .entry(obs.date)
                .or_insert((0.0, 0));
            match aggregation {
                Aggregation::Mean => {
                    cell.0 += obs.value;
                    cell.1 += 1;
                }
                Aggregation::Last => {
                    cell.0 = obs.value;
                    cell.1 = 1;
                }
            }
        }

        let dates: Vec<NaiveDate> = all_dates.into_iter().collect();
        let columns = cells
            .into_iter()
            .map(|(ticker, by_date)| {
                let column = dates
                    .iter()
                    .map(|d| match by_date.get(d) {
                        Some((sum, n)) if *n > 0 => sum / *n as f64,
                        _ => f64::NAN,
                    })
                    .collect();
                (ticker.to_string(), column)
            })
            .collect();

        Self::from_columns(dates, columns)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.lookup.contains_key(ticker)
    }

    pub fn column(&self, ticker: &str) -> Option<&[f64]> {
        self.lookup.get(ticker).map(|&i| self.columns[i].as_slice())
    }

    /// Cell value; NaN when the ticker is unknown or the row is out of range.
    pub fn get(&self, row: usize, ticker: &str) -> f64 {
        self.column(ticker)
            .and_then(|c| c.get(row).copied())
            .unwrap_or(f64::NAN)
    }

    /// Value on `date` or the latest earlier row; NaN when there is none.
    pub fn value_at(&self, ticker: &str, date: NaiveDate) -> f64 {
        match self.dates.partition_point(|d| *d <= date).checked_sub(1) {
            Some(row) => self.get(row, ticker),
            None => f64::NAN,
        }
    }

    /// Row index of an exact date.
    pub fn row_of(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    /// Carry the last finite value down each column. Leading gaps stay NaN.
    pub fn forward_fill(mut self) -> Self {
        for column in &mut self.columns {
            let mut last = f64::NAN;
            for v in column.iter_mut() {
                if v.is_finite() {
                    last = *v;
                } else {
                    *v = last;
                }
            }
        }
        self
    }

    /// Drop rows dated before `start`.
    pub fn since(mut self, start: NaiveDate) -> Self {
        let cut = self.dates.partition_point(|d| *d < start);
        self.dates.drain(..cut);
        for column in &mut self.columns {
            column.drain(..cut);
        }
        self
    }

    /// Resample onto `dates`: each target row takes the latest source row
    /// dated on or before it, or NaN when there is none.
    pub fn align_asof(&self, dates: &[NaiveDate]) -> Panel {
        let source_rows: Vec<Option<usize>> = dates
            .iter()
            .map(|d| self.dates.partition_point(|x| x <= d).checked_sub(1))
            .collect();

        let columns = self
            .tickers
            .iter()
            .zip(&self.columns)
            .map(|(ticker, column)| {
                let aligned = source_rows
                    .iter()
                    .map(|row| row.map_or(f64::NAN, |r| column[r]))
                    .collect();
                (ticker.clone(), aligned)
            })
            .collect();

        Panel::from_columns(dates.to_vec(), columns)
    }

    /// Row sums over finite cells.
    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.dates.len())
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| c[row])
                    .filter(|v| v.is_finite())
                    .sum()
            })
            .collect()
    }
}
