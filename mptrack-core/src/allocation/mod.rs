//! Model-portfolio allocation schedule.
//!
//! The allocation sheet is "wide": a `Ticker` column and one column per
//! rebalance date holding target weights. Rows that are not listed tickers
//! are either cash lines (summed into `CASH`) or ignored (totals, notes).
//! Each rebalance is normalised to sum to one including cash.

pub mod dates;
pub mod grid;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{is_listed_ticker, CASH};
use crate::error::EngineError;

pub use dates::{label_to_date, parse_day_first};
pub use grid::{Grid, GridCell};

/// Name of the ticker column in allocation sheets.
pub const TICKER_COLUMN: &str = "Ticker";

/// Target weights for one rebalance date. Weights and cash sum to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub date: NaiveDate,
    pub weights: BTreeMap<String, f64>,
    pub cash: f64,
}

impl Target {
    pub fn weight(&self, ticker: &str) -> f64 {
        if ticker == CASH {
            return self.cash;
        }
        self.weights.get(ticker).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum::<f64>() + self.cash
    }
}

/// Ordered rebalance targets plus the union of tickers they mention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceSchedule {
    targets: Vec<Target>,
    tickers: Vec<String>,
}

impl RebalanceSchedule {
    /// Build from targets. Targets are sorted by date, weights normalised.
    pub fn new(mut targets: Vec<Target>) -> Result<Self, EngineError> {
        if targets.is_empty() {
            return Err(EngineError::NoRebalances);
        }
        targets.sort_by_key(|t| t.date);
        for pair in targets.windows(2) {
            if pair[0].date == pair[1].date {
                return Err(EngineError::DuplicateRebalance(pair[0].date));
            }
        }

        for target in &mut targets {
            let total = target.total();
            if !total.is_finite() || total <= 0.0 {
                return Err(EngineError::EmptyRebalance(target.date));
            }
            for w in target.weights.values_mut() {
                *w /= total;
            }
            target.cash /= total;
        }

        let tickers: BTreeSet<String> = targets
            .iter()
            .flat_map(|t| t.weights.keys().cloned())
            .collect();

        Ok(Self {
            targets,
            tickers: tickers.into_iter().collect(),
        })
    }

    /// Parse a wide allocation sheet.
    pub fn from_grid(grid: &Grid) -> Result<Self, EngineError> {
        let ticker_col = grid
            .column_index(TICKER_COLUMN)
            .ok_or_else(|| EngineError::MissingColumn(TICKER_COLUMN.to_string()))?;

        let mut value_cols: Vec<(usize, NaiveDate)> = Vec::new();
        for (col, label) in grid.header.iter().enumerate() {
            if col == ticker_col || label.is_empty() {
                continue;
            }
            let date = label_to_date(label)
                .ok_or_else(|| EngineError::BadDateLabel(label.as_text()))?;
            value_cols.push((col, date));
        }
        if value_cols.is_empty() {
            return Err(EngineError::NoRebalances);
        }

        let mut targets: Vec<Target> = value_cols
            .iter()
            .map(|&(_, date)| Target {
                date,
                weights: BTreeMap::new(),
                cash: 0.0,
            })
            .collect();

        for row in 0..grid.rows.len() {
            let label = grid.cell(row, ticker_col).as_text();
            let lowered = label.to_lowercase();
            if label.trim().is_empty() || lowered.contains("total") {
                continue;
            }

            if is_listed_ticker(&label) {
                let ticker = label.trim().to_string();
                for (target, &(col, _)) in targets.iter_mut().zip(&value_cols) {
                    if target.weights.contains_key(&ticker) {
                        continue;
                    }
                    if let Some(w) = grid.cell(row, col).as_number() {
                        target.weights.insert(ticker.clone(), w);
                    }
                }
            } else if lowered.contains("cash") {
                for (target, &(col, _)) in targets.iter_mut().zip(&value_cols) {
                    target.cash += grid.cell(row, col).as_number().unwrap_or(0.0);
                }
            }
        }

        // A ticker quoted on some dates but not others holds zero weight there.
        let mentioned: BTreeSet<String> = targets
            .iter()
            .flat_map(|t| t.weights.keys().cloned())
            .collect();
        for target in &mut targets {
            for ticker in &mentioned {
                target.weights.entry(ticker.clone()).or_insert(0.0);
            }
        }

        Self::new(targets)
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn target(&self, i: usize) -> Option<&Target> {
        self.targets.get(i)
    }

    /// Tickers held at any rebalance (sorted, never `CASH`).
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.targets.iter().map(|t| t.date).collect()
    }

    /// First rebalance date; the portfolio starts here.
    pub fn start_date(&self) -> NaiveDate {
        self.targets[0].date
    }

    pub fn initial(&self) -> &Target {
        &self.targets[0]
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> GridCell {
        GridCell::Text(s.to_string())
    }

    fn num(n: f64) -> GridCell {
        GridCell::Number(n)
    }

    fn sample_grid() -> Grid {
        Grid::new(
            vec![text("Ticker"), text("02/01/2025"), text("03/03/2025")],
            vec![
                vec![text("FPT"), num(40.0), num(30.0)],
                vec![text("HPG"), num(40.0), num(30.0)],
                vec![text("Cash"), num(10.0), num(20.0)],
                vec![text("Cash (dividends)"), num(10.0), num(20.0)],
                vec![text("Total"), num(100.0), num(100.0)],
                vec![text("note: rebalance at close"), GridCell::Empty, GridCell::Empty],
            ],
        )
    }

    #[test]
    fn parses_wide_sheet() {
        let schedule = RebalanceSchedule::from_grid(&sample_grid()).unwrap();
        assert_eq!(schedule.len(), 2);
        assert_eq!(schedule.tickers(), &["FPT".to_string(), "HPG".to_string()]);
        assert_eq!(
            schedule.start_date(),
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()
        );
        let first = schedule.initial();
        assert!((first.weight("FPT") - 0.4).abs() < 1e-12);
        assert!((first.weight(CASH) - 0.2).abs() < 1e-12);
        let second = &schedule.targets()[1];
        assert!((second.weight(CASH) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn targets_are_normalised() {
        let schedule = RebalanceSchedule::from_grid(&sample_grid()).unwrap();
        for target in schedule.targets() {
            assert!((target.total() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn missing_ticker_column() {
        let grid = Grid::new(vec![text("Symbol"), text("02/01/2025")], vec![]);
        assert_eq!(
            RebalanceSchedule::from_grid(&grid),
            Err(EngineError::MissingColumn("Ticker".into()))
        );
    }

    #[test]
    fn bad_date_label() {
        let grid = Grid::new(
            vec![text("Ticker"), text("Weight")],
            vec![vec![text("FPT"), num(1.0)]],
        );
        assert_eq!(
            RebalanceSchedule::from_grid(&grid),
            Err(EngineError::BadDateLabel("Weight".into()))
        );
    }

    #[test]
    fn zero_weight_rebalance_is_rejected() {
        let grid = Grid::new(
            vec![text("Ticker"), text("02/01/2025")],
            vec![vec![text("FPT"), GridCell::Empty]],
        );
        assert!(matches!(
            RebalanceSchedule::from_grid(&grid),
            Err(EngineError::EmptyRebalance(_))
        ));
    }

    #[test]
    fn first_nonblank_duplicate_wins() {
        let grid = Grid::new(
            vec![text("Ticker"), text("02/01/2025")],
            vec![
                vec![text("FPT"), GridCell::Empty],
                vec![text("FPT"), num(1.0)],
                vec![text("FPT"), num(3.0)],
                vec![text("VCB"), num(1.0)],
            ],
        );
        let schedule = RebalanceSchedule::from_grid(&grid).unwrap();
        assert!((schedule.initial().weight("FPT") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn lowercase_tickers_are_not_holdings() {
        let grid = Grid::new(
            vec![text("Ticker"), text("02/01/2025")],
            vec![vec![text("fpt"), num(1.0)], vec![text("VCB"), num(1.0)]],
        );
        let schedule = RebalanceSchedule::from_grid(&grid).unwrap();
        assert_eq!(schedule.tickers(), &["VCB".to_string()]);
    }

    #[test]
    fn duplicate_dates_rejected() {
        let grid = Grid::new(
            vec![text("Ticker"), text("02/01/2025"), text("2-Jan-2025")],
            vec![vec![text("VCB"), num(1.0), num(1.0)]],
        );
        assert!(matches!(
            RebalanceSchedule::from_grid(&grid),
            Err(EngineError::DuplicateRebalance(_))
        ));
    }
}
