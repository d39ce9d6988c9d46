//! Portfolio simulation over a daily price panel.
//!
//! The engine walks the price dates from the first rebalance onward. Before a
//! day is valued, every rebalance dated on or before it is applied: the book
//! is marked to market and re-split across the target weights. The very
//! first rebalance always starts from a value of 100.
//!
//! Two policies share the loop:
//! - `Scheduled` applies every target in the schedule (the model portfolio)
//! - `BuyAndHold` applies only the first target (the original portfolio)

pub mod accounting;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::allocation::{RebalanceSchedule, Target};
use crate::domain::Panel;
use crate::error::EngineError;

pub use accounting::{allocate, holding_weights, mark_to_market, Allocation};

/// Portfolio value on the first rebalance date.
pub const INITIAL_VALUE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RebalancePolicy {
    Scheduled,
    BuyAndHold,
}

/// One simulated day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub value: f64,
    pub cash: f64,
    /// Value rebased to 100 on the first simulated day.
    pub index: f64,
}

/// Output of a simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    pub policy: RebalancePolicy,
    pub days: Vec<DayRecord>,
    /// Schedule tickers that have a price column, in schedule order.
    pub holdings: Vec<String>,
    /// Daily weights, `weights[day][holding]`.
    pub weights: Vec<Vec<f64>>,
    pub warnings: Vec<String>,
}

impl Simulation {
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.days.iter().map(|d| d.date).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.days.iter().map(|d| d.value).collect()
    }

    pub fn index_levels(&self) -> Vec<f64> {
        self.days.iter().map(|d| d.index).collect()
    }

    /// Daily weight of one ticker; `None` if it was never a holding.
    pub fn weight_column(&self, ticker: &str) -> Option<Vec<f64>> {
        let i = self.holdings.iter().position(|h| h == ticker)?;
        Some(self.weights.iter().map(|row| row[i]).collect())
    }

    /// Daily weights as a panel (dates × holdings).
    pub fn weight_panel(&self) -> Panel {
        let columns = self
            .holdings
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), self.weights.iter().map(|row| row[i]).collect()))
            .collect();
        Panel::from_columns(self.dates(), columns)
    }
}

/// Run `schedule` against `prices` (normally forward-filled).
pub fn simulate(
    schedule: &RebalanceSchedule,
    prices: &Panel,
    policy: RebalancePolicy,
) -> Result<Simulation, EngineError> {
    let mut warnings = Vec::new();

    let holdings: Vec<String> = schedule
        .tickers()
        .iter()
        .filter(|t| prices.contains(t))
        .cloned()
        .collect();
    if holdings.is_empty() {
        return Err(EngineError::NoOverlap);
    }
    for ticker in schedule.tickers() {
        if !prices.contains(ticker) {
            warnings.push(format!(
                "{ticker} has no price history; its weight is held as cash"
            ));
        }
    }

    let start = schedule.start_date();
    let first_row = prices.dates().partition_point(|d| *d < start);
    if first_row == prices.len() {
        return Err(EngineError::NoPrices(start));
    }
    if policy == RebalancePolicy::BuyAndHold && prices.dates()[first_row] != start {
        return Err(EngineError::MissingStartPrice(start));
    }

    let targets: &[Target] = match policy {
        RebalancePolicy::Scheduled => schedule.targets(),
        RebalancePolicy::BuyAndHold => &schedule.targets()[..1],
    };

    let columns: Vec<&[f64]> = holdings
        .iter()
        .filter_map(|t| prices.column(t))
        .collect();

    let mut units = vec![0.0; holdings.len()];
    let mut cash = 0.0;
    let mut next = 0usize;
    let mut days: Vec<DayRecord> = Vec::with_capacity(prices.len() - first_row);
    let mut weights: Vec<Vec<f64>> = Vec::with_capacity(prices.len() - first_row);

    for row in first_row..prices.len() {
        let date = prices.dates()[row];
        let px: Vec<f64> = columns.iter().map(|c| c[row]).collect();

        while next < targets.len() && targets[next].date <= date {
            let target = &targets[next];
            let value = if next == 0 {
                INITIAL_VALUE
            } else {
                mark_to_market(&units, &px, cash)
            };
            let target_weights: Vec<f64> = holdings.iter().map(|t| target.weight(t)).collect();
            let held: f64 = target_weights.iter().sum();
            let cash_weight = target.total() - held;

            let alloc = allocate(value, &target_weights, cash_weight, &px);
            for &i in &alloc.unpriced {
                warnings.push(format!(
                    "{} has no usable price on {date} (rebalance of {}); its weight is held as cash",
                    holdings[i], target.date
                ));
            }
            units = alloc.units;
            cash = alloc.cash;
            next += 1;
        }

        let value = mark_to_market(&units, &px, cash);
        weights.push(holding_weights(&units, &px, value));
        days.push(DayRecord {
            date,
            value,
            cash,
            index: f64::NAN,
        });
    }

    let base = days[0].value;
    for day in &mut days {
        day.index = if base != 0.0 {
            day.value / base * 100.0
        } else {
            f64::NAN
        };
    }

    Ok(Simulation {
        policy,
        days,
        holdings,
        weights,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn target(date: &str, weights: &[(&str, f64)], cash: f64) -> Target {
        Target {
            date: d(date),
            weights: weights
                .iter()
                .map(|(t, w)| (t.to_string(), *w))
                .collect::<BTreeMap<_, _>>(),
            cash,
        }
    }

    fn prices() -> Panel {
        Panel::from_columns(
            vec![d("2025-01-02"), d("2025-01-03"), d("2025-01-06"), d("2025-01-07")],
            vec![
                ("AAA".into(), vec![10.0, 11.0, 12.0, 12.0]),
                ("BBB".into(), vec![20.0, 20.0, 18.0, 18.0]),
            ],
        )
    }

    #[test]
    fn buy_and_hold_tracks_prices() {
        let schedule =
            RebalanceSchedule::new(vec![target("2025-01-02", &[("AAA", 0.5), ("BBB", 0.5)], 0.0)])
                .unwrap();
        let sim = simulate(&schedule, &prices(), RebalancePolicy::BuyAndHold).unwrap();
        assert_eq!(sim.days.len(), 4);
        assert_eq!(sim.days[0].value, 100.0);
        // 5 AAA + 2.5 BBB
        assert!((sim.days[1].value - 105.0).abs() < 1e-9);
        assert!((sim.days[2].value - 105.0).abs() < 1e-9);
        assert!((sim.days[0].index - 100.0).abs() < 1e-12);
    }

    #[test]
    fn scheduled_rebalance_resets_weights() {
        let schedule = RebalanceSchedule::new(vec![
            target("2025-01-02", &[("AAA", 1.0), ("BBB", 0.0)], 0.0),
            target("2025-01-04", &[("AAA", 0.0), ("BBB", 0.5)], 0.5),
        ])
        .unwrap();
        let sim = simulate(&schedule, &prices(), RebalancePolicy::Scheduled).unwrap();
        // Day 2 is 2025-01-06: rebalance dated 2025-01-04 applies there.
        let day = &sim.days[2];
        // Value before rebalance: 10 AAA * 12 = 120.
        assert!((day.value - 120.0).abs() < 1e-9);
        assert!((day.cash - 60.0).abs() < 1e-9);
        let bbb = sim.weight_column("BBB").unwrap();
        assert!((bbb[2] - 0.5).abs() < 1e-12);
        assert_eq!(sim.weight_column("AAA").unwrap()[2], 0.0);
    }

    #[test]
    fn weights_plus_cash_sum_to_one() {
        let schedule = RebalanceSchedule::new(vec![target(
            "2025-01-02",
            &[("AAA", 0.3), ("BBB", 0.3)],
            0.4,
        )])
        .unwrap();
        let sim = simulate(&schedule, &prices(), RebalancePolicy::Scheduled).unwrap();
        for (day, w) in sim.days.iter().zip(&sim.weights) {
            let total: f64 = w.iter().sum::<f64>() + day.cash / day.value;
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn unpriced_tickers_are_held_as_cash() {
        let schedule = RebalanceSchedule::new(vec![target(
            "2025-01-02",
            &[("AAA", 0.5), ("ZZZ", 0.5)],
            0.0,
        )])
        .unwrap();
        let sim = simulate(&schedule, &prices(), RebalancePolicy::Scheduled).unwrap();
        assert_eq!(sim.holdings, vec!["AAA".to_string()]);
        assert!((sim.days[0].cash - 50.0).abs() < 1e-9);
        assert_eq!(sim.warnings.len(), 1);
    }

    #[test]
    fn no_overlap_is_an_error() {
        let schedule =
            RebalanceSchedule::new(vec![target("2025-01-02", &[("ZZZ", 1.0)], 0.0)]).unwrap();
        assert_eq!(
            simulate(&schedule, &prices(), RebalancePolicy::Scheduled),
            Err(EngineError::NoOverlap)
        );
    }

    #[test]
    fn buy_and_hold_needs_start_price() {
        let schedule =
            RebalanceSchedule::new(vec![target("2025-01-04", &[("AAA", 1.0)], 0.0)]).unwrap();
        assert_eq!(
            simulate(&schedule, &prices(), RebalancePolicy::BuyAndHold),
            Err(EngineError::MissingStartPrice(d("2025-01-04")))
        );
        // The scheduled policy starts on the next trading day instead.
        let sim = simulate(&schedule, &prices(), RebalancePolicy::Scheduled).unwrap();
        assert_eq!(sim.days[0].date, d("2025-01-06"));
        assert_eq!(sim.days[0].value, 100.0);
    }

    #[test]
    fn start_after_last_price() {
        let schedule =
            RebalanceSchedule::new(vec![target("2025-02-01", &[("AAA", 1.0)], 0.0)]).unwrap();
        assert_eq!(
            simulate(&schedule, &prices(), RebalancePolicy::Scheduled),
            Err(EngineError::NoPrices(d("2025-02-01")))
        );
    }
}
