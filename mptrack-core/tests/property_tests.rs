//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Normalisation: every rebalance target sums to one
//! 2. Value conservation: holding weights plus cash share sum to one every day
//! 3. Return algebra: compounding daily changes recovers the total change
//! 4. Attribution ordering: rows sorted by (date, ticker) and always finite
//! 5. Summary totals: per-ticker attribution sums to the row total

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use std::collections::BTreeMap;

use mptrack_core::allocation::{RebalanceSchedule, Target};
use mptrack_core::attribution::{attribute, AttributionInputs};
use mptrack_core::domain::{Panel, Series};
use mptrack_core::engine::{simulate, RebalancePolicy};
use mptrack_core::returns::{compound, expanding_mean, pct_change};
use mptrack_core::summary::summarize_by_ticker;

const TICKERS: [&str; 4] = ["ACB", "FPT", "HPG", "VCB"];

fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 2).unwrap() + Duration::days(i as i64)
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_weights() -> impl Strategy<Value = (Vec<f64>, f64)> {
    (prop::collection::vec(0.0..50.0_f64, TICKERS.len()), 0.0..20.0_f64)
        .prop_filter("non-zero total", |(w, c)| w.iter().sum::<f64>() + c > 1e-6)
}

fn arb_levels(len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(5.0..200.0_f64, len)
}

fn arb_prices(days: usize) -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(arb_levels(days), TICKERS.len())
}

fn target(date: NaiveDate, (weights, cash): &(Vec<f64>, f64)) -> Target {
    Target {
        date,
        weights: TICKERS
            .iter()
            .zip(weights)
            .map(|(t, w)| (t.to_string(), *w))
            .collect::<BTreeMap<_, _>>(),
        cash: *cash,
    }
}

fn panel(prices: &[Vec<f64>]) -> Panel {
    let days = prices[0].len();
    Panel::from_columns(
        (0..days).map(day).collect(),
        TICKERS
            .iter()
            .zip(prices)
            .map(|(t, col)| (t.to_string(), col.clone()))
            .collect(),
    )
}

// ── 1. Normalisation ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn targets_sum_to_one(a in arb_weights(), b in arb_weights()) {
        let schedule = RebalanceSchedule::new(vec![target(day(5), &b), target(day(0), &a)]).unwrap();
        prop_assert_eq!(schedule.start_date(), day(0));
        for t in schedule.targets() {
            prop_assert!((t.total() - 1.0).abs() < 1e-9);
        }
    }
}

// ── 2. Value Conservation ────────────────────────────────────────────

proptest! {
    #[test]
    fn weights_and_cash_sum_to_one(
        a in arb_weights(),
        b in arb_weights(),
        prices in arb_prices(20),
        rebalance_day in 1usize..19,
    ) {
        let schedule = RebalanceSchedule::new(vec![
            target(day(0), &a),
            target(day(rebalance_day), &b),
        ]).unwrap();
        let sim = simulate(&schedule, &panel(&prices), RebalancePolicy::Scheduled).unwrap();
        prop_assert_eq!(sim.days.len(), 20);
        prop_assert_eq!(sim.days[0].value, 100.0);
        for (record, weights) in sim.days.iter().zip(&sim.weights) {
            let total = weights.iter().sum::<f64>() + record.cash / record.value;
            prop_assert!((total - 1.0).abs() < 1e-9);
        }
    }

    /// A rebalance never changes the portfolio value on the day it happens.
    #[test]
    fn rebalance_is_value_neutral(
        a in arb_weights(),
        b in arb_weights(),
        prices in arb_prices(10),
        rebalance_day in 1usize..9,
    ) {
        let p = panel(&prices);
        let single = RebalanceSchedule::new(vec![target(day(0), &a)]).unwrap();
        let double = RebalanceSchedule::new(vec![
            target(day(0), &a),
            target(day(rebalance_day), &b),
        ]).unwrap();
        let held = simulate(&single, &p, RebalancePolicy::Scheduled).unwrap();
        let rebalanced = simulate(&double, &p, RebalancePolicy::Scheduled).unwrap();
        let before = held.days[rebalance_day].value;
        let after = rebalanced.days[rebalance_day].value;
        prop_assert!((before - after).abs() < 1e-6 * before.max(1.0));
    }

    /// Buy-and-hold ignores every target after the first.
    #[test]
    fn buy_and_hold_ignores_later_targets(
        a in arb_weights(),
        b in arb_weights(),
        prices in arb_prices(10),
    ) {
        let p = panel(&prices);
        let single = RebalanceSchedule::new(vec![target(day(0), &a)]).unwrap();
        let double = RebalanceSchedule::new(vec![target(day(0), &a), target(day(4), &b)]).unwrap();
        let x = simulate(&single, &p, RebalancePolicy::BuyAndHold).unwrap();
        let y = simulate(&double, &p, RebalancePolicy::BuyAndHold).unwrap();
        prop_assert_eq!(x.values(), y.values());
    }
}

// ── 3. Return Algebra ────────────────────────────────────────────────

proptest! {
    #[test]
    fn compounded_changes_match_total_change(levels in arb_levels(30)) {
        let total = compound(pct_change(&levels));
        let expected = levels[levels.len() - 1] / levels[0] - 1.0;
        prop_assert!((total - expected).abs() < 1e-9 * expected.abs().max(1.0));
    }

    #[test]
    fn expanding_mean_stays_within_bounds(values in prop::collection::vec(-1.0..1.0_f64, 1..50)) {
        let means = expanding_mean(&values);
        for (i, m) in means.iter().enumerate() {
            let window = &values[..=i];
            let lo = window.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(*m >= lo - 1e-12 && *m <= hi + 1e-12);
        }
    }
}

// ── 4 & 5. Attribution Ordering and Summary Totals ───────────────────

proptest! {
    #[test]
    fn attribution_rows_sorted_and_finite(
        a in arb_weights(),
        prices in arb_prices(15),
        caps in arb_prices(15),
        index in arb_levels(15),
    ) {
        let p = panel(&prices);
        let c = panel(&caps);
        let schedule = RebalanceSchedule::new(vec![target(day(0), &a)]).unwrap();
        let model = simulate(&schedule, &p, RebalancePolicy::Scheduled).unwrap();
        let baseline = simulate(&schedule, &p, RebalancePolicy::BuyAndHold).unwrap();
        let benchmark = Series::from_points((0..15).map(day).zip(index).collect());
        let universe: Vec<String> = TICKERS.iter().map(|t| t.to_string()).collect();

        let rows = attribute(&AttributionInputs {
            model: &model,
            baseline: &baseline,
            prices: &p,
            caps: &c,
            benchmark: &benchmark,
            universe: &universe,
        });
        prop_assert_eq!(rows.len(), 14 * TICKERS.len());
        for pair in rows.windows(2) {
            prop_assert!((pair[0].date, &pair[0].ticker) < (pair[1].date, &pair[1].ticker));
        }
        prop_assert!(rows.iter().all(|r| r.attribution.is_finite()));

        let total: f64 = rows.iter().map(|r| r.attribution).sum();
        let summed: f64 = summarize_by_ticker(&rows).iter().map(|s| s.attribution).sum();
        prop_assert!((total - summed).abs() < 1e-9);
    }
}
