//! Daily active-weight attribution.
//!
//! For every trading day of the model portfolio and every ticker in the
//! universe (model holdings ∪ benchmark members), the contribution of the
//! ticker to the model's excess return is
//!
//! ```text
//! attribution = (avg model weight − avg benchmark weight) × (ticker return − benchmark return)
//! ```
//!
//! where the averages are expanding means from the first model day. The same
//! decomposition is repeated against the original (buy-and-hold) portfolio.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{Panel, Series};
use crate::engine::Simulation;
use crate::returns::{expanding_mean, pct_change};

/// One `(date, ticker)` attribution record, column names as written to CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionRow {
    #[serde(rename = "TRADE_DATE")]
    pub date: NaiveDate,
    #[serde(rename = "Ticker")]
    pub ticker: String,
    #[serde(rename = "AvgPortfolioWeightYTD")]
    pub avg_portfolio_weight: f64,
    #[serde(rename = "AvgBenchmarkWeightYTD")]
    pub avg_benchmark_weight: f64,
    #[serde(rename = "ActiveWeightYTD")]
    pub active_weight: f64,
    #[serde(rename = "TickerReturn")]
    pub ticker_return: f64,
    #[serde(rename = "ActiveReturn")]
    pub active_return: f64,
    #[serde(rename = "Attribution")]
    pub attribution: f64,
    #[serde(rename = "AvgBaselineWeightYTD")]
    pub avg_baseline_weight: Option<f64>,
    #[serde(rename = "ActiveWeightVsOriginal")]
    pub active_weight_vs_original: Option<f64>,
    #[serde(rename = "ActiveReturnVsOriginal")]
    pub active_return_vs_original: Option<f64>,
    #[serde(rename = "AttributionVsOriginal")]
    pub attribution_vs_original: Option<f64>,
    #[serde(rename = "BenchmarkReturn")]
    pub benchmark_return: f64,
    #[serde(rename = "BaselineReturn")]
    pub baseline_return: Option<f64>,
}

/// Indexed performance of the three tracked series, all based at 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    #[serde(rename = "TRADE_DATE")]
    pub date: NaiveDate,
    #[serde(rename = "ModelPortfolioIndex")]
    pub model: f64,
    #[serde(rename = "OriginalPortfolioIndex")]
    pub original: Option<f64>,
    #[serde(rename = "VNINDEX")]
    pub benchmark: Option<f64>,
}

/// Everything the attribution needs, already fetched and simulated.
#[derive(Debug, Clone, Copy)]
pub struct AttributionInputs<'a> {
    pub model: &'a Simulation,
    pub baseline: &'a Simulation,
    /// Forward-filled prices for the whole universe.
    pub prices: &'a Panel,
    /// Forward-filled market caps of benchmark members.
    pub caps: &'a Panel,
    pub benchmark: &'a Series,
    /// Sorted union of model tickers and benchmark members.
    pub universe: &'a [String],
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// Compute attribution rows, ordered by date then ticker. Rows whose
/// attribution is not finite (first day, unpriced tickers) are dropped.
pub fn attribute(inputs: &AttributionInputs<'_>) -> Vec<AttributionRow> {
    let dates = inputs.model.dates();
    if dates.is_empty() {
        return Vec::new();
    }

    let prices = inputs.prices.align_asof(&dates);
    let caps = inputs.caps.align_asof(&dates);
    let cap_totals = caps.row_sums();

    let benchmark_returns = pct_change(&inputs.benchmark.align_asof(&dates));
    let baseline_values = Series {
        dates: inputs.baseline.dates(),
        values: inputs.baseline.values(),
    }
    .align_asof(&dates);
    let baseline_returns = pct_change(&baseline_values);
    let baseline_weights = inputs.baseline.weight_panel().align_asof(&dates);
    let baseline_started: Vec<bool> = baseline_values.iter().map(|v| v.is_finite()).collect();

    let per_ticker: Vec<Vec<AttributionRow>> = inputs
        .universe
        .par_iter()
        .map(|ticker| {
            let ticker_returns = match prices.column(ticker) {
                Some(col) => pct_change(col),
                None => vec![f64::NAN; dates.len()],
            };

            let model_weights = inputs
                .model
                .weight_column(ticker)
                .unwrap_or_else(|| vec![0.0; dates.len()]);
            let avg_model = expanding_mean(&model_weights);

            let bench_weights: Vec<f64> = (0..dates.len())
                .map(|row| {
                    let cap = caps.get(row, ticker);
                    let total = cap_totals[row];
                    if cap.is_finite() && total > 0.0 {
                        cap / total
                    } else {
                        0.0
                    }
                })
                .collect();
            let avg_bench = expanding_mean(&bench_weights);

            // Before the baseline's first day its weights are unknown (NaN);
            // afterwards a ticker it never held weighs zero.
            let base_weights: Vec<f64> = match baseline_weights.column(ticker) {
                Some(col) => col.to_vec(),
                None => baseline_started
                    .iter()
                    .map(|&s| if s { 0.0 } else { f64::NAN })
                    .collect(),
            };
            let avg_base = expanding_mean(&base_weights);

            dates
                .iter()
                .enumerate()
                .filter_map(|(row, &date)| {
                    let ticker_return = ticker_returns[row];
                    let benchmark_return = benchmark_returns[row];
                    let active_weight = avg_model[row] - avg_bench[row];
                    let active_return = ticker_return - benchmark_return;
                    let attribution = active_weight * active_return;
                    if !attribution.is_finite() {
                        return None;
                    }

                    let active_weight_base = avg_model[row] - avg_base[row];
                    let active_return_base = ticker_return - baseline_returns[row];

                    Some(AttributionRow {
                        date,
                        ticker: ticker.clone(),
                        avg_portfolio_weight: avg_model[row],
                        avg_benchmark_weight: avg_bench[row],
                        active_weight,
                        ticker_return,
                        active_return,
                        attribution,
                        avg_baseline_weight: finite(avg_base[row]),
                        active_weight_vs_original: finite(active_weight_base),
                        active_return_vs_original: finite(active_return_base),
                        attribution_vs_original: finite(active_weight_base * active_return_base),
                        benchmark_return,
                        baseline_return: finite(baseline_returns[row]),
                    })
                })
                .collect()
        })
        .collect();

    let mut rows: Vec<AttributionRow> = per_ticker.into_iter().flatten().collect();
    rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.ticker.cmp(&b.ticker)));
    rows
}

/// Model, original and benchmark levels rebased to 100 on the first model day.
pub fn index_series(
    model: &Simulation,
    baseline: &Simulation,
    benchmark: &Series,
) -> Vec<SeriesPoint> {
    let dates = model.dates();
    let original = Series {
        dates: baseline.dates(),
        values: baseline.index_levels(),
    }
    .align_asof(&dates);
    let bench = benchmark.align_asof(&dates);
    let bench_base = bench.iter().copied().find(|v| v.is_finite() && *v != 0.0);
    let original_base = original.iter().copied().find(|v| v.is_finite() && *v != 0.0);

    dates
        .iter()
        .enumerate()
        .map(|(i, &date)| SeriesPoint {
            date,
            model: model.days[i].index,
            original: original_base.and_then(|b| finite(original[i] / b * 100.0)),
            benchmark: bench_base.and_then(|b| finite(bench[i] / b * 100.0)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::{RebalanceSchedule, Target};
    use crate::engine::{simulate, RebalancePolicy};
    use std::collections::BTreeMap;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dates() -> Vec<NaiveDate> {
        vec![d("2025-01-02"), d("2025-01-03"), d("2025-01-06")]
    }

    fn fixture() -> (Simulation, Simulation, Panel, Panel, Series, Vec<String>) {
        let prices = Panel::from_columns(
            dates(),
            vec![
                ("AAA".into(), vec![10.0, 11.0, 11.0]),
                ("BBB".into(), vec![20.0, 20.0, 22.0]),
            ],
        );
        let caps = Panel::from_columns(
            dates(),
            vec![
                ("AAA".into(), vec![100.0, 100.0, 100.0]),
                ("BBB".into(), vec![300.0, 300.0, 300.0]),
            ],
        );
        let benchmark = Series::from_points(vec![
            (d("2025-01-02"), 1000.0),
            (d("2025-01-03"), 1010.0),
            (d("2025-01-06"), 1010.0),
        ]);
        let schedule = RebalanceSchedule::new(vec![Target {
            date: d("2025-01-02"),
            weights: BTreeMap::from([("AAA".to_string(), 1.0)]),
            cash: 0.0,
        }])
        .unwrap();
        let model = simulate(&schedule, &prices, RebalancePolicy::Scheduled).unwrap();
        let baseline = simulate(&schedule, &prices, RebalancePolicy::BuyAndHold).unwrap();
        (
            model,
            baseline,
            prices,
            caps,
            benchmark,
            vec!["AAA".to_string(), "BBB".to_string()],
        )
    }

    #[test]
    fn first_day_is_dropped() {
        let (model, baseline, prices, caps, benchmark, universe) = fixture();
        let rows = attribute(&AttributionInputs {
            model: &model,
            baseline: &baseline,
            prices: &prices,
            caps: &caps,
            benchmark: &benchmark,
            universe: &universe,
        });
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.date != d("2025-01-02")));
        assert_eq!(rows[0].ticker, "AAA");
        assert_eq!(rows[1].ticker, "BBB");
    }

    #[test]
    fn attribution_matches_hand_calculation() {
        let (model, baseline, prices, caps, benchmark, universe) = fixture();
        let rows = attribute(&AttributionInputs {
            model: &model,
            baseline: &baseline,
            prices: &prices,
            caps: &caps,
            benchmark: &benchmark,
            universe: &universe,
        });
        let aaa = &rows[0];
        // Model holds only AAA (weight 1); benchmark weight 0.25.
        assert!((aaa.avg_portfolio_weight - 1.0).abs() < 1e-12);
        assert!((aaa.avg_benchmark_weight - 0.25).abs() < 1e-12);
        assert!((aaa.ticker_return - 0.1).abs() < 1e-12);
        assert!((aaa.benchmark_return - 0.01).abs() < 1e-12);
        assert!((aaa.attribution - 0.75 * 0.09).abs() < 1e-12);
        // Same holdings as the original: no active weight versus it.
        assert!(aaa.active_weight_vs_original.unwrap().abs() < 1e-12);

        let bbb = &rows[1];
        assert!((bbb.active_weight + 0.75).abs() < 1e-12);
        assert!((bbb.attribution - (-0.75 * -0.01)).abs() < 1e-12);
    }

    #[test]
    fn series_rebased_to_100() {
        let (model, baseline, _, _, benchmark, _) = fixture();
        let series = index_series(&model, &baseline, &benchmark);
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].benchmark, Some(100.0));
        assert!((series[1].benchmark.unwrap() - 101.0).abs() < 1e-9);
        assert!((series[1].model - 110.0).abs() < 1e-9);
        assert_eq!(series[1].original, Some(series[1].model));
    }
}
