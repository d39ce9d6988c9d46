//! Period views over attribution rows: per-ticker totals, contributor
//! rankings, analyst leaderboard and headline index figures.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::attribution::{AttributionRow, SeriesPoint};
use crate::error::EngineError;
use crate::returns::{compound, finite_mean};

/// Analyst label for tickers nobody covers.
pub const NO_ASSIGNMENT: &str = "No assignment";

/// Rows dated within `[from, to]`, both ends inclusive.
pub fn filter_range(
    rows: &[AttributionRow],
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<AttributionRow>, EngineError> {
    if from > to {
        return Err(EngineError::InvalidRange { from, to });
    }
    let selected: Vec<AttributionRow> = rows
        .iter()
        .filter(|r| r.date >= from && r.date <= to)
        .cloned()
        .collect();
    if selected.is_empty() {
        return Err(EngineError::EmptyRange { from, to });
    }
    Ok(selected)
}

/// Per-ticker aggregate over a selected period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSummary {
    pub ticker: String,
    pub avg_portfolio_weight: f64,
    pub avg_benchmark_weight: f64,
    pub active_weight: f64,
    /// Compounded over the period.
    pub ticker_return: f64,
    /// Compounded over the period.
    pub active_return: f64,
    /// Summed over the period.
    pub attribution: f64,
    pub avg_baseline_weight: Option<f64>,
    pub active_weight_vs_original: Option<f64>,
    pub active_return_vs_original: Option<f64>,
    /// Summed over the period.
    pub attribution_vs_original: f64,
}

fn optional_mean(
    rows: &[&AttributionRow],
    field: impl Fn(&AttributionRow) -> Option<f64>,
) -> Option<f64> {
    let m = finite_mean(rows.iter().filter_map(|r| field(r)));
    m.is_finite().then_some(m)
}

/// Aggregate rows per ticker, sorted by attribution descending (ticker
/// ascending on ties).
pub fn summarize_by_ticker(rows: &[AttributionRow]) -> Vec<TickerSummary> {
    let mut groups: BTreeMap<&str, Vec<&AttributionRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.ticker.as_str()).or_default().push(row);
    }

    let mut summary: Vec<TickerSummary> = groups
        .into_iter()
        .map(|(ticker, group)| TickerSummary {
            ticker: ticker.to_string(),
            avg_portfolio_weight: finite_mean(group.iter().map(|r| r.avg_portfolio_weight)),
            avg_benchmark_weight: finite_mean(group.iter().map(|r| r.avg_benchmark_weight)),
            active_weight: finite_mean(group.iter().map(|r| r.active_weight)),
            ticker_return: compound(group.iter().map(|r| r.ticker_return)),
            active_return: compound(group.iter().map(|r| r.active_return)),
            attribution: group.iter().map(|r| r.attribution).sum(),
            avg_baseline_weight: optional_mean(&group, |r| r.avg_baseline_weight),
            active_weight_vs_original: optional_mean(&group, |r| r.active_weight_vs_original),
            active_return_vs_original: optional_mean(&group, |r| r.active_return_vs_original),
            attribution_vs_original: group
                .iter()
                .filter_map(|r| r.attribution_vs_original)
                .sum(),
        })
        .collect();

    summary.sort_by(|a, b| {
        b.attribution
            .total_cmp(&a.attribution)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    summary
}

/// The first `n` entries of a summary sorted by [`summarize_by_ticker`].
pub fn top_contributors(summary: &[TickerSummary], n: usize) -> Vec<TickerSummary> {
    summary.iter().take(n).cloned().collect()
}

/// The last `n` entries, most negative first.
pub fn bottom_contributors(summary: &[TickerSummary], n: usize) -> Vec<TickerSummary> {
    let start = summary.len().saturating_sub(n);
    summary[start..].iter().rev().cloned().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystScore {
    pub analyst: String,
    pub attribution: f64,
    pub attribution_vs_original: f64,
    pub tickers: usize,
}

/// Sum attribution per analyst. Tickers missing from `mapping` or mapped to
/// a blank name fall under [`NO_ASSIGNMENT`].
pub fn analyst_leaderboard(
    summary: &[TickerSummary],
    mapping: &HashMap<String, String>,
) -> Vec<AnalystScore> {
    let mut scores: BTreeMap<String, AnalystScore> = BTreeMap::new();
    for entry in summary {
        let analyst = mapping
            .get(&entry.ticker)
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .unwrap_or(NO_ASSIGNMENT);
        let score = scores
            .entry(analyst.to_string())
            .or_insert_with(|| AnalystScore {
                analyst: analyst.to_string(),
                attribution: 0.0,
                attribution_vs_original: 0.0,
                tickers: 0,
            });
        score.attribution += entry.attribution;
        score.attribution_vs_original += entry.attribution_vs_original;
        score.tickers += 1;
    }

    let mut board: Vec<AnalystScore> = scores.into_values().collect();
    board.sort_by(|a, b| {
        b.attribution
            .total_cmp(&a.attribution)
            .then_with(|| a.analyst.cmp(&b.analyst))
    });
    board
}

/// Latest level and change since the first observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub last: f64,
    pub ytd: f64,
}

impl Headline {
    fn from_levels<I: IntoIterator<Item = f64>>(levels: I) -> Option<Self> {
        let mut finite = levels.into_iter().filter(|v| v.is_finite());
        let first = finite.next()?;
        let last = finite.last().unwrap_or(first);
        let ytd = if first != 0.0 {
            last / first - 1.0
        } else {
            f64::NAN
        };
        Some(Self { last, ytd })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Headlines {
    pub as_of: NaiveDate,
    pub model: Option<Headline>,
    pub original: Option<Headline>,
    pub benchmark: Option<Headline>,
}

/// Headline figures for the three indexed series; `None` for an empty series.
pub fn headline(series: &[SeriesPoint]) -> Option<Headlines> {
    let as_of = series.last()?.date;
    Some(Headlines {
        as_of,
        model: Headline::from_levels(series.iter().map(|p| p.model)),
        original: Headline::from_levels(series.iter().filter_map(|p| p.original)),
        benchmark: Headline::from_levels(series.iter().filter_map(|p| p.benchmark)),
    })
}

/// Fraction as a percentage rounded to 2 dp.
pub fn to_percent(x: f64) -> f64 {
    (x * 100.0 * 100.0).round() / 100.0
}

/// Fraction in basis points rounded to 2 dp.
pub fn to_bps(x: f64) -> f64 {
    (x * 10_000.0 * 100.0).round() / 100.0
}
