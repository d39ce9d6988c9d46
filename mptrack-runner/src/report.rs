//! Period report over saved artifacts: headline figures, contributor
//! rankings, per-ticker table and analyst leaderboard, as Markdown.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt::Write as _;

use mptrack_core::attribution::{AttributionRow, SeriesPoint};
use mptrack_core::summary::{
    analyst_leaderboard, bottom_contributors, filter_range, headline, summarize_by_ticker,
    to_bps, to_percent, top_contributors, AnalystScore, Headline, Headlines, TickerSummary,
};
use mptrack_core::EngineError;

/// Number of entries in the contributor tables.
pub const DEFAULT_TOP: usize = 10;

#[derive(Debug, Clone)]
pub struct PeriodReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub headlines: Option<Headlines>,
    pub tickers: Vec<TickerSummary>,
    pub top: Vec<TickerSummary>,
    pub bottom: Vec<TickerSummary>,
    pub analysts: Vec<AnalystScore>,
}

/// First and last dates present in the rows.
pub fn date_bounds(rows: &[AttributionRow]) -> Option<(NaiveDate, NaiveDate)> {
    let first = rows.iter().map(|r| r.date).min()?;
    let last = rows.iter().map(|r| r.date).max()?;
    Some((first, last))
}

impl PeriodReport {
    /// Summarise `[from, to]`; open ends default to the first/last row date.
    pub fn build(
        rows: &[AttributionRow],
        series: &[SeriesPoint],
        analysts: &HashMap<String, String>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        top_n: usize,
    ) -> Result<Self, EngineError> {
        let (first, last) = date_bounds(rows).ok_or(EngineError::EmptyRange {
            from: from.unwrap_or_default(),
            to: to.unwrap_or_default(),
        })?;
        let from = from.unwrap_or(first);
        let to = to.unwrap_or(last);

        let selected = filter_range(rows, from, to)?;
        let tickers = summarize_by_ticker(&selected);
        let top = top_contributors(&tickers, top_n);
        let bottom = bottom_contributors(&tickers, top_n);
        let analysts = analyst_leaderboard(&tickers, analysts);

        Ok(Self {
            from,
            to,
            headlines: headline(series),
            tickers,
            top,
            bottom,
            analysts,
        })
    }

    pub fn total_attribution(&self) -> f64 {
        self.tickers.iter().map(|t| t.attribution).sum()
    }

    pub fn total_attribution_vs_original(&self) -> f64 {
        self.tickers.iter().map(|t| t.attribution_vs_original).sum()
    }
}

fn pct(x: f64) -> String {
    if x.is_finite() {
        format!("{:.2}%", to_percent(x))
    } else {
        "n/a".to_string()
    }
}

fn bps(x: f64) -> String {
    if x.is_finite() {
        format!("{:.2}", to_bps(x))
    } else {
        "n/a".to_string()
    }
}

fn headline_line(label: &str, h: Option<Headline>) -> String {
    match h {
        Some(h) => format!("- {label}: {:.2} (YTD {})\n", h.last, pct(h.ytd)),
        None => format!("- {label}: n/a\n"),
    }
}

fn contributor_table(out: &mut String, entries: &[TickerSummary]) {
    out.push_str("| Ticker | Avg weight | Avg bench weight | Active weight | Ticker return | Active return | Attribution (bps) |\n");
    out.push_str("|--------|-----------|------------------|---------------|---------------|---------------|-------------------|\n");
    for t in entries {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} |",
            t.ticker,
            pct(t.avg_portfolio_weight),
            pct(t.avg_benchmark_weight),
            pct(t.active_weight),
            pct(t.ticker_return),
            pct(t.active_return),
            bps(t.attribution)
        );
    }
}

/// Render the report as Markdown.
pub fn render_markdown(report: &PeriodReport) -> String {
    let mut out = format!(
        "# Model Portfolio Attribution\n\nPeriod: {} to {}\n\n## Headline\n",
        report.from, report.to
    );
    match &report.headlines {
        Some(h) => {
            let _ = writeln!(out, "As of {}\n", h.as_of);
            out.push_str(&headline_line("Model portfolio", h.model));
            out.push_str(&headline_line("Original portfolio", h.original));
            out.push_str(&headline_line("VNINDEX", h.benchmark));
        }
        None => out.push_str("No index series available.\n"),
    }
    let _ = writeln!(
        out,
        "- Attribution vs VNINDEX: {} bps\n- Attribution vs original: {} bps",
        bps(report.total_attribution()),
        bps(report.total_attribution_vs_original())
    );

    let _ = writeln!(out, "\n## Top {} Contributors\n", report.top.len());
    contributor_table(&mut out, &report.top);
    let _ = writeln!(out, "\n## Bottom {} Contributors\n", report.bottom.len());
    contributor_table(&mut out, &report.bottom);

    out.push_str("\n## All Tickers\n\n");
    out.push_str("| Ticker | Attribution (bps) | Vs original (bps) | Avg weight | Avg baseline weight |\n");
    out.push_str("|--------|-------------------|-------------------|-----------|---------------------|\n");
    for t in &report.tickers {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            t.ticker,
            bps(t.attribution),
            bps(t.attribution_vs_original),
            pct(t.avg_portfolio_weight),
            t.avg_baseline_weight.map_or_else(|| "n/a".to_string(), pct)
        );
    }

    out.push_str("\n## Analyst Leaderboard\n\n");
    out.push_str("| Analyst | Tickers | Attribution (bps) | Vs original (bps) |\n");
    out.push_str("|---------|---------|-------------------|-------------------|\n");
    for a in &report.analysts {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            a.analyst,
            a.tickers,
            bps(a.attribution),
            bps(a.attribution_vs_original)
        );
    }
    out
}
