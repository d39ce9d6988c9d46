//! Panel 1: headline figures and the index chart.
//!
//! All three lines share the day axis of the series file. Rebalance dates
//! are drawn as vertical markers spanning the y range.

use chrono::NaiveDate;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Axis, Chart, Dataset, GraphType, Paragraph};
use ratatui::Frame;

use mptrack_core::attribution::SeriesPoint;
use mptrack_core::summary::Headline;

use crate::app::App;
use crate::theme;

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(5)])
        .split(area);

    render_headlines(f, chunks[0], app);
    if let Some(data) = &app.data {
        render_chart(f, chunks[1], &data.series, &data.rebalance_dates);
    }
}

fn render_headlines(f: &mut Frame, area: Rect, app: &App) {
    let mut lines: Vec<Line> = Vec::new();
    let Some(report) = &app.report else { return };

    match &report.headlines {
        Some(h) => {
            lines.push(Line::from(Span::styled(
                format!("As of {}", h.as_of),
                theme::accent_bold(),
            )));
            lines.push(headline_line("Model portfolio", h.model.as_ref(), theme::ACCENT));
            lines.push(headline_line("Original portfolio", h.original.as_ref(), theme::WARNING));
            lines.push(headline_line("VNINDEX", h.benchmark.as_ref(), theme::NEUTRAL));
        }
        None => lines.push(Line::from(Span::styled(
            "Series file is empty.",
            theme::warning(),
        ))),
    }

    let total = report.total_attribution();
    let vs_original = report.total_attribution_vs_original();
    lines.push(Line::from(vec![
        Span::styled(
            format!("{} .. {}  attribution ", report.from, report.to),
            theme::secondary(),
        ),
        Span::styled(format!("{} bps", super::bps(total)), theme::value_style(total)),
        Span::styled("  vs original ", theme::secondary()),
        Span::styled(
            format!("{} bps", super::bps(vs_original)),
            theme::value_style(vs_original),
        ),
    ]));

    f.render_widget(Paragraph::new(lines), area);
}

fn headline_line<'a>(label: &str, headline: Option<&Headline>, color: ratatui::style::Color) -> Line<'a> {
    let label = Span::styled(format!("  {label:<20}"), Style::default().fg(color));
    match headline {
        Some(h) => Line::from(vec![
            label,
            Span::styled(format!("{:>10.2}", h.last), theme::text()),
            Span::styled("  YTD ", theme::muted()),
            Span::styled(super::pct(h.ytd), theme::value_style(h.ytd)),
        ]),
        None => Line::from(vec![label, Span::styled("n/a", theme::muted())]),
    }
}

/// (x, y) points for one line of the chart, skipping gaps.
fn points(series: &[SeriesPoint], pick: impl Fn(&SeriesPoint) -> Option<f64>) -> Vec<(f64, f64)> {
    series
        .iter()
        .enumerate()
        .filter_map(|(i, p)| pick(p).filter(|v| v.is_finite()).map(|v| (i as f64, v)))
        .collect()
}

/// Day-axis positions of the rebalance dates that fall inside the series.
fn marker_positions(series: &[SeriesPoint], rebalance_dates: &[NaiveDate]) -> Vec<f64> {
    rebalance_dates
        .iter()
        .filter_map(|d| series.iter().position(|p| p.date >= *d))
        .map(|i| i as f64)
        .collect()
}

fn render_chart(f: &mut Frame, area: Rect, series: &[SeriesPoint], rebalance_dates: &[NaiveDate]) {
    if series.is_empty() {
        return;
    }
    let model = points(series, |p| Some(p.model));
    let original = points(series, |p| p.original);
    let benchmark = points(series, |p| p.benchmark);

    let (min_y, max_y) = model
        .iter()
        .chain(&original)
        .chain(&benchmark)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| {
            (lo.min(y), hi.max(y))
        });
    let padding = ((max_y - min_y).abs() * 0.05).max(0.5);
    let y_min = min_y - padding;
    let y_max = max_y + padding;
    let x_max = series.len().saturating_sub(1) as f64;

    let markers: Vec<[(f64, f64); 2]> = marker_positions(series, rebalance_dates)
        .into_iter()
        .map(|x| [(x, y_min), (x, y_max)])
        .collect();

    let mut datasets: Vec<Dataset> = markers
        .iter()
        .map(|m| {
            Dataset::default()
                .marker(symbols::Marker::Dot)
                .style(theme::muted())
                .graph_type(GraphType::Line)
                .data(m)
        })
        .collect();
    for (name, data, color) in [
        ("VNINDEX", &benchmark, theme::NEUTRAL),
        ("Original", &original, theme::WARNING),
        ("Model", &model, theme::ACCENT),
    ] {
        datasets.push(
            Dataset::default()
                .name(name)
                .marker(symbols::Marker::Braille)
                .style(Style::default().fg(color))
                .graph_type(GraphType::Line)
                .data(data),
        );
    }

    let first = series[0].date;
    let last = series[series.len() - 1].date;
    let chart = Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title(Span::styled("Date", theme::muted()))
                .style(theme::muted())
                .bounds([0.0, x_max.max(1.0)])
                .labels(vec![
                    Span::styled(first.to_string(), theme::muted()),
                    Span::styled(last.to_string(), theme::muted()),
                ]),
        )
        .y_axis(
            Axis::default()
                .title(Span::styled("Index (base 100)", theme::muted()))
                .style(theme::muted())
                .bounds([y_min, y_max])
                .labels(vec![
                    Span::styled(format!("{y_min:.1}"), theme::muted()),
                    Span::styled(format!("{y_max:.1}"), theme::muted()),
                ]),
        );

    f.render_widget(chart, area);
}
