//! Panel 2: top and bottom contributors over the selected range, plus a
//! scrollable table of every ticker.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Row, Table};
use ratatui::Frame;

use mptrack_core::summary::TickerSummary;

use crate::app::App;
use crate::theme;

use super::{bps, opt_pct, pct};

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let Some(report) = &app.report else { return };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(report.top.len().max(1) as u16 + 3),
            Constraint::Min(4),
        ])
        .split(area);
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[0]);

    render_ranked(f, halves[0], &format!(" Top {} ", report.top.len()), &report.top);
    render_ranked(
        f,
        halves[1],
        &format!(" Bottom {} ", report.bottom.len()),
        &report.bottom,
    );
    render_all(f, rows[1], &report.tickers, app.scroll);
}

fn header(names: &[&'static str]) -> Row<'static> {
    Row::new(
        names
            .iter()
            .map(|h| Cell::from(*h).style(theme::accent().add_modifier(Modifier::BOLD))),
    )
    .height(1)
}

fn render_ranked(f: &mut Frame, area: Rect, title: &str, tickers: &[TickerSummary]) {
    let rows = tickers.iter().map(|t| {
        Row::new(vec![
            Cell::from(t.ticker.clone()),
            Cell::from(bps(t.attribution)).style(theme::value_style(t.attribution)),
            Cell::from(pct(t.active_weight)),
            Cell::from(pct(t.ticker_return)),
        ])
        .style(theme::text())
    });
    let widths = [
        Constraint::Length(8),
        Constraint::Length(10),
        Constraint::Length(9),
        Constraint::Length(9),
    ];
    let table = Table::new(rows, widths)
        .header(header(&["Ticker", "Attr bps", "Active W", "Return"]))
        .block(
            Block::default()
                .title(title.to_string())
                .borders(Borders::ALL)
                .border_style(theme::muted()),
        )
        .column_spacing(1);
    f.render_widget(table, area);
}

fn render_all(f: &mut Frame, area: Rect, tickers: &[TickerSummary], scroll: usize) {
    let visible = area.height.saturating_sub(3) as usize;
    let start = scroll.min(tickers.len().saturating_sub(1));
    let end = (start + visible).min(tickers.len());

    let rows = tickers[start..end].iter().map(|t| {
        Row::new(vec![
            Cell::from(t.ticker.clone()),
            Cell::from(pct(t.avg_portfolio_weight)),
            Cell::from(pct(t.avg_benchmark_weight)),
            Cell::from(pct(t.active_weight)).style(theme::value_style(t.active_weight)),
            Cell::from(pct(t.ticker_return)),
            Cell::from(bps(t.attribution)).style(theme::value_style(t.attribution)),
            Cell::from(opt_pct(t.avg_baseline_weight)),
            Cell::from(bps(t.attribution_vs_original))
                .style(theme::value_style(t.attribution_vs_original)),
        ])
        .style(Style::default().fg(theme::TEXT_PRIMARY))
    });
    let widths = [
        Constraint::Length(8),
        Constraint::Length(9),
        Constraint::Length(9),
        Constraint::Length(9),
        Constraint::Length(9),
        Constraint::Length(10),
        Constraint::Length(9),
        Constraint::Length(11),
    ];
    let title = format!(
        " All tickers [{}-{} of {}]  j/k scroll ",
        if tickers.is_empty() { 0 } else { start + 1 },
        end,
        tickers.len()
    );
    let table = Table::new(rows, widths)
        .header(header(&[
            "Ticker", "Port W", "Bench W", "Active W", "Return", "Attr bps", "Orig W", "vs Orig",
        ]))
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(theme::muted()),
        )
        .column_spacing(1);
    f.render_widget(table, area);
}
