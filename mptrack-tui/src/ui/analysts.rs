//! Panel 3: analyst leaderboard over the selected range.

use ratatui::layout::{Constraint, Rect};
use ratatui::style::Modifier;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Cell, Paragraph, Row, Table};
use ratatui::Frame;

use crate::app::App;
use crate::theme;

use super::bps;

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let Some(report) = &app.report else { return };
    if app.data.as_ref().map_or(true, |d| d.analysts.is_empty()) {
        render_no_mapping(f, area, app);
        return;
    }

    let header = Row::new(
        ["#", "Analyst", "Tickers", "Attr bps", "vs Orig bps"]
            .into_iter()
            .map(|h| Cell::from(h).style(theme::accent().add_modifier(Modifier::BOLD))),
    )
    .height(1);

    let rows = report.analysts.iter().enumerate().map(|(i, a)| {
        Row::new(vec![
            Cell::from(format!("{}", i + 1)),
            Cell::from(a.analyst.clone()),
            Cell::from(format!("{}", a.tickers)),
            Cell::from(bps(a.attribution)).style(theme::value_style(a.attribution)),
            Cell::from(bps(a.attribution_vs_original))
                .style(theme::value_style(a.attribution_vs_original)),
        ])
        .style(theme::text())
    });

    let widths = [
        Constraint::Length(4),
        Constraint::Length(24),
        Constraint::Length(8),
        Constraint::Length(10),
        Constraint::Length(12),
    ];
    let table = Table::new(rows, widths).header(header).column_spacing(1);
    f.render_widget(table, area);
}

fn render_no_mapping(f: &mut Frame, area: Rect, app: &App) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Analyst mapping file not found or empty.",
            theme::warning(),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "Expected Ticker and Analyst in charge columns in {}",
                app.sources.analysts.display()
            ),
            theme::muted(),
        )),
    ];
    f.render_widget(Paragraph::new(lines), area);
}
