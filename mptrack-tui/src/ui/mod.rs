//! Top-level UI layout: one bordered panel plus a status bar.

pub mod analysts;
pub mod attribution;
pub mod help_panel;
pub mod overview;
pub mod status_bar;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use crate::app::{App, Panel};
use crate::theme;

/// Draw the entire UI.
pub fn draw(f: &mut Frame, app: &App) {
    // Split: main area + 1-line status bar.
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(f.area());

    draw_panel(f, chunks[0], app);
    status_bar::render(f, chunks[1], app);
}

fn draw_panel(f: &mut Frame, area: Rect, app: &App) {
    let panel = app.active_panel;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::panel_border(true))
        .title(format!(" {} [{}] ", panel.label(), panel.index() + 1))
        .title_style(theme::panel_title(true));

    let inner = block.inner(area);
    f.render_widget(block, area);

    if panel == Panel::Help {
        help_panel::render(f, inner, app);
        return;
    }
    if app.report.is_none() {
        render_missing(f, inner, app);
        return;
    }
    match panel {
        Panel::Overview => overview::render(f, inner, app),
        Panel::Attribution => attribution::render(f, inner, app),
        Panel::Analysts => analysts::render(f, inner, app),
        Panel::Help => {}
    }
}

/// Shown on every data panel until artifacts load.
fn render_missing(f: &mut Frame, area: Rect, app: &App) {
    let hint = app
        .load_error
        .as_deref()
        .unwrap_or("No attribution data loaded. Run `mptrack calc`, then press r.");
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled("Nothing to show yet.", theme::warning())),
        Line::from(""),
        Line::from(Span::styled(hint.to_string(), theme::muted())),
    ];
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), area);
}

/// Signed basis points with a fixed width, for table cells.
pub(crate) fn bps(x: f64) -> String {
    if x.is_finite() {
        format!("{:+.2}", mptrack_core::summary::to_bps(x))
    } else {
        "-".to_string()
    }
}

pub(crate) fn pct(x: f64) -> String {
    if x.is_finite() {
        format!("{:.2}%", mptrack_core::summary::to_percent(x))
    } else {
        "-".to_string()
    }
}

pub(crate) fn opt_pct(x: Option<f64>) -> String {
    x.map_or_else(|| "-".to_string(), pct)
}
