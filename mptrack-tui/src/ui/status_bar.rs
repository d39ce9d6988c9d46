//! Bottom status bar: selected range, panel hints, last status message.

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::{App, StatusLevel};
use crate::theme;

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let mut spans: Vec<Span> = Vec::new();

    if let Some((from, to)) = app.selected_range() {
        spans.push(Span::styled(format!(" {from} .. {to} "), theme::accent_bold()));
        spans.push(Span::raw("|"));
    }

    spans.push(Span::styled(
        " 1:Overview 2:Attribution 3:Analysts 4:Help",
        theme::muted(),
    ));
    spans.push(Span::raw(" | "));

    if let Some((msg, level)) = &app.status_message {
        let style = match level {
            StatusLevel::Info => theme::accent(),
            StatusLevel::Warning => theme::warning(),
            StatusLevel::Error => theme::negative(),
        };
        spans.push(Span::styled(msg.as_str(), style));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use crate::app::tests::sample_app;
    use crate::ui::tests::render_to_string;

    #[test]
    fn shows_selected_range() {
        let mut app = sample_app();
        app.shift_start(1);
        let screen = render_to_string(&app, 120, 10);
        let last = screen.lines().last().unwrap();
        assert!(last.contains("2025-01-06 .. 2025-01-07"));
    }
}
