//! Panel 4: keyboard shortcuts.

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::App;
use crate::theme;

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let mut lines: Vec<Line> = Vec::new();

    section(&mut lines, "Global Navigation");
    key(&mut lines, "1-4", "Switch to panel by number");
    key(&mut lines, "Tab / Shift+Tab", "Cycle panels forward / back");
    key(&mut lines, "r", "Reload artifacts from disk");
    key(&mut lines, "q / Esc", "Quit");
    lines.push(Line::from(""));

    section(&mut lines, "Date Range");
    key(&mut lines, "[ / ]", "Move start date back / forward one trading day");
    key(&mut lines, "{ / }", "Move end date back / forward one trading day");
    lines.push(Line::from(""));

    section(&mut lines, "Panel 2: Attribution");
    key(&mut lines, "j / k", "Scroll the all-tickers table");
    lines.push(Line::from(""));

    section(&mut lines, "Artifacts");
    key(&mut lines, "attribution", &app.sources.attribution.display().to_string());
    key(&mut lines, "series", &app.sources.series.display().to_string());
    key(&mut lines, "manifest", &app.sources.manifest.display().to_string());
    key(&mut lines, "analysts", &app.sources.analysts.display().to_string());

    f.render_widget(Paragraph::new(lines), area);
}

fn section<'a>(lines: &mut Vec<Line<'a>>, title: &str) {
    lines.push(Line::from(Span::styled(title.to_string(), theme::accent_bold())));
}

fn key<'a>(lines: &mut Vec<Line<'a>>, keys: &str, desc: &str) {
    lines.push(Line::from(vec![
        Span::styled(format!("  {keys:>16}  "), theme::accent()),
        Span::styled(desc.to_string(), theme::muted()),
    ]));
}

#[cfg(test)]
mod tests {
    use crate::app::tests::sample_app;
    use crate::app::Panel;
    use crate::ui::tests::render_to_string;

    #[test]
    fn lists_range_keys_and_artifact_paths() {
        let mut app = sample_app();
        app.active_panel = Panel::Help;
        let screen = render_to_string(&app, 120, 30);
        assert!(screen.contains("Move start date back / forward"));
        assert!(screen.contains("mptrack-tui-missing"));
    }
}
