//! Keyboard input dispatch: global keys first, then panel-specific ones.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::app::{App, Panel};

/// Trading days moved by `[`/`]` and `{`/`}`.
const DATE_STEP: isize = 1;

pub fn handle_key(app: &mut App, key: KeyEvent) {
    // Only handle key press events (Windows sends both Press and Release).
    if key.kind != KeyEventKind::Press {
        return;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.running = false,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.running = false
        }
        KeyCode::Char(c @ '1'..='4') => {
            if let Some(panel) = c.to_digit(10).and_then(|n| Panel::from_index(n as usize - 1)) {
                app.active_panel = panel;
            }
        }
        KeyCode::Tab => {
            app.active_panel = if key.modifiers.contains(KeyModifiers::SHIFT) {
                app.active_panel.prev()
            } else {
                app.active_panel.next()
            };
        }
        KeyCode::BackTab => app.active_panel = app.active_panel.prev(),
        KeyCode::Char('r') => app.reload(),
        KeyCode::Char('[') => app.shift_start(-DATE_STEP),
        KeyCode::Char(']') => app.shift_start(DATE_STEP),
        KeyCode::Char('{') => app.shift_end(-DATE_STEP),
        KeyCode::Char('}') => app.shift_end(DATE_STEP),
        KeyCode::Char('j') | KeyCode::Down if app.active_panel == Panel::Attribution => {
            app.scroll_down()
        }
        KeyCode::Char('k') | KeyCode::Up if app.active_panel == Panel::Attribution => {
            app.scroll_up()
        }
        _ => {}
    }
}
