//! Parrot/neon theme tokens for the mptrack dashboard.
//!
//! # Color Palette
//! - **Accent**: Electric cyan (focus, titles, model portfolio)
//! - **Positive**: Neon green (positive attribution)
//! - **Negative**: Hot pink (negative attribution, errors)
//! - **Warning**: Neon orange (warnings, original portfolio)
//! - **Neutral**: Cool purple (benchmark)
//! - **Muted**: Steel blue (secondary text, rebalance markers)

use ratatui::style::{Color, Modifier, Style};

pub const ACCENT: Color = Color::Rgb(0, 255, 255);
pub const POSITIVE: Color = Color::Rgb(0, 255, 128);
pub const NEGATIVE: Color = Color::Rgb(255, 20, 147);
pub const WARNING: Color = Color::Rgb(255, 140, 0);
pub const NEUTRAL: Color = Color::Rgb(147, 112, 219);
pub const MUTED: Color = Color::Rgb(100, 149, 237);
pub const TEXT_PRIMARY: Color = Color::White;
pub const TEXT_SECONDARY: Color = Color::Rgb(170, 170, 170);

pub fn accent() -> Style {
    Style::default().fg(ACCENT)
}

pub fn accent_bold() -> Style {
    accent().add_modifier(Modifier::BOLD)
}

pub fn muted() -> Style {
    Style::default().fg(MUTED)
}

pub fn warning() -> Style {
    Style::default().fg(WARNING)
}

pub fn negative() -> Style {
    Style::default().fg(NEGATIVE)
}

pub fn text() -> Style {
    Style::default().fg(TEXT_PRIMARY)
}

pub fn secondary() -> Style {
    Style::default().fg(TEXT_SECONDARY)
}

pub fn panel_border(active: bool) -> Style {
    if active {
        accent()
    } else {
        muted()
    }
}

pub fn panel_title(active: bool) -> Style {
    if active {
        accent_bold()
    } else {
        muted()
    }
}

/// Green for gains, pink for losses. Zero and NaN are neutral text.
pub fn value_color(value: f64) -> Color {
    if value > 0.0 {
        POSITIVE
    } else if value < 0.0 {
        NEGATIVE
    } else {
        TEXT_PRIMARY
    }
}

pub fn value_style(value: f64) -> Style {
    Style::default().fg(value_color(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_colors() {
        assert_eq!(value_color(0.25), POSITIVE);
        assert_eq!(value_color(-0.01), NEGATIVE);
        assert_eq!(value_color(0.0), TEXT_PRIMARY);
        assert_eq!(value_color(f64::NAN), TEXT_PRIMARY);
    }

    #[test]
    fn active_panels_are_highlighted() {
        assert_eq!(panel_border(true).fg, Some(ACCENT));
        assert_eq!(panel_border(false).fg, Some(MUTED));
    }
}
