//! Terminal styling for CLI output.
//!
//! Color/style detection based on environment variables, plus the state
//! palette used by the history and state views.

use anstyle::{AnsiColor, Color, Style};
use std::io::IsTerminal;

use crate::state::BuildState;

/// Get error style (red)
pub fn error_style() -> Style {
    Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)))
}

/// Get bold style
pub fn bold_style() -> Style {
    Style::new().bold()
}

/// Get dim style
pub fn dim_style() -> Style {
    Style::new().dimmed()
}

/// Style for a build state: real outcomes are saturated, assumed and
/// possible states dimmed.
pub fn state_style(state: BuildState) -> Style {
    let green = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green)));
    let red = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));
    let yellow = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));
    match state {
        BuildState::Good => green,
        BuildState::Bad => red,
        BuildState::Breaking => red.bold(),
        BuildState::Running => yellow,
        BuildState::AssumedGood | BuildState::PossiblyFixing => green.dimmed(),
        BuildState::AssumedBad | BuildState::PossiblyBreaking => red.dimmed(),
        BuildState::Unknown => dim_style(),
    }
}

fn should_use_color_with_env(no_color: bool, force_color: bool, is_terminal: bool) -> bool {
    if force_color {
        return true;
    }
    if no_color {
        return false;
    }
    is_terminal
}

/// Determines if colored output should be used
pub fn should_use_color() -> bool {
    should_use_color_with_env(
        std::env::var("NO_COLOR").is_ok(),
        std::env::var("CLICOLOR_FORCE").is_ok() || std::env::var("FORCE_COLOR").is_ok(),
        std::io::stdout().is_terminal(),
    )
}

/// Apply a style when color is enabled, otherwise pass the text through.
pub fn paint(style: Style, text: &str) -> String {
    if should_use_color() {
        format!("{}{}{}", style.render(), text, style.render_reset())
    } else {
        text.to_string()
    }
}

/// Format an error message with red color and ❌ emoji
pub fn format_error(msg: &str) -> String {
    if should_use_color() {
        let style = error_style();
        format!("{}❌ {}{}", style.render(), msg, style.render_reset())
    } else {
        format!("❌ {}", msg)
    }
}
