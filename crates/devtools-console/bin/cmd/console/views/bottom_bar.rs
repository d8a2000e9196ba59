use ratatui::{style::Stylize, text::Line};

use crate::cmd::console::state::Focus;

/// Context-aware keybindings, with the refresh status appended when known
pub(crate) fn controls_line(focus: Focus, refresh_status: String) -> Line<'static> {
    let mut spans = match focus {
        Focus::Console => vec![
            " Quit ".into(),
            "<q> ".blue().bold(),
            " | ".into(),
            "<↑↓/jk> ".blue().bold(),
            " | Expand ".into(),
            "<enter/space> ".blue().bold(),
            " | Filter ".into(),
            "<a/w/e> ".blue().bold(),
            " | Inspect ".into(),
            "<i> ".blue().bold(),
            " | Clear ".into(),
            "<c> ".blue().bold(),
            " | Pause ".into(),
            "<p> ".blue().bold(),
        ],
        Focus::Inspect => vec![
            " Quit ".into(),
            "<q> ".blue().bold(),
            " | ".into(),
            "<↑↓/jk> ".blue().bold(),
            " | Close ".into(),
            "<i/esc> ".blue().bold(),
            " | Pause ".into(),
            "<p> ".blue().bold(),
        ],
    };

    if !refresh_status.is_empty() {
        spans.push(" | ".into());
        spans.push(refresh_status.yellow());
    }

    Line::from(spans)
}
