use devtools_console::{ConsoleIcon, ConsoleLevel, Preview, TokenKind};
use ratatui::{
    style::{Color, Modifier, Style},
    text::Span,
};

pub(crate) fn level_color(level: ConsoleLevel) -> Color {
    match level {
        ConsoleLevel::Error => Color::Red,
        ConsoleLevel::Warn => Color::Yellow,
        ConsoleLevel::Info => Color::Blue,
        ConsoleLevel::Log => Color::Reset,
    }
}

pub(crate) fn icon_span(icon: ConsoleIcon) -> Span<'static> {
    let text = format!("{:>3} ", icon.symbol());
    let style = match icon {
        ConsoleIcon::Count { level, .. } => Style::default()
            .fg(Color::Black)
            .bg(match level {
                ConsoleLevel::Log => Color::Gray,
                other => level_color(other),
            }),
        ConsoleIcon::Error => Style::default().fg(Color::Red),
        ConsoleIcon::Warn => Style::default().fg(Color::Yellow),
        ConsoleIcon::Info => Style::default().fg(Color::Blue),
        ConsoleIcon::Empty => Style::default(),
    };
    Span::styled(text, style)
}

fn token_style(kind: TokenKind) -> Style {
    match kind {
        TokenKind::Plain => Style::default(),
        TokenKind::Primitive => Style::default().fg(Color::Magenta),
        TokenKind::String => Style::default().fg(Color::Green),
        TokenKind::Bright => Style::default().add_modifier(Modifier::BOLD),
        TokenKind::Dim => Style::default().fg(Color::DarkGray),
    }
}

pub(crate) fn preview_spans(preview: &Preview) -> Vec<Span<'static>> {
    preview
        .tokens
        .iter()
        .map(|token| {
            let mut style = token_style(token.kind);
            if preview.italic {
                style = style.add_modifier(Modifier::ITALIC);
            }
            Span::styled(token.text.clone(), style)
        })
        .collect()
}

/// Formats a time difference in nanoseconds as "now", "1s ago", "1m ago", "1h ago", etc.
pub(crate) fn format_time_ago(nanos_ago: u64) -> String {
    const NANOS_PER_SEC: u64 = 1_000_000_000;
    const NANOS_PER_MIN: u64 = 60 * NANOS_PER_SEC;
    const NANOS_PER_HOUR: u64 = 60 * NANOS_PER_MIN;

    if nanos_ago < NANOS_PER_SEC {
        "now".to_string()
    } else if nanos_ago < NANOS_PER_MIN {
        format!("{}s ago", nanos_ago / NANOS_PER_SEC)
    } else if nanos_ago < NANOS_PER_HOUR {
        format!("{}m ago", nanos_ago / NANOS_PER_MIN)
    } else {
        format!("{}h ago", nanos_ago / NANOS_PER_HOUR)
    }
}
