use devtools_console::presenter::CLEARED_HINT;
use devtools_console::{ConsoleFilter, PresentedMessage};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, HighlightSpacing, List, ListItem, ListState, Paragraph, Tabs},
    Frame,
};

use crate::cmd::console::state::console_lines;
use crate::cmd::console::widgets::formatters::{icon_span, level_color, preview_spans};

/// Renders the filter tabs and the console rows
pub(crate) fn render_console_panel(
    messages: &[PresentedMessage],
    filter: ConsoleFilter,
    area: Rect,
    frame: &mut Frame,
    list_state: &mut ListState,
    is_focused: bool,
) {
    let [tabs_area, list_area] =
        Layout::vertical([Constraint::Length(1), Constraint::Min(1)]).areas(area);

    let selected_tab = ConsoleFilter::TABS
        .iter()
        .position(|f| *f == filter)
        .unwrap_or(0);
    let tabs = Tabs::new(ConsoleFilter::TABS.iter().map(|f| f.label()))
        .select(selected_tab)
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, tabs_area);

    let block = Block::bordered()
        .border_set(if is_focused {
            border::THICK
        } else {
            border::PLAIN
        })
        .style(if is_focused {
            Style::default()
        } else {
            Style::default().fg(Color::DarkGray)
        });

    if messages.is_empty() {
        let hint = Paragraph::new(Line::from(CLEARED_HINT).centered())
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(hint, list_area);
        return;
    }

    let items: Vec<ListItem> = console_lines(messages)
        .into_iter()
        .map(|line| {
            let mut spans = Vec::new();
            spans.push(if line.first {
                icon_span(line.message.icon)
            } else {
                Span::raw("    ")
            });
            spans.push(Span::raw("  ".repeat(line.row.depth)));
            spans.push(Span::styled(
                match (line.row.collapsible, line.row.collapsed) {
                    (true, true) => "▶ ",
                    (true, false) => "▼ ",
                    _ => "  ",
                },
                Style::default().fg(Color::DarkGray),
            ));
            if let Some(label) = &line.row.label {
                spans.push(Span::styled(
                    format!("{label}: "),
                    Style::default().fg(Color::Cyan),
                ));
            }
            spans.extend(preview_spans(&line.row.preview));

            ListItem::new(Line::from(spans))
                .style(Style::default().fg(level_color(line.message.level)))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .add_modifier(Modifier::REVERSED)
                .bg(Color::DarkGray),
        )
        .highlight_symbol(">")
        .highlight_spacing(HighlightSpacing::Always);

    frame.render_stateful_widget(list, list_area, list_state);
}
