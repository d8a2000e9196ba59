use devtools_console::{format_timestamp, LogEntry};
use ratatui::{
    layout::Rect,
    symbols::border,
    text::Line,
    widgets::{Block, Clear, Paragraph, Wrap},
    Frame,
};

/// Renders a centered popup with the raw arguments of an entry
pub(crate) fn render_inspect_popup(entry: &LogEntry, area: Rect, frame: &mut Frame) {
    // Center the popup at 80% of screen size
    let popup_width = (area.width as f32 * 0.8) as u16;
    let popup_height = (area.height as f32 * 0.8) as u16;
    let x = (area.width.saturating_sub(popup_width)) / 2;
    let y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect {
        x: area.x + x,
        y: area.y + y,
        width: popup_width,
        height: popup_height,
    };

    let body = serde_json::to_string_pretty(&entry.args)
        .unwrap_or_else(|e| format!("(cannot display arguments: {e})"));

    frame.render_widget(Clear, popup_area);

    let block = Block::bordered()
        .title(format!(
            " {} #{} at {} (x{}) ",
            entry.level,
            entry.id,
            format_timestamp(entry.timestamp),
            entry.occurrences()
        ))
        .border_set(border::DOUBLE);

    let text: Vec<Line> = body.lines().map(|line| Line::from(line.to_string())).collect();
    let paragraph = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false });

    frame.render_widget(paragraph, popup_area);
}
