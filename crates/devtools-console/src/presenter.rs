use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::aggregator::LogEntry;
use crate::flatten::{flatten, ExpandState, RowKey};
use crate::hub::ConsoleLevel;
use crate::preview::{generate_preview, Preview};

pub const CLEARED_HINT: &str = "Console was cleared";

/// Which entries the console shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConsoleFilter {
    #[default]
    All,
    Warnings,
    Errors,
}

impl ConsoleFilter {
    /// Filters in tab order.
    pub const TABS: [ConsoleFilter; 3] = [
        ConsoleFilter::All,
        ConsoleFilter::Errors,
        ConsoleFilter::Warnings,
    ];

    pub fn matches(&self, level: ConsoleLevel) -> bool {
        match self {
            ConsoleFilter::All => true,
            ConsoleFilter::Warnings => level == ConsoleLevel::Warn,
            ConsoleFilter::Errors => level == ConsoleLevel::Error,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConsoleFilter::All => "All",
            ConsoleFilter::Warnings => "Warnings",
            ConsoleFilter::Errors => "Errors",
        }
    }
}

/// Icon shown next to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleIcon {
    /// Total number of occurrences of a repeated message.
    Count { level: ConsoleLevel, count: u32 },
    Error,
    Warn,
    Info,
    Empty,
}

impl ConsoleIcon {
    pub fn for_entry(level: ConsoleLevel, repeat: u32) -> Self {
        if repeat > 0 {
            return ConsoleIcon::Count {
                level,
                count: repeat + 1,
            };
        }
        match level {
            ConsoleLevel::Error => ConsoleIcon::Error,
            ConsoleLevel::Warn => ConsoleIcon::Warn,
            ConsoleLevel::Info => ConsoleIcon::Info,
            ConsoleLevel::Log => ConsoleIcon::Empty,
        }
    }

    pub fn symbol(&self) -> String {
        match self {
            ConsoleIcon::Count { count, .. } => count.to_string(),
            ConsoleIcon::Error => "✖".to_string(),
            ConsoleIcon::Warn => "⚠".to_string(),
            ConsoleIcon::Info => "ℹ".to_string(),
            ConsoleIcon::Empty => " ".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresentedRow {
    pub key: RowKey,
    pub depth: usize,
    pub label: Option<String>,
    pub preview: Preview,
    pub collapsible: bool,
    pub collapsed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresentedMessage {
    pub entry_id: u64,
    pub level: ConsoleLevel,
    pub icon: ConsoleIcon,
    pub rows: Vec<PresentedRow>,
}

/// Turns log entries into displayable rows.
///
/// Holds the active filter and one [`ExpandState`] per message.
#[derive(Debug, Default)]
pub struct ConsolePresenter {
    filter: ConsoleFilter,
    expand: HashMap<u64, ExpandState>,
}

impl ConsolePresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(&self) -> ConsoleFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: ConsoleFilter) {
        self.filter = filter;
    }

    pub fn visible<'a>(&self, entries: &'a [Arc<LogEntry>]) -> Vec<&'a Arc<LogEntry>> {
        entries
            .iter()
            .filter(|entry| self.filter.matches(entry.level))
            .collect()
    }

    pub fn present(&self, entries: &[Arc<LogEntry>]) -> Vec<PresentedMessage> {
        let fresh = ExpandState::new();
        self.visible(entries)
            .into_iter()
            .map(|entry| {
                let state = self.expand.get(&entry.id).unwrap_or(&fresh);
                present_entry(entry, state)
            })
            .collect()
    }

    /// Flips `key` in the message's expand state. Returns whether it is now
    /// collapsed.
    pub fn toggle(&mut self, entry_id: u64, key: &RowKey) -> bool {
        self.expand.entry(entry_id).or_default().toggle(key)
    }

    /// Drops expand states of entries that left the log.
    pub fn sync(&mut self, entries: &[Arc<LogEntry>]) {
        self.expand
            .retain(|id, _| entries.iter().any(|entry| entry.id == *id));
    }

    pub fn hint(messages: &[PresentedMessage]) -> Option<&'static str> {
        messages.is_empty().then_some(CLEARED_HINT)
    }
}

fn present_entry(entry: &LogEntry, state: &ExpandState) -> PresentedMessage {
    let rows = flatten(entry.value(), state)
        .into_iter()
        .map(|row| {
            let collapsible = row.is_collapsible() && entry.repeat == 0;
            PresentedRow {
                collapsed: collapsible && state.is_collapsed(&row.key),
                preview: generate_preview(&row.value, row.level, false),
                depth: row.level,
                label: row.label.map(|label| label.into_owned()),
                key: row.key,
                collapsible,
            }
        })
        .collect();

    PresentedMessage {
        entry_id: entry.id,
        level: entry.level,
        icon: ConsoleIcon::for_entry(entry.level, entry.repeat),
        rows,
    }
}

/// Plain-text rendering, one line per row.
pub fn render_text(messages: &[PresentedMessage]) -> String {
    let mut out = String::new();
    if let Some(hint) = ConsolePresenter::hint(messages) {
        let _ = writeln!(out, "{hint}");
        return out;
    }
    for message in messages {
        for (i, row) in message.rows.iter().enumerate() {
            let icon = if i == 0 {
                message.icon.symbol()
            } else {
                " ".to_string()
            };
            let marker = match (row.collapsible, row.collapsed) {
                (true, true) => "▶ ",
                (true, false) => "▼ ",
                _ => "",
            };
            let label = row
                .label
                .as_deref()
                .map(|label| format!("{label}: "))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "[{:>2}] {}{}{}{}",
                icon,
                "  ".repeat(row.depth),
                marker,
                label,
                row.preview
            );
        }
    }
    out
}
