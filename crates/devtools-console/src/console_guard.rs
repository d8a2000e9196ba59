use std::time::{Duration, Instant};

use prettytable::{Cell, Row, Table};

use crate::aggregator::{ConsoleAggregator, ConsoleJson};
use crate::preview::generate_preview;
use crate::presenter::{ConsoleFilter, ConsoleIcon, ConsolePresenter};
use crate::{format_timestamp, Format};

const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Builder for creating a ConsoleGuard with custom configuration.
///
/// # Examples
///
/// ```no_run
/// use devtools_console::{ConsoleAggregator, ConsoleFilter, ConsoleGuardBuilder, EventHub, Format};
///
/// let hub = EventHub::new();
/// let aggregator = ConsoleAggregator::spawn(&hub).unwrap();
/// let _guard = ConsoleGuardBuilder::new(aggregator)
///     .format(Format::JsonPretty)
///     .filter(ConsoleFilter::Errors)
///     .build();
/// // The console will be printed as pretty JSON when _guard is dropped
/// ```
pub struct ConsoleGuardBuilder {
    aggregator: ConsoleAggregator,
    format: Format,
    filter: ConsoleFilter,
}

impl ConsoleGuardBuilder {
    pub fn new(aggregator: ConsoleAggregator) -> Self {
        Self {
            aggregator,
            format: Format::default(),
            filter: ConsoleFilter::default(),
        }
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Only print entries matching `filter`. Applies to table output.
    pub fn filter(mut self, filter: ConsoleFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Build and return the ConsoleGuard.
    /// The console will be printed when the guard is dropped.
    pub fn build(self) -> ConsoleGuard {
        ConsoleGuard {
            aggregator: self.aggregator,
            start_time: Instant::now(),
            format: self.format,
            filter: self.filter,
        }
    }
}

/// Guard printing the aggregated console when dropped.
///
/// Use `ConsoleGuardBuilder` to pick the output format.
///
/// # Examples
///
/// ```no_run
/// use devtools_console::{ConsoleAggregator, ConsoleGuard, EventHub, Value};
///
/// let hub = EventHub::new();
/// let _guard = ConsoleGuard::new(ConsoleAggregator::spawn(&hub).unwrap());
/// hub.warn(vec![Value::from("low disk")]);
/// // The console table will be printed when _guard is dropped
/// ```
pub struct ConsoleGuard {
    aggregator: ConsoleAggregator,
    start_time: Instant,
    format: Format,
    filter: ConsoleFilter,
}

impl ConsoleGuard {
    pub fn new(aggregator: ConsoleAggregator) -> Self {
        ConsoleGuardBuilder::new(aggregator).build()
    }

    fn table(&self) -> Option<Table> {
        let mut presenter = ConsolePresenter::new();
        presenter.set_filter(self.filter);
        let entries = self.aggregator.snapshot();
        let visible = presenter.visible(&entries);
        if visible.is_empty() {
            return None;
        }

        let mut table = Table::new();
        table.add_row(Row::new(vec![
            Cell::new("#"),
            Cell::new("Time"),
            Cell::new("Level"),
            Cell::new("Count"),
            Cell::new("Message"),
        ]));

        for entry in visible {
            let count = match ConsoleIcon::for_entry(entry.level, entry.repeat) {
                ConsoleIcon::Count { count, .. } => count.to_string(),
                _ => String::new(),
            };
            let message = entry
                .args
                .iter()
                .map(|arg| generate_preview(arg, 0, false).to_plain())
                .collect::<Vec<_>>()
                .join(" ");
            table.add_row(Row::new(vec![
                Cell::new(&entry.id.to_string()),
                Cell::new(&format_timestamp(entry.timestamp)),
                Cell::new(entry.level.as_str()),
                Cell::new(&count),
                Cell::new(&message),
            ]));
        }
        Some(table)
    }

    fn json(&self) -> ConsoleJson {
        let mut json = self.aggregator.to_json();
        json.entries.retain(|entry| self.filter.matches(entry.level));
        json
    }
}

impl Drop for ConsoleGuard {
    fn drop(&mut self) {
        if !self.aggregator.flush(FLUSH_TIMEOUT) {
            tracing::warn!("console collector did not flush in time");
        }
        let elapsed = self.start_time.elapsed();

        match self.format {
            Format::Table => match self.table() {
                Some(table) => {
                    println!("\n=== Console (runtime: {:.2}s) ===", elapsed.as_secs_f64());
                    table.printstd();
                }
                None => println!("\nNo console entries found."),
            },
            Format::Json => match serde_json::to_string(&self.json()) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Failed to serialize console to JSON: {}", e),
            },
            Format::JsonPretty => match serde_json::to_string_pretty(&self.json()) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Failed to serialize console to pretty JSON: {}", e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{ConsoleLevel, EventHub};
    use crate::value::Value;

    fn guard(filter: ConsoleFilter) -> (EventHub, ConsoleGuard) {
        let hub = EventHub::new();
        let aggregator = ConsoleAggregator::spawn(&hub).unwrap();
        let guard = ConsoleGuardBuilder::new(aggregator)
            .format(Format::Json)
            .filter(filter)
            .build();
        (hub, guard)
    }

    #[test]
    fn test_table_lists_entries_with_counts() {
        let (hub, guard) = guard(ConsoleFilter::All);
        hub.log(vec![Value::from("tick")]);
        hub.log(vec![Value::from("tick")]);
        hub.error(vec![Value::from("boom"), Value::from(7)]);
        assert!(guard.aggregator.flush(FLUSH_TIMEOUT));

        let rendered = guard.table().unwrap().to_string();
        assert!(rendered.contains("Level"));
        assert!(rendered.contains("tick"));
        assert!(rendered.contains("| 2 "));
        assert!(rendered.contains("boom 7"));
    }

    #[test]
    fn test_filter_applies_to_output() {
        let (hub, guard) = guard(ConsoleFilter::Warnings);
        hub.log(vec![Value::from("quiet")]);
        assert!(guard.aggregator.flush(FLUSH_TIMEOUT));
        assert!(guard.table().is_none());

        hub.warn(vec![Value::from("loud")]);
        assert!(guard.aggregator.flush(FLUSH_TIMEOUT));
        let json = guard.json();
        assert_eq!(json.entries.len(), 1);
        assert_eq!(json.entries[0].level, ConsoleLevel::Warn);
    }
}
