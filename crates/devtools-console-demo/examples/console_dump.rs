use devtools_console::{
    render_text, ConsoleAggregator, ConsoleGuardBuilder, ConsolePresenter, EventHub, Format, RowKey,
};
use devtools_console_demo::replay_session;
use std::time::Duration;

fn main() -> std::io::Result<()> {
    let format = match std::env::args().nth(1).as_deref() {
        Some("--json") => Format::Json,
        Some("--json-pretty") => Format::JsonPretty,
        _ => Format::Table,
    };

    let hub = EventHub::new();
    let aggregator = ConsoleAggregator::spawn(&hub)?;
    let _guard = ConsoleGuardBuilder::new(aggregator.clone())
        .format(format)
        .build();

    replay_session(&hub);
    aggregator.flush(Duration::from_secs(1));

    if matches!(format, Format::Table) {
        // open every top-level value once, as a user clicking through would
        let entries = aggregator.snapshot();
        let mut presenter = ConsolePresenter::new();
        for entry in &entries {
            presenter.toggle(entry.id, &RowKey::root());
        }
        println!("{}", render_text(&presenter.present(&entries)));
    }

    Ok(())
}
