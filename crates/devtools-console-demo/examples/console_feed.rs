use devtools_console::{Config, ConsoleAggregator, EventHub, HighlightService, TokenHighlighter, Value};
use devtools_console_demo::replay_session;
use std::time::Duration;
use tokio::runtime::Handle;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let duration: u64 = std::env::var("DEMO_DURATION_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);

    let hub = EventHub::new();
    let aggregator = ConsoleAggregator::spawn(&hub)?;
    let service = HighlightService::spawn(
        TokenHighlighter,
        config.cache_builder().runtime(Handle::current()),
    )?;
    let _server = aggregator.serve(&config.addr(), Some(service.clone()))?;

    println!("Console server listening on http://{}", config.addr());
    println!("Open the TUI console to watch live updates!");
    println!(
        "   Run: cargo run -p devtools-console --features tui -- console --port {}\n",
        config.port
    );

    replay_session(&hub);

    let mut interval = tokio::time::interval(Duration::from_millis(500));
    for tick in 0..duration * 2 {
        interval.tick().await;

        hub.log(vec![Value::from("heartbeat")]);
        if tick % 6 == 0 {
            hub.info(vec![Value::object([
                ("tick", Value::from(tick as i64)),
                ("uptime_ms", Value::from(aggregator.uptime().as_millis() as f64)),
            ])]);
        }
        if tick % 10 == 5 {
            hub.warn(vec![Value::from("slow frame"), Value::from(tick as i64)]);
        }
        if tick % 20 == 19 {
            hub.error(vec![Value::from("worker crashed, restarting")]);
        }
        if tick % 40 == 39 {
            hub.clear();
        }
        let _ = service.highlight("console.log(tick)", "js");
    }

    Ok(())
}
