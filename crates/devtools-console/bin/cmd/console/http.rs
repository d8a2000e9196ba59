use devtools_console::{CacheStats, ConsoleJson};
use eyre::Result;

/// Fetches the aggregated console from the HTTP server
pub(crate) fn fetch_console(agent: &ureq::Agent, port: u16) -> Result<ConsoleJson> {
    let url = format!("http://127.0.0.1:{}/console", port);
    let console: ConsoleJson = agent.get(&url).call()?.body_mut().read_json()?;
    Ok(console)
}

/// Asks the server to clear its console
pub(crate) fn clear_console(agent: &ureq::Agent, port: u16) -> Result<()> {
    let url = format!("http://127.0.0.1:{}/console/clear", port);
    agent.post(&url).send_empty()?;
    Ok(())
}

/// Fetches highlight cache counters, if the process serves them
pub(crate) fn fetch_highlight_stats(agent: &ureq::Agent, port: u16) -> Option<CacheStats> {
    let url = format!("http://127.0.0.1:{}/highlight/stats", port);
    agent.get(&url).call().ok()?.body_mut().read_json().ok()
}
