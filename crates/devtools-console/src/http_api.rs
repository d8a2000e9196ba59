use regex::Regex;
use serde::Serialize;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::{Arc, LazyLock};
use std::thread::JoinHandle;
use tiny_http::{Header, Method, Request, Response, Server};

use crate::aggregator::ConsoleAggregator;
use crate::highlight::HighlightService;

static RE_CONSOLE_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/console/(\d+)$").unwrap());

/// Running console HTTP server. Dropping the handle stops it.
pub struct ServerHandle {
    server: Arc<Server>,
    addr: Option<SocketAddr>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Bound address, useful when listening on port 0.
    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.server.unblock();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl ConsoleAggregator {
    /// Serves the aggregated console, and highlight cache counters when a
    /// service is given, on `addr`.
    pub fn serve(
        &self,
        addr: &str,
        highlight: Option<HighlightService>,
    ) -> std::io::Result<ServerHandle> {
        start_console_server(addr, self.clone(), highlight)
    }
}

pub(crate) fn start_console_server(
    addr: &str,
    aggregator: ConsoleAggregator,
    highlight: Option<HighlightService>,
) -> std::io::Result<ServerHandle> {
    let server = Server::http(addr).map_err(|e| {
        std::io::Error::other(format!(
            "Failed to bind console server to {}: {}. Customize the port using the DEVTOOLS_CONSOLE_PORT environment variable.",
            addr, e
        ))
    })?;
    let server = Arc::new(server);
    let bound = server.server_addr().to_ip();

    tracing::info!(addr = ?bound, "console server listening");

    let worker = Arc::clone(&server);
    let thread = std::thread::Builder::new()
        .name("console-http".into())
        .spawn(move || {
            for request in worker.incoming_requests() {
                handle_request(request, &aggregator, highlight.as_ref());
            }
            tracing::debug!("console server stopped");
        })?;

    Ok(ServerHandle {
        server,
        addr: bound,
        thread: Some(thread),
    })
}

fn handle_request(
    request: Request,
    aggregator: &ConsoleAggregator,
    highlight: Option<&HighlightService>,
) {
    let path = request.url().split('?').next().unwrap_or("/").to_string();
    let method = request.method().clone();
    tracing::trace!(%method, path = %path, "console request");

    match (&method, path.as_str()) {
        (Method::Get, "/console") => {
            let console = aggregator.to_json();
            respond_json(request, &console);
        }
        (Method::Post, "/console/clear") => {
            aggregator.clear();
            respond_json(request, &serde_json::json!({ "cleared": true }));
        }
        (Method::Get, "/highlight/stats") => match highlight {
            Some(service) => respond_json(request, &service.stats()),
            None => respond_error(request, 404, "Highlighting not enabled"),
        },
        (Method::Get, _) => {
            // Handle /console/<id>
            if let Some(caps) = RE_CONSOLE_ENTRY.captures(&path) {
                let entry = caps[1].parse().ok().and_then(|id| aggregator.entry(id));
                return match entry {
                    Some(entry) => respond_json(request, entry.as_ref()),
                    None => respond_error(request, 404, "Entry not found"),
                };
            }

            respond_error(request, 404, "Not found");
        }
        _ => respond_error(request, 405, "Method not allowed"),
    }
}

fn respond_json<T: Serialize>(request: Request, value: &T) {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = Response::from_data(body);
            if let Ok(header) =
                Header::from_bytes(b"Content-Type".as_slice(), b"application/json".as_slice())
            {
                response.add_header(header);
            }
            let _ = request.respond(response);
        }
        Err(e) => respond_internal_error(request, e),
    }
}

fn respond_error(request: Request, code: u16, msg: &str) {
    let _ = request.respond(Response::from_string(msg).with_status_code(code));
}

fn respond_internal_error(request: Request, e: impl Display) {
    tracing::error!("Internal server error: {}", e);
    let _ = request.respond(
        Response::from_string(format!("Internal server error: {}", e)).with_status_code(500),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{ConsoleJson, LogEntry};
    use crate::highlight::TokenHighlighter;
    use crate::hub::{ConsoleLevel, EventHub};
    use crate::memo::{CacheStats, MemoCacheBuilder};
    use crate::value::Value;
    use std::time::Duration;

    fn url(handle: &ServerHandle, path: &str) -> String {
        format!("http://{}{}", handle.addr().unwrap(), path)
    }

    #[test]
    fn test_console_routes() {
        let hub = EventHub::new();
        let aggregator = ConsoleAggregator::spawn(&hub).unwrap();
        let handle = aggregator.serve("127.0.0.1:0", None).unwrap();

        hub.warn(vec![Value::from("disk")]);
        hub.warn(vec![Value::from("disk")]);
        hub.log(vec![Value::object([("ok", Value::Bool(true))])]);
        assert!(aggregator.flush(Duration::from_secs(2)));

        let console: ConsoleJson = ureq::get(&url(&handle, "/console"))
            .call()
            .unwrap()
            .body_mut()
            .read_json()
            .unwrap();
        assert_eq!(console.entries.len(), 2);
        assert_eq!(console.entries[0].level, ConsoleLevel::Warn);
        assert_eq!(console.entries[0].repeat, 1);

        let id = console.entries[1].id;
        let entry: LogEntry = ureq::get(&url(&handle, &format!("/console/{id}")))
            .call()
            .unwrap()
            .body_mut()
            .read_json()
            .unwrap();
        assert_eq!(entry.args, vec![Value::object([("ok", Value::Bool(true))])]);

        let missing = ureq::get(&url(&handle, "/console/999")).call();
        assert!(matches!(missing, Err(ureq::Error::StatusCode(404))));
        let stats = ureq::get(&url(&handle, "/highlight/stats")).call();
        assert!(matches!(stats, Err(ureq::Error::StatusCode(404))));

        ureq::post(&url(&handle, "/console/clear"))
            .send_empty()
            .unwrap();
        assert!(aggregator.flush(Duration::from_secs(2)));
        assert!(aggregator.snapshot().is_empty());

        handle.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_highlight_stats_route() {
        let hub = EventHub::new();
        let aggregator = ConsoleAggregator::spawn(&hub).unwrap();
        let service = HighlightService::spawn(
            TokenHighlighter,
            MemoCacheBuilder::new().runtime(tokio::runtime::Handle::current()),
        )
        .unwrap();
        service.highlight_settled("let a = 1;", "js").await.unwrap();
        service.highlight_settled("let a = 1;", "js").await.unwrap();

        let handle = aggregator.serve("127.0.0.1:0", Some(service)).unwrap();
        let stats_url = url(&handle, "/highlight/stats");
        let stats: CacheStats = tokio::task::spawn_blocking(move || {
            ureq::get(&stats_url)
                .call()
                .unwrap()
                .body_mut()
                .read_json()
                .unwrap()
        })
        .await
        .unwrap();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.settled, 1);
        assert_eq!(stats.pending, 0);
    }
}
