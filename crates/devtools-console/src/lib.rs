//! Background syntax highlighting for rendered code blocks and a live,
//! deduplicating console for sandboxed code runners.
//!
//! # Examples
//!
//! ```no_run
//! use devtools_console::{ConsoleAggregator, EventHub, Value};
//!
//! let hub = EventHub::new();
//! let aggregator = ConsoleAggregator::spawn(&hub).unwrap();
//! let _server = aggregator.serve("127.0.0.1:6771", None).unwrap();
//!
//! hub.log(vec![Value::from("hello")]);
//! hub.log(vec![Value::from("hello")]);
//! // GET http://127.0.0.1:6771/console now lists one entry repeated once
//! ```

use std::sync::LazyLock;

pub mod aggregator;
pub mod code_block;
pub mod config;
pub mod console_guard;
pub mod flatten;
pub mod highlight;
pub mod hub;
pub mod memo;
pub mod presenter;
pub mod preview;
pub mod value;
pub mod worker;

mod http_api;

pub use aggregator::{ConsoleAggregator, ConsoleJson, ConsoleLog, LogEntry};
pub use code_block::{BlockState, CodeBlock, CodeBlockRenderer, Element, Node, RenderedBlock};
pub use config::{Config, ConfigError};
pub use console_guard::{ConsoleGuard, ConsoleGuardBuilder};
pub use flatten::{flatten, ExpandState, PathSegment, Row, RowKey};
pub use highlight::{
    HighlightError, HighlightKey, HighlightService, HighlightWorker, Highlighter, TokenHighlighter,
};
pub use http_api::ServerHandle;
pub use hub::{ConsoleEvent, ConsoleLevel, EventHub, HubEvent};
pub use memo::{CacheStats, Computation, Lookup, MemoCache, MemoCacheBuilder, PendingHandle};
pub use presenter::{
    render_text, ConsoleFilter, ConsoleIcon, ConsolePresenter, PresentedMessage, PresentedRow,
};
pub use preview::{generate_preview, Preview, Token, TokenKind};
pub use value::Value;
pub use worker::{ThreadTransport, Transport, WorkerError, WorkerHandler, WorkerProxy};

/// Runtime driving memoized computations when no other handle is configured.
pub static RT: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .thread_name("devtools-console-rt")
        .enable_time()
        .build()
        .unwrap()
});

/// Format of the output produced by ConsoleGuard on drop.
#[derive(Clone, Copy, Debug, Default)]
pub enum Format {
    #[default]
    Table,
    Json,
    JsonPretty,
}

/// Formats nanoseconds since aggregator start as MM:SS.mmm
pub fn format_timestamp(timestamp_ns: u64) -> String {
    let total_secs = timestamp_ns / 1_000_000_000;
    let millis = (timestamp_ns % 1_000_000_000) / 1_000_000;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{:02}:{:02}.{:03}", minutes, seconds, millis)
}
