//! Scripted sandbox sessions and sample documents shared by the demos.

use devtools_console::{Element, EventHub, Value};

/// Replays what a short sandboxed program would print to its console.
pub fn replay_session(hub: &EventHub) {
    hub.log(vec![Value::from("booting sandbox")]);
    for _ in 0..3 {
        hub.log(vec![Value::from(1)]);
    }
    hub.warn(vec![Value::from("deprecated api: use fetchAll()")]);
    hub.warn(vec![Value::from("deprecated api: use fetchAll()")]);
    hub.log(vec![Value::from(1)]);
    hub.info(vec![Value::from(vec!["alpha", "beta"])]);
    hub.log(vec![Value::object([
        ("user", Value::object([("name", Value::from("ada")), ("admin", Value::Bool(true))])),
        ("tags", Value::from(vec!["x", "y"])),
        ("missing", Value::Undefined),
    ])]);
    hub.log(vec![Value::from("total"), Value::from(42), Value::Null]);
    hub.error(vec![Value::object([
        ("message", Value::from("request failed")),
        ("status", Value::from(503)),
    ])]);
    hub.log(vec![Value::Number(f64::NAN)]);
    hub.log(vec![Value::Number(f64::NAN)]);
}

fn pre_code(class: Option<&str>, code: &str) -> Element {
    let mut inner = Element::new("code");
    if let Some(class) = class {
        inner = inner.attr("class", class);
    }
    Element::new("pre").child(inner.child(code))
}

/// Blocks covering every rendering path: runnable, opted out, unknown
/// language, untagged and a bare `<pre>`.
pub fn sample_blocks() -> Vec<(&'static str, Element)> {
    vec![
        (
            "runnable js",
            pre_code(
                Some("language-js"),
                "const xs = [1, 2, 3];\n// double them\nconsole.log(xs.map((x) => x * 2));",
            ),
        ),
        (
            "js without repl",
            pre_code(Some("language-js"), "let a = 1;\nlet b = 2;\nconsole.log(a + b);")
                .attr("repl", "false"),
        ),
        (
            "rust",
            pre_code(Some("lang-rust"), "fn main() {\n    println!(\"<hi>\");\n}"),
        ),
        ("unknown language", pre_code(Some("language-zig"), "const x: u8 = 1;")),
        ("untagged", pre_code(None, "a < b && c > d")),
        ("plain pre", Element::new("pre").child("just text")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use devtools_console::{ConsoleAggregator, ConsoleLevel};
    use std::time::Duration;

    #[test]
    fn test_replay_session_deduplicates() {
        let hub = EventHub::new();
        let aggregator = ConsoleAggregator::spawn(&hub).unwrap();
        replay_session(&hub);
        assert!(aggregator.flush(Duration::from_secs(2)));

        let entries = aggregator.snapshot();
        let repeats: Vec<(ConsoleLevel, u32)> =
            entries.iter().map(|e| (e.level, e.repeat)).collect();
        assert_eq!(
            repeats,
            vec![
                (ConsoleLevel::Log, 0),
                (ConsoleLevel::Log, 2),
                (ConsoleLevel::Warn, 1),
                (ConsoleLevel::Log, 0),
                (ConsoleLevel::Info, 0),
                (ConsoleLevel::Log, 0),
                (ConsoleLevel::Log, 0),
                (ConsoleLevel::Error, 0),
                (ConsoleLevel::Log, 0),
                (ConsoleLevel::Log, 0),
            ]
        );
    }
}
