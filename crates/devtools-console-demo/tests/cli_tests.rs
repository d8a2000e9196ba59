#[cfg(test)]
pub mod tests {
    use std::process::{Command, Stdio};
    use std::time::{Duration, Instant};

    fn run_example(example: &str, args: &[&str]) -> String {
        let mut cmd_args = vec!["run", "-p", "devtools-console-demo", "--example", example];
        if !args.is_empty() {
            cmd_args.push("--");
            cmd_args.extend_from_slice(args);
        }
        let output = Command::new("cargo")
            .args(&cmd_args)
            .output()
            .expect("Failed to execute command");

        assert!(
            output.status.success(),
            "Command failed with status: {}\n{}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );

        String::from_utf8_lossy(&output.stdout).to_string()
    }

    fn assert_contains(stdout: &str, all_expected: &[&str]) {
        for expected in all_expected {
            assert!(
                stdout.contains(expected),
                "Expected:\n{expected}\n\nGot:\n{stdout}",
            );
        }
    }

    #[test]
    fn test_console_dump_output() {
        let stdout = run_example("console_dump", &[]);
        assert_contains(
            &stdout,
            &[
                "=== Console",
                "Level",
                "booting sandbox",
                "deprecated api: use fetchAll()",
                "[ 3] 1",
                "[ 2] deprecated api: use fetchAll()",
                "user: {name: 'ada', admin: true}",
                "length: 2",
                "NaN",
            ],
        );
    }

    #[test]
    fn test_console_dump_json_output() {
        let stdout = run_example("console_dump", &["--json"]);
        assert_contains(
            &stdout,
            &[
                "\"level\":\"warn\"",
                "\"repeat\":2",
                "\"missing\":{\"$undefined\":true}",
                "\"args\":[\"total\",42.0,null]",
            ],
        );
    }

    #[test]
    fn test_highlight_blocks_output() {
        let stdout = run_example("highlight_blocks", &[]);
        assert_contains(
            &stdout,
            &[
                "--- runnable js",
                "first paint: Fallback",
                "settled: Highlighted",
                "<span class=\"token keyword\">const</span>",
                "<a class=\"repl-link\" href=\"/repl?code=const%20xs",
                "--- unknown language",
                "<code class=\"language-zig\">const x: u8 = 1;</code>",
                "<code class=\"language-plain\">a &lt; b &amp;&amp; c &gt; d</code>",
                "first paint: Plain",
                "<pre>just text</pre>",
                "\"misses\": 5",
            ],
        );

        let js_without_repl = stdout
            .split("--- ")
            .find(|section| section.starts_with("js without repl"))
            .expect("missing section");
        assert!(!js_without_repl.contains("repl-link"));
    }

    #[test]
    fn test_console_feed_serves_http() {
        let port = "6791";
        let mut child = Command::new("cargo")
            .args(["run", "-p", "devtools-console-demo", "--example", "console_feed"])
            .env("DEVTOOLS_CONSOLE_PORT", port)
            .env("DEMO_DURATION_SECS", "120")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to execute command");

        let url = format!("http://127.0.0.1:{port}/console");
        let deadline = Instant::now() + Duration::from_secs(300);
        let mut console = None;
        while Instant::now() < deadline {
            if let Ok(mut response) = ureq::get(&url).call() {
                let json: serde_json::Value = response.body_mut().read_json().unwrap();
                if json["entries"].as_array().is_some_and(|e| !e.is_empty()) {
                    console = Some(json);
                    break;
                }
            }
            std::thread::sleep(Duration::from_millis(250));
        }

        let stats = ureq::get(&format!("http://127.0.0.1:{port}/highlight/stats")).call();
        let _ = child.kill();
        let _ = child.wait();

        let console = console.expect("console server never answered");
        assert_eq!(console["entries"][0]["args"][0], "booting sandbox");
        assert!(stats.is_ok());
    }
}
