use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::memo::{CacheStats, Computation, Lookup, MemoCache, MemoCacheBuilder};
use crate::worker::{ThreadTransport, WorkerError, WorkerHandler, WorkerProxy, WorkerReply};

pub const HIGHLIGHT_METHOD: &str = "highlight";

/// The highlighting engine. Only its request/response contract is relied on.
pub trait Highlighter: Send + 'static {
    fn highlight(&self, code: &str, lang: &str) -> Result<String, String>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HighlightError {
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error("failed to start highlight worker: {0}")]
    Spawn(String),
}

/// Cache key for one highlight request.
///
/// The language and the source are kept as separate fields, so two different
/// pairs can never produce the same key no matter what characters they hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HighlightKey {
    pub lang: String,
    pub code: String,
}

impl HighlightKey {
    pub fn new(lang: &str, code: &str) -> Self {
        Self {
            lang: lang.to_string(),
            code: code.to_string(),
        }
    }
}

/// Serves highlight requests for a [`Highlighter`] inside a worker.
pub struct HighlightWorker<H>(pub H);

impl<H: Highlighter> WorkerHandler for HighlightWorker<H> {
    fn handle(&mut self, method: &str, args: serde_json::Value) -> WorkerReply {
        if method != HIGHLIGHT_METHOD {
            return Err(format!("unknown method `{method}`"));
        }
        let (code, lang): (String, String) =
            serde_json::from_value(args).map_err(|e| format!("invalid arguments: {e}"))?;
        let markup = self.0.highlight(&code, &lang)?;
        Ok(serde_json::Value::String(markup))
    }
}

/// Fronts a background highlighting worker with a [`MemoCache`].
#[derive(Clone)]
pub struct HighlightService {
    cache: MemoCache<HighlightKey, String, HighlightError>,
    proxy: WorkerProxy,
}

impl HighlightService {
    pub fn new(proxy: WorkerProxy, cache: MemoCache<HighlightKey, String, HighlightError>) -> Self {
        Self { cache, proxy }
    }

    /// Starts `highlighter` on a `highlight-worker` thread.
    pub fn spawn<H: Highlighter>(
        highlighter: H,
        cache: MemoCacheBuilder,
    ) -> Result<Self, HighlightError> {
        let transport = ThreadTransport::spawn("highlight-worker", HighlightWorker(highlighter))
            .map_err(|e| HighlightError::Spawn(e.to_string()))?;
        Ok(Self::new(WorkerProxy::new(transport), cache.build()))
    }

    /// Highlights `code` as `lang` without suspending.
    ///
    /// Identical requests share a single call into the worker.
    pub fn highlight(&self, code: &str, lang: &str) -> Lookup<String, HighlightError> {
        self.cache.get(HighlightKey::new(lang, code), || {
            let call = self
                .proxy
                .call_typed::<_, String>(HIGHLIGHT_METHOD, (code, lang));
            Computation::pending(async move { call.await.map_err(HighlightError::from) })
        })
    }

    /// Highlights `code`, waiting for the worker if needed.
    pub async fn highlight_settled(&self, code: &str, lang: &str) -> Result<String, HighlightError> {
        match self.highlight(code, lang) {
            Lookup::Ready(markup) => Ok(markup),
            Lookup::Failed(err) => Err(err),
            Lookup::Pending(handle) => handle.wait().await,
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

static RE_JS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?P<comment>//[^\n]*|/\*[\s\S]*?\*/)|(?P<string>"(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*'|`(?:[^`\\]|\\.)*`)|(?P<number>\b\d+(?:\.\d+)?\b)|(?P<keyword>\b(?:async|await|break|case|catch|class|const|continue|default|delete|do|else|export|extends|false|finally|for|from|function|if|import|in|instanceof|let|new|null|of|return|super|switch|this|throw|true|try|typeof|undefined|var|void|while|yield)\b)|(?P<tag></?[A-Za-z][\w.-]*)"#,
    )
    .unwrap()
});

static RE_RUST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?P<comment>//[^\n]*|/\*[\s\S]*?\*/)|(?P<string>"(?:[^"\\]|\\.)*")|(?P<number>\b\d+(?:\.\d+)?(?:_?[iuf](?:8|16|32|64|128|size))?\b)|(?P<keyword>\b(?:as|async|await|break|const|continue|crate|dyn|else|enum|false|fn|for|if|impl|in|let|loop|match|mod|move|mut|pub|ref|return|self|Self|static|struct|super|trait|true|type|unsafe|use|where|while)\b)|(?P<macro>\b[a-z_]+!)"#,
    )
    .unwrap()
});

static RE_SHELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?P<comment>#[^\n]*)|(?P<string>"(?:[^"\\]|\\.)*"|'[^']*')|(?P<variable>\$\{?\w+\}?)|(?P<keyword>\b(?:if|then|else|elif|fi|for|in|do|done|case|esac|while|function|export|local)\b)"#,
    )
    .unwrap()
});

const TOKEN_KINDS: &[&str] = &[
    "comment", "string", "number", "keyword", "tag", "macro", "variable",
];

/// A small regex tokenizer standing in for a full highlighting engine.
///
/// Produces `<span class="token KIND">` markup. `plain` and `text` are
/// escaped verbatim; other unknown languages are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenHighlighter;

impl Highlighter for TokenHighlighter {
    fn highlight(&self, code: &str, lang: &str) -> Result<String, String> {
        let grammar = match lang {
            "js" | "jsx" | "javascript" | "ts" | "tsx" | "typescript" => &*RE_JS,
            "rs" | "rust" => &*RE_RUST,
            "sh" | "bash" | "shell" => &*RE_SHELL,
            "plain" | "text" => return Ok(escape_html(code)),
            other => return Err(format!("unsupported language `{other}`")),
        };
        Ok(tokenize(grammar, code))
    }
}

fn tokenize(grammar: &Regex, code: &str) -> String {
    let mut out = String::with_capacity(code.len() * 2);
    let mut last = 0;

    for caps in grammar.captures_iter(code) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(kind) = TOKEN_KINDS.iter().find(|kind| caps.name(kind).is_some()) else {
            continue;
        };
        out.push_str(&escape_html(&code[last..whole.start()]));
        out.push_str(&format!(
            r#"<span class="token {}">{}</span>"#,
            kind,
            escape_html(whole.as_str())
        ));
        last = whole.end();
    }
    out.push_str(&escape_html(&code[last..]));
    out
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::runtime::Handle;

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl Highlighter for Counting {
        fn highlight(&self, code: &str, lang: &str) -> Result<String, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if lang == "broken" {
                return Err("engine failure".to_string());
            }
            // slow enough that both callers below find the request in flight
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(format!("<b>{lang}</b>{code}"))
        }
    }

    fn service(calls: &Arc<AtomicUsize>) -> HighlightService {
        HighlightService::spawn(
            Counting {
                calls: Arc::clone(calls),
            },
            MemoCacheBuilder::new().runtime(Handle::current()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_call_engine_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = service(&calls);

        let (a, b) = tokio::join!(
            service.highlight_settled("let a = 1;", "js"),
            service.highlight_settled("let a = 1;", "js"),
        );

        assert_eq!(a, Ok("<b>js</b>let a = 1;".to_string()));
        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_separator_lookalike_keys_do_not_collide() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = service(&calls);

        // "js\nx" + "\n" + "y" and "js" + "\n" + "x\ny" are the same string
        let first = service.highlight_settled("y", "js\nx").await;
        let second = service.highlight_settled("x\ny", "js").await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_ne!(first, second);
        assert_eq!(service.stats().settled, 2);
    }

    #[tokio::test]
    async fn test_engine_failure_is_cached_as_failed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = service(&calls);

        let err = service.highlight_settled("x", "broken").await.unwrap_err();
        assert!(matches!(err, HighlightError::Worker(WorkerError::Rejected { .. })));

        assert!(matches!(service.highlight("x", "broken"), Lookup::Failed(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_token_highlighter() {
        let html = TokenHighlighter
            .highlight("const n = 42; // <answer>", "js")
            .unwrap();
        assert_eq!(
            html,
            r#"<span class="token keyword">const</span> n = <span class="token number">42</span>; <span class="token comment">// &lt;answer&gt;</span>"#
        );

        assert_eq!(TokenHighlighter.highlight("a < b", "plain").unwrap(), "a &lt; b");
        assert!(TokenHighlighter.highlight("x", "cobol").is_err());
    }
}
