//! Rendering of authored code blocks.
//!
//! A block is a `pre` element whose first child is a `code` element carrying
//! a `lang-<id>` or `language-<id>` class. The first render always answers
//! synchronously with escaped source; the highlighted markup replaces it once
//! the [`HighlightService`] settles.

use regex::Regex;
use std::sync::LazyLock;

use crate::highlight::{escape_html, HighlightError, HighlightService};
use crate::memo::{Lookup, PendingHandle};

/// Language used when a block carries no recognizable language class.
pub const DEFAULT_LANGUAGE: &str = "plain";

/// Languages that get a "Run in REPL" link.
pub const RUNNABLE_LANGUAGES: &[&str] = &["js", "jsx"];

pub const DEFAULT_REPL_PATH: &str = "/repl";

static RE_LANGUAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:lang|language)-([a-z]+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Element(Element),
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(text.to_string())
    }
}

/// A parsed markup element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_string(), value.to_string()));
        self
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn to_html(&self) -> String {
        let mut out = format!("<{}", self.tag);
        for (name, value) in &self.attrs {
            out.push_str(&format!(r#" {}="{}""#, name, escape_html(value)));
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Text(text) => out.push_str(&escape_html(text)),
                Node::Element(element) => out.push_str(&element.to_html()),
            }
        }
        out.push_str(&format!("</{}>", self.tag));
        out
    }
}

/// What was extracted from a `pre > code` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub code: String,
    pub lang: String,
    pub class: Option<String>,
    pub repl: bool,
}

impl CodeBlock {
    /// Returns `None` when `pre` does not wrap a `code` element.
    pub fn from_element(pre: &Element) -> Option<Self> {
        let Some(Node::Element(code)) = pre.children.first() else {
            return None;
        };
        if code.tag != "code" {
            return None;
        }

        let lang = code
            .get_attr("class")
            .and_then(|class| RE_LANGUAGE.captures(class))
            .map(|caps| caps[1].to_string())
            .unwrap_or_else(|| {
                tracing::debug!("code block without a language class, using {DEFAULT_LANGUAGE}");
                DEFAULT_LANGUAGE.to_string()
            });

        let text = match code.children.first() {
            Some(Node::Text(text)) => text.trim().to_string(),
            _ => String::new(),
        };

        Some(Self {
            code: text,
            lang,
            class: pre.get_attr("class").map(str::to_string),
            repl: pre.get_attr("repl") != Some("false"),
        })
    }

    pub fn is_runnable(&self) -> bool {
        self.repl
            && RUNNABLE_LANGUAGES.contains(&self.lang.as_str())
            && self.code.split('\n').count() > 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Not a code block, rendered as authored.
    Plain,
    /// Escaped source, shown while highlighting is pending or after it failed.
    Fallback,
    Highlighted,
}

#[derive(Debug, Clone)]
pub struct RenderedBlock {
    pub html: String,
    pub state: BlockState,
    /// Set while the highlight is in flight; render again once it settles.
    pub pending: Option<PendingHandle<String, HighlightError>>,
}

#[derive(Clone)]
pub struct CodeBlockRenderer {
    service: HighlightService,
    repl_path: String,
}

impl CodeBlockRenderer {
    pub fn new(service: HighlightService) -> Self {
        Self {
            service,
            repl_path: DEFAULT_REPL_PATH.to_string(),
        }
    }

    pub fn repl_path(mut self, path: &str) -> Self {
        self.repl_path = path.to_string();
        self
    }

    pub fn render(&self, pre: &Element) -> RenderedBlock {
        let Some(block) = CodeBlock::from_element(pre) else {
            return RenderedBlock {
                html: pre.to_html(),
                state: BlockState::Plain,
                pending: None,
            };
        };

        let (body, state, pending) = match self.service.highlight(&block.code, &block.lang) {
            Lookup::Ready(markup) if !markup.is_empty() => (markup, BlockState::Highlighted, None),
            Lookup::Ready(_) => (escape_code(&block.code), BlockState::Fallback, None),
            Lookup::Failed(err) => {
                tracing::debug!(lang = %block.lang, error = %err, "highlighting failed, showing source");
                (escape_code(&block.code), BlockState::Fallback, None)
            }
            Lookup::Pending(handle) => (escape_code(&block.code), BlockState::Fallback, Some(handle)),
        };

        RenderedBlock {
            html: self.wrap(&block, &body),
            state,
            pending,
        }
    }

    /// Renders, then renders again once a pending highlight has settled.
    pub async fn render_settled(&self, pre: &Element) -> RenderedBlock {
        let first = self.render(pre);
        match first.pending {
            Some(handle) => {
                let _ = handle.wait().await;
                self.render(pre)
            }
            None => first,
        }
    }

    fn wrap(&self, block: &CodeBlock, body: &str) -> String {
        let container_class = match &block.class {
            Some(class) => format!("highlight-container {}", escape_html(class)),
            None => "highlight-container".to_string(),
        };
        let link = if block.is_runnable() {
            format!(
                r#"<a class="repl-link" href="{}?code={}">Run in REPL</a>"#,
                self.repl_path,
                urlencoding::encode(&block.code)
            )
        } else {
            String::new()
        };
        format!(
            r#"<div class="{}"><pre class="highlight"><code class="language-{}">{}</code></pre>{}</div>"#,
            container_class, block.lang, body, link
        )
    }
}

/// Escapes the angle brackets of raw source so it is never read as markup.
pub fn escape_code(code: &str) -> String {
    code.replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::Highlighter;
    use crate::memo::MemoCacheBuilder;
    use crossbeam_channel::{bounded, Receiver};
    use tokio::runtime::Handle;

    /// Blocks each request until the test releases it.
    struct Gated(Receiver<()>);

    impl Highlighter for Gated {
        fn highlight(&self, code: &str, lang: &str) -> Result<String, String> {
            let _ = self.0.recv();
            match lang {
                "broken" => Err("no grammar".to_string()),
                "empty" => Ok(String::new()),
                _ => Ok(format!("<em>{code}</em>")),
            }
        }
    }

    fn renderer() -> (CodeBlockRenderer, crossbeam_channel::Sender<()>) {
        let (tx, rx) = bounded(16);
        let service =
            HighlightService::spawn(Gated(rx), MemoCacheBuilder::new().runtime(Handle::current()))
                .unwrap();
        (CodeBlockRenderer::new(service), tx)
    }

    fn block(class: &str, text: &str) -> Element {
        Element::new("pre").child(Element::new("code").attr("class", class).child(text))
    }

    #[test]
    fn test_extracts_language_and_trims_source() {
        let parsed = CodeBlock::from_element(&block("language-jsx", "\n  <A />\n")).unwrap();
        assert_eq!(parsed.lang, "jsx");
        assert_eq!(parsed.code, "<A />");

        let parsed = CodeBlock::from_element(&block("foo lang-sh", "ls")).unwrap();
        assert_eq!(parsed.lang, "sh");
    }

    #[test]
    fn test_missing_language_defaults_to_plain() {
        let parsed = CodeBlock::from_element(&block("highlight", "x")).unwrap();
        assert_eq!(parsed.lang, DEFAULT_LANGUAGE);

        let no_class = Element::new("pre").child(Element::new("code").child("x"));
        assert_eq!(CodeBlock::from_element(&no_class).unwrap().lang, DEFAULT_LANGUAGE);

        assert!(CodeBlock::from_element(&Element::new("pre").child("text")).is_none());
    }

    #[test]
    fn test_runnable_needs_script_language_and_three_lines() {
        let three = "a\nb\nc";
        assert!(CodeBlock::from_element(&block("lang-js", three)).unwrap().is_runnable());
        assert!(!CodeBlock::from_element(&block("lang-js", "a\nb")).unwrap().is_runnable());
        assert!(!CodeBlock::from_element(&block("lang-rust", three)).unwrap().is_runnable());

        let opted_out = block("lang-js", three).attr("repl", "false");
        assert!(!CodeBlock::from_element(&opted_out).unwrap().is_runnable());
    }

    #[tokio::test]
    async fn test_fallback_then_highlighted() {
        let (renderer, release) = renderer();
        let pre = block("lang-js", "a < b");

        let first = renderer.render(&pre);
        assert_eq!(first.state, BlockState::Fallback);
        assert!(first.html.contains("<code class=\"language-js\">a &lt; b</code>"));
        let pending = first.pending.expect("highlight should be in flight");

        release.send(()).unwrap();
        pending.wait().await.unwrap();

        let second = renderer.render(&pre);
        assert_eq!(second.state, BlockState::Highlighted);
        assert!(second.html.contains("<em>a < b</em>"));
        assert!(second.pending.is_none());
    }

    #[tokio::test]
    async fn test_failed_or_empty_highlight_falls_back() {
        let (renderer, release) = renderer();
        release.send(()).unwrap();
        release.send(()).unwrap();

        let failed = renderer.render_settled(&block("lang-broken", "<x>")).await;
        assert_eq!(failed.state, BlockState::Fallback);
        assert!(failed.html.contains("&lt;x&gt;"));

        let empty = renderer.render_settled(&block("lang-empty", "<y>")).await;
        assert_eq!(empty.state, BlockState::Fallback);
        assert!(empty.html.contains("&lt;y&gt;"));
    }

    #[tokio::test]
    async fn test_repl_link_and_passthrough() {
        let (renderer, release) = renderer();
        release.send(()).unwrap();

        let code = "let a = 1;\nlet b = 2;\nconsole.log(a + b);";
        let rendered = renderer
            .render_settled(&block("lang-js", code).attr("class", "wide"))
            .await;
        assert!(rendered.html.starts_with(r#"<div class="highlight-container wide">"#));
        assert!(rendered.html.contains(&format!(
            r#"href="/repl?code={}""#,
            urlencoding::encode(code)
        )));

        let plain = Element::new("pre").child("just text");
        let rendered = renderer.render(&plain);
        assert_eq!(rendered.state, BlockState::Plain);
        assert_eq!(rendered.html, "<pre>just text</pre>");
    }
}
