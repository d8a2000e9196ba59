use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::{format_number, Value};

/// Styling class of a preview token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Plain,
    /// Numbers and booleans.
    Primitive,
    /// Quoted strings below the top level.
    String,
    /// Object braces.
    Bright,
    /// Property names.
    Dim,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

/// One-line rendering of a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub tokens: Vec<Token>,
    /// Top-level objects are shown in italics.
    pub italic: bool,
}

impl Preview {
    fn push(&mut self, kind: TokenKind, text: impl Into<String>) {
        self.tokens.push(Token {
            kind,
            text: text.into(),
        });
    }

    pub fn to_plain(&self) -> String {
        self.tokens.iter().map(|t| t.text.as_str()).collect()
    }
}

impl fmt::Display for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            f.write_str(&token.text)?;
        }
        Ok(())
    }
}

/// Builds the preview of `value` shown at nesting `level`.
///
/// A full object preview lists its properties inline, but each property value
/// is only summarized; deeper structure is reached by expanding rows.
pub fn generate_preview(value: &Value, level: usize, summary: bool) -> Preview {
    let mut preview = Preview::default();
    write_preview(&mut preview, value, level, summary);
    preview
}

fn write_preview(out: &mut Preview, value: &Value, level: usize, summary: bool) {
    match value {
        Value::Undefined => out.push(TokenKind::Plain, "undefined"),
        Value::Null => out.push(TokenKind::Plain, "null"),
        Value::Bool(b) => out.push(TokenKind::Primitive, b.to_string()),
        Value::Number(n) => out.push(TokenKind::Primitive, format_number(*n)),
        Value::String(s) if level == 0 && !summary => out.push(TokenKind::Plain, s.as_str()),
        Value::String(s) => out.push(TokenKind::String, format!("'{s}'")),
        Value::Array(items) => out.push(TokenKind::Plain, format!("Array({})", items.len())),
        Value::Object(entries) => {
            out.italic |= level == 0;
            out.push(TokenKind::Bright, "{");
            if summary {
                if !entries.is_empty() {
                    out.push(TokenKind::Plain, "…");
                }
            } else {
                for (i, (name, item)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push(TokenKind::Plain, ", ");
                    }
                    out.push(TokenKind::Dim, name.as_str());
                    out.push(TokenKind::Plain, ": ");
                    write_preview(out, item, level + 1, true);
                }
            }
            out.push(TokenKind::Bright, "}");
        }
    }
}
