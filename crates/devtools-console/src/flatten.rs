//! Flattening of a logged value into display rows.
//!
//! Rows are derived on every render from the value and the message's
//! [`ExpandState`]; nothing here is cached.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;

use crate::value::Value;

/// One step of a row's path from the root value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Property(String),
    Index(usize),
    /// The derived `length` row of an array.
    Length,
}

/// Positional path identifying a row.
///
/// Segments are kept structured rather than joined into a string, so a
/// property literally named `a.b` never shares a key with `a` → `b`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RowKey(Vec<PathSegment>);

impl RowKey {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Property(name) if i == 0 => write!(f, "{name}")?,
                PathSegment::Property(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
                PathSegment::Length if i == 0 => write!(f, "length")?,
                PathSegment::Length => write!(f, ".length")?,
            }
        }
        Ok(())
    }
}

/// Row keys the user has collapsed in one message.
///
/// A fresh state has the root collapsed, so a newly logged object shows as a
/// single preview line until it is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandState {
    collapsed: HashSet<RowKey>,
}

impl ExpandState {
    pub fn new() -> Self {
        Self {
            collapsed: HashSet::from([RowKey::root()]),
        }
    }

    /// A state with every branch open.
    pub fn expanded() -> Self {
        Self {
            collapsed: HashSet::new(),
        }
    }

    pub fn is_collapsed(&self, key: &RowKey) -> bool {
        self.collapsed.contains(key)
    }

    /// Flips `key` and returns whether it is now collapsed.
    pub fn toggle(&mut self, key: &RowKey) -> bool {
        if self.collapsed.remove(key) {
            false
        } else {
            self.collapsed.insert(key.clone());
            true
        }
    }

    pub fn collapse(&mut self, key: RowKey) {
        self.collapsed.insert(key);
    }

    pub fn expand(&mut self, key: &RowKey) {
        self.collapsed.remove(key);
    }
}

impl Default for ExpandState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row<'a> {
    pub key: RowKey,
    pub level: usize,
    /// Property name or index under the parent; `None` for the root.
    pub label: Option<Cow<'a, str>>,
    pub value: Cow<'a, Value>,
}

impl Row<'_> {
    pub fn is_collapsible(&self) -> bool {
        self.value.is_structured()
    }
}

/// Flattens `value` into rows, descending into every branch not collapsed
/// in `state`.
pub fn flatten<'a>(value: &'a Value, state: &ExpandState) -> Vec<Row<'a>> {
    let mut rows = Vec::new();
    flatten_into(value, RowKey::root(), None, 0, state, &mut rows);
    rows
}

fn flatten_into<'a>(
    value: &'a Value,
    key: RowKey,
    label: Option<Cow<'a, str>>,
    level: usize,
    state: &ExpandState,
    rows: &mut Vec<Row<'a>>,
) {
    let open = value.is_structured() && !state.is_collapsed(&key);
    rows.push(Row {
        key: key.clone(),
        level,
        label,
        value: Cow::Borrowed(value),
    });
    if !open {
        return;
    }

    match value {
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                let child = key.child(PathSegment::Index(index));
                flatten_into(item, child, Some(Cow::Owned(index.to_string())), level + 1, state, rows);
            }
            rows.push(Row {
                key: key.child(PathSegment::Length),
                level: level + 1,
                label: Some(Cow::Borrowed("length")),
                value: Cow::Owned(Value::Number(items.len() as f64)),
            });
        }
        Value::Object(entries) => {
            for (name, item) in entries {
                let child = key.child(PathSegment::Property(name.clone()));
                flatten_into(item, child, Some(Cow::Borrowed(name.as_str())), level + 1, state, rows);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(rows: &[Row<'_>]) -> Vec<String> {
        rows.iter().map(|row| row.key.to_string()).collect()
    }

    fn sample() -> Value {
        Value::object([
            ("a", Value::from(1)),
            (
                "b",
                Value::object([("c", Value::from("x")), ("d", Value::from(vec![true, false]))]),
            ),
        ])
    }

    #[test]
    fn test_primitive_is_one_terminal_row() {
        let value = Value::from("hello");
        let rows = flatten(&value, &ExpandState::expanded());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].level, 0);
        assert!(rows[0].key.is_root());
        assert!(!rows[0].is_collapsible());
    }

    #[test]
    fn test_new_state_shows_only_root() {
        let value = sample();
        let rows = flatten(&value, &ExpandState::new());
        assert_eq!(keys(&rows), vec![""]);
        assert!(rows[0].is_collapsible());
    }

    #[test]
    fn test_repeated_object_key_yields_one_row() {
        let value = Value::object([
            ("a", Value::from(1)),
            ("b", Value::from(2)),
            ("a", Value::from(3)),
        ]);
        let rows = flatten(&value, &ExpandState::expanded());
        assert_eq!(keys(&rows), vec!["", "a", "b"]);
        assert_eq!(*rows[1].value, Value::from(3));
    }

    #[test]
    fn test_expanded_tree_with_array_length_row() {
        let value = sample();
        let rows = flatten(&value, &ExpandState::expanded());
        assert_eq!(
            keys(&rows),
            vec!["", "a", "b", "b.c", "b.d", "b.d[0]", "b.d[1]", "b.d.length"]
        );
        let levels: Vec<usize> = rows.iter().map(|r| r.level).collect();
        assert_eq!(levels, vec![0, 1, 1, 2, 2, 3, 3, 3]);

        let length = rows.last().unwrap();
        assert_eq!(length.label.as_deref(), Some("length"));
        assert_eq!(*length.value, Value::Number(2.0));
        assert!(!length.is_collapsible());
    }

    #[test]
    fn test_collapsing_a_branch_keeps_sibling_keys() {
        let value = sample();
        let mut state = ExpandState::expanded();
        let before = flatten(&value, &state);

        let b = RowKey::root().child(PathSegment::Property("b".into()));
        assert!(state.toggle(&b));
        let after = flatten(&value, &state);
        assert_eq!(keys(&after), vec!["", "a", "b"]);
        assert_eq!(before[1].key, after[1].key);

        assert!(!state.toggle(&b));
        assert_eq!(keys(&flatten(&value, &state)), keys(&before));
    }

    #[test]
    fn test_dotted_property_names_do_not_collide() {
        let value = Value::object([
            ("a.b", Value::from(1)),
            ("a", Value::object([("b", Value::from(2))])),
        ]);
        let rows = flatten(&value, &ExpandState::expanded());
        let dotted = &rows[1].key;
        let nested = &rows[3].key;
        assert_eq!(dotted.to_string(), nested.to_string());
        assert_ne!(dotted, nested);
    }
}
