use serde::de::Deserializer;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

// JSON has no undefined, NaN or Infinity. Those travel as single-key marker
// objects, and a real object shaped like a marker is wrapped in `$object`.
const UNDEFINED_MARKER: &str = "$undefined";
const NUMBER_MARKER: &str = "$number";
const OBJECT_MARKER: &str = "$object";

/// A value logged by the sandboxed runner.
///
/// Objects keep the insertion order of their keys, matching what the runner
/// reports when enumerating own properties.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
}

impl Value {
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Value::Array(_) | Value::Object(_))
    }

    /// Objects and arrays, the values that can be expanded into child rows.
    pub fn is_structured(&self) -> bool {
        !self.is_primitive()
    }

    /// Identity comparison as the runner performs it.
    ///
    /// `NaN` never equals itself, `0` equals `-0`, and structured values are
    /// never equal because each logged object is a distinct reference.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }

    /// Builds an object from key/value pairs.
    ///
    /// A repeated key keeps its first position and takes the last value, as
    /// property assignment does.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut object: Vec<(String, Value)> = Vec::new();
        for (key, value) in entries {
            let key = key.into();
            match object.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => object.push((key, value)),
            }
        }
        Value::Object(object)
    }

    pub fn len(&self) -> usize {
        match self {
            Value::Array(items) => items.len(),
            Value::Object(entries) => entries.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Formats a number the way the runner stringifies it.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
        // shortest digits in exponent form, with an explicit sign on the exponent
        let formatted = format!("{:e}", n);
        match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => formatted,
        }
    } else {
        n.to_string()
    }
}

fn parse_non_finite(text: &str) -> Option<f64> {
    match text {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

fn is_marker_shaped(entries: &[(String, Value)]) -> bool {
    matches!(entries, [(key, _)] if key.starts_with('$'))
}

/// Rebuilds a value from its wire form, undoing the marker encoding.
fn decode(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Array(items) => Value::Array(items.into_iter().map(decode).collect()),
        serde_json::Value::Object(map) => {
            if map.len() == 1 {
                if let Some((key, inner)) = map.iter().next() {
                    match (key.as_str(), inner) {
                        (UNDEFINED_MARKER, serde_json::Value::Bool(true)) => {
                            return Value::Undefined
                        }
                        (NUMBER_MARKER, serde_json::Value::String(text)) => {
                            if let Some(n) = parse_non_finite(text) {
                                return Value::Number(n);
                            }
                        }
                        _ => {}
                    }
                }
                if let Some(serde_json::Value::Object(inner)) = map.get(OBJECT_MARKER) {
                    return Value::Object(
                        inner
                            .clone()
                            .into_iter()
                            .map(|(k, v)| (k, decode(v)))
                            .collect(),
                    );
                }
            }
            Value::Object(map.into_iter().map(|(k, v)| (k, decode(v))).collect())
        }
        other => Value::from(other),
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Undefined => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(UNDEFINED_MARKER, &true)?;
                map.end()
            }
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if !n.is_finite() => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(NUMBER_MARKER, &format_number(*n))?;
                map.end()
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(entries) if is_marker_shaped(entries) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(OBJECT_MARKER, &ObjectEntries(entries))?;
                map.end()
            }
            Value::Object(entries) => ObjectEntries(entries).serialize(serializer),
        }
    }
}

struct ObjectEntries<'a>(&'a [(String, Value)]);

impl Serialize for ObjectEntries<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let json = serde_json::Value::deserialize(deserializer)?;
        Ok(decode(json))
    }
}
