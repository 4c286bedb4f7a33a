//! Single-line text encoding for parameter values.
//!
//! Values are stored as the third field of a `group::name::value` line, so
//! the encoding never contains a newline. Decoding is a best-effort sniff:
//!
//! 1. contains `,` → tuple of strings
//! 2. contains `.` → float, else the raw string
//! 3. otherwise    → integer, else the raw string
//!
//! The empty string means "unset".

use std::fmt;

/// A decoded parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i64),
    Float(f64),
    /// Ordered list of strings, stored comma-joined.
    Tuple(Vec<String>),
}

impl Value {
    /// The unset value (encodes to an empty string).
    pub fn unset() -> Self {
        Value::Text(String::new())
    }

    /// True for the empty string and the empty tuple.
    pub fn is_unset(&self) -> bool {
        match self {
            Value::Text(s) => s.is_empty(),
            Value::Tuple(items) => items.iter().all(|s| s.is_empty()),
            Value::Int(_) | Value::Float(_) => false,
        }
    }

    /// Borrow the text of a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Tuple(_) => None,
        }
    }

    /// Build a value from one or more user-entered tokens.
    ///
    /// Several tokens are joined with a single space into one line of the
    /// control file; the joined text is then decoded like any stored value.
    pub fn from_user_values(values: &[String]) -> Self {
        match values {
            [] => Value::unset(),
            [single] => decode(single),
            many => decode(&many.join(" ")),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(self))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::Tuple(items)
    }
}

/// Format a float so that it always keeps a fractional part (`2.0`, `0.05`).
///
/// Integral floats must not render as `2`, otherwise they would decode back
/// as integers.
/// Display never switches to exponent notation, so `1e-7` stays a float
/// with a `.` in it.
pub fn format_float(value: f64) -> String {
    let mut text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        text.push_str(".0");
    }
    text
}

/// Encode a value as a single line of text.
pub fn encode(value: &Value) -> String {
    let raw = match value {
        Value::Text(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format_float(*f),
        Value::Tuple(items) => items.join(","),
    };
    if raw.contains(['\n', '\r']) {
        raw.replace(['\n', '\r'], " ")
    } else {
        raw
    }
}

/// Decode the text of a stored value.
pub fn decode(text: &str) -> Value {
    if text.contains(',') {
        return Value::Tuple(text.split(',').map(|s| s.trim().to_string()).collect());
    }
    if text.contains('.') {
        if let Ok(f) = text.parse::<f64>() {
            return Value::Float(f);
        }
    } else if let Ok(i) = text.parse::<i64>() {
        return Value::Int(i);
    }
    Value::Text(text.to_string())
}
