//! Structured key-value data that can be attached to log records.
//!
//! Values that carry sensitive data are wrapped into a [`Redactor`];
//! the log output then only ever contains their redacted form.
//!
//! ```rust
//! use levlog::{Fields, Sensitive};
//!
//! let fields = Fields::new()
//!     .with("user", "karl")
//!     .with("attempt", 3)
//!     .with_redacted("password", Sensitive::new("hunter2"));
//! assert_eq!(fields.to_string(), "attempt=3 password=******* user=karl");
//! ```
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

/// Replaces every character of `s` with `*`.
#[must_use]
pub fn redact(s: &str) -> String {
    "*".repeat(s.chars().count())
}

/// Capability of values that must not appear in clear text in the log.
pub trait Redactor: Send + Sync {
    /// The representation that is written instead of the value.
    fn redacted(&self) -> String;
}

/// A string that is only ever logged as a same-length run of `*`.
#[derive(Clone)]
pub struct Sensitive(String);

impl Sensitive {
    /// Wraps a secret.
    #[must_use]
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self(secret.into())
    }
}

impl Redactor for Sensitive {
    fn redacted(&self) -> String {
        redact(&self.0)
    }
}

impl fmt::Debug for Sensitive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Sensitive").field(&self.redacted()).finish()
    }
}

/// Value of a structured field.
#[derive(Clone)]
pub enum Value {
    /// Text.
    Str(String),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer that does not fit into `Int`.
    Uint(u64),
    /// Floating point number.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// Time span.
    Duration(Duration),
    /// Nested fields.
    Map(Fields),
    /// A value that is only accessible in redacted form.
    Redacted(Arc<dyn Redactor>),
}

impl Value {
    /// Wraps a redactable value.
    pub fn redacted<R: Redactor + 'static>(r: R) -> Self {
        Value::Redacted(Arc::new(r))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{i}"),
            Value::Uint(u) => write!(f, "{u}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Duration(d) => write!(f, "{d:?}"),
            Value::Map(m) => write!(f, "{{{m}}}"),
            Value::Redacted(r) => f.write_str(&r.redacted()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Redacted(r) => write!(f, "Redacted({})", r.redacted()),
            v => fmt::Display::fmt(v, f),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}
impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i.into())
    }
}
impl From<u32> for Value {
    fn from(u: u32) -> Self {
        Value::Int(u.into())
    }
}
impl From<u64> for Value {
    fn from(u: u64) -> Self {
        i64::try_from(u).map_or(Value::Uint(u), Value::Int)
    }
}
impl From<usize> for Value {
    fn from(u: usize) -> Self {
        Value::from(u as u64)
    }
}
impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
impl From<Duration> for Value {
    fn from(d: Duration) -> Self {
        Value::Duration(d)
    }
}
impl From<Fields> for Value {
    fn from(m: Fields) -> Self {
        Value::Map(m)
    }
}

/// Types that can provide fields for structured logging.
pub trait Fielder {
    /// The fields.
    fn fields(&self) -> Fields;
}

/// Unordered set of named values; enumeration is sorted by name.
#[derive(Clone, Debug, Default)]
pub struct Fields(HashMap<String, Value>);

impl Fields {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a field.
    #[must_use]
    pub fn with<K: Into<String>, V: Into<Value>>(mut self, name: K, value: V) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds or replaces a field whose value must be redacted.
    #[must_use]
    pub fn with_redacted<K: Into<String>, R: Redactor + 'static>(mut self, name: K, value: R) -> Self {
        self.insert(name, Value::redacted(value));
        self
    }

    /// Adds or replaces a field.
    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, name: K, value: V) {
        self.0.insert(name.into(), value.into());
    }

    /// Value of a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Field names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.0.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Fields, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.names()
            .into_iter()
            .filter_map(|name| self.0.get(name).map(|v| (name, v)))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Adds all fields of `other`, replacing existing ones with the same name.
    pub fn extend(&mut self, other: Fields) {
        self.0.extend(other.0);
    }
}

impl Fielder for Fields {
    fn fields(&self) -> Fields {
        self.clone()
    }
}

impl fmt::Display for Fields {
    /// `name=value` pairs, sorted by name and separated by blanks.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}
