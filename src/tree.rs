//! Nested-value access over loosely-shaped JSON.
//!
//! License and update responses arrive as arbitrary JSON trees. [`Tree`]
//! wraps `serde_json::Value` so callers can dereference deep, possibly
//! absent paths (`purchase.subscription_failed_at`) without checking every
//! level: a missing key resolves to a null tree that keeps chaining.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tree(Value);

impl Tree {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Parses a JSON document; anything unparseable becomes a null tree.
    pub fn parse(text: &str) -> Self {
        serde_json::from_str(text).map(Self).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Tree {
        match &self.0 {
            Value::Object(map) => map.get(key).cloned().map(Self).unwrap_or_default(),
            _ => Self::default(),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        if !self.0.is_object() {
            self.0 = Value::Object(serde_json::Map::new());
        }
        if let Value::Object(map) = &mut self.0 {
            map.insert(key.to_string(), value.into());
        }
    }

    /// Appends to the underlying array, starting a new one if the current
    /// value is anything else.
    pub fn push(&mut self, value: impl Into<Value>) {
        if !self.0.is_array() {
            self.0 = Value::Array(Vec::new());
        }
        if let Value::Array(items) = &mut self.0 {
            items.push(value.into());
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        matches!(&self.0, Value::Object(map) if map.contains_key(key))
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        match &mut self.0 {
            Value::Object(map) => map.remove(key),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// Loose truthiness, matching how the licensing server's payloads are
    /// interpreted: null, false, 0, `""`, `"0"` and empty arrays/objects
    /// are all falsy.
    pub fn is_truthy(&self) -> bool {
        match &self.0 {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !s.is_empty() && s != "0",
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.0.as_i64()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.0.as_f64()
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.0.as_bool()
    }

    /// Integer view that also accepts numeric strings, which some endpoints
    /// emit for counters.
    pub fn to_i64(&self) -> Option<i64> {
        match &self.0 {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// String view: strings come back as-is, null as `""`, everything else
    /// in its JSON form.
    pub fn text(&self) -> String {
        match &self.0 {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    pub fn iter_array(&self) -> impl Iterator<Item = Tree> + '_ {
        self.0
            .as_array()
            .into_iter()
            .flatten()
            .map(|v| Self(v.clone()))
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Tree {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
