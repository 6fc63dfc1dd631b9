//! Property bag carried by every message.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TesterError;

/// String-keyed property bag backed by a JSON object.
///
/// Keys are taken literally; dotted paths are not interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(Map<String, Value>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object document. `null` and the empty string yield an
    /// empty bag.
    pub fn from_json_str(json: &str) -> Result<Self, TesterError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, TesterError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(TesterError::InvalidArgument(format!(
                "properties must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Merge the top-level keys of a JSON object document into this bag.
    pub fn merge_json_str(&mut self, json: &str) -> Result<(), TesterError> {
        let other = Self::from_json_str(json)?;
        self.0.extend(other.0);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get_string(&self, key: &str) -> Result<String, TesterError> {
        self.require(key)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch(key, "string"))
    }

    pub fn get_int(&self, key: &str) -> Result<i64, TesterError> {
        self.require(key)?
            .as_i64()
            .ok_or_else(|| mismatch(key, "integer"))
    }

    pub fn get_float(&self, key: &str) -> Result<f64, TesterError> {
        self.require(key)?
            .as_f64()
            .ok_or_else(|| mismatch(key, "float"))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, TesterError> {
        self.require(key)?
            .as_bool()
            .ok_or_else(|| mismatch(key, "bool"))
    }

    pub fn get_json(&self, key: &str) -> Result<Value, TesterError> {
        self.require(key).cloned()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn set_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.set(key, Value::String(value.into()));
    }

    pub fn set_int(&mut self, key: impl Into<String>, value: i64) {
        self.set(key, value);
    }

    pub fn set_float(&mut self, key: impl Into<String>, value: f64) {
        self.set(key, value);
    }

    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) {
        self.set(key, value);
    }

    pub fn set_json(&mut self, key: impl Into<String>, value: Value) {
        self.set(key, value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn to_json_string(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    fn require(&self, key: &str) -> Result<&Value, TesterError> {
        self.0
            .get(key)
            .ok_or_else(|| TesterError::PropertyNotFound(key.to_string()))
    }
}

impl From<Map<String, Value>> for Properties {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn mismatch(key: &str, expected: &'static str) -> TesterError {
    TesterError::PropertyTypeMismatch {
        key: key.to_string(),
        expected,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "properties_tests.rs"]
mod tests;
