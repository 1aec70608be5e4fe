use crate::result::{DeskpackError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tokio::fs;

pub const SETTINGS_FILE: &str = "settings.json";

/// Application settings read from `settings.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(Map<String, Value>);

impl Settings {
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).await?;
        let value: Value = serde_json::from_str(&content).map_err(|e| {
            DeskpackError::config(format!("Malformed {}: {}", path.display(), e))
        })?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DeskpackError::config(format!(
                "settings must be a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn title(&self) -> Option<&str> {
        self.str_value("title")
    }

    pub fn icon(&self) -> Option<&str> {
        self.str_value("icon")
    }

    pub fn splash_image(&self) -> Option<&str> {
        self.str_value("splash_image")
    }

    pub fn description(&self) -> Option<&str> {
        self.str_value("description")
    }

    pub fn console(&self) -> bool {
        self.truthy("console")
    }

    pub fn debug(&self) -> bool {
        self.truthy("debug")
    }

    /// `version` as a string; numeric versions such as `1.2` are accepted.
    pub fn version(&self) -> Option<String> {
        match self.0.get("version")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn production_copy(&self) -> Self {
        let mut clean = self.clone();
        clean.set("debug", Value::Bool(false));
        clean
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        String::from_utf8(buf).map_err(|e| DeskpackError::process(e.to_string()))
    }

    fn str_value(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    fn truthy(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            _ => false,
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
