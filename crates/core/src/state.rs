// Shared state store
//
// SharedState is the key-value blob threaded through one run. Tools mutate it
// through ToolContext; the engine only seeds it from the workflow template.
// Snapshots are compact JSON text so they can be embedded in persisted run
// contexts and restored byte-for-byte equivalent.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, WorkflowError};

/// Mutable key-value state scoped to a single run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedState {
    values: Map<String, Value>,
}

impl SharedState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state from a JSON value, which must be an object
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            Value::Null => Ok(Self::default()),
            other => Err(WorkflowError::config(format!(
                "shared state must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Get a value by key, falling back to `default` when absent
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.values.get(key).cloned().unwrap_or(default)
    }

    /// Get a value by key and deserialize it into `T`
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.values.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Set a value, replacing any previous one
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Remove a value, returning it
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Look up a nested value by dotted path, e.g. `research_notes.intro`
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.values.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Set a nested value by dotted path, creating intermediate objects.
    ///
    /// Fails if an intermediate segment exists but is not an object.
    pub fn set_path(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(WorkflowError::config(format!("invalid state path '{path}'")));
        }

        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| WorkflowError::config("empty state path"))?;

        let mut current = &mut self.values;
        for segment in parents {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match entry {
                Value::Object(map) => map,
                other => {
                    return Err(WorkflowError::config(format!(
                        "state path '{path}' crosses a {} at '{segment}'",
                        json_type_name(other)
                    )))
                }
            };
        }
        current.insert(last.to_string(), value.into());
        Ok(())
    }

    /// Get the object stored under `key`, inserting an empty one if absent
    pub fn object_mut(&mut self, key: &str) -> Result<&mut Map<String, Value>> {
        let entry = self
            .values
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match entry {
            Value::Object(map) => Ok(map),
            other => Err(WorkflowError::config(format!(
                "state key '{key}' holds a {}, not an object",
                json_type_name(other)
            ))),
        }
    }

    /// Serialize the state to its flat textual form
    pub fn snapshot(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.values)?)
    }

    /// Rebuild a state from a snapshot produced by [`SharedState::snapshot`]
    pub fn restore(snapshot: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(snapshot)?;
        Self::from_value(value)
    }

    /// Run `f` against the state, rolling back every change if it fails
    pub fn transaction<T, E>(
        &mut self,
        f: impl FnOnce(&mut SharedState) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let checkpoint = self.values.clone();
        let result = f(self);
        if result.is_err() {
            self.values = checkpoint;
        }
        result
    }

    /// Consume the state, returning it as a JSON object value
    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }
}

impl From<Map<String, Value>> for SharedState {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_set_and_default() {
        let mut state = SharedState::new();
        state.set("name", "Mohammed");
        assert_eq!(state.get("name"), Some(&json!("Mohammed")));
        assert_eq!(state.get_or("missing", json!(0)), json!(0));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let mut state = SharedState::new();
        state.set("count", 3);
        state.set("nested", json!({"a": [1, 2, {"b": null}], "c": "text"}));
        state.set("flag", true);
        state.remove("flag");
        state.set("ratio", 0.25);

        let snapshot = state.snapshot().unwrap();
        let restored = SharedState::restore(&snapshot).unwrap();

        assert_eq!(restored, state);
        assert_eq!(
            restored.keys().collect::<Vec<_>>(),
            state.keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_restore_rejects_non_object() {
        assert!(SharedState::restore("[1,2,3]").is_err());
        assert!(SharedState::restore("not json").is_err());
    }

    #[test]
    fn test_paths() {
        let mut state = SharedState::new();
        state.set_path("research_notes.intro", "notes").unwrap();
        assert_eq!(state.get_path("research_notes.intro"), Some(&json!("notes")));
        assert_eq!(state.get_path("research_notes.missing"), None);

        state.set("report_content", "text");
        assert!(state.set_path("report_content.title", "x").is_err());
        assert!(state.set_path("a..b", 1).is_err());
    }

    #[test]
    fn test_object_mut() {
        let mut state = SharedState::new();
        state.object_mut("notes").unwrap().insert("k".into(), json!("v"));
        assert_eq!(state.get_path("notes.k"), Some(&json!("v")));

        state.set("scalar", 1);
        assert!(state.object_mut("scalar").is_err());
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let mut state = SharedState::new();
        state.set("balance", 10);

        let result: std::result::Result<(), String> = state.transaction(|s| {
            s.set("balance", 0);
            s.set("partial", true);
            Err("boom".to_string())
        });

        assert!(result.is_err());
        assert_eq!(state.get("balance"), Some(&json!(10)));
        assert!(!state.contains_key("partial"));

        let ok: std::result::Result<i32, String> = state.transaction(|s| {
            s.set("balance", 5);
            Ok(5)
        });
        assert_eq!(ok, Ok(5));
        assert_eq!(state.get("balance"), Some(&json!(5)));
    }

    #[test]
    fn test_get_as() {
        let mut state = SharedState::new();
        state.set("turns", 4);
        let turns: Option<u32> = state.get_as("turns").unwrap();
        assert_eq!(turns, Some(4));
        let missing: Option<u32> = state.get_as("nope").unwrap();
        assert_eq!(missing, None);
    }
}
