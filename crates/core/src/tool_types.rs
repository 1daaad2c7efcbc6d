// Tool definitions, calls and results
//
// Design Decision: Tools are identified by name (string) for extensibility.
// The parameter schema is an ordered list rather than free-form JSON Schema so
// the invoker can validate arguments without a schema engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ToolError;

/// Type of a declared tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    /// Accepts any JSON value
    Any,
}

impl ParamType {
    /// Check whether a JSON value is acceptable for this type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
            ParamType::Any => true,
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamType::String => write!(f, "string"),
            ParamType::Number => write!(f, "number"),
            ParamType::Integer => write!(f, "integer"),
            ParamType::Boolean => write!(f, "boolean"),
            ParamType::Object => write!(f, "object"),
            ParamType::Array => write!(f, "array"),
            ParamType::Any => write!(f, "any"),
        }
    }
}

/// One entry of a tool's parameter schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    /// Value filled in when an optional parameter is omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ToolParameter {
    /// A required parameter
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            default: None,
            description: String::new(),
        }
    }

    /// An optional parameter without a default
    pub fn optional(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            default: None,
            description: String::new(),
        }
    }

    /// Set the default used when the argument is omitted (makes it optional)
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.required = false;
        self.default = Some(default.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Tool catalog entry handed to the reasoning capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

/// Tool call requested by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this tool call
    pub id: String,
    /// Tool name to execute
    pub name: String,
    /// Arguments as JSON
    pub arguments: Value,
}

impl ToolCall {
    /// Create a new tool call with a fresh ID
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: format!("call_{}", Uuid::now_v7().simple()),
            name: name.into(),
            arguments,
        }
    }
}

/// Tool execution result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the call this result answers
    pub tool_call_id: String,
    pub tool_name: String,
    /// Result value (if successful)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error (if failed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(call: &ToolCall, result: Value) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error result
    pub fn failure(call: &ToolCall, error: ToolError) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            result: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The payload the agent sees: the result, or `{"error": {...}}`
    pub fn observation(&self) -> Value {
        match (&self.error, &self.result) {
            (Some(err), _) => serde_json::json!({
                "error": { "kind": err.kind, "message": err.message }
            }),
            (None, Some(value)) => value.clone(),
            (None, None) => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolErrorKind;
    use serde_json::json;

    #[test]
    fn test_param_type_accepts() {
        assert!(ParamType::String.accepts(&json!("x")));
        assert!(!ParamType::String.accepts(&json!(1)));
        assert!(ParamType::Number.accepts(&json!(1.5)));
        assert!(ParamType::Integer.accepts(&json!(2)));
        assert!(!ParamType::Integer.accepts(&json!(2.5)));
        assert!(ParamType::Any.accepts(&Value::Null));
    }

    #[test]
    fn test_tool_call_ids_are_unique() {
        let a = ToolCall::new("add", json!({}));
        let b = ToolCall::new("add", json!({}));
        assert!(a.id.starts_with("call_"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_observation() {
        let call = ToolCall::new("add", json!({"a": 1, "b": 2}));
        let ok = ToolResult::success(&call, json!({"result": 3}));
        assert_eq!(ok.observation(), json!({"result": 3}));

        let failed = ToolResult::failure(&call, ToolError::execution_failed("boom"));
        assert!(!failed.is_success());
        assert_eq!(
            failed.observation(),
            json!({"error": {"kind": "execution_failed", "message": "boom"}})
        );
        assert_eq!(
            failed.error.as_ref().map(|e| e.kind),
            Some(ToolErrorKind::ExecutionFailed)
        );
    }

    #[test]
    fn test_with_default_makes_optional() {
        let param = ToolParameter::required("filename", ParamType::String).with_default("report.md");
        assert!(!param.required);
        assert_eq!(param.default, Some(json!("report.md")));
    }
}
