// Tool invocation
//
// The invoker is the only path from a ToolCall to a tool body:
// validate arguments, run the body, fold every outcome into a ToolResult.
// Nothing here is transactional; state mutations made before a failure stay.

use futures::FutureExt;
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, warn};

use crate::error::ToolError;
use crate::tool_types::{ToolCall, ToolParameter, ToolResult};
use crate::tools::{Tool, ToolArguments, ToolContext, ToolExecutionResult};

/// Message returned to the agent in place of internal error details
const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred while executing the tool";

/// Validates and executes tool calls
#[derive(Debug, Default, Clone, Copy)]
pub struct ToolInvoker;

impl ToolInvoker {
    /// Invoke `tool` for `call`. Never fails: every outcome is a ToolResult.
    pub async fn invoke(tool: &dyn Tool, ctx: &mut ToolContext<'_>, call: &ToolCall) -> ToolResult {
        let arguments = match validate_arguments(&tool.parameters(), &call.arguments) {
            Ok(arguments) => arguments,
            Err(err) => {
                warn!(
                    tool_name = %call.name,
                    tool_call_id = %call.id,
                    error = %err.message,
                    "Rejected tool call arguments"
                );
                return ToolResult::failure(call, err);
            }
        };

        debug!(tool_name = %call.name, tool_call_id = %call.id, "Executing tool");

        let outcome = AssertUnwindSafe(tool.execute(arguments, ctx))
            .catch_unwind()
            .await;

        match outcome {
            Ok(ToolExecutionResult::Success(value)) => ToolResult::success(call, value),
            Ok(ToolExecutionResult::ToolError(message)) => {
                ToolResult::failure(call, ToolError::execution_failed(message))
            }
            Ok(ToolExecutionResult::InternalError(message)) => {
                error!(
                    tool_name = %call.name,
                    tool_call_id = %call.id,
                    error = %message,
                    "Tool internal error (details hidden from agent)"
                );
                ToolResult::failure(call, ToolError::execution_failed(INTERNAL_ERROR_MESSAGE))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    tool_name = %call.name,
                    tool_call_id = %call.id,
                    panic = %message,
                    "Tool panicked"
                );
                ToolResult::failure(
                    call,
                    ToolError::execution_failed(format!("tool panicked: {message}")),
                )
            }
        }
    }
}

/// Check `arguments` against the declared schema and fill defaults.
pub fn validate_arguments(
    parameters: &[ToolParameter],
    arguments: &Value,
) -> Result<ToolArguments, ToolError> {
    let mut values: Map<String, Value> = match arguments {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            return Err(ToolError::invalid_arguments(format!(
                "arguments must be an object, got {other}"
            )))
        }
    };

    if let Some(unknown) = values
        .keys()
        .find(|key| !parameters.iter().any(|p| &p.name == *key))
    {
        return Err(ToolError::invalid_arguments(format!(
            "unexpected argument '{unknown}'"
        )));
    }

    for param in parameters {
        match values.get(&param.name) {
            None | Some(Value::Null) if param.required => {
                return Err(ToolError::invalid_arguments(format!(
                    "missing required argument '{}'",
                    param.name
                )));
            }
            None | Some(Value::Null) => {
                if let Some(default) = &param.default {
                    values.insert(param.name.clone(), default.clone());
                }
            }
            Some(value) if !param.param_type.accepts(value) => {
                return Err(ToolError::invalid_arguments(format!(
                    "argument '{}' must be of type {}",
                    param.name, param.param_type
                )));
            }
            Some(_) => {}
        }
    }

    Ok(ToolArguments::new(values))
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
