// Tool Abstraction
//
// Tools are defined via the `Tool` trait and grouped per agent in a
// `ToolRegistry`. The invoker validates arguments against `parameters()`
// before `execute` ever runs, so tool bodies can rely on required arguments
// being present and well-typed.
//
// Design decisions:
// - Error handling distinguishes between agent-visible errors and internal errors
// - Internal errors are logged but not exposed to the agent
// - Tools receive the run's SharedState by &mut through ToolContext

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Result, WorkflowError};
use crate::interaction::Interaction;
use crate::state::SharedState;
use crate::tool_types::{ToolDescriptor, ToolParameter};

// ============================================================================
// Tool Execution Result - Error Handling Contract
// ============================================================================

/// Result of a tool execution.
///
/// - `Success`: the value becomes the observation the agent sees
/// - `ToolError`: expected failure, message shown to the agent
/// - `InternalError`: unexpected failure, logged and replaced with a generic
///   message before reaching the agent
#[derive(Debug)]
pub enum ToolExecutionResult {
    Success(Value),
    ToolError(String),
    InternalError(String),
}

impl ToolExecutionResult {
    /// Create a successful result
    pub fn success(value: impl Into<Value>) -> Self {
        ToolExecutionResult::Success(value.into())
    }

    /// Create a tool-level error (safe to show to the agent)
    pub fn tool_error(message: impl Into<String>) -> Self {
        ToolExecutionResult::ToolError(message.into())
    }

    /// Create an internal error (hidden from the agent)
    pub fn internal_error(error: impl std::fmt::Display) -> Self {
        ToolExecutionResult::InternalError(error.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolExecutionResult::Success(_))
    }
}

impl From<std::result::Result<Value, String>> for ToolExecutionResult {
    fn from(result: std::result::Result<Value, String>) -> Self {
        match result {
            Ok(value) => ToolExecutionResult::Success(value),
            Err(message) => ToolExecutionResult::ToolError(message),
        }
    }
}

// ============================================================================
// ToolArguments - validated arguments
// ============================================================================

/// Arguments of a tool call after validation and default filling
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments {
    values: Map<String, Value>,
}

impl ToolArguments {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(Value::as_f64)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(Value::as_i64)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.values.get(name).and_then(Value::as_bool)
    }

    /// Required string argument, as a tool error when missing
    pub fn require_str(&self, name: &str) -> std::result::Result<&str, String> {
        self.str(name)
            .ok_or_else(|| format!("missing string argument '{name}'"))
    }

    /// Required numeric argument, as a tool error when missing
    pub fn require_f64(&self, name: &str) -> std::result::Result<f64, String> {
        self.f64(name)
            .ok_or_else(|| format!("missing numeric argument '{name}'"))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }
}

// ============================================================================
// ToolContext - what a tool can touch while it runs
// ============================================================================

/// Runtime context handed to a tool for one invocation
pub struct ToolContext<'a> {
    pub run_id: Uuid,
    /// Agent that requested the call
    pub agent: &'a str,
    pub turn: usize,
    /// The run's shared state, exclusively borrowed for the call
    pub state: &'a mut SharedState,
    interaction: Option<&'a Interaction>,
}

impl<'a> ToolContext<'a> {
    /// Context without a human channel, for hosts and tests driving tools directly
    pub fn new(agent: &'a str, state: &'a mut SharedState) -> Self {
        Self {
            run_id: Uuid::nil(),
            agent,
            turn: 0,
            state,
            interaction: None,
        }
    }

    pub(crate) fn for_run(
        run_id: Uuid,
        agent: &'a str,
        turn: usize,
        state: &'a mut SharedState,
        interaction: &'a Interaction,
    ) -> Self {
        Self {
            run_id,
            agent,
            turn,
            state,
            interaction: Some(interaction),
        }
    }

    /// Ask a human and wait for the answer carrying `correlation_key`.
    ///
    /// Emits InputRequired, then HumanResponse once answered. Returns
    /// `WorkflowError::Cancelled` if the run is cancelled while waiting.
    pub async fn request_input(&self, prefix: &str, correlation_key: &str) -> Result<String> {
        let interaction = self.interaction.ok_or_else(|| {
            WorkflowError::invalid_state("no human channel attached to this tool context")
        })?;
        interaction
            .request_input(self.agent, prefix, correlation_key)
            .await
    }
}

impl std::fmt::Debug for ToolContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("run_id", &self.run_id)
            .field("agent", &self.agent)
            .field("turn", &self.turn)
            .field("interactive", &self.interaction.is_some())
            .finish()
    }
}

// ============================================================================
// Tool Trait - Core Tool Abstraction
// ============================================================================

/// Trait for implementing tools that agents can call.
///
/// # Example
///
/// ```ignore
/// struct RecordNotes;
///
/// #[async_trait]
/// impl Tool for RecordNotes {
///     fn name(&self) -> &str { "record_notes" }
///     fn description(&self) -> &str { "Record notes on a topic" }
///     fn parameters(&self) -> Vec<ToolParameter> {
///         vec![
///             ToolParameter::required("notes", ParamType::String),
///             ToolParameter::required("notes_title", ParamType::String),
///         ]
///     }
///     async fn execute(&self, args: ToolArguments, ctx: &mut ToolContext<'_>) -> ToolExecutionResult {
///         let path = format!("research_notes.{}", args.str("notes_title").unwrap_or_default());
///         match ctx.state.set_path(&path, args.str("notes").unwrap_or_default()) {
///             Ok(()) => ToolExecutionResult::success("Notes recorded."),
///             Err(e) => ToolExecutionResult::internal_error(e),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name within an agent's tool set
    fn name(&self) -> &str;

    /// Description provided to the reasoning capability
    fn description(&self) -> &str;

    /// Ordered parameter schema
    fn parameters(&self) -> Vec<ToolParameter>;

    /// Execute the tool with validated arguments
    async fn execute(&self, arguments: ToolArguments, ctx: &mut ToolContext<'_>)
        -> ToolExecutionResult;

    /// Catalog entry for this tool
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

// ============================================================================
// FunctionTool - closure-backed tools
// ============================================================================

type ToolHandler =
    dyn Fn(&ToolArguments, &mut SharedState) -> std::result::Result<Value, String> + Send + Sync;

/// A tool whose body is a synchronous closure over arguments and state.
///
/// ```ignore
/// let add = FunctionTool::builder("add", "Add two numbers")
///     .param(ToolParameter::required("a", ParamType::Number))
///     .param(ToolParameter::required("b", ParamType::Number))
///     .handler(|args, _state| Ok(json!(args.require_f64("a")? + args.require_f64("b")?)));
/// ```
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: Vec<ToolParameter>,
    handler: Arc<ToolHandler>,
}

impl FunctionTool {
    pub fn builder(name: impl Into<String>, description: impl Into<String>) -> FunctionToolBuilder {
        FunctionToolBuilder {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        self.parameters.clone()
    }

    async fn execute(
        &self,
        arguments: ToolArguments,
        ctx: &mut ToolContext<'_>,
    ) -> ToolExecutionResult {
        (self.handler)(&arguments, ctx.state).into()
    }
}

/// Builder for [`FunctionTool`]; `handler` finishes it
pub struct FunctionToolBuilder {
    name: String,
    description: String,
    parameters: Vec<ToolParameter>,
}

impl FunctionToolBuilder {
    /// Append a parameter to the schema
    pub fn param(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Attach the body and build the tool
    pub fn handler<F>(self, handler: F) -> FunctionTool
    where
        F: Fn(&ToolArguments, &mut SharedState) -> std::result::Result<Value, String>
            + Send
            + Sync
            + 'static,
    {
        FunctionTool {
            name: self.name,
            description: self.description,
            parameters: self.parameters,
            handler: Arc::new(handler),
        }
    }
}

// ============================================================================
// ToolRegistry - Collection of Tools
// ============================================================================

/// Name to tool map. Names are unique; iteration is in name order.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A second tool with the same name is a configuration error.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<()> {
        self.register_arc(Arc::new(tool))
    }

    /// Register an Arc-wrapped tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if name.is_empty() {
            return Err(WorkflowError::config("tool name must not be empty"));
        }
        if self.tools.contains_key(&name) {
            return Err(WorkflowError::config(format!(
                "duplicate tool name '{name}'"
            )));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Catalog entries for every registered tool
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor()).collect()
    }

    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tool_names())
            .finish()
    }
}

/// Fluent builder for [`ToolRegistry`]. The first registration error is
/// reported by `build`.
#[derive(Default)]
pub struct ToolRegistryBuilder {
    registry: ToolRegistry,
    error: Option<WorkflowError>,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool(self, tool: impl Tool + 'static) -> Self {
        self.tool_arc(Arc::new(tool))
    }

    pub fn tool_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.registry.register_arc(tool) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn build(self) -> Result<ToolRegistry> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.registry),
        }
    }
}
