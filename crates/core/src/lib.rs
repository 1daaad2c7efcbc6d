// Multi-agent handoff workflow engine
//
// This crate runs a set of named agents over one shared conversation and
// shared state. Each turn the active agent (through an injected reasoning
// capability) answers, calls one of its tools, hands off to another agent,
// or asks a human. Progress is published as an ordered event stream.
//
// Key design decisions:
// - Model-agnostic: decisions come from the Reasoner trait
// - Tools are defined via a Tool trait; closures via FunctionTool
// - Tool errors are observations for the agent, workflow errors end the run
// - Events are a closed enum delivered through the EventEmitter trait
// - RunContext persists as a JSON document for multi-message sessions

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod interaction;
pub mod invoker;
pub mod message;
pub mod reasoning;
pub mod state;
pub mod tool_types;
pub mod tools;
pub mod workflow;

mod engine;

// In-memory implementations for examples and testing
pub mod memory;

// Re-exports for convenience
pub use agent::{Agent, AgentBuilder, HandoffDescriptor};
pub use config::{ModelSettings, ProviderKind, WorkflowConfig};
pub use context::{RunContext, RunDocument, RunStatus};
pub use error::{FailureReason, Result, ToolError, ToolErrorKind, WorkflowError};
pub use events::{
    ChannelEventEmitter, Event, EventEmitter, EventEnvelope, EventKind, EventStream,
    NoopEventEmitter,
};
pub use interaction::{HumanInbox, HumanResponse, Responder};
pub use invoker::ToolInvoker;
pub use memory::InMemoryEventEmitter;
pub use message::{Message, MessageContent, MessageRole};
pub use reasoning::{Decision, FnReasoner, Reasoner, ReasoningRequest, ScriptedReasoner};
pub use state::SharedState;
pub use tool_types::{ParamType, ToolCall, ToolDescriptor, ToolParameter, ToolResult};
pub use tools::{
    FunctionTool, FunctionToolBuilder, Tool, ToolArguments, ToolContext, ToolExecutionResult,
    ToolRegistry, ToolRegistryBuilder,
};
pub use workflow::{RunHandle, RunOutput, Workflow, WorkflowBuilder};
