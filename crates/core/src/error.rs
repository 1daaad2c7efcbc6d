// Error types for the workflow engine
//
// Two tiers:
// - ToolError: recoverable, returned to the active agent as an observation
// - WorkflowError: fatal for a run (or a construction/configuration problem)

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for workflow operations
pub type Result<T> = std::result::Result<T, WorkflowError>;

// ============================================================================
// Tool-level errors (non-fatal)
// ============================================================================

/// Kind of a tool-level error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Arguments did not match the declared parameter schema; the body never ran
    InvalidArguments,
    /// The tool body returned an error or panicked
    ExecutionFailed,
    /// The agent asked for a tool outside its tool set
    ToolNotAllowed,
}

impl std::fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolErrorKind::InvalidArguments => write!(f, "invalid_arguments"),
            ToolErrorKind::ExecutionFailed => write!(f, "execution_failed"),
            ToolErrorKind::ToolNotAllowed => write!(f, "tool_not_allowed"),
        }
    }
}

/// A tool-level error surfaced to the agent as a tool result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self {
            kind: ToolErrorKind::InvalidArguments,
            message: message.into(),
        }
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self {
            kind: ToolErrorKind::ExecutionFailed,
            message: message.into(),
        }
    }

    pub fn not_allowed(message: impl Into<String>) -> Self {
        Self {
            kind: ToolErrorKind::ToolNotAllowed,
            message: message.into(),
        }
    }
}

// ============================================================================
// Run failure reasons (fatal)
// ============================================================================

/// Why a run ended in the `Failed` state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InvalidHandoff,
    AgentStuck,
    MaxTurnsExceeded,
    Cancelled,
    ReasoningFailed,
    Internal,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::InvalidHandoff => write!(f, "invalid_handoff"),
            FailureReason::AgentStuck => write!(f, "agent_stuck"),
            FailureReason::MaxTurnsExceeded => write!(f, "max_turns_exceeded"),
            FailureReason::Cancelled => write!(f, "cancelled"),
            FailureReason::ReasoningFailed => write!(f, "reasoning_failed"),
            FailureReason::Internal => write!(f, "internal"),
        }
    }
}

// ============================================================================
// Workflow errors
// ============================================================================

/// Errors that can occur while building or running a workflow
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Handoff target outside the active agent's handoff set
    #[error("Agent '{from}' is not allowed to hand off to '{to}'")]
    InvalidHandoff { from: String, to: String },

    /// Too many consecutive rejected decisions in one turn
    #[error("Agent '{agent}' is stuck after {attempts} rejected attempts")]
    AgentStuck { agent: String, attempts: usize },

    /// Turn budget for the run exhausted
    #[error("Max turns ({0}) exceeded")]
    MaxTurnsExceeded(usize),

    /// Run was cancelled by the caller
    #[error("Run cancelled")]
    Cancelled,

    /// The injected reasoning capability failed
    #[error("Reasoning failed: {0}")]
    ReasoningFailed(String),

    /// Agent name not present in the workflow
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// Invalid workflow, agent or tool configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Snapshot or document (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A run was resumed or driven in a state that does not allow it
    #[error("Invalid run state: {0}")]
    InvalidState(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl WorkflowError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        WorkflowError::Configuration(msg.into())
    }

    /// Create a reasoning error
    pub fn reasoning(msg: impl Into<String>) -> Self {
        WorkflowError::ReasoningFailed(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        WorkflowError::InvalidState(msg.into())
    }

    /// Map this error onto the reason recorded in a failed run
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            WorkflowError::InvalidHandoff { .. } => FailureReason::InvalidHandoff,
            WorkflowError::AgentStuck { .. } => FailureReason::AgentStuck,
            WorkflowError::MaxTurnsExceeded(_) => FailureReason::MaxTurnsExceeded,
            WorkflowError::Cancelled => FailureReason::Cancelled,
            WorkflowError::ReasoningFailed(_) => FailureReason::ReasoningFailed,
            WorkflowError::UnknownAgent(_)
            | WorkflowError::Configuration(_)
            | WorkflowError::Serialization(_)
            | WorkflowError::InvalidState(_)
            | WorkflowError::Internal(_) => FailureReason::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_mapping() {
        let err = WorkflowError::InvalidHandoff {
            from: "A".into(),
            to: "C".into(),
        };
        assert_eq!(err.failure_reason(), FailureReason::InvalidHandoff);
        assert_eq!(
            WorkflowError::MaxTurnsExceeded(3).failure_reason(),
            FailureReason::MaxTurnsExceeded
        );
        assert_eq!(
            WorkflowError::config("bad").failure_reason(),
            FailureReason::Internal
        );
    }

    #[test]
    fn test_tool_error_display() {
        let err = ToolError::invalid_arguments("missing required argument 'notes'");
        assert_eq!(
            err.to_string(),
            "invalid_arguments: missing required argument 'notes'"
        );
    }

    #[test]
    fn test_failure_reason_serialization() {
        let json = serde_json::to_string(&FailureReason::MaxTurnsExceeded).unwrap();
        assert_eq!(json, "\"max_turns_exceeded\"");
    }
}
