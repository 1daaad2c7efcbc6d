// Run context
//
// RunContext is everything a run owns: the active agent, its shared state,
// the turn counter, the status machine position and the conversation.
// It persists as a self-contained JSON document so a host can checkpoint a
// run between messages and resume it later, possibly in another process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FailureReason, Result, WorkflowError};
use crate::message::Message;
use crate::state::SharedState;

/// Position of a run in the workflow state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// The agent is about to decide
    Active { agent: String },
    /// A tool call is executing
    AwaitingToolResult { agent: String, tool_call_id: String },
    /// Waiting for a human answer
    AwaitingHuman { agent: String, correlation_key: String },
    /// Terminal: finished with an answer
    Completed { output: String },
    /// Terminal: failed
    Failed {
        reason: FailureReason,
        message: String,
    },
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed { .. } | RunStatus::Failed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            RunStatus::Active { .. } => "active",
            RunStatus::AwaitingToolResult { .. } => "awaiting_tool_result",
            RunStatus::AwaitingHuman { .. } => "awaiting_human",
            RunStatus::Completed { .. } => "completed",
            RunStatus::Failed { .. } => "failed",
        }
    }
}

/// Per-run execution context
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    pub run_id: Uuid,
    pub active_agent: String,
    pub state: SharedState,
    /// Non-terminal transitions taken over the whole life of the run
    pub turn: usize,
    pub status: RunStatus,
    pub conversation: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunContext {
    /// Fresh context positioned on `agent`
    pub fn new(agent: impl Into<String>, state: SharedState) -> Self {
        let agent = agent.into();
        let now = Utc::now();
        Self {
            run_id: Uuid::now_v7(),
            status: RunStatus::Active {
                agent: agent.clone(),
            },
            active_agent: agent,
            state,
            turn: 0,
            conversation: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Final answer, if the run completed
    pub fn output(&self) -> Option<&str> {
        match &self.status {
            RunStatus::Completed { output } => Some(output),
            _ => None,
        }
    }

    /// Failure reason, if the run failed
    pub fn failure(&self) -> Option<FailureReason> {
        match &self.status {
            RunStatus::Failed { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub(crate) fn set_status(&mut self, status: RunStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub(crate) fn push_message(&mut self, message: Message) {
        self.conversation.push(message);
        self.updated_at = Utc::now();
    }

    /// Prepare a persisted or finished context for another invocation.
    ///
    /// Completed runs reactivate the agent that answered. Runs checkpointed
    /// mid-turn restart that turn's decision. Failed runs cannot be resumed.
    pub(crate) fn reactivate(&mut self) -> Result<()> {
        match &self.status {
            RunStatus::Failed { reason, .. } => Err(WorkflowError::invalid_state(format!(
                "run {} failed ({reason}) and cannot be resumed",
                self.run_id
            ))),
            _ => {
                let agent = self.active_agent.clone();
                self.set_status(RunStatus::Active { agent });
                Ok(())
            }
        }
    }

    /// Serialize to a self-contained JSON document
    pub fn to_document(&self) -> Result<String> {
        let document = RunDocument {
            run_id: self.run_id,
            active_agent: self.active_agent.clone(),
            turn: self.turn,
            state: self.state.snapshot()?,
            status: self.status.clone(),
            terminal: self.is_terminal(),
            conversation: self.conversation.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Rebuild a context from [`RunContext::to_document`] output
    pub fn from_document(document: &str) -> Result<Self> {
        let document: RunDocument = serde_json::from_str(document)?;
        if document.terminal != document.status.is_terminal() {
            return Err(WorkflowError::invalid_state(format!(
                "document marks run {} terminal={} but status is {}",
                document.run_id,
                document.terminal,
                document.status.name()
            )));
        }
        Ok(Self {
            run_id: document.run_id,
            active_agent: document.active_agent,
            state: SharedState::restore(&document.state)?,
            turn: document.turn,
            status: document.status,
            conversation: document.conversation,
            created_at: document.created_at,
            updated_at: document.updated_at,
        })
    }
}

/// Persisted form of a [`RunContext`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDocument {
    pub run_id: Uuid,
    pub active_agent: String,
    pub turn: usize,
    /// SharedState snapshot text
    pub state: String,
    pub status: RunStatus,
    pub terminal: bool,
    pub conversation: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
