// Reasoning capability
//
// The engine never decides anything itself. Each turn it builds a
// ReasoningRequest for the active agent and asks the injected Reasoner for a
// Decision. Real model clients live outside this crate; ScriptedReasoner and
// FnReasoner cover tests and demos.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::agent::HandoffDescriptor;
use crate::config::ModelSettings;
use crate::error::{Result, WorkflowError};
use crate::message::Message;
use crate::state::SharedState;
use crate::tool_types::ToolDescriptor;

/// What the active agent wants to do next
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Finish the run with this answer
    FinalAnswer { text: String },

    /// Call one of the agent's tools
    ToolCall { name: String, arguments: Value },

    /// Pass control to another agent
    Handoff {
        target: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Ask a human and wait for the matching answer
    RequestInput {
        prefix: String,
        correlation_key: String,
    },
}

impl Decision {
    pub fn final_answer(text: impl Into<String>) -> Self {
        Decision::FinalAnswer { text: text.into() }
    }

    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Decision::ToolCall {
            name: name.into(),
            arguments,
        }
    }

    pub fn handoff(target: impl Into<String>) -> Self {
        Decision::Handoff {
            target: target.into(),
            reason: None,
        }
    }

    pub fn handoff_with_reason(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Decision::Handoff {
            target: target.into(),
            reason: Some(reason.into()),
        }
    }

    pub fn request_input(prefix: impl Into<String>, correlation_key: impl Into<String>) -> Self {
        Decision::RequestInput {
            prefix: prefix.into(),
            correlation_key: correlation_key.into(),
        }
    }

    /// Short human-readable rendering, used for AgentOutput content
    pub fn summary(&self) -> String {
        match self {
            Decision::FinalAnswer { text } => text.clone(),
            Decision::ToolCall { name, .. } => format!("Calling tool {name}"),
            Decision::Handoff { target, reason } => match reason {
                Some(reason) => format!("Handing off to {target}: {reason}"),
                None => format!("Handing off to {target}"),
            },
            Decision::RequestInput { prefix, .. } => prefix.clone(),
        }
    }
}

/// Everything the reasoning capability gets to see for one decision
#[derive(Debug, Clone)]
pub struct ReasoningRequest<'a> {
    pub agent: &'a str,
    pub directive: &'a str,
    pub tools: Vec<ToolDescriptor>,
    pub handoffs: Vec<HandoffDescriptor>,
    /// Full run conversation, oldest first
    pub conversation: &'a [Message],
    /// Read-only view of the run's shared state
    pub state: &'a SharedState,
    pub settings: &'a ModelSettings,
    pub turn: usize,
}

impl ReasoningRequest<'_> {
    /// Text of the most recent user message
    pub fn last_user_message(&self) -> Option<&str> {
        self.conversation
            .iter()
            .rev()
            .find(|m| m.role == crate::message::MessageRole::User)
            .and_then(|m| m.text())
    }
}

/// The injected decide step
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn reason(&self, request: ReasoningRequest<'_>) -> Result<Decision>;
}

// ============================================================================
// ScriptedReasoner - Returns predefined decisions per agent
// ============================================================================

/// Reasoner that replays a queue of decisions per agent.
///
/// An agent asked to decide with an empty queue fails the run with
/// `ReasoningFailed`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedReasoner {
    scripts: Arc<RwLock<HashMap<String, VecDeque<Decision>>>>,
    call_log: Arc<RwLock<Vec<String>>>,
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a reasoner from `(agent, decisions)` pairs
    pub fn with_scripts<I, S>(scripts: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<Decision>)>,
        S: Into<String>,
    {
        let scripts = scripts
            .into_iter()
            .map(|(agent, decisions)| (agent.into(), decisions.into_iter().collect()))
            .collect();
        Self {
            scripts: Arc::new(RwLock::new(scripts)),
            call_log: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Queue another decision for `agent`
    pub async fn push(&self, agent: &str, decision: Decision) {
        self.scripts
            .write()
            .await
            .entry(agent.to_string())
            .or_default()
            .push_back(decision);
    }

    /// Agents asked to decide, in call order
    pub async fn calls(&self) -> Vec<String> {
        self.call_log.read().await.clone()
    }

    /// Decisions not yet consumed for `agent`
    pub async fn remaining(&self, agent: &str) -> usize {
        self.scripts
            .read()
            .await
            .get(agent)
            .map(VecDeque::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn reason(&self, request: ReasoningRequest<'_>) -> Result<Decision> {
        self.call_log.write().await.push(request.agent.to_string());

        self.scripts
            .write()
            .await
            .get_mut(request.agent)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| {
                WorkflowError::reasoning(format!(
                    "no scripted decision left for agent '{}'",
                    request.agent
                ))
            })
    }
}

// ============================================================================
// FnReasoner - closure-backed reasoning
// ============================================================================

type ReasonFn = dyn Fn(&ReasoningRequest<'_>) -> Result<Decision> + Send + Sync;

/// Reasoner backed by a synchronous closure
pub struct FnReasoner {
    f: Box<ReasonFn>,
}

impl FnReasoner {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&ReasoningRequest<'_>) -> Result<Decision> + Send + Sync + 'static,
    {
        Self { f: Box::new(f) }
    }
}

impl std::fmt::Debug for FnReasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnReasoner").finish_non_exhaustive()
    }
}

#[async_trait]
impl Reasoner for FnReasoner {
    async fn reason(&self, request: ReasoningRequest<'_>) -> Result<Decision> {
        (self.f)(&request)
    }
}
