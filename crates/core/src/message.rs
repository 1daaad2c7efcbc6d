// Message types
//
// Message is a DB-agnostic entry in the conversation shared by every agent of
// a run. Handoffs do not reset the conversation: the next agent sees the
// whole history plus a handoff note.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::tool_types::{ToolCall, ToolResult};

/// Message role in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// System note (handoff notices, engine observations)
    System,
    /// User message or human response
    User,
    /// Agent output
    Assistant,
    /// Tool execution result
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// Message content variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MessageContent {
    Text(String),
    ToolResult(Value),
}

impl MessageContent {
    /// Get text content if available
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::ToolResult(_) => None,
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: MessageContent,
    /// Agent that produced (or was addressed by) this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Tool call ID (for tool results)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool calls (for assistant messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn new(role: MessageRole, content: MessageContent) -> Self {
        Self {
            id: Uuid::now_v7(),
            role,
            content,
            agent: None,
            tool_call_id: None,
            tool_calls: None,
            created_at: Utc::now(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, MessageContent::Text(content.into()))
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, MessageContent::Text(content.into()))
    }

    /// Create an assistant message attributed to an agent
    pub fn assistant(agent: &str, content: impl Into<String>) -> Self {
        let mut msg = Self::new(MessageRole::Assistant, MessageContent::Text(content.into()));
        msg.agent = Some(agent.to_string());
        msg
    }

    /// Create an assistant message carrying a tool call
    pub fn assistant_tool_call(agent: &str, tool_call: ToolCall) -> Self {
        let mut msg = Self::assistant(agent, String::new());
        msg.tool_calls = Some(vec![tool_call]);
        msg
    }

    /// Create a tool result message
    pub fn tool_result(agent: &str, result: &ToolResult) -> Self {
        let mut msg = Self::new(
            MessageRole::Tool,
            MessageContent::ToolResult(result.observation()),
        );
        msg.agent = Some(agent.to_string());
        msg.tool_call_id = Some(result.tool_call_id.clone());
        msg
    }

    /// Text content, if any
    pub fn text(&self) -> Option<&str> {
        self.content.as_text()
    }
}
