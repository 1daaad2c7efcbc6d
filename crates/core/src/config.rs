// Workflow and model configuration
//
// WorkflowConfig bounds a run (turn budget, retry budget). ModelSettings is
// handed to the reasoning capability with every request; the engine never
// reads it. Both can be created directly or loaded from the environment.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Result, WorkflowError};

pub const ENV_MAX_TURNS: &str = "AGENTFLOW_MAX_TURNS";
pub const ENV_MAX_TOOL_RETRIES: &str = "AGENTFLOW_MAX_TOOL_RETRIES";
pub const ENV_EMIT_AGENT_OUTPUT: &str = "AGENTFLOW_EMIT_AGENT_OUTPUT";
pub const ENV_LLM_TYPE: &str = "LLM_TYPE";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_MODEL: &str = "AGENTFLOW_MODEL";

// ============================================================================
// WorkflowConfig
// ============================================================================

/// Limits applied to every run of a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Non-terminal transitions allowed per run invocation
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Consecutive rejected tool calls tolerated after the first one
    #[serde(default = "default_max_tool_retries")]
    pub max_tool_retries: usize,

    /// Emit an AgentOutput event for every decision
    #[serde(default)]
    pub emit_agent_output: bool,
}

fn default_max_turns() -> usize {
    20
}

fn default_max_tool_retries() -> usize {
    3
}

impl WorkflowConfig {
    pub fn new(max_turns: usize, max_tool_retries: usize) -> Self {
        Self {
            max_turns,
            max_tool_retries,
            emit_agent_output: false,
        }
    }

    /// Enable or disable AgentOutput events
    pub fn with_agent_output(mut self, enabled: bool) -> Self {
        self.emit_agent_output = enabled;
        self
    }

    /// Load from `AGENTFLOW_*` variables; unset variables keep their defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            max_turns: parse_var(&lookup, ENV_MAX_TURNS)?.unwrap_or_else(default_max_turns),
            max_tool_retries: parse_var(&lookup, ENV_MAX_TOOL_RETRIES)?
                .unwrap_or_else(default_max_tool_retries),
            emit_agent_output: parse_var(&lookup, ENV_EMIT_AGENT_OUTPUT)?.unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }

    /// A zero turn budget can never make progress
    pub fn validate(&self) -> Result<()> {
        if self.max_turns == 0 {
            return Err(WorkflowError::config("max_turns must be at least 1"));
        }
        Ok(())
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self::new(default_max_turns(), default_max_tool_retries())
    }
}

// ============================================================================
// ModelSettings
// ============================================================================

/// Which model backend the reasoning capability should talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Ollama,
    OpenAi,
}

impl ProviderKind {
    /// Model used when none is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "qwen2.5:7b-instruct-q8_0",
            ProviderKind::OpenAi => "gpt-4.1",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(ProviderKind::Ollama),
            "openai" => Ok(ProviderKind::OpenAi),
            other => Err(WorkflowError::config(format!(
                "unknown LLM type '{other}' (expected 'ollama' or 'openai')"
            ))),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Ollama => write!(f, "ollama"),
            ProviderKind::OpenAi => write!(f, "openai"),
        }
    }
}

/// Settings passed to the reasoning capability on every request
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub provider: ProviderKind,
    pub model: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    /// Never serialized
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl ModelSettings {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            temperature: 0.1,
            request_timeout_secs: 360,
            api_key: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Load from `LLM_TYPE`, `OPENAI_API_KEY` and `AGENTFLOW_MODEL`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let provider = match lookup(ENV_LLM_TYPE) {
            Some(value) => value.parse()?,
            None => ProviderKind::Ollama,
        };

        let mut settings = Self::new(provider);
        if let Some(model) = lookup(ENV_MODEL).filter(|m| !m.trim().is_empty()) {
            settings.model = model;
        }
        settings.api_key = lookup(ENV_OPENAI_API_KEY).filter(|k| !k.is_empty());

        if provider == ProviderKind::OpenAi && settings.api_key.is_none() {
            return Err(WorkflowError::config(format!(
                "{ENV_OPENAI_API_KEY} is required when {ENV_LLM_TYPE}=openai"
            )));
        }
        Ok(settings)
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self::new(ProviderKind::Ollama)
    }
}

// Keep the key out of logs
impl std::fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSettings")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| WorkflowError::config(format!("invalid value for {key}: '{raw}'"))),
    }
}
