// Agent definition
//
// An Agent is immutable once built: a name, a directive for the reasoning
// capability, the tools it may call and the agents it may hand off to.
// Handoff targets are checked against the workflow when the workflow is built.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{Result, WorkflowError};
use crate::tool_types::ToolDescriptor;
use crate::tools::{Tool, ToolRegistry};

/// Handoff catalog entry: a target agent and what it is for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffDescriptor {
    pub name: String,
    pub description: String,
}

/// A named participant in a workflow
#[derive(Debug, Clone)]
pub struct Agent {
    name: String,
    description: String,
    directive: String,
    tools: ToolRegistry,
    handoffs: BTreeSet<String>,
}

impl Agent {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Instruction text handed to the reasoning capability
    pub fn directive(&self) -> &str {
        &self.directive
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Names this agent may hand off to
    pub fn handoffs(&self) -> impl Iterator<Item = &str> {
        self.handoffs.iter().map(|s| s.as_str())
    }

    pub fn can_handoff_to(&self, target: &str) -> bool {
        self.handoffs.contains(target)
    }

    pub fn tool_catalog(&self) -> Vec<ToolDescriptor> {
        self.tools.descriptors()
    }
}

/// Builder for [`Agent`]
pub struct AgentBuilder {
    name: String,
    description: String,
    directive: String,
    tools: Vec<Arc<dyn Tool>>,
    handoffs: BTreeSet<String>,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            directive: String::new(),
            tools: Vec::new(),
            handoffs: BTreeSet::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = directive.into();
        self
    }

    pub fn tool(self, tool: impl Tool + 'static) -> Self {
        self.tool_arc(Arc::new(tool))
    }

    /// Share one tool instance between agents
    pub fn tool_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Allow handing off to `target`
    pub fn handoff(mut self, target: impl Into<String>) -> Self {
        self.handoffs.insert(target.into());
        self
    }

    pub fn handoffs<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.handoffs.extend(targets.into_iter().map(Into::into));
        self
    }

    /// Validate and build. Fails on an empty name, a duplicate tool name,
    /// or a handoff to itself.
    pub fn build(self) -> Result<Agent> {
        if self.name.trim().is_empty() {
            return Err(WorkflowError::config("agent name must not be empty"));
        }
        if self.handoffs.contains(&self.name) {
            return Err(WorkflowError::config(format!(
                "agent '{}' cannot hand off to itself",
                self.name
            )));
        }

        let mut registry = ToolRegistry::new();
        for tool in self.tools {
            registry.register_arc(tool).map_err(|e| {
                WorkflowError::config(format!("agent '{}': {}", self.name, config_message(e)))
            })?;
        }

        Ok(Agent {
            name: self.name,
            description: self.description,
            directive: self.directive,
            tools: registry,
            handoffs: self.handoffs,
        })
    }
}

fn config_message(err: WorkflowError) -> String {
    match err {
        WorkflowError::Configuration(message) => message,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::FunctionTool;
    use serde_json::json;

    fn noop(name: &str) -> FunctionTool {
        FunctionTool::builder(name, "does nothing").handler(|_args, _state| Ok(json!(null)))
    }

    #[test]
    fn test_build_agent() {
        let agent = Agent::builder("ResearchAgent")
            .description("Searches the web and records notes")
            .directive("You are the ResearchAgent")
            .tool(noop("record_notes"))
            .handoffs(["WriteAgent"])
            .build()
            .unwrap();

        assert_eq!(agent.name(), "ResearchAgent");
        assert!(agent.tools().has("record_notes"));
        assert!(agent.can_handoff_to("WriteAgent"));
        assert!(!agent.can_handoff_to("ReviewAgent"));
        assert_eq!(agent.tool_catalog().len(), 1);
    }

    #[test]
    fn test_duplicate_tool_rejected() {
        let err = Agent::builder("A")
            .tool(noop("add"))
            .tool(noop("add"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate tool name 'add'"));
    }

    #[test]
    fn test_self_handoff_rejected() {
        assert!(Agent::builder("A").handoff("A").build().is_err());
        assert!(Agent::builder("  ").build().is_err());
    }
}
