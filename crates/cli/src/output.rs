// Output formatting for CLI

use agentflow_core::{Event, EventEnvelope};
use anyhow::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Self {
        match s {
            "json" => OutputFormat::Json,
            "yaml" => OutputFormat::Yaml,
            _ => OutputFormat::Text,
        }
    }

    pub fn print_value<T: Serialize>(&self, value: &T) -> Result<()> {
        match self {
            OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
            OutputFormat::Yaml => print!("---\n{}", serde_yaml::to_string(value)?),
            OutputFormat::Text => {
                // Text format is handled by each printer
            }
        }
        Ok(())
    }

    pub fn is_text(&self) -> bool {
        matches!(self, OutputFormat::Text)
    }
}

/// Print a simple key-value pair for text output
pub fn print_field(label: &str, value: &str) {
    println!("{:<14} {}", format!("{}:", label), value);
}

/// Renders run events to the console
pub struct EventPrinter {
    format: OutputFormat,
    quiet: bool,
    current_agent: Option<String>,
}

impl EventPrinter {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self {
            format,
            quiet,
            current_agent: None,
        }
    }

    pub fn print(&mut self, envelope: &EventEnvelope) -> Result<()> {
        if !self.format.is_text() {
            return self.format.print_value(envelope);
        }

        match &envelope.event {
            Event::AgentInput { agent, .. } => {
                if self.current_agent.as_deref() != Some(agent.as_str()) && !self.quiet {
                    println!("\n{}", "=".repeat(50));
                    println!("Agent: {agent}");
                    println!("{}", "=".repeat(50));
                }
                self.current_agent = Some(agent.clone());
            }
            Event::AgentOutput { content, .. } => {
                if !self.quiet && !content.is_empty() {
                    println!("{content}");
                }
            }
            Event::ToolCallRequested { tool_call, .. } => {
                if !self.quiet {
                    println!("\nCalling tool: {}", tool_call.name);
                    println!("  With arguments: {}", tool_call.arguments);
                }
            }
            Event::ToolCallResult {
                tool_call, result, ..
            } => {
                if !self.quiet {
                    println!("Tool result ({}):", tool_call.name);
                    println!("  Output: {}", result.observation());
                }
            }
            Event::HandoffRequested { to, reason, .. } => {
                if !self.quiet {
                    match reason {
                        Some(reason) => println!("\nHanding off to {to}: {reason}"),
                        None => println!("\nHanding off to {to}"),
                    }
                }
            }
            Event::InputRequired { prefix, .. } => {
                // Always shown: the user has to answer it
                print!("{prefix}");
                std::io::stdout().flush()?;
            }
            Event::HumanResponse { .. } => {}
            Event::RunCompleted { output, .. } => {
                println!();
                print_field("Final answer", output);
            }
            Event::RunFailed {
                reason, message, ..
            } => {
                eprintln!("\nRun failed ({reason}): {message}");
            }
        }
        Ok(())
    }
}
