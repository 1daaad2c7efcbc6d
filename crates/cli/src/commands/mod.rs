// CLI subcommands
//
// Each subcommand wires one demo workflow to a scripted reasoning capability
// and prints its event stream.

pub mod calc;
pub mod confirm;
pub mod research;
pub mod state;

use agentflow_core::{ModelSettings, RunHandle, WorkflowConfig};
use anyhow::{Context, Result};
use futures::StreamExt;

use crate::output::{EventPrinter, OutputFormat};

/// Settings shared by every subcommand
#[derive(Debug, Clone)]
pub struct App {
    pub config: WorkflowConfig,
    pub settings: ModelSettings,
    pub output: OutputFormat,
    pub quiet: bool,
}

impl App {
    pub fn printer(&self) -> EventPrinter {
        EventPrinter::new(self.output, self.quiet)
    }
}

/// Print every event of a non-interactive run until it ends
pub async fn print_events(handle: &mut RunHandle, printer: &mut EventPrinter) -> Result<()> {
    let mut events = handle
        .stream_events()
        .context("event stream already taken")?;
    while let Some(envelope) = events.next().await {
        printer.print(&envelope)?;
    }
    Ok(())
}
