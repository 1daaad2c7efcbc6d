// Confirm command - a tool that pauses the run for a human "yes"

use agentflow_core::{
    Agent, Decision, Event, FnReasoner, HumanResponse, MessageContent, MessageRole, Workflow,
};
use anyhow::{Context, Result};
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use super::App;
use crate::tools::ConfirmedTask;

pub async fn run(app: &App, message: String, user: String) -> Result<()> {
    let workflow = workflow(app, &user)?;
    let mut printer = app.printer();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    let mut handle = workflow.run(message);
    let mut events = handle
        .stream_events()
        .context("event stream already taken")?;

    while let Some(envelope) = events.next().await {
        printer.print(&envelope)?;

        if let Event::InputRequired {
            correlation_key, ..
        } = &envelope.event
        {
            match stdin.next_line().await? {
                Some(line) => handle.respond(HumanResponse::new(correlation_key.clone(), line))?,
                None => {
                    warn!(correlation_key = %correlation_key, "stdin closed while input was pending");
                    handle.cancel();
                }
            }
        }
    }

    let ctx = handle.await_context().await?;
    if let Some(reason) = ctx.failure() {
        anyhow::bail!("run {} failed: {reason}", ctx.run_id);
    }
    Ok(())
}

/// What the agent says about the outcome of the task
fn describe(observation: &Value) -> String {
    match observation {
        Value::String(text) => text.clone(),
        other => other
            .pointer("/error/message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}

pub(crate) fn workflow(app: &App, user: &str) -> Result<Workflow> {
    let agent = Agent::builder("TaskAgent")
        .description("Performs tasks that need a human's approval")
        .directive("Call dangerous_task when asked to, then report what happened.")
        .tool(ConfirmedTask::new(user))
        .build()?;

    let reasoner = FnReasoner::new(|req| {
        let observation = req.conversation.last().and_then(|m| match (&m.role, &m.content) {
            (MessageRole::Tool, MessageContent::ToolResult(value)) => Some(value),
            _ => None,
        });
        Ok(match observation {
            Some(value) => Decision::final_answer(describe(value)),
            None => Decision::tool_call("dangerous_task", json!({})),
        })
    });

    Ok(Workflow::builder()
        .agent(agent)
        .root("TaskAgent")
        .reasoner(reasoner)
        .config(app.config)
        .model_settings(app.settings.clone())
        .build()?)
}
