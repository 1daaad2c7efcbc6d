// Calc command - single calculator agent computing (a + b) * c with tools

use agentflow_core::{Agent, Decision, FnReasoner, MessageContent, MessageRole, Workflow};
use anyhow::Result;
use serde_json::{json, Value};

use super::{print_events, App};

pub async fn run(app: &App, a: f64, b: f64, c: f64) -> Result<()> {
    let workflow = workflow(app, a, b, c)?;
    let mut printer = app.printer();

    let mut handle = workflow.run(format!("What is ({a} + {b}) * {c}?"));
    print_events(&mut handle, &mut printer).await?;
    handle.await_result().await?;
    Ok(())
}

/// Tool results produced since the latest user message, newest first
fn recent_results(conversation: &[agentflow_core::Message]) -> Vec<&Value> {
    conversation
        .iter()
        .rev()
        .take_while(|m| m.role != MessageRole::User)
        .filter_map(|m| match &m.content {
            MessageContent::ToolResult(value) => Some(value),
            MessageContent::Text(_) => None,
        })
        .collect()
}

pub(crate) fn workflow(app: &App, a: f64, b: f64, c: f64) -> Result<Workflow> {
    let agent = Agent::builder("Calculator")
        .description("Performs basic arithmetic operations")
        .directive("You are a calculator assistant. Use your tools for any math operation.")
        .tool(crate::tools::add())
        .tool(crate::tools::multiply())
        .build()?;

    let reasoner = FnReasoner::new(move |req| {
        let results = recent_results(req.conversation);
        let decision = match results.as_slice() {
            [] => Decision::tool_call("add", json!({"a": a, "b": b})),
            [sum] if sum.get("error").is_none() => {
                Decision::tool_call("multiply", json!({"a": sum, "b": c}))
            }
            [latest, ..] => Decision::final_answer(format!(
                "The result of ({a} + {b}) * {c} is {latest}."
            )),
        };
        Ok(decision)
    });

    Ok(Workflow::builder()
        .agent(agent)
        .root("Calculator")
        .reasoner(reasoner)
        .config(app.config)
        .model_settings(app.settings.clone())
        .build()?)
}
