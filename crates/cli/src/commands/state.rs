// State command - state persists across messages and through a checkpoint file

use agentflow_core::{
    Agent, Decision, FnReasoner, MessageRole, ReasoningRequest, RunContext, Workflow,
};
use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;
use tracing::info;

use super::{print_events, App};
use crate::output::print_field;
use crate::tools;

pub async fn run(app: &App, name: String, checkpoint: &Path) -> Result<()> {
    let workflow = workflow(app)?;
    let mut printer = app.printer();

    let mut handle = workflow.run(format!("Hi! My name is {name}."));
    print_events(&mut handle, &mut printer).await?;
    let ctx = handle.await_context().await?;

    let mut handle = workflow.resume(ctx, "What is my name?");
    print_events(&mut handle, &mut printer).await?;
    let ctx = handle.await_context().await?;

    // Checkpoint, then continue from the file as a new process would
    let document = ctx.to_document()?;
    tokio::fs::write(checkpoint, &document)
        .await
        .with_context(|| format!("failed to write {}", checkpoint.display()))?;
    info!(path = %checkpoint.display(), run_id = %ctx.run_id, "Checkpoint written");

    let document = tokio::fs::read_to_string(checkpoint)
        .await
        .with_context(|| format!("failed to read {}", checkpoint.display()))?;
    let restored = RunContext::from_document(&document)?;

    let mut handle = workflow.resume(restored, "Do you still remember my name?");
    print_events(&mut handle, &mut printer).await?;
    let output = handle.await_result().await?;

    if app.output.is_text() && !app.quiet {
        print_field(
            "Stored name",
            output
                .context
                .state
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("unset"),
        );
        print_field("Checkpoint", &checkpoint.display().to_string());
    }
    Ok(())
}

/// Pull a name out of "... my name is <name> ..."
fn extract_name(message: &str) -> Option<String> {
    let lower = message.to_ascii_lowercase();
    let start = lower.find("my name is ")? + "my name is ".len();
    let name: String = message[start..]
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '-' || *c == '\'')
        .collect();
    (!name.is_empty()).then_some(name)
}

fn decide(req: &ReasoningRequest<'_>) -> Decision {
    let stored = req.state.get("name").and_then(|v| v.as_str());

    if req
        .conversation
        .last()
        .is_some_and(|m| m.role == MessageRole::Tool)
    {
        return Decision::final_answer(format!(
            "Your name has been set to {}.",
            stored.unwrap_or("unset")
        ));
    }

    if let Some(name) = req.last_user_message().and_then(extract_name) {
        return Decision::tool_call("set_name", json!({ "name": name }));
    }

    match stored {
        Some(name) => Decision::final_answer(format!("Your name is {name}.")),
        None => Decision::final_answer("I don't know your name yet."),
    }
}

pub(crate) fn workflow(app: &App) -> Result<Workflow> {
    let agent = Agent::builder("NameAgent")
        .description("Remembers the user's name")
        .directive("Use the set_name tool whenever the user tells you their name.")
        .tool(tools::set_name())
        .build()?;

    Ok(Workflow::builder()
        .agent(agent)
        .root("NameAgent")
        .reasoner(FnReasoner::new(|req| Ok(decide(req))))
        .config(app.config)
        .model_settings(app.settings.clone())
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use agentflow_core::{ModelSettings, WorkflowConfig};

    #[test]
    fn test_extract_name() {
        assert_eq!(extract_name("Hi! My name is Logan."), Some("Logan".into()));
        assert_eq!(extract_name("my name is o'brien"), Some("o'brien".into()));
        assert_eq!(extract_name("What is my name?"), None);
        assert_eq!(extract_name("my name is "), None);
    }

    #[tokio::test]
    async fn test_name_survives_checkpoint() {
        let app = App {
            config: WorkflowConfig::default(),
            settings: ModelSettings::default(),
            output: OutputFormat::Json,
            quiet: true,
        };
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = dir.path().join("run_context.json");

        run(&app, "Logan".into(), &checkpoint).await.unwrap();

        let restored =
            RunContext::from_document(&std::fs::read_to_string(&checkpoint).unwrap()).unwrap();
        assert_eq!(restored.state.get("name"), Some(&json!("Logan")));
        assert_eq!(restored.output(), Some("Your name is Logan."));
    }
}
