// Demo tools used by the CLI workflows

use agentflow_core::{
    FunctionTool, ParamType, Tool, ToolArguments, ToolContext, ToolExecutionResult, ToolParameter,
};
use async_trait::async_trait;
use serde_json::json;
use std::path::PathBuf;

/// Stores notes under `research_notes.<notes_title>`
pub fn record_notes() -> FunctionTool {
    FunctionTool::builder("record_notes", "Useful for recording notes on a given topic.")
        .param(
            ToolParameter::required("notes", ParamType::String)
                .with_description("The notes to record"),
        )
        .param(
            ToolParameter::required("notes_title", ParamType::String)
                .with_description("Title of the notes"),
        )
        .handler(|args, state| {
            let title = args.require_str("notes_title")?.to_string();
            let notes = args.require_str("notes")?.to_string();
            state
                .object_mut("research_notes")
                .map_err(|e| e.to_string())?
                .insert(title, json!(notes));
            Ok(json!("Notes recorded."))
        })
}

/// Stores the report in state and, with a docs directory, on disk
pub fn write_report(docs_dir: Option<PathBuf>) -> FunctionTool {
    FunctionTool::builder(
        "write_report",
        "Useful for writing a report on a given topic. Your input should be a markdown formatted report.",
    )
    .param(ToolParameter::required("report_content", ParamType::String))
    .param(ToolParameter::optional("filename", ParamType::String).with_default("report.md"))
    .handler(move |args, state| {
        let content = args.require_str("report_content")?;
        let filename = args.str("filename").unwrap_or("report.md");
        state.set("report_content", content);

        match &docs_dir {
            Some(dir) => {
                let path = dir.join(filename);
                std::fs::create_dir_all(dir)
                    .and_then(|_| std::fs::write(&path, content))
                    .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
                Ok(json!(format!("Report written to {}.", path.display())))
            }
            None => Ok(json!("Report written.")),
        }
    })
}

pub fn review_report() -> FunctionTool {
    FunctionTool::builder(
        "review_report",
        "Useful for reviewing a report and providing feedback.",
    )
    .param(
        ToolParameter::required("review", ParamType::String)
            .with_description("A detailed markdown formatted review of the report"),
    )
    .handler(|args, state| {
        state.set("review", args.require_str("review")?);
        Ok(json!("Report reviewed."))
    })
}

pub fn add() -> FunctionTool {
    FunctionTool::builder("add", "Add two numbers together")
        .param(ToolParameter::required("a", ParamType::Number))
        .param(ToolParameter::required("b", ParamType::Number))
        .handler(|args, _state| Ok(json!(args.require_f64("a")? + args.require_f64("b")?)))
}

pub fn multiply() -> FunctionTool {
    FunctionTool::builder("multiply", "Multiply two numbers together")
        .param(ToolParameter::required("a", ParamType::Number))
        .param(ToolParameter::required("b", ParamType::Number))
        .handler(|args, _state| Ok(json!(args.require_f64("a")? * args.require_f64("b")?)))
}

pub fn set_name() -> FunctionTool {
    FunctionTool::builder("set_name", "Set the name in the state")
        .param(ToolParameter::required("name", ParamType::String))
        .handler(|args, state| {
            let name = args.require_str("name")?;
            state.set("name", name);
            Ok(json!(format!("Name set to {name}")))
        })
}

/// Asks the human for confirmation; only "yes" performs the task
pub struct ConfirmedTask {
    user_name: String,
}

impl ConfirmedTask {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
        }
    }
}

#[async_trait]
impl Tool for ConfirmedTask {
    fn name(&self) -> &str {
        "dangerous_task"
    }

    fn description(&self) -> &str {
        "A dangerous task that requires human confirmation"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        Vec::new()
    }

    async fn execute(
        &self,
        _arguments: ToolArguments,
        ctx: &mut ToolContext<'_>,
    ) -> ToolExecutionResult {
        let answer = match ctx
            .request_input("Are you sure you want to proceed? ", &self.user_name)
            .await
        {
            Ok(answer) => answer,
            Err(e) => return ToolExecutionResult::internal_error(e),
        };

        if answer.trim().eq_ignore_ascii_case("yes") {
            ToolExecutionResult::success(json!("Dangerous task completed successfully."))
        } else {
            ToolExecutionResult::tool_error("Dangerous task aborted.")
        }
    }
}
