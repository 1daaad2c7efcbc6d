// Research command - ResearchAgent -> WriteAgent -> ReviewAgent -> WriteAgent

use agentflow_core::{Agent, Decision, ScriptedReasoner, SharedState, Workflow};
use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;

use super::{print_events, App};
use crate::output::print_field;
use crate::tools;

pub async fn run(app: &App, topic: String, docs_dir: Option<PathBuf>) -> Result<()> {
    let workflow = workflow(app, &topic, docs_dir)?;
    let mut printer = app.printer();

    let mut handle = workflow.run(format!(
        "Write me a report on {topic}. Briefly describe the history, \
         then review it and make sure the feedback is addressed."
    ));
    print_events(&mut handle, &mut printer).await?;
    let output = handle.await_result().await?;

    if app.output.is_text() && !app.quiet {
        let notes = output
            .context
            .state
            .get("research_notes")
            .and_then(|v| v.as_object())
            .map(|m| m.keys().cloned().collect::<Vec<_>>().join(", "))
            .unwrap_or_default();
        print_field("Notes", &notes);
        print_field(
            "Review",
            output
                .context
                .state
                .get("review")
                .and_then(|v| v.as_str())
                .unwrap_or_default(),
        );
        print_field("Turns", &output.context.turn.to_string());
    }
    Ok(())
}

fn initial_state() -> Result<SharedState> {
    Ok(SharedState::from_value(json!({
        "research_notes": {},
        "report_content": "Not written yet.",
        "review": "Review required.",
    }))?)
}

/// Decisions a model would plausibly make for `topic`
fn script(topic: &str) -> ScriptedReasoner {
    let report = format!(
        "# {topic}\n\n## Origins\n\nEarly work on {topic}.\n\n## Growth\n\nHow {topic} spread."
    );
    let revised = format!("{report}\n\n## Outlook\n\nWhere {topic} is heading.");

    ScriptedReasoner::with_scripts([
        (
            "ResearchAgent",
            vec![
                Decision::tool_call(
                    "record_notes",
                    json!({"notes": format!("Key milestones of {topic}."), "notes_title": "milestones"}),
                ),
                Decision::tool_call(
                    "record_notes",
                    json!({"notes": format!("People behind {topic}."), "notes_title": "people"}),
                ),
                Decision::handoff_with_reason("WriteAgent", "research notes are recorded"),
            ],
        ),
        (
            "WriteAgent",
            vec![
                Decision::tool_call("write_report", json!({"report_content": report})),
                Decision::handoff_with_reason("ReviewAgent", "the first draft is ready"),
                Decision::tool_call("write_report", json!({"report_content": revised})),
                Decision::final_answer(format!(
                    "The report on {topic} is written and the review feedback is addressed."
                )),
            ],
        ),
        (
            "ReviewAgent",
            vec![
                Decision::tool_call(
                    "review_report",
                    json!({"review": "Add a section on where things are heading."}),
                ),
                Decision::handoff_with_reason("WriteAgent", "changes requested"),
            ],
        ),
    ])
}

pub(crate) fn workflow(app: &App, topic: &str, docs_dir: Option<PathBuf>) -> Result<Workflow> {
    let research = Agent::builder("ResearchAgent")
        .description("Useful for searching the web for information on a given topic and recording notes on the topic.")
        .directive(
            "You are the ResearchAgent that can search the web for information on a given topic and record notes on the topic. \
             Once notes are recorded and you are satisfied, you should hand off control to the WriteAgent to write a report on the topic.",
        )
        .tool(tools::record_notes())
        .handoff("WriteAgent")
        .build()?;

    let write = Agent::builder("WriteAgent")
        .description("Useful for writing a report on a given topic.")
        .directive(
            "You are the WriteAgent that can write a report on a given topic. \
             Your report should be in a markdown format. Once the report is written, \
             you should get feedback at least once from the ReviewAgent.",
        )
        .tool(tools::write_report(docs_dir))
        .handoff("ReviewAgent")
        .build()?;

    let review = Agent::builder("ReviewAgent")
        .description("Useful for reviewing a report and providing feedback.")
        .directive(
            "You are the ReviewAgent that can review a report and provide feedback. \
             Your feedback should either approve the current report or request changes \
             for the WriteAgent to implement.",
        )
        .tool(tools::review_report())
        .handoff("WriteAgent")
        .build()?;

    Ok(Workflow::builder()
        .agent(research)
        .agent(write)
        .agent(review)
        .root("ResearchAgent")
        .initial_state(initial_state()?)
        .reasoner(script(topic))
        .config(app.config)
        .model_settings(app.settings.clone())
        .build()?)
}
