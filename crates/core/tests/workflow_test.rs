// Integration tests for the workflow engine
//
// These drive complete runs inline with a ScriptedReasoner and an
// InMemoryEventEmitter, then check the final context and the event sequence.
//
// Run with: cargo test -p agentflow-core --test workflow_test

use agentflow_core::{
    Agent, Decision, Event, EventKind, FailureReason, FnReasoner, FunctionTool,
    InMemoryEventEmitter, MessageRole, ParamType, Reasoner, ReasoningRequest, RunStatus,
    ScriptedReasoner, SharedState, Tool, ToolArguments, ToolContext, ToolErrorKind,
    ToolExecutionResult, ToolParameter, Workflow, WorkflowConfig, WorkflowError,
};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

// =============================================================================
// Fixtures
// =============================================================================

fn record_notes_tool(calls: Arc<AtomicUsize>) -> FunctionTool {
    FunctionTool::builder("record_notes", "Record notes on a given topic")
        .param(ToolParameter::required("notes", ParamType::String))
        .param(ToolParameter::required("notes_title", ParamType::String))
        .handler(move |args, state| {
            calls.fetch_add(1, Ordering::SeqCst);
            let title = args.require_str("notes_title")?.to_string();
            let notes = args.require_str("notes")?.to_string();
            state
                .object_mut("research_notes")
                .map_err(|e| e.to_string())?
                .insert(title, json!(notes));
            Ok(json!("Notes recorded."))
        })
}

fn write_report_tool() -> FunctionTool {
    FunctionTool::builder("write_report", "Write a report on a given topic")
        .param(ToolParameter::required("report_content", ParamType::String))
        .param(ToolParameter::optional("filename", ParamType::String).with_default("report.md"))
        .handler(|args, state| {
            state.set("report_content", args.require_str("report_content")?);
            Ok(json!(format!(
                "Report written to {}",
                args.str("filename").unwrap_or_default()
            )))
        })
}

fn research_state() -> SharedState {
    SharedState::from_value(json!({
        "research_notes": {},
        "report_content": "Not written yet.",
        "review": "Review required."
    }))
    .unwrap()
}

fn research_workflow(reasoner: ScriptedReasoner, notes_calls: Arc<AtomicUsize>) -> Workflow {
    let research = Agent::builder("ResearchAgent")
        .description("Useful for searching the web and recording notes")
        .directive("You are the ResearchAgent.")
        .tool(record_notes_tool(notes_calls))
        .handoff("WriteAgent")
        .build()
        .unwrap();
    let write = Agent::builder("WriteAgent")
        .description("Useful for writing a report on a given topic")
        .directive("You are the WriteAgent.")
        .tool(write_report_tool())
        .handoff("ReviewAgent")
        .build()
        .unwrap();
    let review = Agent::builder("ReviewAgent")
        .description("Useful for reviewing a report and providing feedback")
        .directive("You are the ReviewAgent.")
        .handoff("WriteAgent")
        .build()
        .unwrap();

    Workflow::builder()
        .agent(research)
        .agent(write)
        .agent(review)
        .root("ResearchAgent")
        .initial_state(research_state())
        .reasoner(reasoner)
        .config(WorkflowConfig::new(10, 3))
        .build()
        .unwrap()
}

fn ping_pong_workflow(reasoner: ScriptedReasoner, max_turns: usize) -> Workflow {
    Workflow::builder()
        .agent(Agent::builder("A").handoff("B").build().unwrap())
        .agent(Agent::builder("B").handoff("A").build().unwrap())
        .root("A")
        .reasoner(reasoner)
        .config(WorkflowConfig::new(max_turns, 3))
        .build()
        .unwrap()
}

// =============================================================================
// Handoffs
// =============================================================================

#[tokio::test]
async fn test_handoff_then_final_answer() {
    let reasoner = ScriptedReasoner::with_scripts([
        ("A", vec![Decision::handoff("B")]),
        ("B", vec![Decision::final_answer("done")]),
    ]);
    let workflow = ping_pong_workflow(reasoner, 5);
    let emitter = InMemoryEventEmitter::new();

    let mut ctx = workflow.new_context();
    let output = workflow
        .execute(&mut ctx, Some("start".into()), Arc::new(emitter.clone()))
        .await
        .unwrap();

    assert_eq!(output, "done");
    assert_eq!(ctx.status, RunStatus::Completed { output: "done".into() });
    assert_eq!(ctx.active_agent, "B");
    assert_eq!(ctx.turn, 1);
    assert_eq!(emitter.count(EventKind::HandoffRequested).await, 1);
}

#[tokio::test]
async fn test_invalid_handoff_fails_without_running_tools() {
    let calls = Arc::new(AtomicUsize::new(0));
    let reasoner = ScriptedReasoner::with_scripts([(
        "ResearchAgent",
        vec![Decision::handoff("ReviewAgent")],
    )]);
    let workflow = research_workflow(reasoner, calls.clone());
    let emitter = InMemoryEventEmitter::new();

    let mut ctx = workflow.new_context();
    let err = workflow
        .execute(&mut ctx, Some("Write a report".into()), Arc::new(emitter.clone()))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::InvalidHandoff { ref to, .. } if to == "ReviewAgent"));
    assert_eq!(ctx.failure(), Some(FailureReason::InvalidHandoff));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(ctx.active_agent, "ResearchAgent");

    let kinds = emitter.kinds().await;
    assert_eq!(kinds, vec![EventKind::AgentInput, EventKind::RunFailed]);
}

#[tokio::test]
async fn test_max_turns_exceeded_after_exactly_max_turns() {
    let reasoner = ScriptedReasoner::with_scripts([
        ("A", vec![Decision::handoff("B"), Decision::handoff("B")]),
        ("B", vec![Decision::handoff("A"), Decision::handoff("A")]),
    ]);
    let workflow = ping_pong_workflow(reasoner, 3);
    let emitter = InMemoryEventEmitter::new();

    let mut ctx = workflow.new_context();
    let err = workflow
        .execute(&mut ctx, Some("go".into()), Arc::new(emitter.clone()))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::MaxTurnsExceeded(3)));
    assert_eq!(ctx.turn, 3);
    assert_eq!(ctx.failure(), Some(FailureReason::MaxTurnsExceeded));
    assert_eq!(emitter.count(EventKind::HandoffRequested).await, 3);
    assert_eq!(emitter.count(EventKind::RunFailed).await, 1);
}

#[tokio::test]
async fn test_turn_counter_increments_per_transition() {
    let calls = Arc::new(AtomicUsize::new(0));
    let reasoner = ScriptedReasoner::with_scripts([
        (
            "ResearchAgent",
            vec![
                Decision::tool_call("record_notes", json!({"notes": "a", "notes_title": "one"})),
                Decision::tool_call("record_notes", json!({"notes": "b", "notes_title": "two"})),
                Decision::handoff_with_reason("WriteAgent", "notes are ready"),
            ],
        ),
        ("WriteAgent", vec![Decision::final_answer("report")]),
    ]);
    let workflow = research_workflow(reasoner, calls.clone());

    let mut ctx = workflow.new_context();
    workflow
        .execute(&mut ctx, Some("research".into()), Arc::new(InMemoryEventEmitter::new()))
        .await
        .unwrap();

    // two tool calls + one handoff; the final answer is terminal
    assert_eq!(ctx.turn, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(ctx
        .conversation
        .iter()
        .any(|m| m.text() == Some("Agent WriteAgent is now handling the request: notes are ready")));
}

// =============================================================================
// Research / Write scenario
// =============================================================================

#[tokio::test]
async fn test_research_write_event_sequence() {
    let calls = Arc::new(AtomicUsize::new(0));
    let reasoner = ScriptedReasoner::with_scripts([
        (
            "ResearchAgent",
            vec![
                Decision::tool_call("record_notes", json!({"notes": "y", "notes_title": "x"})),
                Decision::handoff("WriteAgent"),
            ],
        ),
        ("WriteAgent", vec![Decision::final_answer("done")]),
    ]);
    let workflow = research_workflow(reasoner, calls);
    let emitter = InMemoryEventEmitter::new();

    let mut ctx = workflow.new_context();
    let output = workflow
        .execute(
            &mut ctx,
            Some("Write me a report on the history of the web.".into()),
            Arc::new(emitter.clone()),
        )
        .await
        .unwrap();

    assert_eq!(output, "done");
    assert_eq!(
        emitter.kinds().await,
        vec![
            EventKind::AgentInput,
            EventKind::ToolCallRequested,
            EventKind::ToolCallResult,
            EventKind::HandoffRequested,
            EventKind::AgentInput,
            EventKind::RunCompleted,
        ]
    );
    assert_eq!(ctx.state.get_path("research_notes.x"), Some(&json!("y")));
    assert_eq!(ctx.state.get("review"), Some(&json!("Review required.")));

    let envelopes = emitter.envelopes().await;
    let sequences: Vec<u64> = envelopes.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5, 6]);
    assert!(envelopes.iter().all(|e| e.run_id == ctx.run_id));

    match &envelopes[4].event {
        Event::AgentInput { agent, input } => {
            assert_eq!(agent, "WriteAgent");
            // user message, tool call, tool result, handoff note
            assert_eq!(input.len(), 4);
        }
        other => panic!("expected AgentInput, got {other:?}"),
    }
}

#[tokio::test]
async fn test_initial_state_is_copied_per_run() {
    let reasoner = ScriptedReasoner::with_scripts([(
        "ResearchAgent",
        vec![
            Decision::tool_call("record_notes", json!({"notes": "y", "notes_title": "x"})),
            Decision::final_answer("first"),
        ],
    )]);
    let workflow = research_workflow(reasoner, Arc::new(AtomicUsize::new(0)));

    let mut first = workflow.new_context();
    workflow
        .execute(&mut first, Some("one".into()), Arc::new(InMemoryEventEmitter::new()))
        .await
        .unwrap();

    assert_eq!(first.state.get_path("research_notes.x"), Some(&json!("y")));
    assert_eq!(workflow.initial_state().get("research_notes"), Some(&json!({})));
    assert_eq!(workflow.new_context().state, research_state());
}

// =============================================================================
// Tool errors
// =============================================================================

#[tokio::test]
async fn test_missing_arguments_are_reported_to_agent() {
    let calls = Arc::new(AtomicUsize::new(0));
    let reasoner = ScriptedReasoner::with_scripts([(
        "ResearchAgent",
        vec![
            Decision::tool_call("record_notes", json!({"notes": "no title"})),
            Decision::final_answer("gave up"),
        ],
    )]);
    let workflow = research_workflow(reasoner, calls.clone());
    let emitter = InMemoryEventEmitter::new();

    let mut ctx = workflow.new_context();
    workflow
        .execute(&mut ctx, Some("research".into()), Arc::new(emitter.clone()))
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(ctx.turn, 1);

    let result = emitter
        .events()
        .await
        .into_iter()
        .find_map(|e| match e {
            Event::ToolCallResult { result, .. } => Some(result),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        result.error.map(|e| e.kind),
        Some(ToolErrorKind::InvalidArguments)
    );
}

#[tokio::test]
async fn test_tool_not_allowed_then_agent_stuck() {
    let reasoner = ScriptedReasoner::with_scripts([(
        "ResearchAgent",
        vec![Decision::tool_call("write_report", json!({"report_content": "x"})); 4],
    )]);
    let workflow = research_workflow(reasoner, Arc::new(AtomicUsize::new(0)));
    let emitter = InMemoryEventEmitter::new();

    let mut ctx = workflow.new_context();
    let err = workflow
        .execute(&mut ctx, Some("research".into()), Arc::new(emitter.clone()))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::AgentStuck { attempts: 4, .. }));
    assert_eq!(ctx.failure(), Some(FailureReason::AgentStuck));
    assert_eq!(ctx.turn, 0);
    assert_eq!(emitter.count(EventKind::ToolCallResult).await, 4);
    assert_eq!(emitter.count(EventKind::ToolCallRequested).await, 0);
    // the report tool of another agent never ran
    assert_eq!(ctx.state.get("report_content"), Some(&json!("Not written yet.")));
}

#[tokio::test]
async fn test_rejections_reset_after_progress() {
    let not_allowed = Decision::tool_call("write_report", json!({"report_content": "x"}));
    let allowed = Decision::tool_call("record_notes", json!({"notes": "n", "notes_title": "t"}));
    let reasoner = ScriptedReasoner::with_scripts([(
        "ResearchAgent",
        vec![
            not_allowed.clone(),
            not_allowed.clone(),
            not_allowed.clone(),
            allowed,
            not_allowed.clone(),
            not_allowed.clone(),
            Decision::final_answer("recovered"),
        ],
    )]);
    let workflow = research_workflow(reasoner, Arc::new(AtomicUsize::new(0)));
    let emitter = InMemoryEventEmitter::new();

    let mut ctx = workflow.new_context();
    let output = workflow
        .execute(&mut ctx, Some("research".into()), Arc::new(emitter.clone()))
        .await
        .unwrap();

    assert_eq!(output, "recovered");
    assert_eq!(emitter.count(EventKind::ToolCallResult).await, 6);
}

#[tokio::test]
async fn test_transactional_tool_rolls_back_on_failure() {
    let transfer = FunctionTool::builder("transfer", "Move funds between accounts")
        .param(ToolParameter::required("amount", ParamType::Number))
        .handler(|args, state| {
            let amount = args.require_f64("amount")?;
            state.transaction(|s| {
                let from = s.get("checking").and_then(|v| v.as_f64()).unwrap_or(0.0);
                s.set("checking", from - amount);
                if from < amount {
                    return Err("insufficient funds".to_string());
                }
                let to = s.get("savings").and_then(|v| v.as_f64()).unwrap_or(0.0);
                s.set("savings", to + amount);
                Ok(json!("transferred"))
            })
        });
    let agent = Agent::builder("Bank").tool(transfer).build().unwrap();
    let reasoner = ScriptedReasoner::with_scripts([(
        "Bank",
        vec![
            Decision::tool_call("transfer", json!({"amount": 500.0})),
            Decision::final_answer("could not transfer"),
        ],
    )]);
    let workflow = Workflow::single_agent(agent, reasoner, WorkflowConfig::new(5, 1)).unwrap();

    let mut ctx = workflow.new_context();
    ctx.state.set("checking", 100.0);
    ctx.state.set("savings", 0.0);
    workflow
        .execute(&mut ctx, Some("move 500".into()), Arc::new(InMemoryEventEmitter::new()))
        .await
        .unwrap();

    assert_eq!(ctx.state.get("checking"), Some(&json!(100.0)));
    assert_eq!(ctx.state.get("savings"), Some(&json!(0.0)));
}

// =============================================================================
// Reasoning and output events
// =============================================================================

#[tokio::test]
async fn test_reasoner_failure_fails_run() {
    let workflow = ping_pong_workflow(ScriptedReasoner::new(), 5);
    let emitter = InMemoryEventEmitter::new();

    let mut ctx = workflow.new_context();
    let err = workflow
        .execute(&mut ctx, Some("hi".into()), Arc::new(emitter.clone()))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::ReasoningFailed(_)));
    let events = emitter.events().await;
    match events.last() {
        Some(Event::RunFailed { reason, agent, .. }) => {
            assert_eq!(*reason, FailureReason::ReasoningFailed);
            assert_eq!(agent, "A");
        }
        other => panic!("expected RunFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_agent_output_events_when_enabled() {
    let add = FunctionTool::builder("add", "Add two numbers")
        .param(ToolParameter::required("a", ParamType::Number))
        .param(ToolParameter::required("b", ParamType::Number))
        .handler(|args, _state| Ok(json!(args.require_f64("a")? + args.require_f64("b")?)));
    let agent = Agent::builder("Calculator").tool(add).build().unwrap();
    let reasoner = ScriptedReasoner::with_scripts([(
        "Calculator",
        vec![
            Decision::tool_call("add", json!({"a": 2, "b": 3})),
            Decision::final_answer("5"),
        ],
    )]);
    let workflow = Workflow::single_agent(
        agent,
        reasoner,
        WorkflowConfig::new(5, 1).with_agent_output(true),
    )
    .unwrap();
    let emitter = InMemoryEventEmitter::new();

    let mut ctx = workflow.new_context();
    workflow
        .execute(&mut ctx, Some("2 + 3?".into()), Arc::new(emitter.clone()))
        .await
        .unwrap();

    assert_eq!(
        emitter.kinds().await,
        vec![
            EventKind::AgentInput,
            EventKind::AgentOutput,
            EventKind::ToolCallRequested,
            EventKind::ToolCallResult,
            EventKind::AgentOutput,
            EventKind::RunCompleted,
        ]
    );

    let events = emitter.events().await;
    match &events[3] {
        Event::ToolCallResult { result, .. } => assert_eq!(result.result, Some(json!(5.0))),
        other => panic!("expected ToolCallResult, got {other:?}"),
    }
    match &events[1] {
        Event::AgentOutput { tool_calls, .. } => assert_eq!(tool_calls[0].name, "add"),
        other => panic!("expected AgentOutput, got {other:?}"),
    }
}

// =============================================================================
// Panics and cancellation
// =============================================================================

/// Reasoner that never decides
struct StalledReasoner {
    started: Arc<Notify>,
}

#[async_trait]
impl Reasoner for StalledReasoner {
    async fn reason(&self, _request: ReasoningRequest<'_>) -> agentflow_core::Result<Decision> {
        self.started.notify_one();
        std::future::pending().await
    }
}

/// Writes a draft into state, then never finishes
struct SlowWriter {
    started: Arc<Notify>,
}

#[async_trait]
impl Tool for SlowWriter {
    fn name(&self) -> &str {
        "slow_write"
    }

    fn description(&self) -> &str {
        "Write a draft slowly"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        Vec::new()
    }

    async fn execute(
        &self,
        _arguments: ToolArguments,
        ctx: &mut ToolContext<'_>,
    ) -> ToolExecutionResult {
        ctx.state.set("draft", "partial");
        self.started.notify_one();
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_reasoner_panic_fails_run() {
    let agent = Agent::builder("A").build().unwrap();
    let reasoner = FnReasoner::new(|_| panic!("model client blew up"));
    let workflow = Workflow::single_agent(agent, reasoner, WorkflowConfig::new(5, 1)).unwrap();

    let mut handle = workflow.run("hi");
    let kinds: Vec<EventKind> = handle
        .stream_events()
        .unwrap()
        .map(|envelope| envelope.event.kind())
        .collect()
        .await;
    assert_eq!(kinds, vec![EventKind::AgentInput, EventKind::RunFailed]);

    let ctx = handle.await_context().await.unwrap();
    assert_eq!(ctx.failure(), Some(FailureReason::ReasoningFailed));
    match &ctx.status {
        RunStatus::Failed { message, .. } => {
            assert!(message.contains("reasoner panicked: model client blew up"))
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cancel_during_slow_reasoner() {
    let started = Arc::new(Notify::new());
    let agent = Agent::builder("A").build().unwrap();
    let reasoner = StalledReasoner {
        started: started.clone(),
    };
    let workflow = Workflow::single_agent(agent, reasoner, WorkflowConfig::new(5, 1)).unwrap();

    let mut handle = workflow.run("hi");
    let events = handle.stream_events().unwrap();
    started.notified().await;
    handle.cancel();

    let kinds: Vec<EventKind> = events.map(|e| e.event.kind()).collect().await;
    assert_eq!(kinds, vec![EventKind::AgentInput, EventKind::RunFailed]);

    let err = handle.await_result().await.unwrap_err();
    assert!(matches!(err, WorkflowError::Cancelled));
}

#[tokio::test]
async fn test_cancel_during_tool_keeps_earlier_state_writes() {
    let started = Arc::new(Notify::new());
    let agent = Agent::builder("Writer")
        .tool(SlowWriter {
            started: started.clone(),
        })
        .build()
        .unwrap();
    let reasoner = ScriptedReasoner::with_scripts([(
        "Writer",
        vec![Decision::tool_call("slow_write", json!({}))],
    )]);
    let workflow = Workflow::single_agent(agent, reasoner, WorkflowConfig::new(5, 1)).unwrap();

    let mut handle = workflow.run("write a draft");
    let events = handle.stream_events().unwrap();
    started.notified().await;
    handle.cancel();

    let kinds: Vec<EventKind> = events.map(|e| e.event.kind()).collect().await;
    assert_eq!(
        kinds,
        vec![
            EventKind::AgentInput,
            EventKind::ToolCallRequested,
            EventKind::RunFailed,
        ]
    );

    let ctx = handle.await_context().await.unwrap();
    assert_eq!(ctx.failure(), Some(FailureReason::Cancelled));
    assert_eq!(ctx.state.get("draft"), Some(&json!("partial")));
    assert_eq!(ctx.turn, 1);
    // The call is recorded but no result follows it
    assert_eq!(
        ctx.conversation.last().map(|m| m.role),
        Some(MessageRole::Assistant)
    );
}
