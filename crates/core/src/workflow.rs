// Workflow definition and run handles
//
// A Workflow is an immutable, cheaply clonable set of agents plus the
// reasoning capability and limits that drive them. Each run gets its own
// RunContext seeded from a deep copy of the workflow's initial state.
//
// Hosts either spawn a run (`run`/`resume`, returning a RunHandle that
// exposes the event stream, human responses and cancellation) or drive it
// inline on their own task (`execute`/`execute_with`).

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent::Agent;
use crate::config::{ModelSettings, WorkflowConfig};
use crate::context::RunContext;
use crate::engine::WorkflowEngine;
use crate::error::{Result, WorkflowError};
use crate::events::{ChannelEventEmitter, EventEmitter, EventSink, EventStream};
use crate::interaction::{self, HumanInbox, HumanResponse, Interaction, Responder};
use crate::reasoning::Reasoner;
use crate::state::SharedState;

struct WorkflowInner {
    agents: BTreeMap<String, Agent>,
    root: String,
    initial_state: SharedState,
    config: WorkflowConfig,
    settings: ModelSettings,
    reasoner: Arc<dyn Reasoner>,
}

/// A validated multi-agent workflow
#[derive(Clone)]
pub struct Workflow {
    inner: Arc<WorkflowInner>,
}

impl Workflow {
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::default()
    }

    /// Workflow with a single root agent and no handoffs
    pub fn single_agent(
        agent: Agent,
        reasoner: impl Reasoner + 'static,
        config: WorkflowConfig,
    ) -> Result<Self> {
        let root = agent.name().to_string();
        Self::builder()
            .agent(agent)
            .root(root)
            .reasoner(reasoner)
            .config(config)
            .build()
    }

    pub fn root(&self) -> &str {
        &self.inner.root
    }

    pub fn agent(&self, name: &str) -> Option<&Agent> {
        self.inner.agents.get(name)
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.inner.agents.keys().map(|s| s.as_str()).collect()
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.inner.config
    }

    pub fn model_settings(&self) -> &ModelSettings {
        &self.inner.settings
    }

    pub fn initial_state(&self) -> &SharedState {
        &self.inner.initial_state
    }

    /// Fresh context on the root agent with a copy of the initial state
    pub fn new_context(&self) -> RunContext {
        RunContext::new(self.inner.root.clone(), self.inner.initial_state.clone())
    }

    /// Start a new run on a spawned task. Must be called inside a tokio runtime.
    pub fn run(&self, message: impl Into<String>) -> RunHandle {
        self.spawn(self.new_context(), Some(message.into()))
    }

    /// Continue an existing context with another user message.
    ///
    /// Conversation, state and turn counter carry over; a completed context
    /// reactivates the agent that gave the last answer.
    pub fn resume(&self, context: RunContext, message: impl Into<String>) -> RunHandle {
        self.spawn(context, Some(message.into()))
    }

    /// Drive `context` inline with no human channel attached.
    ///
    /// Any request for human input ends the run as cancelled.
    pub async fn execute(
        &self,
        context: &mut RunContext,
        message: Option<String>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Result<String> {
        let (responder, inbox) = interaction::channel();
        drop(responder);
        self.execute_with(context, message, emitter, inbox, CancellationToken::new())
            .await
    }

    /// Drive `context` inline with caller-provided human inbox and cancellation
    pub async fn execute_with(
        &self,
        context: &mut RunContext,
        message: Option<String>,
        emitter: Arc<dyn EventEmitter>,
        inbox: HumanInbox,
        cancel: CancellationToken,
    ) -> Result<String> {
        let engine = WorkflowEngine {
            agents: &self.inner.agents,
            reasoner: self.inner.reasoner.as_ref(),
            settings: &self.inner.settings,
            config: self.inner.config,
            interaction: Interaction {
                sink: EventSink::new(context.run_id, emitter),
                inbox,
                cancel,
            },
        };
        engine.run(context, message).await
    }

    fn spawn(&self, mut context: RunContext, message: Option<String>) -> RunHandle {
        let (emitter, events) = ChannelEventEmitter::new();
        let (responder, inbox) = interaction::channel();
        let cancel = CancellationToken::new();
        let run_id = context.run_id;

        let workflow = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let result = workflow
                .execute_with(&mut context, message, Arc::new(emitter), inbox, token)
                .await;
            (context, result)
        });

        RunHandle {
            run_id,
            events: Some(events),
            responder,
            cancel,
            task,
        }
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("root", &self.inner.root)
            .field("agents", &self.agent_names())
            .field("config", &self.inner.config)
            .finish()
    }
}

// ============================================================================
// WorkflowBuilder
// ============================================================================

/// Builder for [`Workflow`]. Config, root agent and reasoner are required.
#[derive(Default)]
pub struct WorkflowBuilder {
    agents: Vec<Agent>,
    root: Option<String>,
    initial_state: SharedState,
    config: Option<WorkflowConfig>,
    settings: ModelSettings,
    reasoner: Option<Arc<dyn Reasoner>>,
}

impl WorkflowBuilder {
    pub fn agent(mut self, agent: Agent) -> Self {
        self.agents.push(agent);
        self
    }

    /// Name of the agent every new run starts with
    pub fn root(mut self, name: impl Into<String>) -> Self {
        self.root = Some(name.into());
        self
    }

    /// Template copied into every new run
    pub fn initial_state(mut self, state: SharedState) -> Self {
        self.initial_state = state;
        self
    }

    pub fn config(mut self, config: WorkflowConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn model_settings(mut self, settings: ModelSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn reasoner(self, reasoner: impl Reasoner + 'static) -> Self {
        self.reasoner_arc(Arc::new(reasoner))
    }

    pub fn reasoner_arc(mut self, reasoner: Arc<dyn Reasoner>) -> Self {
        self.reasoner = Some(reasoner);
        self
    }

    pub fn build(self) -> Result<Workflow> {
        let config = self
            .config
            .ok_or_else(|| WorkflowError::config("workflow config is required"))?;
        config.validate()?;

        let reasoner = self
            .reasoner
            .ok_or_else(|| WorkflowError::config("a reasoning capability is required"))?;

        if self.agents.is_empty() {
            return Err(WorkflowError::config("a workflow needs at least one agent"));
        }

        let mut agents = BTreeMap::new();
        for agent in self.agents {
            let name = agent.name().to_string();
            if agents.insert(name.clone(), agent).is_some() {
                return Err(WorkflowError::config(format!("duplicate agent name '{name}'")));
            }
        }

        let root = self
            .root
            .ok_or_else(|| WorkflowError::config("a root agent is required"))?;
        if !agents.contains_key(&root) {
            return Err(WorkflowError::config(format!(
                "root agent '{root}' is not part of the workflow"
            )));
        }

        for agent in agents.values() {
            if let Some(missing) = agent.handoffs().find(|t| !agents.contains_key(*t)) {
                return Err(WorkflowError::config(format!(
                    "agent '{}' hands off to unknown agent '{missing}'",
                    agent.name()
                )));
            }
        }

        Ok(Workflow {
            inner: Arc::new(WorkflowInner {
                agents,
                root,
                initial_state: self.initial_state,
                config,
                settings: self.settings,
                reasoner,
            }),
        })
    }
}

// ============================================================================
// RunHandle
// ============================================================================

/// Final answer together with the context that produced it
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub output: String,
    pub context: RunContext,
}

/// Host-side handle to a spawned run
pub struct RunHandle {
    run_id: Uuid,
    events: Option<EventStream>,
    responder: Responder,
    cancel: CancellationToken,
    task: JoinHandle<(RunContext, Result<String>)>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Take the event stream. Only the first call returns it.
    pub fn stream_events(&mut self) -> Option<EventStream> {
        self.events.take()
    }

    /// Answer a pending input request
    pub fn respond(&self, response: HumanResponse) -> Result<()> {
        self.responder.respond(response)
    }

    /// A clonable sender for answering from another task
    pub fn responder(&self) -> Responder {
        self.responder.clone()
    }

    /// Request cancellation; the run fails with `Cancelled` at its next
    /// suspension point
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run. Failed runs return their error.
    pub async fn await_result(self) -> Result<RunOutput> {
        let (context, result) = self.join().await?;
        let output = result?;
        Ok(RunOutput { output, context })
    }

    /// Wait for the run and return its final context, whatever the outcome
    pub async fn await_context(self) -> Result<RunContext> {
        let (context, _) = self.join().await?;
        Ok(context)
    }

    async fn join(self) -> Result<(RunContext, Result<String>)> {
        self.task
            .await
            .map_err(|e| WorkflowError::Internal(anyhow::anyhow!("run task failed: {e}")))
    }
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("run_id", &self.run_id)
            .field("events_taken", &self.events.is_none())
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::{Decision, ScriptedReasoner};

    fn agent(name: &str, handoffs: &[&str]) -> Agent {
        Agent::builder(name)
            .description(format!("{name} agent"))
            .handoffs(handoffs.iter().copied())
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_requires_config() {
        let err = Workflow::builder()
            .agent(agent("A", &[]))
            .root("A")
            .reasoner(ScriptedReasoner::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("config"));
    }

    #[test]
    fn test_build_validates_agents() {
        let base = || {
            Workflow::builder()
                .reasoner(ScriptedReasoner::new())
                .config(WorkflowConfig::new(5, 1))
        };

        assert!(base().root("A").build().is_err());
        assert!(base().agent(agent("A", &[])).root("Z").build().is_err());
        assert!(base()
            .agent(agent("A", &[]))
            .agent(agent("A", &[]))
            .root("A")
            .build()
            .is_err());
        assert!(base().agent(agent("A", &["B"])).root("A").build().is_err());

        let workflow = base()
            .agent(agent("A", &["B"]))
            .agent(agent("B", &[]))
            .root("A")
            .build()
            .unwrap();
        assert_eq!(workflow.agent_names(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_runs_get_independent_state() {
        let mut template = SharedState::new();
        template.set("counter", 0);
        let workflow = Workflow::builder()
            .agent(agent("A", &[]))
            .root("A")
            .initial_state(template)
            .reasoner(ScriptedReasoner::with_scripts([(
                "A",
                vec![Decision::final_answer("one")],
            )]))
            .config(WorkflowConfig::new(5, 1))
            .build()
            .unwrap();

        let mut ctx = workflow.new_context();
        ctx.state.set("counter", 99);
        let other = workflow.new_context();
        assert_ne!(ctx.run_id, other.run_id);
        assert_eq!(other.state.get("counter"), Some(&serde_json::json!(0)));
    }
}
