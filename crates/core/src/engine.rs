// Workflow engine - turn-by-turn state machine
//
// One engine drives one run invocation over a borrowed RunContext:
//
//   Active(A) --FinalAnswer--> Completed
//   Active(A) --ToolCall-----> AwaitingToolResult(A) --> Active(A)
//   Active(A) --Handoff------> Active(B)
//   Active(A) --RequestInput-> AwaitingHuman(A) -----> Active(A)
//   any       --fatal error--> Failed
//
// Every non-terminal transition spends one turn. A rejected tool call does not
// spend a turn but counts toward the agent's retry budget. Each suspension
// point (reasoner, tool, human) races the run's cancellation token.

use futures::FutureExt;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, info, warn};

use crate::agent::{Agent, HandoffDescriptor};
use crate::config::{ModelSettings, WorkflowConfig};
use crate::context::{RunContext, RunStatus};
use crate::error::{FailureReason, Result, ToolError, WorkflowError};
use crate::events::Event;
use crate::interaction::Interaction;
use crate::invoker::{panic_message, ToolInvoker};
use crate::message::Message;
use crate::reasoning::{Decision, Reasoner, ReasoningRequest};
use crate::tool_types::{ToolCall, ToolResult};
use crate::tools::{Tool, ToolContext};

pub(crate) struct WorkflowEngine<'w> {
    pub(crate) agents: &'w BTreeMap<String, Agent>,
    pub(crate) reasoner: &'w dyn Reasoner,
    pub(crate) settings: &'w ModelSettings,
    pub(crate) config: WorkflowConfig,
    pub(crate) interaction: Interaction,
}

impl<'w> WorkflowEngine<'w> {
    /// Drive `ctx` until it completes or fails.
    ///
    /// Fatal errors are recorded in `ctx.status`, emitted as RunFailed and
    /// returned. A context that cannot be resumed is left untouched; the
    /// refusal is still emitted as RunFailed.
    pub(crate) async fn run(&self, ctx: &mut RunContext, message: Option<String>) -> Result<String> {
        if let Err(err) = ctx.reactivate() {
            warn!(run_id = %ctx.run_id, error = %err, "Refusing to resume run");
            // The stored failure stays; only the stream learns about the refusal
            let event = Event::RunFailed {
                agent: ctx.active_agent.clone(),
                reason: err.failure_reason(),
                message: err.to_string(),
            };
            if let Err(emit_err) = self.emit(event).await {
                warn!(run_id = %ctx.run_id, error = %emit_err, "Failed to emit RunFailed");
            }
            return Err(err);
        }

        match self.drive(ctx, message).await {
            Ok(output) => Ok(output),
            Err(err) => {
                self.fail(ctx, &err).await;
                Err(err)
            }
        }
    }

    async fn drive(&self, ctx: &mut RunContext, message: Option<String>) -> Result<String> {
        if let Some(text) = message {
            ctx.push_message(Message::user(text));
        }

        let mut agent = self.agent(&ctx.active_agent)?;
        info!(
            run_id = %ctx.run_id,
            agent = %agent.name(),
            turn = ctx.turn,
            "Starting run"
        );
        self.emit(Event::AgentInput {
            agent: agent.name().to_string(),
            input: ctx.conversation.clone(),
        })
        .await?;

        let mut turns_this_run = 0usize;
        let mut rejections = 0usize;

        loop {
            self.check_cancelled()?;

            let decision = self.decide(agent, ctx).await?;
            let summary = decision.summary();

            match decision {
                Decision::FinalAnswer { text } => {
                    self.emit_output(agent, summary, Vec::new()).await?;
                    ctx.push_message(Message::assistant(agent.name(), text.clone()));
                    ctx.set_status(RunStatus::Completed {
                        output: text.clone(),
                    });
                    info!(
                        run_id = %ctx.run_id,
                        agent = %agent.name(),
                        turn = ctx.turn,
                        "Run completed"
                    );
                    self.emit(Event::RunCompleted {
                        agent: agent.name().to_string(),
                        output: text.clone(),
                    })
                    .await?;
                    return Ok(text);
                }

                Decision::ToolCall { name, arguments } => {
                    let call = ToolCall::new(name, arguments);
                    self.emit_output(agent, summary, vec![call.clone()]).await?;

                    let Some(tool) = agent.tools().get(&call.name) else {
                        rejections += 1;
                        self.reject_tool_call(agent, ctx, call, rejections).await?;
                        continue;
                    };

                    self.spend_turn(ctx, &mut turns_this_run)?;
                    rejections = 0;
                    self.call_tool(agent, tool.as_ref(), ctx, call).await?;
                }

                Decision::Handoff { target, reason } => {
                    self.emit_output(agent, summary, Vec::new()).await?;

                    if !agent.can_handoff_to(&target) {
                        return Err(WorkflowError::InvalidHandoff {
                            from: agent.name().to_string(),
                            to: target,
                        });
                    }

                    self.spend_turn(ctx, &mut turns_this_run)?;
                    rejections = 0;
                    agent = self.handoff(agent, ctx, &target, reason).await?;
                }

                Decision::RequestInput {
                    prefix,
                    correlation_key,
                } => {
                    self.emit_output(agent, summary, Vec::new()).await?;
                    self.spend_turn(ctx, &mut turns_this_run)?;
                    rejections = 0;
                    self.await_human(agent, ctx, prefix, correlation_key).await?;
                }
            }
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    async fn decide(&self, agent: &Agent, ctx: &RunContext) -> Result<Decision> {
        let request = ReasoningRequest {
            agent: agent.name(),
            directive: agent.directive(),
            tools: agent.tool_catalog(),
            handoffs: self.handoff_catalog(agent),
            conversation: &ctx.conversation,
            state: &ctx.state,
            settings: self.settings,
            turn: ctx.turn,
        };

        debug!(
            run_id = %ctx.run_id,
            agent = %agent.name(),
            turn = ctx.turn,
            "Requesting decision"
        );

        let outcome = tokio::select! {
            _ = self.interaction.cancel.cancelled() => return Err(WorkflowError::Cancelled),
            outcome = AssertUnwindSafe(self.reasoner.reason(request)).catch_unwind() => outcome,
        };
        let decision = match outcome {
            Ok(decision) => decision,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    run_id = %ctx.run_id,
                    agent = %agent.name(),
                    panic = %message,
                    "Reasoner panicked"
                );
                return Err(WorkflowError::reasoning(format!("reasoner panicked: {message}")));
            }
        };

        decision.map_err(|err| match err {
            WorkflowError::Cancelled | WorkflowError::ReasoningFailed(_) => err,
            other => WorkflowError::reasoning(other.to_string()),
        })
    }

    /// Run an allowed tool call to completion.
    ///
    /// Cancellation drops the tool future at its current await point. State
    /// writes the tool made before that point stay applied; no result
    /// message is recorded for the call.
    async fn call_tool(
        &self,
        agent: &Agent,
        tool: &dyn Tool,
        ctx: &mut RunContext,
        call: ToolCall,
    ) -> Result<()> {
        info!(
            run_id = %ctx.run_id,
            agent = %agent.name(),
            turn = ctx.turn,
            tool = %call.name,
            tool_call_id = %call.id,
            "Executing tool call"
        );

        ctx.set_status(RunStatus::AwaitingToolResult {
            agent: agent.name().to_string(),
            tool_call_id: call.id.clone(),
        });
        self.emit(Event::ToolCallRequested {
            agent: agent.name().to_string(),
            tool_call: call.clone(),
        })
        .await?;
        ctx.push_message(Message::assistant_tool_call(agent.name(), call.clone()));

        let result = {
            let mut tool_ctx = ToolContext::for_run(
                ctx.run_id,
                agent.name(),
                ctx.turn,
                &mut ctx.state,
                &self.interaction,
            );
            tokio::select! {
                _ = self.interaction.cancel.cancelled() => return Err(WorkflowError::Cancelled),
                result = ToolInvoker::invoke(tool, &mut tool_ctx, &call) => result,
            }
        };
        // A tool that was waiting on a human may have returned because of cancellation
        self.check_cancelled()?;

        if !result.is_success() {
            debug!(
                run_id = %ctx.run_id,
                tool = %call.name,
                error = ?result.error,
                "Tool call returned an error observation"
            );
        }

        ctx.push_message(Message::tool_result(agent.name(), &result));
        self.emit(Event::ToolCallResult {
            agent: agent.name().to_string(),
            tool_call: call,
            result,
        })
        .await?;
        ctx.set_status(RunStatus::Active {
            agent: agent.name().to_string(),
        });
        Ok(())
    }

    async fn reject_tool_call(
        &self,
        agent: &Agent,
        ctx: &mut RunContext,
        call: ToolCall,
        rejections: usize,
    ) -> Result<()> {
        warn!(
            run_id = %ctx.run_id,
            agent = %agent.name(),
            tool = %call.name,
            rejections = rejections,
            "Tool not in agent's tool set"
        );

        let result = ToolResult::failure(
            &call,
            ToolError::not_allowed(format!(
                "agent '{}' has no tool named '{}'; available: [{}]",
                agent.name(),
                call.name,
                agent.tools().tool_names().join(", ")
            )),
        );
        ctx.push_message(Message::assistant_tool_call(agent.name(), call.clone()));
        ctx.push_message(Message::tool_result(agent.name(), &result));
        self.emit(Event::ToolCallResult {
            agent: agent.name().to_string(),
            tool_call: call,
            result,
        })
        .await?;

        if rejections > self.config.max_tool_retries {
            return Err(WorkflowError::AgentStuck {
                agent: agent.name().to_string(),
                attempts: rejections,
            });
        }
        Ok(())
    }

    async fn handoff(
        &self,
        from: &Agent,
        ctx: &mut RunContext,
        target: &str,
        reason: Option<String>,
    ) -> Result<&'w Agent> {
        let next = self.agent(target)?;

        info!(
            run_id = %ctx.run_id,
            from = %from.name(),
            to = %next.name(),
            turn = ctx.turn,
            "Handing off"
        );

        self.emit(Event::HandoffRequested {
            from: from.name().to_string(),
            to: next.name().to_string(),
            reason: reason.clone(),
        })
        .await?;

        let note = match &reason {
            Some(reason) => format!(
                "Agent {} is now handling the request: {}",
                next.name(),
                reason
            ),
            None => format!("Agent {} is now handling the request", next.name()),
        };
        ctx.push_message(Message::system(note));
        ctx.active_agent = next.name().to_string();
        ctx.set_status(RunStatus::Active {
            agent: next.name().to_string(),
        });

        self.emit(Event::AgentInput {
            agent: next.name().to_string(),
            input: ctx.conversation.clone(),
        })
        .await?;
        Ok(next)
    }

    async fn await_human(
        &self,
        agent: &Agent,
        ctx: &mut RunContext,
        prefix: String,
        correlation_key: String,
    ) -> Result<()> {
        ctx.set_status(RunStatus::AwaitingHuman {
            agent: agent.name().to_string(),
            correlation_key: correlation_key.clone(),
        });
        ctx.push_message(Message::assistant(agent.name(), prefix.clone()));

        let response = self
            .interaction
            .request_input(agent.name(), &prefix, &correlation_key)
            .await?;

        ctx.push_message(Message::user(response));
        ctx.set_status(RunStatus::Active {
            agent: agent.name().to_string(),
        });
        Ok(())
    }

    async fn fail(&self, ctx: &mut RunContext, err: &WorkflowError) {
        let reason = err.failure_reason();
        if reason == FailureReason::Cancelled {
            info!(run_id = %ctx.run_id, agent = %ctx.active_agent, "Run cancelled");
        } else {
            error!(
                run_id = %ctx.run_id,
                agent = %ctx.active_agent,
                turn = ctx.turn,
                reason = %reason,
                error = %err,
                "Run failed"
            );
        }

        ctx.set_status(RunStatus::Failed {
            reason,
            message: err.to_string(),
        });

        let event = Event::RunFailed {
            agent: ctx.active_agent.clone(),
            reason,
            message: err.to_string(),
        };
        if let Err(emit_err) = self.emit(event).await {
            warn!(run_id = %ctx.run_id, error = %emit_err, "Failed to emit RunFailed");
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn agent(&self, name: &str) -> Result<&'w Agent> {
        self.agents
            .get(name)
            .ok_or_else(|| WorkflowError::UnknownAgent(name.to_string()))
    }

    fn handoff_catalog(&self, agent: &Agent) -> Vec<HandoffDescriptor> {
        agent
            .handoffs()
            .filter_map(|name| self.agents.get(name))
            .map(|target| HandoffDescriptor {
                name: target.name().to_string(),
                description: target.description().to_string(),
            })
            .collect()
    }

    fn spend_turn(&self, ctx: &mut RunContext, turns_this_run: &mut usize) -> Result<()> {
        if *turns_this_run >= self.config.max_turns {
            return Err(WorkflowError::MaxTurnsExceeded(self.config.max_turns));
        }
        *turns_this_run += 1;
        ctx.turn += 1;
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.interaction.cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }
        Ok(())
    }

    async fn emit_output(&self, agent: &Agent, content: String, tool_calls: Vec<ToolCall>) -> Result<()> {
        if !self.config.emit_agent_output {
            return Ok(());
        }
        self.emit(Event::AgentOutput {
            agent: agent.name().to_string(),
            content,
            tool_calls,
        })
        .await
    }

    async fn emit(&self, event: Event) -> Result<()> {
        self.interaction.sink.emit(event).await
    }
}
