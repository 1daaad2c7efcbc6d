// Workflow events for streaming
//
// Event is a closed enum over every progress notification a run produces.
// Consumers match on it exhaustively, so adding a kind is a compile-visible
// change at every consumption site.
//
// Delivery goes through the EventEmitter trait:
// - ChannelEventEmitter feeds an EventStream (unbounded, never blocks the run)
// - InMemoryEventEmitter (memory module) collects events for tests
// - NoopEventEmitter discards everything

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;
use uuid::Uuid;

use crate::error::{FailureReason, Result};
use crate::message::Message;
use crate::tool_types::{ToolCall, ToolResult};

// ============================================================================
// Event
// ============================================================================

/// Progress events emitted during a run, in execution order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An agent became active and receives the conversation so far
    AgentInput { agent: String, input: Vec<Message> },

    /// An agent produced a decision (only when agent output streaming is on)
    AgentOutput {
        agent: String,
        content: String,
        tool_calls: Vec<ToolCall>,
    },

    /// A tool call passed the allow-list check and is about to run
    ToolCallRequested { agent: String, tool_call: ToolCall },

    /// A tool call finished, failed, or was rejected
    ToolCallResult {
        agent: String,
        tool_call: ToolCall,
        result: ToolResult,
    },

    /// Control moves from one agent to another
    HandoffRequested {
        from: String,
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// The run is waiting for a human answer
    InputRequired {
        agent: String,
        prefix: String,
        correlation_key: String,
    },

    /// A human answer matching an InputRequired was received
    HumanResponse {
        agent: String,
        response: String,
        correlation_key: String,
    },

    /// Terminal: the run completed with a final answer
    RunCompleted { agent: String, output: String },

    /// Terminal: the run failed
    RunFailed {
        agent: String,
        reason: FailureReason,
        message: String,
    },
}

/// Discriminant of an [`Event`], handy for comparing sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AgentInput,
    AgentOutput,
    ToolCallRequested,
    ToolCallResult,
    HandoffRequested,
    InputRequired,
    HumanResponse,
    RunCompleted,
    RunFailed,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::AgentInput { .. } => EventKind::AgentInput,
            Event::AgentOutput { .. } => EventKind::AgentOutput,
            Event::ToolCallRequested { .. } => EventKind::ToolCallRequested,
            Event::ToolCallResult { .. } => EventKind::ToolCallResult,
            Event::HandoffRequested { .. } => EventKind::HandoffRequested,
            Event::InputRequired { .. } => EventKind::InputRequired,
            Event::HumanResponse { .. } => EventKind::HumanResponse,
            Event::RunCompleted { .. } => EventKind::RunCompleted,
            Event::RunFailed { .. } => EventKind::RunFailed,
        }
    }

    /// Name of the agent that was active when the event was produced
    pub fn agent(&self) -> &str {
        match self {
            Event::AgentInput { agent, .. }
            | Event::AgentOutput { agent, .. }
            | Event::ToolCallRequested { agent, .. }
            | Event::ToolCallResult { agent, .. }
            | Event::InputRequired { agent, .. }
            | Event::HumanResponse { agent, .. }
            | Event::RunCompleted { agent, .. }
            | Event::RunFailed { agent, .. } => agent,
            Event::HandoffRequested { from, .. } => from,
        }
    }

    /// RunCompleted and RunFailed end the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::RunCompleted { .. } | Event::RunFailed { .. })
    }
}

/// An event with its position in the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub run_id: Uuid,
    /// 1-based, strictly increasing within a run
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

// ============================================================================
// EventEmitter - For streaming events during execution
// ============================================================================

/// Trait for emitting events during a run
///
/// Implementations must not block waiting for a consumer.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    /// Emit a single event
    async fn emit(&self, event: EventEnvelope) -> Result<()>;

    /// Emit multiple events
    async fn emit_batch(&self, events: Vec<EventEnvelope>) -> Result<()> {
        for event in events {
            self.emit(event).await?;
        }
        Ok(())
    }
}

/// Emitter that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventEmitter;

#[async_trait]
impl EventEmitter for NoopEventEmitter {
    async fn emit(&self, _event: EventEnvelope) -> Result<()> {
        Ok(())
    }
}

/// Emitter backed by an unbounded channel feeding an [`EventStream`]
#[derive(Debug, Clone)]
pub struct ChannelEventEmitter {
    tx: mpsc::UnboundedSender<EventEnvelope>,
}

impl ChannelEventEmitter {
    /// Create an emitter and the stream that receives its events
    pub fn new() -> (Self, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, EventStream::new(rx))
    }
}

#[async_trait]
impl EventEmitter for ChannelEventEmitter {
    async fn emit(&self, event: EventEnvelope) -> Result<()> {
        // Nobody listening is fine: the run keeps going
        if self.tx.send(event).is_err() {
            debug!("event stream receiver dropped, discarding event");
        }
        Ok(())
    }
}

/// Stamps events with run id and sequence before handing them to an emitter
#[derive(Clone)]
pub(crate) struct EventSink {
    run_id: Uuid,
    sequence: Arc<AtomicU64>,
    emitter: Arc<dyn EventEmitter>,
}

impl EventSink {
    pub(crate) fn new(run_id: Uuid, emitter: Arc<dyn EventEmitter>) -> Self {
        Self {
            run_id,
            sequence: Arc::new(AtomicU64::new(0)),
            emitter,
        }
    }

    pub(crate) async fn emit(&self, event: Event) -> Result<()> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.emitter
            .emit(EventEnvelope {
                run_id: self.run_id,
                sequence,
                timestamp: Utc::now(),
                event,
            })
            .await
    }
}

// ============================================================================
// EventStream - consumer side
// ============================================================================

/// Lazy, finite, non-restartable sequence of run events.
///
/// Ends after RunCompleted or RunFailed, or when the producer goes away.
#[derive(Debug)]
pub struct EventStream {
    inner: UnboundedReceiverStream<EventEnvelope>,
    finished: bool,
}

impl EventStream {
    fn new(rx: mpsc::UnboundedReceiver<EventEnvelope>) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(rx),
            finished: false,
        }
    }
}

impl Stream for EventStream {
    type Item = EventEnvelope;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(envelope)) => {
                if envelope.event.is_terminal() {
                    this.finished = true;
                }
                Poll::Ready(Some(envelope))
            }
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
