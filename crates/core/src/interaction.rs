// Human-in-the-loop plumbing
//
// A run that needs a human answer emits InputRequired and parks until a
// HumanResponse with the same correlation key arrives through a Responder.
// Responses with other keys are discarded. Cancellation, or every Responder
// being dropped, ends the wait with WorkflowError::Cancelled.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{Result, WorkflowError};
use crate::events::{Event, EventSink};

/// A human answer addressed to a pending input request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanResponse {
    /// Must equal the key of the InputRequired event being answered
    pub correlation_key: String,
    pub response: String,
}

impl HumanResponse {
    pub fn new(correlation_key: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            correlation_key: correlation_key.into(),
            response: response.into(),
        }
    }
}

/// Caller side: sends human responses into a run
#[derive(Debug, Clone)]
pub struct Responder {
    tx: mpsc::UnboundedSender<HumanResponse>,
}

impl Responder {
    /// Deliver a response. Fails only when the run is gone.
    pub fn respond(&self, response: HumanResponse) -> Result<()> {
        self.tx
            .send(response)
            .map_err(|_| WorkflowError::invalid_state("run is no longer accepting responses"))
    }
}

/// Run side: receives human responses
#[derive(Debug)]
pub struct HumanInbox {
    rx: Mutex<mpsc::UnboundedReceiver<HumanResponse>>,
}

/// Create a connected responder/inbox pair
pub fn channel() -> (Responder, HumanInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Responder { tx }, HumanInbox { rx: Mutex::new(rx) })
}

impl HumanInbox {
    /// Wait for the response matching `correlation_key`
    pub(crate) async fn wait_for(
        &self,
        correlation_key: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let mut rx = self.rx.lock().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(WorkflowError::Cancelled),
                received = rx.recv() => match received {
                    Some(response) if response.correlation_key == correlation_key => {
                        return Ok(response.response);
                    }
                    Some(response) => {
                        warn!(
                            expected = %correlation_key,
                            received = %response.correlation_key,
                            "Discarding human response with unmatched correlation key"
                        );
                    }
                    None => return Err(WorkflowError::Cancelled),
                },
            }
        }
    }
}

/// Everything a run needs to talk to a human, shared by engine and tools
pub(crate) struct Interaction {
    pub(crate) sink: EventSink,
    pub(crate) inbox: HumanInbox,
    pub(crate) cancel: CancellationToken,
}

impl Interaction {
    /// Emit InputRequired, wait for the matching answer, emit HumanResponse
    pub(crate) async fn request_input(
        &self,
        agent: &str,
        prefix: &str,
        correlation_key: &str,
    ) -> Result<String> {
        info!(agent = %agent, correlation_key = %correlation_key, "Waiting for human input");

        self.sink
            .emit(Event::InputRequired {
                agent: agent.to_string(),
                prefix: prefix.to_string(),
                correlation_key: correlation_key.to_string(),
            })
            .await?;

        let response = match self.inbox.wait_for(correlation_key, &self.cancel).await {
            Ok(response) => response,
            Err(err) => {
                // Also stops the run when the request came from inside a tool
                self.cancel.cancel();
                return Err(err);
            }
        };

        self.sink
            .emit(Event::HumanResponse {
                agent: agent.to_string(),
                response: response.clone(),
                correlation_key: correlation_key.to_string(),
            })
            .await?;

        Ok(response)
    }
}
