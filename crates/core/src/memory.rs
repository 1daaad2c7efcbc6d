// In-memory implementations for testing and examples
//
// These let a workflow run without any external consumer attached.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::events::{Event, EventEmitter, EventEnvelope, EventKind};

// ============================================================================
// InMemoryEventEmitter
// ============================================================================

/// Event emitter that records every envelope
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventEmitter {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
}

impl InMemoryEventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded envelopes, in emission order
    pub async fn envelopes(&self) -> Vec<EventEnvelope> {
        self.events.read().await.clone()
    }

    /// All recorded events without their envelopes
    pub async fn events(&self) -> Vec<Event> {
        self.events
            .read()
            .await
            .iter()
            .map(|e| e.event.clone())
            .collect()
    }

    /// Kinds of all recorded events
    pub async fn kinds(&self) -> Vec<EventKind> {
        self.events
            .read()
            .await
            .iter()
            .map(|e| e.event.kind())
            .collect()
    }

    /// Number of recorded events of `kind`
    pub async fn count(&self, kind: EventKind) -> usize {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.event.kind() == kind)
            .count()
    }

    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait]
impl EventEmitter for InMemoryEventEmitter {
    async fn emit(&self, event: EventEnvelope) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }
}
