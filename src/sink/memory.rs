//! In-memory event sink
//!
//! Keeps every published batch. Useful for tests and for embedding the
//! collector in a host that drains batches itself.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::trace;

use crate::events::{EventBatch, EventDescriptor};

use super::EventSink;

#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    batches: Arc<Mutex<Vec<EventBatch>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn batches(&self) -> Vec<EventBatch> {
        self.batches.lock().await.clone()
    }

    /// All events of all batches, in publish order
    pub async fn events(&self) -> Vec<EventDescriptor> {
        self.batches
            .lock()
            .await
            .iter()
            .flat_map(|batch| batch.events.iter().cloned())
            .collect()
    }

    /// Remove and return everything collected so far
    pub async fn drain(&self) -> Vec<EventBatch> {
        std::mem::take(&mut *self.batches.lock().await)
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn publish(&self, batch: EventBatch) -> anyhow::Result<()> {
        trace!("storing batch with {} events", batch.len());
        self.batches.lock().await.push(batch);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
