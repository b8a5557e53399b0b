//! Event sinks
//!
//! A sink receives one [`EventBatch`] per completed cycle. Delivery is
//! best-effort: a batch the sink rejects is logged and dropped.

pub mod log;
pub mod memory;
pub mod webhook;

use async_trait::async_trait;

use crate::events::EventBatch;

pub use log::LogSink;
pub use memory::MemorySink;
pub use webhook::WebhookSink;

#[async_trait]
pub trait EventSink: Send + Sync {
    /// Accept a batch for downstream storage/alerting
    async fn publish(&self, batch: EventBatch) -> anyhow::Result<()>;

    /// Short name for logging
    fn name(&self) -> &str;
}
