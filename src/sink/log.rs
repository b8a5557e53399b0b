use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::EventBatch;

use super::EventSink;

/// Writes every event to the tracing log
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn publish(&self, batch: EventBatch) -> anyhow::Result<()> {
        for event in &batch.events {
            let component = event.component.as_deref().unwrap_or("-");
            if event.is_clear() {
                info!(
                    "[{}] {} {} ({}/{}): {}",
                    event.severity,
                    event.device,
                    component,
                    event.event_class,
                    event.event_key,
                    event.summary
                );
            } else {
                warn!(
                    "[{}] {} {} ({}/{}): {}",
                    event.severity,
                    event.device,
                    component,
                    event.event_class,
                    event.event_key,
                    event.summary
                );
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
