//! SinkActor - Forwards event batches to the configured sink
//!
//! Subscribes to the batch broadcast channel and hands every batch to an
//! [`EventSink`]. A rejected batch is lost; the actor only counts it.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, instrument, trace, warn};

use crate::config::SinkConfig;
use crate::events::EventBatch;
use crate::sink::EventSink;

use super::messages::{SinkCommand, SinkStats};

pub struct SinkActor {
    sink: Arc<dyn EventSink>,

    /// Command receiver
    command_rx: mpsc::Receiver<SinkCommand>,

    /// Batch receiver (broadcast subscription)
    batch_rx: broadcast::Receiver<EventBatch>,

    stats: SinkStats,
}

impl SinkActor {
    pub fn new(
        sink: Arc<dyn EventSink>,
        command_rx: mpsc::Receiver<SinkCommand>,
        batch_rx: broadcast::Receiver<EventBatch>,
    ) -> Self {
        Self {
            sink,
            command_rx,
            batch_rx,
            stats: SinkStats::default(),
        }
    }

    #[instrument(skip(self), fields(sink = %self.sink.name()))]
    pub async fn run(mut self) {
        debug!("starting sink actor");

        loop {
            tokio::select! {
                result = self.batch_rx.recv() => {
                    match result {
                        Ok(batch) => self.deliver(batch).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("sink actor lagged, skipped {skipped} batches");
                            self.stats.lagged += skipped;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("batch channel closed, shutting down");
                            break;
                        }
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        SinkCommand::GetStats { respond_to } => {
                            let _ = respond_to.send(self.stats);
                        }
                        SinkCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => break,
            }
        }

        debug!("sink actor stopped");
    }

    async fn deliver(&mut self, batch: EventBatch) {
        trace!("delivering {} events for {}", batch.len(), batch.device);

        match self.sink.publish(batch).await {
            Ok(()) => self.stats.delivered += 1,
            Err(e) => {
                warn!("event batch lost: {e:#}");
                self.stats.failed += 1;
            }
        }
    }
}

/// Handle for controlling the SinkActor
#[derive(Clone)]
pub struct SinkHandle {
    sender: mpsc::Sender<SinkCommand>,
}

impl SinkHandle {
    pub fn spawn(sink: Arc<dyn EventSink>, batch_rx: broadcast::Receiver<EventBatch>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = SinkActor::new(sink, cmd_rx, batch_rx);

        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    pub async fn stats(&self) -> anyhow::Result<SinkStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SinkCommand::GetStats { respond_to: tx })
            .await
            .context("failed to send GetStats command")?;

        rx.await.context("failed to receive sink stats")
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.sender
            .send(SinkCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}

/// The running sink actor and the configuration it was built from
pub struct ConfiguredSink {
    config: SinkConfig,
    handle: SinkHandle,
}

impl ConfiguredSink {
    pub fn spawn(config: SinkConfig, batch_tx: &broadcast::Sender<EventBatch>) -> anyhow::Result<Self> {
        let handle = SinkHandle::spawn(config.build()?, batch_tx.subscribe());
        Ok(Self { config, handle })
    }

    /// Replace the sink actor if `config` differs from the running one.
    ///
    /// Returns whether the sink was replaced. On error the running sink is
    /// kept. A batch published during the swap may reach both sinks.
    pub async fn reconfigure(
        &mut self,
        config: SinkConfig,
        batch_tx: &broadcast::Sender<EventBatch>,
    ) -> anyhow::Result<bool> {
        if config == self.config {
            return Ok(false);
        }

        let sink = config.build()?;
        let batch_rx = batch_tx.subscribe();
        if let Err(e) = self.handle.shutdown().await {
            warn!("previous sink already stopped: {e:#}");
        }

        info!("switching event sink to {}", sink.name());
        self.handle = SinkHandle::spawn(sink, batch_rx);
        self.config = config;
        Ok(true)
    }

    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    pub fn handle(&self) -> &SinkHandle {
        &self.handle
    }
}
