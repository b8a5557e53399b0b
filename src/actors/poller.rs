//! PollerActor - Runs the poll cycle of one service datasource
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → resolve PollConfig → run_cycle → Publish EventBatch → [SinkActor, ...]
//!     ↑
//!     └─── Commands (PollNow, UpdateInterval, Shutdown)
//! ```
//!
//! The datasource is resolved afresh on every cycle. A cycle that overruns
//! its interval delays the next tick instead of firing the missed ones, so a
//! new attempt only starts on a cycle boundary. Changes to the resolved
//! [`ConfigKey`](crate::datasource::ConfigKey) are handled by the scheduler,
//! which replaces the poller.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{debug, error, instrument, trace, warn};

use crate::config::{MonitoredService, TargetConfig};
use crate::connection::ConnectionProperties;
use crate::datasource::ServiceDataSource;
use crate::events::EventBatch;
use crate::plugin::{CollectorPlugin, run_cycle};
use crate::template::TemplateContext;

use super::messages::PollerCommand;

/// Everything a poller needs to resolve and run its cycles
#[derive(Debug, Clone)]
pub struct PollTask {
    pub datasource: ServiceDataSource,
    pub context: TemplateContext,
    pub connection: ConnectionProperties,
}

impl PollTask {
    pub fn new(target: &TargetConfig, service: &MonitoredService) -> Self {
        Self {
            datasource: service.datasource.clone(),
            context: target.context_for(service),
            connection: target.connection.clone(),
        }
    }

    /// `device/component` label for logging
    pub fn label(&self) -> String {
        format!(
            "{}/{}",
            self.context.device_id,
            self.context.component_id.as_deref().unwrap_or("-")
        )
    }
}

/// Actor that polls a single service
pub struct PollerActor {
    plugin: Arc<dyn CollectorPlugin>,

    task: PollTask,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<PollerCommand>,

    /// Broadcast sender for publishing batches
    batch_tx: broadcast::Sender<EventBatch>,

    /// Current polling interval
    interval_duration: Duration,

    /// Set when the timer has to be re-armed with `interval_duration`
    rearm: bool,

    label: String,
}

impl PollerActor {
    pub fn new(
        plugin: Arc<dyn CollectorPlugin>,
        task: PollTask,
        command_rx: mpsc::Receiver<PollerCommand>,
        batch_tx: broadcast::Sender<EventBatch>,
    ) -> Self {
        let interval_duration = Duration::from_secs(task.datasource.cycletime.max(1));
        let label = task.label();

        Self {
            plugin,
            task,
            command_rx,
            batch_tx,
            interval_duration,
            rearm: false,
            label,
        }
    }

    /// Run the actor's main loop
    ///
    /// This is the entry point for the actor. It runs until:
    /// - A Shutdown command is received
    /// - The command channel is closed
    #[instrument(skip(self), fields(service = %self.label))]
    pub async fn run(mut self) {
        debug!("starting poller actor");

        let mut ticker = cycle_ticker(self.interval_duration);

        loop {
            tokio::select! {
                // Timer tick - run a cycle
                _ = ticker.tick() => {
                    if let Err(e) = self.poll().await {
                        error!("poll cycle did not run: {:#}", e);
                    }
                }

                // Handle commands
                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        PollerCommand::PollNow { respond_to } => {
                            debug!("received PollNow command");
                            let result = self.poll().await;
                            let _ = respond_to.send(result);
                        }

                        PollerCommand::UpdateInterval { interval_secs } => {
                            debug!("updating interval to {interval_secs}s");
                            self.interval_duration = Duration::from_secs(interval_secs.max(1));
                            self.rearm = true;
                        }

                        PollerCommand::UpdateTask { task } => {
                            trace!("received UpdateTask command");
                            self.task = *task;
                        }

                        PollerCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                // Command channel closed - exit
                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }

            if self.rearm {
                self.rearm = false;
                ticker = cycle_ticker(self.interval_duration);
                // the cycle just ran, wait a full period
                ticker.reset();
            }
        }

        debug!("poller actor stopped");
    }

    /// Resolve the datasource and run one cycle
    ///
    /// Resolution failures abort the cycle without publishing anything.
    async fn poll(&mut self) -> Result<EventBatch> {
        let config = self
            .plugin
            .build_config(&self.task.datasource, &self.task.context)
            .with_context(|| format!("failed to resolve datasource for {}", self.label))?;

        trace!("polling {}", self.plugin.config_key(&config));

        let batch = run_cycle(self.plugin.as_ref(), &config, &self.task.connection).await;

        match self.batch_tx.send(batch.clone()) {
            Ok(num_receivers) => {
                trace!("published batch to {num_receivers} receivers");
            }
            Err(_) => {
                trace!("no receivers for batch (this is OK)");
            }
        }

        Ok(batch)
    }
}

fn cycle_ticker(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Handle for controlling a PollerActor
#[derive(Clone)]
pub struct PollerHandle {
    sender: mpsc::Sender<PollerCommand>,

    /// `device/component` label
    pub label: String,
}

impl PollerHandle {
    /// Spawn a new poller actor
    pub fn spawn(
        plugin: Arc<dyn CollectorPlugin>,
        task: PollTask,
        batch_tx: broadcast::Sender<EventBatch>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let label = task.label();

        let actor = PollerActor::new(plugin, task, cmd_rx, batch_tx);

        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            label,
        }
    }

    /// Run a cycle now and return its batch
    pub async fn poll_now(&self) -> Result<EventBatch> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PollerCommand::PollNow { respond_to: tx })
            .await
            .context("failed to send PollNow command")?;

        rx.await.context("failed to receive response")?
    }

    /// Update the polling interval
    pub async fn update_interval(&self, interval_secs: u64) -> Result<()> {
        self.sender
            .send(PollerCommand::UpdateInterval { interval_secs })
            .await
            .context("failed to send UpdateInterval command")?;
        Ok(())
    }

    /// Replace the task definition used by future cycles
    pub async fn update_task(&self, task: PollTask) -> Result<()> {
        self.sender
            .send(PollerCommand::UpdateTask {
                task: Box::new(task),
            })
            .await
            .context("failed to send UpdateTask command")?;
        Ok(())
    }

    /// Gracefully shut down the poller
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(PollerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
