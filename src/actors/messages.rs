//! Message types for actor communication
//!
//! Pollers publish one [`EventBatch`](crate::events::EventBatch) per cycle on a
//! broadcast channel; commands travel over per-actor mpsc channels and
//! replies over oneshot channels.

use tokio::sync::oneshot;

use crate::events::EventBatch;

use super::poller::PollTask;

/// Commands that can be sent to a PollerActor
#[derive(Debug)]
pub enum PollerCommand {
    /// Run a cycle immediately (bypassing the interval timer)
    ///
    /// Replies with the batch the cycle produced, or an error if the
    /// datasource could not be resolved.
    PollNow {
        respond_to: oneshot::Sender<anyhow::Result<EventBatch>>,
    },

    /// Override the polling interval
    ///
    /// Stays in effect for the lifetime of the poller.
    UpdateInterval { interval_secs: u64 },

    /// Replace the datasource, context and connection settings
    ///
    /// Takes effect with the next cycle.
    UpdateTask { task: Box<PollTask> },

    /// Gracefully shut down the poller
    ///
    /// An in-flight cycle is finished first.
    Shutdown,
}

/// Commands that can be sent to the SinkActor
#[derive(Debug)]
pub enum SinkCommand {
    GetStats {
        respond_to: oneshot::Sender<SinkStats>,
    },

    /// Gracefully shut down the sink actor
    Shutdown,
}

/// Delivery statistics of the sink actor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Batches accepted by the sink
    pub delivered: u64,

    /// Batches the sink rejected (lost)
    pub failed: u64,

    /// Batches skipped because the actor fell behind
    pub lagged: u64,
}
