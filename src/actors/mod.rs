//! Actor-based host scheduling
//!
//! Each actor runs as an independent async task communicating via Tokio channels.
//!
//! ## Architecture Overview
//!
//! ```text
//!                    ┌─────────────────┐
//!                    │    Scheduler    │
//!                    └────────┬────────┘
//!                             │ spawns (one per ConfigKey)
//!                ┌────────────┼────────────┐
//!                │            │            │
//!        ┌───────▼───────┐    │    ┌───────▼───────┐
//!        │   Poller-1    │    │    │   Poller-N    │
//!        │ (win-01/Dhcp) │    │    │ (win-07/Sql)  │
//!        └───────┬───────┘    │    └───────┬───────┘
//!                │            │            │
//!                └────────────┼────────────┘
//!                             │
//!                   ┌─────────▼──────────┐
//!                   │ Broadcast Channel  │ (event batches)
//!                   └─────────┬──────────┘
//!                             │ subscribe
//!                     ┌───────▼───────┐
//!                     │   SinkActor   │ → EventSink
//!                     └───────────────┘
//! ```
//!
//! ## Actor Types
//!
//! - **PollerActor**: Runs the poll cycle of one service at its cycle interval
//! - **SinkActor**: Hands every batch to the configured event sink
//!
//! Pollers share no mutable state; each one has at most one remote call in
//! flight.

pub mod messages;
pub mod poller;
pub mod scheduler;
pub mod sink;
