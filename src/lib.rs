//! Windows service status collector
//!
//! Polls the state of a Windows service over WinRM, compares it against the
//! operator's expectation and emits alert/clear events plus a heartbeat.
//!
//! ```text
//! ServiceDataSource ─resolve→ PollConfig ─collect→ ServiceRecord ─evaluate→ EventBatch
//!                                            └─ failure ─classify→ EventBatch
//! ```

pub mod actors;
pub mod classify;
pub mod config;
pub mod connection;
pub mod datasource;
pub mod events;
pub mod plugin;
pub mod query;
pub mod service;
pub mod sink;
pub mod template;
pub mod transition;
pub mod util;

pub use classify::{CollectError, ErrorCategory};
pub use datasource::{ConfigError, ConfigKey, ExpectedState, PollConfig, ServiceDataSource, StartMode};
pub use events::{EventBatch, EventDescriptor, Severity};
pub use plugin::{CollectorPlugin, ServicePlugin, run_cycle};
pub use service::{ServiceRecord, ServiceState};
