//! Event types emitted by the collector
//!
//! Every poll cycle ends in exactly one [`EventBatch`]. Events are built once and
//! never mutated afterwards; downstream consumers correlate them by
//! `(event_class, event_key)`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default event class when the datasource does not override it
pub const DEFAULT_EVENT_CLASS: &str = "/Status";

/// Default dedup key for service state events
pub const DEFAULT_EVENT_KEY: &str = "WindowsService";

/// Class key of the service state event (alert or recovery)
pub const STATE_EVENT_CLASS_KEY: &str = "WindowsServiceLog";

/// Class key of the heartbeat emitted after a successful collection
pub const HEARTBEAT_EVENT_CLASS_KEY: &str = "WindowsServiceLogSuccess";

/// Class key of the event emitted when a collection fails
pub const ERROR_EVENT_CLASS_KEY: &str = "WindowsServiceCollectionError";

/// Dedup key shared by the heartbeat and the error event.
///
/// A later heartbeat clears an earlier collection error and vice versa.
pub const COLLECTION_EVENT_KEY: &str = "WindowsServiceCollection";

/// Summary of the heartbeat event
pub const HEARTBEAT_SUMMARY: &str = "Windows Service Check: successful service collection";

/// Event severity, serialized as its ordinal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Severity {
    Clear,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn ordinal(self) -> u8 {
        self.into()
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Clear => 0,
            Severity::Debug => 1,
            Severity::Info => 2,
            Severity::Warning => 3,
            Severity::Error => 4,
            Severity::Critical => 5,
        }
    }
}

impl TryFrom<u8> for Severity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            0 => Ok(Severity::Clear),
            1 => Ok(Severity::Debug),
            2 => Ok(Severity::Info),
            3 => Ok(Severity::Warning),
            4 => Ok(Severity::Error),
            5 => Ok(Severity::Critical),
            other => Err(format!("severity must be between 0 and 5, got {other}")),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Clear => "clear",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// A single structured event handed to the event sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDescriptor {
    pub event_class: String,
    pub event_class_key: String,
    pub event_key: String,
    pub severity: Severity,
    pub summary: String,

    /// Sanitized service name; absent on collection-level events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,

    /// Target (device) identifier
    pub device: String,
}

impl EventDescriptor {
    pub fn is_clear(&self) -> bool {
        self.severity == Severity::Clear
    }

    /// The correlation pair downstream alerting deduplicates on
    pub fn dedup_key(&self) -> (&str, &str) {
        (&self.event_class, &self.event_key)
    }
}

/// All events produced by one poll cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBatch {
    /// Target the cycle ran against
    pub device: String,

    /// When the cycle finished
    pub collected_at: DateTime<Utc>,

    pub events: Vec<EventDescriptor>,
}

impl EventBatch {
    pub fn new(device: impl Into<String>, events: Vec<EventDescriptor>) -> Self {
        Self {
            device: device.into(),
            collected_at: Utc::now(),
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
