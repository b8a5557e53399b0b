//! Failure classification
//!
//! Every failed cycle is reduced to one Warning event under the shared
//! collection key. Timeouts get a fixed message; everything else is reported
//! as `failed collection - <failure>`.

use thiserror::Error;

use crate::connection::ConnectionError;
use crate::datasource::PollConfig;
use crate::events::{COLLECTION_EVENT_KEY, ERROR_EVENT_CLASS_KEY, EventDescriptor, Severity};
use crate::query::QueryError;

pub const TIMEOUT_MESSAGE: &str = "Timeout while connecting to host";

pub const FAILURE_PREFIX: &str = "failed collection - ";

/// Why a poll cycle did not produce a service state
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollectError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("service '{service}' not found on host")]
    ServiceNotFound { service: String },

    /// The cycle was abandoned before the remote call completed
    #[error("collection cancelled after {seconds}s")]
    Cancelled { seconds: u64 },
}

/// Normalized failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Timeout,
    TransportFailure,
    Other,
}

impl ErrorCategory {
    pub fn of(error: &CollectError) -> Self {
        match error {
            CollectError::Query(e) if e.is_timeout() => ErrorCategory::Timeout,
            CollectError::Cancelled { .. } => ErrorCategory::Timeout,
            CollectError::Query(_) => ErrorCategory::TransportFailure,
            CollectError::Connection(_) | CollectError::ServiceNotFound { .. } => {
                ErrorCategory::Other
            }
        }
    }

    /// Prefix placed in front of the failure text
    pub fn prefix(self) -> &'static str {
        match self {
            ErrorCategory::Timeout => "",
            ErrorCategory::TransportFailure | ErrorCategory::Other => FAILURE_PREFIX,
        }
    }
}

/// User-facing message for a failure
pub fn message(error: &CollectError) -> String {
    match ErrorCategory::of(error) {
        ErrorCategory::Timeout => TIMEOUT_MESSAGE.to_string(),
        category => format!("{}{error}", category.prefix()),
    }
}

/// Build the single error event of a failed cycle
pub fn classify(error: &CollectError, config: &PollConfig) -> EventDescriptor {
    EventDescriptor {
        event_class: config.event_class.clone(),
        event_class_key: ERROR_EVENT_CLASS_KEY.to_string(),
        event_key: COLLECTION_EVENT_KEY.to_string(),
        severity: Severity::Warning,
        summary: message(error),
        component: None,
        device: config.target_id.clone(),
    }
}
