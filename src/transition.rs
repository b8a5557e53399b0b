//! Maps an observed service state to the events of a successful cycle
//!
//! ```text
//! observed != expected → Alert  (configured severity)  ┐
//! observed == expected → Recovered (Clear)             ├─ + heartbeat (Clear)
//! ```
//!
//! Alert and recovery share the datasource's dedup key, so a recovery clears
//! the alert that preceded it.

use crate::datasource::PollConfig;
use crate::events::{
    COLLECTION_EVENT_KEY, EventDescriptor, HEARTBEAT_EVENT_CLASS_KEY, HEARTBEAT_SUMMARY,
    STATE_EVENT_CLASS_KEY, Severity,
};
use crate::service::ServiceRecord;
use crate::util::prep_id;

/// Outcome of comparing the observed state with the expected one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Alert,
    Recovered,
}

impl Transition {
    pub fn of(config: &PollConfig, record: &ServiceRecord) -> Self {
        if config.expected_state.matches(&record.state) {
            Transition::Recovered
        } else {
            Transition::Alert
        }
    }
}

/// Build the state event followed by the heartbeat
pub fn evaluate(config: &PollConfig, record: &ServiceRecord) -> Vec<EventDescriptor> {
    vec![state_event(config, record), heartbeat(config)]
}

pub fn state_event(config: &PollConfig, record: &ServiceRecord) -> EventDescriptor {
    let (severity, summary) = match Transition::of(config, record) {
        Transition::Alert => (
            config.severity,
            format!(
                "Service Alert: {} has changed to {} state",
                record.name, record.state
            ),
        ),
        Transition::Recovered => (
            Severity::Clear,
            format!(
                "Service Recovered: {} has changed to {} state",
                record.name, record.state
            ),
        ),
    };

    EventDescriptor {
        event_class: config.event_class.clone(),
        event_class_key: STATE_EVENT_CLASS_KEY.to_string(),
        event_key: config.event_key.clone(),
        severity,
        summary,
        component: Some(prep_id(&record.name)),
        device: config.target_id.clone(),
    }
}

/// Clear event confirming the collection itself worked
pub fn heartbeat(config: &PollConfig) -> EventDescriptor {
    EventDescriptor {
        event_class: config.event_class.clone(),
        event_class_key: HEARTBEAT_EVENT_CLASS_KEY.to_string(),
        event_key: COLLECTION_EVENT_KEY.to_string(),
        severity: Severity::Clear,
        summary: HEARTBEAT_SUMMARY.to_string(),
        component: None,
        device: config.target_id.clone(),
    }
}
