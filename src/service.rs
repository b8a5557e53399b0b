//! Windows service records and the status query

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::query::{QueryError, WmiObject, WqlQuery};

/// State of a service as reported by the host.
///
/// Anything other than `Running` and `Stopped` (e.g. `Start Pending`) is kept
/// verbatim so it can be reported back to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServiceState {
    Running,
    Stopped,
    Other(String),
}

impl From<String> for ServiceState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Running" => ServiceState::Running,
            "Stopped" => ServiceState::Stopped,
            _ => ServiceState::Other(value),
        }
    }
}

impl From<&str> for ServiceState {
    fn from(value: &str) -> Self {
        ServiceState::from(value.to_string())
    }
}

impl From<ServiceState> for String {
    fn from(state: ServiceState) -> Self {
        state.to_string()
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Running => f.write_str("Running"),
            ServiceState::Stopped => f.write_str("Stopped"),
            ServiceState::Other(state) => f.write_str(state),
        }
    }
}

/// One `Win32_Service` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    pub display_name: String,
    pub state: ServiceState,
    pub status: String,
}

impl TryFrom<&WmiObject> for ServiceRecord {
    type Error = QueryError;

    fn try_from(object: &WmiObject) -> Result<Self, Self::Error> {
        let required = |property: &str| {
            object
                .get(property)
                .map(str::to_string)
                .ok_or_else(|| QueryError::Malformed(format!("service record without {property}")))
        };

        Ok(Self {
            name: required("Name")?,
            state: ServiceState::from(required("State")?),
            display_name: object.get("DisplayName").unwrap_or_default().to_string(),
            status: object.get("Status").unwrap_or_default().to_string(),
        })
    }
}

/// Build the single-service status query.
///
/// The service name is inserted as-is.
pub fn service_status_query(service_name: &str) -> WqlQuery {
    WqlQuery::new(format!(
        "select name, state, status, displayname from Win32_Service where name = \"{service_name}\""
    ))
}
