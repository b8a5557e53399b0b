//! Service datasource definition and per-cycle resolution
//!
//! A [`ServiceDataSource`] holds the operator's (possibly templated) settings.
//! At the start of every cycle it is resolved against the current
//! [`TemplateContext`] into an immutable [`PollConfig`]. Nothing is cached
//! between cycles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::{DEFAULT_EVENT_CLASS, DEFAULT_EVENT_KEY, Severity};
use crate::service::ServiceState;
use crate::template::{self, TemplateContext};

/// Errors while turning a datasource into a poll configuration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unable to resolve template expression {expression}")]
    UnresolvedTemplate { expression: String },

    #[error("expected state must be Running or Stopped, got '{0}'")]
    InvalidExpectedState(String),

    #[error("start mode must be one of None, Any, Auto, Disabled, Manual, got '{0}'")]
    InvalidStartMode(String),

    #[error("cycle time must be a positive number of seconds")]
    InvalidCycleTime,

    #[error("invalid severity: {0}")]
    InvalidSeverity(String),
}

/// The state a service is expected to be in; anything else raises an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExpectedState {
    Running,
    Stopped,
}

impl ExpectedState {
    pub fn matches(self, observed: &ServiceState) -> bool {
        matches!(
            (self, observed),
            (ExpectedState::Running, ServiceState::Running)
                | (ExpectedState::Stopped, ServiceState::Stopped)
        )
    }
}

impl FromStr for ExpectedState {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "running" => Ok(ExpectedState::Running),
            "stopped" => Ok(ExpectedState::Stopped),
            _ => Err(ConfigError::InvalidExpectedState(s.to_string())),
        }
    }
}

impl fmt::Display for ExpectedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedState::Running => f.write_str("Running"),
            ExpectedState::Stopped => f.write_str("Stopped"),
        }
    }
}

/// Start-mode filter for which service instances get monitored
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StartMode {
    /// Monitoring disabled
    None,
    Any,
    Auto,
    Disabled,
    Manual,
}

impl StartMode {
    /// Whether a service with the given modeled start mode should be polled.
    ///
    /// Services whose start mode is unknown are polled unless monitoring is
    /// disabled altogether.
    pub fn monitors(self, modeled: Option<&str>) -> bool {
        match self {
            StartMode::None => false,
            StartMode::Any => true,
            StartMode::Auto | StartMode::Disabled | StartMode::Manual => {
                modeled.is_none_or(|mode| mode.eq_ignore_ascii_case(&self.to_string()))
            }
        }
    }
}

impl FromStr for StartMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(StartMode::None),
            "any" => Ok(StartMode::Any),
            "auto" => Ok(StartMode::Auto),
            "disabled" => Ok(StartMode::Disabled),
            "manual" => Ok(StartMode::Manual),
            _ => Err(ConfigError::InvalidStartMode(s.to_string())),
        }
    }
}

impl fmt::Display for StartMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StartMode::None => "None",
            StartMode::Any => "Any",
            StartMode::Auto => "Auto",
            StartMode::Disabled => "Disabled",
            StartMode::Manual => "Manual",
        };
        f.write_str(name)
    }
}

/// Windows service status datasource as configured by the operator
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceDataSource {
    /// Datasource name
    #[serde(default = "default_datasource_name")]
    pub name: String,

    #[serde(default = "default_servicename")]
    pub servicename: String,

    #[serde(default = "default_alertifnot")]
    pub alertifnot: String,

    #[serde(default = "default_startmode")]
    pub startmode: String,

    #[serde(default = "default_cycletime")]
    pub cycletime: u64,

    #[serde(default = "default_severity")]
    pub severity: u8,

    pub event_class: Option<String>,
    pub event_key: Option<String>,

    /// Cycle timeout in seconds, defaults to and is capped at the cycle time
    pub timeout: Option<u64>,
}

fn default_datasource_name() -> String {
    "ServiceStatus".to_string()
}

fn default_servicename() -> String {
    "${here/id}".to_string()
}

fn default_alertifnot() -> String {
    "Running".to_string()
}

fn default_startmode() -> String {
    "None".to_string()
}

fn default_cycletime() -> u64 {
    300
}

fn default_severity() -> u8 {
    Severity::Warning.ordinal()
}

impl Default for ServiceDataSource {
    fn default() -> Self {
        Self {
            name: default_datasource_name(),
            servicename: default_servicename(),
            alertifnot: default_alertifnot(),
            startmode: default_startmode(),
            cycletime: default_cycletime(),
            severity: default_severity(),
            event_class: None,
            event_key: None,
            timeout: None,
        }
    }
}

impl ServiceDataSource {
    /// Resolve all templated fields into a poll configuration for one cycle
    pub fn resolve(&self, context: &TemplateContext) -> Result<PollConfig, ConfigError> {
        if self.cycletime == 0 {
            return Err(ConfigError::InvalidCycleTime);
        }

        let service_name = template::resolve(&self.servicename, context)?;
        let expected_state = template::resolve(&self.alertifnot, context)?.parse::<ExpectedState>()?;
        let start_mode = template::resolve(&self.startmode, context)?.parse::<StartMode>()?;
        let severity =
            Severity::try_from(self.severity).map_err(ConfigError::InvalidSeverity)?;

        Ok(PollConfig {
            target_id: context.device_id.clone(),
            datasource: self.name.clone(),
            component_id: context.component_id.clone(),
            service_name,
            expected_state,
            start_mode,
            cycle_seconds: self.cycletime,
            timeout_seconds: self
                .timeout
                .filter(|t| *t > 0)
                .map_or(self.cycletime, |t| t.min(self.cycletime)),
            severity,
            event_class: non_empty_or(&self.event_class, DEFAULT_EVENT_CLASS),
            event_key: non_empty_or(&self.event_key, DEFAULT_EVENT_KEY),
        })
    }
}

fn non_empty_or(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Configuration of a single poll cycle, immutable once resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollConfig {
    pub target_id: String,
    pub datasource: String,
    pub component_id: Option<String>,
    pub service_name: String,
    pub expected_state: ExpectedState,
    pub start_mode: StartMode,
    pub cycle_seconds: u64,
    pub timeout_seconds: u64,
    pub severity: Severity,
    pub event_class: String,
    pub event_key: String,
}

impl PollConfig {
    pub fn config_key(&self, plugin_id: &str) -> ConfigKey {
        ConfigKey {
            target_id: self.target_id.clone(),
            cycle_seconds: self.cycle_seconds,
            datasource: self.datasource.clone(),
            plugin_id: plugin_id.to_string(),
            service_name: self.service_name.clone(),
            expected_state: self.expected_state,
            start_mode: self.start_mode,
        }
    }
}

impl fmt::Display for PollConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} {}/{} service={} alertifnot={} every {}s>",
            self.target_id,
            self.component_id.as_deref().unwrap_or("-"),
            self.datasource,
            self.service_name,
            self.expected_state,
            self.cycle_seconds
        )
    }
}

/// Identity of a poll task.
///
/// Two datasources with the same key are the same task; a changed key means
/// the task has to be re-provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConfigKey {
    pub target_id: String,
    pub cycle_seconds: u64,
    pub datasource: String,
    pub plugin_id: String,
    pub service_name: String,
    pub expected_state: ExpectedState,
    pub start_mode: StartMode,
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}|{}|{}",
            self.target_id,
            self.cycle_seconds,
            self.datasource,
            self.plugin_id,
            self.service_name,
            self.expected_state,
            self.start_mode
        )
    }
}
