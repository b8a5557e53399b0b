use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::trace;

use crate::connection::ConnectionProperties;
use crate::datasource::ServiceDataSource;
use crate::sink::{EventSink, LogSink, WebhookSink};
use crate::template::TemplateContext;

/// Component property holding the modeled start mode of a service
pub const START_MODE_PROPERTY: &str = "start_mode";

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub targets: Vec<TargetConfig>,

    /// Where events go (defaults to the log)
    #[serde(default)]
    pub sink: SinkConfig,
}

/// A monitored Windows host
#[derive(Debug, Clone, serde::Deserialize)]
pub struct TargetConfig {
    pub id: String,

    #[serde(default)]
    pub connection: ConnectionProperties,

    /// Device properties available to templates as `${dev/<name>}`
    #[serde(default)]
    pub properties: BTreeMap<String, String>,

    #[serde(default)]
    pub services: Vec<MonitoredService>,
}

/// A service component on a target together with its datasource
#[derive(Debug, Clone, serde::Deserialize)]
pub struct MonitoredService {
    /// Component id, available to templates as `${here/id}`
    pub id: String,

    /// Component properties available to templates as `${here/<name>}`
    #[serde(default)]
    pub properties: BTreeMap<String, String>,

    #[serde(flatten)]
    pub datasource: ServiceDataSource,
}

impl MonitoredService {
    pub fn modeled_start_mode(&self) -> Option<&str> {
        self.properties.get(START_MODE_PROPERTY).map(String::as_str)
    }
}

impl TargetConfig {
    pub fn context_for(&self, service: &MonitoredService) -> TemplateContext {
        TemplateContext {
            device_id: self.id.clone(),
            component_id: Some(service.id.clone()),
            component_properties: service.properties.clone(),
            device_properties: self.properties.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    #[default]
    Log,
    Webhook(Webhook),
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Webhook {
    pub url: String,
    pub token: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_webhook_timeout")]
    pub timeout: u64,
}

impl SinkConfig {
    pub fn build(&self) -> anyhow::Result<Arc<dyn EventSink>> {
        Ok(match self {
            SinkConfig::Log => Arc::new(LogSink),
            SinkConfig::Webhook(webhook) => Arc::new(WebhookSink::new(webhook.clone())?),
        })
    }
}

fn default_webhook_timeout() -> u64 {
    10
}

pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&file_content)
        .with_context(|| format!("invalid configuration file {}", path.display()))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
