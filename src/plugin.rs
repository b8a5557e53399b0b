//! Collector plugin interface and the Windows service status plugin
//!
//! The host drives a plugin through four hooks per cycle:
//!
//! ```text
//! build_config → collect ─┬─ Ok  → on_success → EventBatch (state + heartbeat)
//!                         └─ Err → on_error   → EventBatch (one error event)
//! ```
//!
//! [`run_cycle`] wires these together and guarantees exactly one batch per
//! cycle. Plugins hold no per-target state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, instrument, trace};

use crate::classify::{self, CollectError};
use crate::connection::{ConnectionInfo, ConnectionProperties};
use crate::datasource::{ConfigError, ConfigKey, PollConfig, ServiceDataSource};
use crate::events::EventBatch;
use crate::query::{QueryError, RemoteQueryClient};
use crate::service::{ServiceRecord, service_status_query};
use crate::template::TemplateContext;
use crate::transition;

/// Hooks a host scheduler invokes for every poll cycle
#[async_trait]
pub trait CollectorPlugin: Send + Sync {
    /// Stable identifier, part of every [`ConfigKey`]
    fn plugin_id(&self) -> &str;

    /// Resolve the datasource for this cycle
    fn build_config(
        &self,
        source: &ServiceDataSource,
        context: &TemplateContext,
    ) -> Result<PollConfig, ConfigError> {
        source.resolve(context)
    }

    fn config_key(&self, config: &PollConfig) -> ConfigKey {
        config.config_key(self.plugin_id())
    }

    /// Perform the remote call for one cycle
    async fn collect(
        &self,
        config: &PollConfig,
        connection: &ConnectionProperties,
    ) -> Result<Vec<ServiceRecord>, CollectError>;

    /// Turn collected records into the success batch
    fn on_success(
        &self,
        records: &[ServiceRecord],
        config: &PollConfig,
    ) -> Result<EventBatch, CollectError>;

    /// Turn a failure into the error batch
    fn on_error(&self, error: &CollectError, config: &PollConfig) -> EventBatch;
}

/// Run one complete cycle and return its batch.
///
/// The remote call is abandoned once `config.timeout_seconds` elapse and the
/// cycle is reported as a timeout.
#[instrument(skip_all, fields(device = %config.target_id, service = %config.service_name))]
pub async fn run_cycle(
    plugin: &dyn CollectorPlugin,
    config: &PollConfig,
    connection: &ConnectionProperties,
) -> EventBatch {
    let timeout = Duration::from_secs(config.timeout_seconds);

    let collected = match tokio::time::timeout(timeout, plugin.collect(config, connection)).await {
        Ok(result) => result,
        Err(_) => Err(CollectError::Cancelled {
            seconds: config.timeout_seconds,
        }),
    };

    match collected.and_then(|records| plugin.on_success(&records, config)) {
        Ok(batch) => batch,
        Err(e) => plugin.on_error(&e, config),
    }
}

pub const SERVICE_PLUGIN_ID: &str = "winservice_monitoring.plugin.ServicePlugin";

/// Collects the state of a single Windows service
#[derive(Clone)]
pub struct ServicePlugin {
    client: Arc<dyn RemoteQueryClient>,
}

impl ServicePlugin {
    pub fn new(client: Arc<dyn RemoteQueryClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CollectorPlugin for ServicePlugin {
    fn plugin_id(&self) -> &str {
        SERVICE_PLUGIN_ID
    }

    async fn collect(
        &self,
        config: &PollConfig,
        connection: &ConnectionProperties,
    ) -> Result<Vec<ServiceRecord>, CollectError> {
        debug!(
            "{}: start collection of service {}",
            config.target_id, config.service_name
        );

        let connection = ConnectionInfo::from_properties(&config.target_id, connection)?;
        let query = service_status_query(&config.service_name);
        trace!("{query}");

        let results = self
            .client
            .execute_query(&connection, std::slice::from_ref(&query))
            .await?;

        let result = results
            .into_iter()
            .next()
            .ok_or_else(|| QueryError::Malformed(format!("no result for query: {query}")))?;

        let records = result
            .objects
            .iter()
            .map(ServiceRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn on_success(
        &self,
        records: &[ServiceRecord],
        config: &PollConfig,
    ) -> Result<EventBatch, CollectError> {
        let record = records.first().ok_or_else(|| CollectError::ServiceNotFound {
            service: config.service_name.clone(),
        })?;

        trace!(
            "{}: service {} is {} (expected {})",
            config.target_id, record.name, record.state, config.expected_state
        );

        Ok(EventBatch::new(
            &config.target_id,
            transition::evaluate(config, record),
        ))
    }

    fn on_error(&self, e: &CollectError, config: &PollConfig) -> EventBatch {
        let event = classify::classify(e, config);
        error!("WindowsServiceLog: {} {config}", event.summary);

        EventBatch::new(&config.target_id, vec![event])
    }
}
