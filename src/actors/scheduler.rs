//! Scheduler - Keeps one poller per configured service datasource
//!
//! Pollers are keyed by their [`ConfigKey`]. On every [`Scheduler::sync`]:
//!
//! ```text
//! key disappeared        → shut the poller down
//! key is new             → spawn a poller
//! key already running    → hand it the latest task definition
//! start mode filters out → no poller
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::config::TargetConfig;
use crate::datasource::ConfigKey;
use crate::events::EventBatch;
use crate::plugin::CollectorPlugin;

use super::poller::{PollTask, PollerHandle};

/// What a sync changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub started: usize,
    pub stopped: usize,
    pub kept: usize,

    /// Filtered out by their start mode
    pub skipped: usize,

    /// Datasources that could not be resolved
    pub invalid: usize,
}

pub struct Scheduler {
    plugin: Arc<dyn CollectorPlugin>,
    batch_tx: broadcast::Sender<EventBatch>,
    pollers: BTreeMap<ConfigKey, PollerHandle>,
}

impl Scheduler {
    pub fn new(plugin: Arc<dyn CollectorPlugin>, batch_tx: broadcast::Sender<EventBatch>) -> Self {
        Self {
            plugin,
            batch_tx,
            pollers: BTreeMap::new(),
        }
    }

    /// Bring the running pollers in line with `targets`
    #[instrument(skip_all, fields(targets = targets.len()))]
    pub async fn sync(&mut self, targets: &[TargetConfig]) -> SyncReport {
        let mut report = SyncReport::default();
        let mut desired = BTreeMap::new();

        for target in targets {
            for service in &target.services {
                let task = PollTask::new(target, service);

                let config = match self.plugin.build_config(&task.datasource, &task.context) {
                    Ok(config) => config,
                    Err(e) => {
                        error!("{}: {e}", task.label());
                        report.invalid += 1;
                        continue;
                    }
                };

                if !config.start_mode.monitors(service.modeled_start_mode()) {
                    debug!(
                        "{}: not monitored (start mode filter {})",
                        task.label(),
                        config.start_mode
                    );
                    report.skipped += 1;
                    continue;
                }

                let key = self.plugin.config_key(&config);
                if desired.insert(key, task).is_some() {
                    warn!("{}: duplicate datasource ignored", config);
                }
            }
        }

        let stale: Vec<ConfigKey> = self
            .pollers
            .keys()
            .filter(|key| !desired.contains_key(*key))
            .cloned()
            .collect();

        for key in stale {
            if let Some(handle) = self.pollers.remove(&key) {
                debug!("stopping poller {key}");
                if let Err(e) = handle.shutdown().await {
                    warn!("{}: {e:#}", handle.label);
                }
                report.stopped += 1;
            }
        }

        for (key, task) in desired {
            match self.pollers.get(&key) {
                Some(handle) => {
                    if let Err(e) = handle.update_task(task).await {
                        warn!("{}: {e:#}", handle.label);
                    }
                    report.kept += 1;
                }
                None => {
                    debug!("starting poller {key}");
                    let handle =
                        PollerHandle::spawn(self.plugin.clone(), task, self.batch_tx.clone());
                    self.pollers.insert(key, handle);
                    report.started += 1;
                }
            }
        }

        info!(
            "scheduler synced: {} started, {} stopped, {} kept, {} skipped, {} invalid",
            report.started, report.stopped, report.kept, report.skipped, report.invalid
        );

        report
    }

    pub fn keys(&self) -> impl Iterator<Item = &ConfigKey> {
        self.pollers.keys()
    }

    pub fn poller(&self, key: &ConfigKey) -> Option<&PollerHandle> {
        self.pollers.get(key)
    }

    pub fn len(&self) -> usize {
        self.pollers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pollers.is_empty()
    }

    /// Shut down every poller
    pub async fn shutdown(&mut self) {
        let results = join_all(self.pollers.values().map(|handle| handle.shutdown())).await;
        for result in results {
            if let Err(e) = result {
                warn!("{e:#}");
            }
        }
        self.pollers.clear();
    }
}
