//! Integration tests for the scheduler and the actor pipeline
//!
//! These tests verify that:
//! - One poller runs per resolved datasource
//! - Start-mode filtering and invalid datasources keep pollers from starting
//! - Re-syncing stops, starts and keeps pollers by config key
//! - Batches flow from the pollers through the sink actor

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use winservice_monitoring::actors::scheduler::{Scheduler, SyncReport};
use winservice_monitoring::actors::sink::SinkHandle;
use winservice_monitoring::plugin::SERVICE_PLUGIN_ID;
use winservice_monitoring::sink::MemorySink;
use winservice_monitoring::{EventBatch, ServiceDataSource, ServicePlugin, StartMode};

use crate::helpers::{MockClient, datasource, service, target};

fn new_scheduler(client: MockClient) -> (Scheduler, broadcast::Receiver<EventBatch>) {
    let (batch_tx, batch_rx) = broadcast::channel(64);
    let plugin = Arc::new(ServicePlugin::new(Arc::new(client)));
    (Scheduler::new(plugin, batch_tx), batch_rx)
}

#[tokio::test]
async fn test_start_mode_filter() {
    let (mut scheduler, _batch_rx) = new_scheduler(MockClient::service("Spooler", "Running"));

    let targets = vec![target(
        "win-01",
        vec![
            service("Spooler", datasource(StartMode::Auto), Some("Auto")),
            service("Fax", datasource(StartMode::Auto), Some("Manual")),
            service("Dhcp", datasource(StartMode::Any), Some("Disabled")),
            service("W32Time", datasource(StartMode::None), Some("Auto")),
            service("Unmodeled", datasource(StartMode::Manual), None),
        ],
    )];

    let report = scheduler.sync(&targets).await;

    assert_eq!(
        report,
        SyncReport {
            started: 3,
            skipped: 2,
            ..Default::default()
        }
    );

    let services: Vec<_> = scheduler.keys().map(|key| key.service_name.as_str()).collect();
    assert_eq!(services.len(), 3);
    assert!(services.contains(&"Spooler"));
    assert!(services.contains(&"Dhcp"));
    assert!(services.contains(&"Unmodeled"));
    assert!(scheduler.keys().all(|key| key.plugin_id == SERVICE_PLUGIN_ID));

    scheduler.shutdown().await;
    assert!(scheduler.is_empty());
}

#[tokio::test]
async fn test_invalid_datasource_is_not_started() {
    let (mut scheduler, _batch_rx) = new_scheduler(MockClient::service("Spooler", "Running"));

    let broken = ServiceDataSource {
        alertifnot: "Paused".to_string(),
        ..datasource(StartMode::Any)
    };
    let unresolved = ServiceDataSource {
        servicename: "${here/missing}".to_string(),
        ..datasource(StartMode::Any)
    };

    let targets = vec![target(
        "win-01",
        vec![
            service("Spooler", datasource(StartMode::Any), None),
            service("Broken", broken, None),
            service("Unresolved", unresolved, None),
        ],
    )];

    let report = scheduler.sync(&targets).await;

    assert_eq!(report.started, 1);
    assert_eq!(report.invalid, 2);
    assert_eq!(scheduler.len(), 1);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_resync_diffs_by_config_key() {
    let (mut scheduler, _batch_rx) = new_scheduler(MockClient::service("Spooler", "Running"));

    let first = vec![target(
        "win-01",
        vec![
            service("Spooler", datasource(StartMode::Any), None),
            service("Dhcp", datasource(StartMode::Any), None),
        ],
    )];
    assert_eq!(scheduler.sync(&first).await.started, 2);

    // Dhcp now expects Stopped, which changes its key
    let dhcp_stopped = ServiceDataSource {
        alertifnot: "Stopped".to_string(),
        ..datasource(StartMode::Any)
    };
    let second = vec![target(
        "win-01",
        vec![
            service("Spooler", datasource(StartMode::Any), None),
            service("Dhcp", dhcp_stopped, None),
            service("W32Time", datasource(StartMode::Any), None),
        ],
    )];

    let report = scheduler.sync(&second).await;

    assert_eq!(
        report,
        SyncReport {
            started: 2,
            stopped: 1,
            kept: 1,
            ..Default::default()
        }
    );
    assert_eq!(scheduler.len(), 3);

    let report = scheduler.sync(&[]).await;
    assert_eq!(report.stopped, 3);
    assert!(scheduler.is_empty());
}

#[tokio::test]
async fn test_duplicate_datasource_runs_once() {
    let (mut scheduler, _batch_rx) = new_scheduler(MockClient::service("Spooler", "Running"));

    let targets = vec![target(
        "win-01",
        vec![
            service("Spooler", datasource(StartMode::Any), None),
            service("Spooler", datasource(StartMode::Any), None),
        ],
    )];

    scheduler.sync(&targets).await;
    assert_eq!(scheduler.len(), 1);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_pipeline_delivers_to_sink() {
    let (mut scheduler, batch_rx) = new_scheduler(MockClient::service("Spooler", "Stopped"));
    let sink = MemorySink::new();
    let sink_handle = SinkHandle::spawn(Arc::new(sink.clone()), batch_rx);

    let targets = vec![target(
        "win-01",
        vec![service("Spooler", datasource(StartMode::Any), None)],
    )];
    scheduler.sync(&targets).await;

    let key = scheduler.keys().next().cloned().unwrap();
    let batch = scheduler.poller(&key).unwrap().poll_now().await.unwrap();
    assert_eq!(batch.len(), 2);

    tokio::time::sleep(Duration::from_millis(100)).await;

    // the first timer tick and the manual poll both publish
    let events = sink.events().await;
    assert!(events.len() >= 2);
    assert!(events.iter().any(|event| {
        event.summary == "Service Alert: Spooler has changed to Stopped state"
    }));
    assert!(sink_handle.stats().await.unwrap().delivered >= 1);

    scheduler.shutdown().await;
    sink_handle.shutdown().await.unwrap();
}
