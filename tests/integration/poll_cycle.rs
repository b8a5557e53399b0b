//! Integration tests for complete poll cycles
//!
//! These tests verify that:
//! - A service in its expected state yields a clear plus the heartbeat
//! - A service in any other state yields an alert plus the heartbeat
//! - Failed collections yield exactly one warning under the collection key
//! - Cycles exceeding their timeout are reported as timeouts

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use winservice_monitoring::classify::TIMEOUT_MESSAGE;
use winservice_monitoring::events::{
    COLLECTION_EVENT_KEY, ERROR_EVENT_CLASS_KEY, HEARTBEAT_EVENT_CLASS_KEY, HEARTBEAT_SUMMARY,
    STATE_EVENT_CLASS_KEY,
};
use winservice_monitoring::query::QueryError;
use winservice_monitoring::template::TemplateContext;
use winservice_monitoring::{PollConfig, ServiceDataSource, ServicePlugin, Severity, run_cycle};

use crate::helpers::{MockClient, connection_properties};

fn config(alertifnot: &str) -> PollConfig {
    ServiceDataSource {
        alertifnot: alertifnot.to_string(),
        ..Default::default()
    }
    .resolve(&TemplateContext::for_device("win-01").with_component("Spooler"))
    .unwrap()
}

#[tokio::test]
async fn test_running_service_clears() {
    let plugin = ServicePlugin::new(Arc::new(MockClient::service("Spooler", "Running")));

    let batch = run_cycle(&plugin, &config("Running"), &connection_properties()).await;

    assert_eq!(batch.device, "win-01");
    assert_eq!(batch.len(), 2);

    let state = &batch.events[0];
    assert_eq!(state.severity, Severity::Clear);
    assert_eq!(state.event_class_key, STATE_EVENT_CLASS_KEY);
    assert_eq!(state.event_key, "WindowsService");
    assert_eq!(state.component.as_deref(), Some("Spooler"));
    assert_eq!(
        state.summary,
        "Service Recovered: Spooler has changed to Running state"
    );

    let heartbeat = &batch.events[1];
    assert_eq!(heartbeat.severity, Severity::Clear);
    assert_eq!(heartbeat.event_class_key, HEARTBEAT_EVENT_CLASS_KEY);
    assert_eq!(heartbeat.event_key, COLLECTION_EVENT_KEY);
    assert_eq!(heartbeat.summary, HEARTBEAT_SUMMARY);
}

#[tokio::test]
async fn test_stopped_service_alerts() {
    let plugin = ServicePlugin::new(Arc::new(MockClient::service("Spooler", "Stopped")));

    let batch = run_cycle(&plugin, &config("Running"), &connection_properties()).await;

    assert_eq!(batch.len(), 2);
    assert_eq!(batch.events[0].severity, Severity::Warning);
    assert_eq!(
        batch.events[0].summary,
        "Service Alert: Spooler has changed to Stopped state"
    );
    assert!(batch.events[1].is_clear());
}

#[tokio::test]
async fn test_pending_state_alerts_either_way() {
    let plugin = ServicePlugin::new(Arc::new(MockClient::service("Spooler", "Start Pending")));

    for expected in ["Running", "Stopped"] {
        let batch = run_cycle(&plugin, &config(expected), &connection_properties()).await;
        assert_eq!(batch.events[0].severity, Severity::Warning);
        assert_eq!(
            batch.events[0].summary,
            "Service Alert: Spooler has changed to Start Pending state"
        );
    }
}

#[tokio::test]
async fn test_remote_timeout_reports_timeout() {
    let client = MockClient::returning(Err(QueryError::Timeout {
        host: "10.0.0.5".to_string(),
    }));
    let plugin = ServicePlugin::new(Arc::new(client));

    let batch = run_cycle(&plugin, &config("Running"), &connection_properties()).await;

    assert_eq!(batch.len(), 1);
    let event = &batch.events[0];
    assert_eq!(event.severity, Severity::Warning);
    assert_eq!(event.summary, TIMEOUT_MESSAGE);
    assert_eq!(event.event_class_key, ERROR_EVENT_CLASS_KEY);
    assert_eq!(event.event_key, COLLECTION_EVENT_KEY);
}

#[tokio::test]
async fn test_connection_reset_is_prefixed() {
    let client = MockClient::returning(Err(QueryError::Transport(
        "Connection reset by peer (os error 104)".to_string(),
    )));
    let plugin = ServicePlugin::new(Arc::new(client));

    let batch = run_cycle(&plugin, &config("Running"), &connection_properties()).await;

    assert_eq!(batch.len(), 1);
    assert_eq!(
        batch.events[0].summary,
        "failed collection - Connection reset by peer (os error 104)"
    );
}

#[tokio::test]
async fn test_slow_host_is_cancelled_as_timeout() {
    let client = Arc::new(MockClient::hanging(Duration::from_secs(30)));
    let plugin = ServicePlugin::new(client.clone());

    let mut config = config("Running");
    config.timeout_seconds = 1;

    let batch = tokio::time::timeout(
        Duration::from_secs(5),
        run_cycle(&plugin, &config, &connection_properties()),
    )
    .await
    .expect("cycle should be cancelled by its own timeout");

    assert_eq!(client.calls(), 1);
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.events[0].summary, TIMEOUT_MESSAGE);
}

#[tokio::test]
async fn test_invalid_connection_is_reported_without_query() {
    let client = Arc::new(MockClient::service("Spooler", "Running"));
    let plugin = ServicePlugin::new(client.clone());

    let mut connection = connection_properties();
    connection.user = Some(r"CORP\administrator".to_string());

    let batch = run_cycle(&plugin, &config("Running"), &connection).await;

    assert_eq!(client.calls(), 0);
    assert_eq!(batch.len(), 1);
    assert!(batch.events[0].summary.starts_with("failed collection - "));
}

#[tokio::test]
async fn test_recovery_clears_previous_alert() {
    let client = Arc::new(MockClient::service("Spooler", "Stopped"));
    let plugin = ServicePlugin::new(client.clone());
    let config = config("Running");

    let alert = run_cycle(&plugin, &config, &connection_properties()).await;
    client.set_outcome(Ok(vec![crate::helpers::service_object("Spooler", "Running")]));
    let recovery = run_cycle(&plugin, &config, &connection_properties()).await;

    assert!(!alert.events[0].is_clear());
    assert!(recovery.events[0].is_clear());
    assert_eq!(alert.events[0].dedup_key(), recovery.events[0].dedup_key());
}
