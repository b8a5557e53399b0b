//! Integration tests for webhook event delivery

use winservice_monitoring::config::Webhook;
use winservice_monitoring::events::{EventBatch, EventDescriptor, Severity};
use winservice_monitoring::sink::{EventSink, WebhookSink};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn batch() -> EventBatch {
    EventBatch::new(
        "win-01",
        vec![EventDescriptor {
            event_class: "/Status".to_string(),
            event_class_key: "WindowsServiceLog".to_string(),
            event_key: "WindowsService".to_string(),
            severity: Severity::Warning,
            summary: "Service Alert: Spooler has changed to Stopped state".to_string(),
            component: Some("Spooler".to_string()),
            device: "win-01".to_string(),
        }],
    )
}

fn webhook(server: &MockServer, token: Option<&str>) -> Webhook {
    Webhook {
        url: format!("{}/events", server.uri()),
        token: token.map(str::to_string),
        timeout: 5,
    }
}

#[tokio::test]
async fn test_webhook_posts_batch() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(serde_json::json!({
            "device": "win-01",
            "events": [{
                "eventClassKey": "WindowsServiceLog",
                "severity": 3,
                "component": "Spooler"
            }]
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sink = WebhookSink::new(webhook(&mock_server, Some("test-token"))).unwrap();

    sink.publish(batch()).await.unwrap();
}

#[tokio::test]
async fn test_webhook_rejection_is_an_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let sink = WebhookSink::new(webhook(&mock_server, None)).unwrap();

    assert!(sink.publish(batch()).await.is_err());
}
