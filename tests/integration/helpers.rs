//! Helper functions for integration tests

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use winservice_monitoring::config::{MonitoredService, START_MODE_PROPERTY, TargetConfig};
use winservice_monitoring::connection::{AuthType, ConnectionInfo, ConnectionProperties, Scheme};
use winservice_monitoring::query::{
    QueryError, QueryResult, RemoteQueryClient, WmiObject, WqlQuery,
};
use winservice_monitoring::{ServiceDataSource, StartMode};

/// Query client that replays a scripted outcome
pub struct MockClient {
    outcome: Mutex<Result<Vec<WmiObject>, QueryError>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockClient {
    pub fn returning(outcome: Result<Vec<WmiObject>, QueryError>) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn service(name: &str, state: &str) -> Self {
        Self::returning(Ok(vec![service_object(name, state)]))
    }

    /// Client that does not answer within `delay`
    pub fn hanging(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::returning(Ok(vec![]))
        }
    }

    pub fn set_outcome(&self, outcome: Result<Vec<WmiObject>, QueryError>) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteQueryClient for MockClient {
    async fn execute_query(
        &self,
        _connection: &ConnectionInfo,
        queries: &[WqlQuery],
    ) -> Result<Vec<QueryResult>, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let objects = self.outcome.lock().unwrap().clone()?;
        Ok(queries
            .iter()
            .map(|query| QueryResult {
                query: query.clone(),
                objects: objects.clone(),
            })
            .collect())
    }
}

pub fn service_object(name: &str, state: &str) -> WmiObject {
    WmiObject::from_iter([
        ("Name", name),
        ("DisplayName", name),
        ("State", state),
        ("Status", "OK"),
    ])
}

/// Valid basic-auth connection settings
pub fn connection_properties() -> ConnectionProperties {
    ConnectionProperties {
        manage_ip: Some("10.0.0.5".to_string()),
        user: Some("administrator".to_string()),
        password: Some("secret".to_string()),
        port: 5985,
        scheme: "http".to_string(),
        timeout: 5,
        ..Default::default()
    }
}

/// Connection pointing at a mock WinRM endpoint
pub fn mock_connection(server_uri: &str, timeout: Duration) -> ConnectionInfo {
    let url = url::Url::parse(server_uri).unwrap();

    ConnectionInfo {
        hostname: url.host_str().unwrap().to_string(),
        auth_type: AuthType::Basic,
        username: "administrator".to_string(),
        password: "secret".to_string(),
        scheme: Scheme::Http,
        port: url.port().unwrap(),
        keytab: None,
        dcip: None,
        timeout,
    }
}

pub fn datasource(startmode: StartMode) -> ServiceDataSource {
    ServiceDataSource {
        startmode: startmode.to_string(),
        cycletime: 3600,
        ..Default::default()
    }
}

pub fn service(id: &str, datasource: ServiceDataSource, start_mode: Option<&str>) -> MonitoredService {
    let mut properties = BTreeMap::new();
    if let Some(mode) = start_mode {
        properties.insert(START_MODE_PROPERTY.to_string(), mode.to_string());
    }

    MonitoredService {
        id: id.to_string(),
        properties,
        datasource,
    }
}

pub fn target(id: &str, services: Vec<MonitoredService>) -> TargetConfig {
    TargetConfig {
        id: id.to_string(),
        connection: connection_properties(),
        properties: BTreeMap::new(),
        services,
    }
}

/// Enumerate response carrying `items` and no further pages
pub fn enumerate_response(items: &str) -> String {
    format!(
        r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:n="http://schemas.xmlsoap.org/ws/2004/09/enumeration" xmlns:w="http://schemas.dmtf.org/wbem/wsman/1/wsman.xsd"><s:Body><n:EnumerateResponse><n:EnumerationContext></n:EnumerationContext><w:Items>{items}</w:Items><w:EndOfSequence/></n:EnumerateResponse></s:Body></s:Envelope>"#
    )
}

pub fn fragment(name: &str, state: &str) -> String {
    format!(
        "<w:XmlFragment><Name>{name}</Name><State>{state}</State><Status>OK</Status><DisplayName>{name}</DisplayName></w:XmlFragment>"
    )
}
