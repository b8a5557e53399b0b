//! WS-Management (WinRM) query client
//!
//! Issues a WS-Enumeration `Enumerate` request with a WQL filter and keeps
//! pulling until the host reports `EndOfSequence`. Only HTTP basic
//! authentication is supported.
//!
//! ## Message Flow
//!
//! ```text
//! Enumerate(WQL) → Items + EnumerationContext → Pull → ... → EndOfSequence
//! ```

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use regex::{Captures, Regex};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument, trace, warn};

use crate::connection::{AuthType, ConnectionInfo};

use super::{QueryError, QueryResult, RemoteQueryClient, WmiObject, WqlQuery};

const SOAP_CONTENT_TYPE: &str = "application/soap+xml;charset=UTF-8";

const RESOURCE_URI: &str = "http://schemas.microsoft.com/wbem/wsman/1/wmi/root/cimv2/*";

const WQL_DIALECT: &str = "http://schemas.microsoft.com/wbem/wsman/1/WQL";

const ACTION_ENUMERATE: &str = "http://schemas.xmlsoap.org/ws/2004/09/enumeration/Enumerate";

const ACTION_PULL: &str = "http://schemas.xmlsoap.org/ws/2004/09/enumeration/Pull";

const MAX_ELEMENTS: usize = 32000;

/// Default upper bound on Pull round trips for a single query
const MAX_PULLS: usize = 1000;

fn pattern(re: &str) -> Regex {
    Regex::new(re).unwrap_or_else(|e| panic!("invalid response pattern {re}: {e}"))
}

static ITEMS: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?s)<(?:\w+:)?Items>(.*?)</(?:\w+:)?Items>"));

static OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?s)<(?:\w+:)?(?:XmlFragment|Win32_\w+)(?:\s[^>]*)?>(.*?)</(?:\w+:)?(?:XmlFragment|Win32_\w+)>",
    )
});

static PROPERTY: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"<(?:\w+:)?(\w+)(?:\s[^>]*)?>([^<]*)</(?:\w+:)?\w+>"));

static ENUMERATION_CONTEXT: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"<(?:\w+:)?EnumerationContext>([^<]*)</(?:\w+:)?EnumerationContext>")
});

static END_OF_SEQUENCE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"<(?:\w+:)?EndOfSequence\s*/?>"));

static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"&(lt|gt|quot|apos|amp|#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7});"));

static FAULT_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?s)<(?:\w+:)?Fault\b.*?<(?:\w+:)?Text\b[^>]*>(.*?)</(?:\w+:)?Text>")
});

/// WinRM client (reused across polls)
#[derive(Debug, Clone)]
pub struct WinRmClient {
    client: reqwest::Client,
    max_pulls: usize,
}

impl WinRmClient {
    pub fn new() -> anyhow::Result<Self> {
        Self::build(false)
    }

    /// Client that accepts self-signed host certificates
    pub fn insecure() -> anyhow::Result<Self> {
        Self::build(true)
    }

    fn build(accept_invalid_certs: bool) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("failed to build WinRM HTTP client")?;

        Ok(Self {
            client,
            max_pulls: MAX_PULLS,
        })
    }

    /// Limit the Pull round trips of one enumeration
    pub fn with_max_pulls(mut self, max_pulls: usize) -> Self {
        self.max_pulls = max_pulls;
        self
    }

    #[instrument(skip(self, connection), fields(host = %connection.hostname))]
    async fn enumerate(
        &self,
        connection: &ConnectionInfo,
        query: &WqlQuery,
    ) -> Result<Vec<WmiObject>, QueryError> {
        let endpoint = connection.endpoint();

        let mut response = self
            .send(connection, enumerate_envelope(&endpoint, query, connection.timeout))
            .await?;
        let mut objects = parse_objects(&response);

        let mut pulls = 0;
        while !END_OF_SEQUENCE.is_match(&response) {
            let Some(context) = enumeration_context(&response) else {
                break;
            };
            if pulls == self.max_pulls {
                warn!("enumeration still open after {pulls} pulls, giving up");
                return Err(QueryError::Malformed(format!(
                    "enumeration did not end after {pulls} pulls"
                )));
            }
            pulls += 1;

            trace!("pulling next page");
            response = self
                .send(connection, pull_envelope(&endpoint, &context, connection.timeout))
                .await?;
            objects.extend(parse_objects(&response));
        }

        debug!("query returned {} objects", objects.len());
        Ok(objects)
    }

    async fn send(&self, connection: &ConnectionInfo, body: String) -> Result<String, QueryError> {
        let host = &connection.hostname;

        let response = self
            .client
            .post(connection.endpoint())
            .basic_auth(&connection.username, Some(&connection.password))
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .timeout(connection.timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| transport_error(&e, host))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(QueryError::Unauthorized(format!(
                "{host} rejected the credentials of {}",
                connection.username
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| transport_error(&e, host))?;

        if let Some(fault) = fault_reason(&text) {
            warn!("{host}: SOAP fault: {fault}");
            return Err(QueryError::Remote(fault));
        }

        if !status.is_success() {
            return Err(QueryError::Http {
                status: status.as_u16(),
            });
        }

        Ok(text)
    }
}

#[async_trait]
impl RemoteQueryClient for WinRmClient {
    async fn execute_query(
        &self,
        connection: &ConnectionInfo,
        queries: &[WqlQuery],
    ) -> Result<Vec<QueryResult>, QueryError> {
        if connection.auth_type == AuthType::Kerberos {
            return Err(QueryError::Unauthorized(
                "kerberos authentication is not supported by this client".to_string(),
            ));
        }

        let mut results = Vec::with_capacity(queries.len());
        for query in queries {
            trace!("executing {query}");
            let objects = self.enumerate(connection, query).await?;
            results.push(QueryResult {
                query: query.clone(),
                objects,
            });
        }

        Ok(results)
    }
}

fn transport_error(error: &reqwest::Error, host: &str) -> QueryError {
    if error.is_timeout() {
        return QueryError::Timeout {
            host: host.to_string(),
        };
    }

    let message = error_chain(error);
    if error.is_connect() {
        QueryError::ConnectionRefused(message)
    } else {
        QueryError::Transport(message)
    }
}

/// Render an error with all of its sources, `outer: inner: root`
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn parse_objects(response: &str) -> Vec<WmiObject> {
    ITEMS
        .captures_iter(response)
        .flat_map(|items| {
            OBJECT
                .captures_iter(items.get(1).map_or("", |m| m.as_str()))
                .map(|object| parse_properties(object.get(1).map_or("", |m| m.as_str())))
                .collect::<Vec<_>>()
        })
        .collect()
}

fn parse_properties(fragment: &str) -> WmiObject {
    PROPERTY
        .captures_iter(fragment)
        .map(|property| (property[1].to_string(), xml_unescape(&property[2])))
        .collect()
}

fn enumeration_context(response: &str) -> Option<String> {
    ENUMERATION_CONTEXT
        .captures(response)
        .map(|caps| caps[1].trim().to_string())
        .filter(|context| !context.is_empty())
}

fn fault_reason(response: &str) -> Option<String> {
    FAULT_TEXT
        .captures(response)
        .map(|caps| xml_unescape(caps[1].trim()))
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Decode predefined and numeric character references in one pass.
///
/// References that do not name a valid character are kept verbatim.
fn xml_unescape(value: &str) -> String {
    ENTITY
        .replace_all(value, |caps: &Captures| {
            let reference = &caps[1];
            let decoded = match reference {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "amp" => Some('&'),
                _ => reference
                    .strip_prefix("#x")
                    .or_else(|| reference.strip_prefix("#X"))
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .unwrap_or_else(|| reference[1..].parse::<u32>())
                    .ok()
                    .and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

fn envelope(endpoint: &str, action: &str, timeout: Duration, body: &str) -> String {
    format!(
        r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:a="http://schemas.xmlsoap.org/ws/2004/08/addressing" xmlns:n="http://schemas.xmlsoap.org/ws/2004/09/enumeration" xmlns:w="http://schemas.dmtf.org/wbem/wsman/1/wsman.xsd"><s:Header><a:To>{to}</a:To><w:ResourceURI s:mustUnderstand="true">{RESOURCE_URI}</w:ResourceURI><a:ReplyTo><a:Address s:mustUnderstand="true">http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous</a:Address></a:ReplyTo><a:Action s:mustUnderstand="true">{action}</a:Action><w:MaxEnvelopeSize s:mustUnderstand="true">512000</w:MaxEnvelopeSize><a:MessageID>uuid:{id}</a:MessageID><w:OperationTimeout>PT{secs}S</w:OperationTimeout></s:Header><s:Body>{body}</s:Body></s:Envelope>"#,
        to = xml_escape(endpoint),
        id = uuid::Uuid::new_v4(),
        secs = timeout.as_secs().max(1),
    )
}

fn enumerate_envelope(endpoint: &str, query: &WqlQuery, timeout: Duration) -> String {
    let body = format!(
        r#"<n:Enumerate><w:OptimizeEnumeration/><w:MaxElements>{MAX_ELEMENTS}</w:MaxElements><w:Filter Dialect="{WQL_DIALECT}">{}</w:Filter></n:Enumerate>"#,
        xml_escape(query.as_str())
    );
    envelope(endpoint, ACTION_ENUMERATE, timeout, &body)
}

fn pull_envelope(endpoint: &str, context: &str, timeout: Duration) -> String {
    let body = format!(
        r#"<n:Pull><n:EnumerationContext>{}</n:EnumerationContext><n:MaxElements>{MAX_ELEMENTS}</n:MaxElements></n:Pull>"#,
        xml_escape(context)
    );
    envelope(endpoint, ACTION_PULL, timeout, &body)
}
