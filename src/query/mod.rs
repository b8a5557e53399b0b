//! Remote WMI queries
//!
//! The collector only depends on the [`RemoteQueryClient`] trait: given a
//! validated connection and a list of WQL queries it returns one
//! [`QueryResult`] per query, in the order the queries were issued, or fails
//! with a classified [`QueryError`].
//!
//! [`winrm::WinRmClient`] is the WS-Management implementation used by the
//! collector binary.

pub mod winrm;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::connection::ConnectionInfo;

/// A WQL query string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WqlQuery(String);

impl WqlQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self(query.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Property bag of one returned WMI object.
///
/// Property names are matched case-insensitively, WMI itself does not care.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WmiObject {
    properties: BTreeMap<String, String>,
}

impl WmiObject {
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for WmiObject {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            properties: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// Objects returned for one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub query: WqlQuery,
    pub objects: Vec<WmiObject>,
}

/// Transport-level failures of a remote query
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("timeout while waiting for {host}")]
    Timeout { host: String },

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("remote fault: {0}")]
    Remote(String),

    #[error("unexpected HTTP status {status}")]
    Http { status: u16 },

    #[error("{0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl QueryError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, QueryError::Timeout { .. })
    }
}

/// Executes WQL queries against a remote host
#[async_trait]
pub trait RemoteQueryClient: Send + Sync {
    /// Run all `queries` and return their results in the same order.
    async fn execute_query(
        &self,
        connection: &ConnectionInfo,
        queries: &[WqlQuery],
    ) -> Result<Vec<QueryResult>, QueryError>;
}
