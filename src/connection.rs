//! WinRM connection parameters
//!
//! [`ConnectionProperties`] is what the operator configures for a target;
//! [`ConnectionInfo`] is the validated form handed to the query client.
//! Validation runs at the start of every collect so that a misconfigured
//! target surfaces as a collection error event instead of a silent skip.

use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

pub const HTTP_PORT: u16 = 5985;
pub const HTTPS_PORT: u16 = 5986;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

static DOMAIN_USER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[a-zA-Z0-9][a-zA-Z0-9.]{0,14}\\[^"/\\\[\]:;|=,+*?<>]{1,104}"#)
        .unwrap_or_else(|e| panic!("invalid user pattern: {e}"))
});

static IPV4: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}$")
        .unwrap_or_else(|e| panic!("invalid address pattern: {e}"))
});

/// Connection settings as configured for a target
#[derive(Clone, Default, Deserialize)]
pub struct ConnectionProperties {
    /// Management address, used when no server name is configured
    pub manage_ip: Option<String>,

    /// Explicit WinRM host name
    pub servername: Option<String>,

    pub user: Option<String>,
    pub password: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Key distribution center, required for domain accounts
    pub kdc: Option<String>,

    pub keytab: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl fmt::Debug for ConnectionProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProperties")
            .field("manage_ip", &self.manage_ip)
            .field("servername", &self.servername)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("port", &self.port)
            .field("scheme", &self.scheme)
            .field("kdc", &self.kdc)
            .field("keytab", &self.keytab)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn default_port() -> u16 {
    HTTP_PORT
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    Basic,
    Kerberos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => f.write_str("http"),
            Scheme::Https => f.write_str("https"),
        }
    }
}

/// Validated connection parameters
#[derive(Clone)]
pub struct ConnectionInfo {
    pub hostname: String,
    pub auth_type: AuthType,
    pub username: String,
    pub password: String,
    pub scheme: Scheme,
    pub port: u16,
    pub keytab: Option<PathBuf>,
    pub dcip: Option<String>,
    pub timeout: Duration,
}

impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("hostname", &self.hostname)
            .field("auth_type", &self.auth_type)
            .field("username", &self.username)
            .field("scheme", &self.scheme)
            .field("port", &self.port)
            .field("dcip", &self.dcip)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ConnectionInfo {
    /// WS-Management endpoint of the host
    pub fn endpoint(&self) -> String {
        format!("{}://{}:{}/wsman", self.scheme, self.hostname, self.port)
    }

    pub fn from_properties(
        device_id: &str,
        props: &ConnectionProperties,
    ) -> Result<Self, ConnectionError> {
        let hostname = non_empty(&props.servername)
            .or_else(|| non_empty(&props.manage_ip))
            .unwrap_or(device_id)
            .to_string();

        let username = non_empty(&props.user).ok_or(ConnectionError::MissingUser)?;

        if DOMAIN_USER.is_match(username) {
            return Err(ConnectionError::DomainUserFormat);
        }

        let password = non_empty(&props.password).ok_or(ConnectionError::MissingPassword)?;

        let auth_type = if username.contains('@') {
            AuthType::Kerberos
        } else {
            AuthType::Basic
        };

        if auth_type == AuthType::Kerberos {
            if non_empty(&props.kdc).is_none() {
                return Err(ConnectionError::MissingKdc);
            }
            if IPV4.is_match(device_id) {
                return Err(ConnectionError::KerberosRequiresHostname);
            }
        }

        let scheme = match props.scheme.to_lowercase().as_str() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => return Err(ConnectionError::InvalidScheme(other.to_string())),
        };

        let expected_port = match scheme {
            Scheme::Http => HTTP_PORT,
            Scheme::Https => HTTPS_PORT,
        };
        if props.port != expected_port {
            return Err(ConnectionError::PortMismatch {
                scheme,
                expected: expected_port,
            });
        }

        Ok(Self {
            hostname,
            auth_type,
            username: username.to_string(),
            password: password.to_string(),
            scheme,
            port: props.port,
            keytab: props.keytab.clone(),
            dcip: props.kdc.clone(),
            timeout: Duration::from_secs(props.timeout),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Invalid connection configuration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("windows user must be configured")]
    MissingUser,

    #[error("windows user must be user@example.com, not DOMAIN\\User")]
    DomainUserFormat,

    #[error("windows password must be configured")]
    MissingPassword,

    #[error("kdc must be configured for domain authentication")]
    MissingKdc,

    #[error(
        "use the device domain hostname for domain authentication, and verify that the hostname is correct and resolvable"
    )]
    KerberosRequiresHostname,

    #[error("scheme must be either 'http' or 'https', got '{0}'")]
    InvalidScheme(String),

    #[error("port must be {expected} if scheme is {scheme}")]
    PortMismatch { scheme: Scheme, expected: u16 },
}
