//! HTTP server configuration settings.

use std::{borrow::Cow, net::SocketAddr, path::PathBuf};

use serde::Deserialize;

use crate::QuotaConfig;

/// HTTP server configuration settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// The socket address the server should listen on.
    pub listen_address: Option<SocketAddr>,
    /// Directory served under `/static/`.
    pub static_dir: PathBuf,
    /// Take the client address from `X-Forwarded-For` or `X-Real-IP` when present.
    /// Only enable this behind a proxy that overwrites these headers.
    pub trust_forwarded_headers: bool,
    /// TLS configuration for secure connections.
    pub tls: Option<TlsServerConfig>,
    /// Health endpoint configuration.
    pub health: HealthConfig,
    /// Per-client request quota.
    pub quota: QuotaConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: None,
            static_dir: PathBuf::from("./static"),
            trust_forwarded_headers: false,
            tls: None,
            health: HealthConfig::default(),
            quota: QuotaConfig::default(),
        }
    }
}

/// PEM files for serving over HTTPS.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsServerConfig {
    /// Certificate chain.
    pub certificate: PathBuf,
    /// Private key.
    pub key: PathBuf,
}

/// Health endpoint configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// Whether the health endpoint is enabled.
    pub enabled: bool,
    /// Serve the health endpoint on its own listener instead of the main one.
    pub listen: Option<SocketAddr>,
    /// The path for the health endpoint.
    pub path: Cow<'static, str>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            enabled: true,
            listen: None,
            path: Cow::Borrowed("/health"),
        }
    }
}
