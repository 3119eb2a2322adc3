//! freegeoip configuration structures to map the freegeoip.toml configuration.

#![deny(missing_docs)]

mod geoip;
mod loader;
mod quota;
mod server;

use std::path::Path;

pub use geoip::{GeoipConfig, ReservedBlock};
pub use quota::*;
use serde::Deserialize;
pub use server::{HealthConfig, ServerConfig, TlsServerConfig};

/// Main configuration structure for the freegeoip service.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Geolocation dataset configuration.
    #[serde(default)]
    pub geoip: GeoipConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Checks the values serde cannot check on its own.
    pub fn validate(&self) -> anyhow::Result<()> {
        loader::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use insta::assert_debug_snapshot;

    use crate::Config;

    #[test]
    fn defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_debug_snapshot!(&config, @r#"
        Config {
            server: ServerConfig {
                listen_address: None,
                static_dir: "./static",
                trust_forwarded_headers: false,
                tls: None,
                health: HealthConfig {
                    enabled: true,
                    listen: None,
                    path: "/health",
                },
                quota: QuotaConfig {
                    enabled: true,
                    limit: 2000,
                    window: 3600s,
                    storage: Memory,
                },
            },
            geoip: GeoipConfig {
                database: "./db/ipdb.sqlite",
                preload: false,
                max_connections: 8,
                reserved: None,
            },
        }
        "#);
    }

    #[test]
    fn all_values() {
        let config = indoc! {r#"
            [server]
            listen_address = "127.0.0.1:8080"
            static_dir = "/srv/freegeoip/static"
            trust_forwarded_headers = true

            [server.tls]
            certificate = "cert.pem"
            key = "key.pem"

            [server.health]
            enabled = false
            listen = "127.0.0.1:9090"
            path = "/status"

            [server.quota]
            enabled = true
            limit = 100
            window = "10m"

            [geoip]
            database = "/var/lib/freegeoip/ipdb.sqlite"
            preload = true
            max_connections = 2
            reserved = ["10.0.0.0/8", "127.0.0.1"]
        "#};

        let config: Config = toml::from_str(config).unwrap();

        assert_debug_snapshot!(&config, @r#"
        Config {
            server: ServerConfig {
                listen_address: Some(
                    127.0.0.1:8080,
                ),
                static_dir: "/srv/freegeoip/static",
                trust_forwarded_headers: true,
                tls: Some(
                    TlsServerConfig {
                        certificate: "cert.pem",
                        key: "key.pem",
                    },
                ),
                health: HealthConfig {
                    enabled: false,
                    listen: Some(
                        127.0.0.1:9090,
                    ),
                    path: "/status",
                },
                quota: QuotaConfig {
                    enabled: true,
                    limit: 100,
                    window: 600s,
                    storage: Memory,
                },
            },
            geoip: GeoipConfig {
                database: "/var/lib/freegeoip/ipdb.sqlite",
                preload: true,
                max_connections: 2,
                reserved: Some(
                    [
                        ReservedBlock {
                            network: 10.0.0.0,
                            prefix_len: 8,
                        },
                        ReservedBlock {
                            network: 127.0.0.1,
                            prefix_len: 32,
                        },
                    ],
                ),
            },
        }
        "#);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let config = indoc! {r#"
            [server]
            listen = "127.0.0.1:8080"
        "#};

        let result: Result<Config, _> = toml::from_str(config);
        assert!(result.is_err());
    }
}
