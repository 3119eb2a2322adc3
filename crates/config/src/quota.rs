//! Per-client request quota configuration.

use duration_str::{deserialize_duration, deserialize_option_duration};
use serde::Deserialize;
use std::{path::PathBuf, time::Duration};

/// Request quota applied to every lookup, keyed by client address.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuotaConfig {
    /// Whether the quota is enforced.
    pub enabled: bool,
    /// Maximum number of lookups a client may make within one window.
    pub limit: u64,
    /// Lifetime of a client's counter, measured from its first request.
    #[serde(deserialize_with = "deserialize_duration")]
    pub window: Duration,
    /// Where the counters live.
    pub storage: StorageConfig,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 2000,
            window: Duration::from_secs(3600),
            storage: StorageConfig::default(),
        }
    }
}

/// Counter storage backend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Counters live in process memory. Every instance keeps its own counts.
    #[default]
    Memory,
    /// Counters live in Redis and are shared by every instance pointing at it.
    Redis(Box<RedisConfig>),
}

/// Redis storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisConfig {
    /// Redis connection URL (redis:// or rediss:// for TLS).
    pub url: String,
    /// Connection pool configuration.
    #[serde(default)]
    pub pool: RedisPoolConfig,
    /// TLS configuration.
    pub tls: Option<RedisTlsConfig>,
    /// Prepended to every counter key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Upper bound for a single Redis command, including waiting for a pooled connection.
    #[serde(default = "default_response_timeout", deserialize_with = "deserialize_duration")]
    pub response_timeout: Duration,
}

fn default_key_prefix() -> String {
    "freegeoip:quota:".to_string()
}

fn default_response_timeout() -> Duration {
    Duration::from_secs(1)
}

/// Redis connection pool configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RedisPoolConfig {
    /// Maximum number of connections.
    pub max_size: usize,
    /// Timeout for creating connections.
    #[serde(deserialize_with = "deserialize_option_duration")]
    pub timeout_create: Option<Duration>,
    /// Timeout for waiting for a connection.
    #[serde(deserialize_with = "deserialize_option_duration")]
    pub timeout_wait: Option<Duration>,
    /// Timeout before recycling idle connections.
    #[serde(deserialize_with = "deserialize_option_duration")]
    pub timeout_recycle: Option<Duration>,
}

impl Default for RedisPoolConfig {
    fn default() -> Self {
        Self {
            max_size: 16,
            timeout_create: Some(Duration::from_secs(5)),
            timeout_wait: Some(Duration::from_secs(5)),
            timeout_recycle: Some(Duration::from_secs(300)),
        }
    }
}

/// Redis TLS configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RedisTlsConfig {
    /// Trust the CA at `ca_cert_path` only, without client authentication.
    pub insecure: bool,
    /// Path to CA certificate file.
    pub ca_cert_path: Option<PathBuf>,
    /// Path to client certificate file (for mutual TLS).
    pub client_cert_path: Option<PathBuf>,
    /// Path to client key file (for mutual TLS).
    pub client_key_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_memory_storage() {
        let toml = r#"
            type = "memory"
        "#;
        let config: StorageConfig = toml::from_str(toml).unwrap();
        insta::assert_debug_snapshot!(config, @"Memory");
    }

    #[test]
    fn deserialize_redis_storage_minimal() {
        let toml = r#"
            type = "redis"
            url = "redis://localhost:6379/0"
        "#;
        let config: StorageConfig = toml::from_str(toml).unwrap();
        insta::assert_debug_snapshot!(config, @r#"
        Redis(
            RedisConfig {
                url: "redis://localhost:6379/0",
                pool: RedisPoolConfig {
                    max_size: 16,
                    timeout_create: Some(
                        5s,
                    ),
                    timeout_wait: Some(
                        5s,
                    ),
                    timeout_recycle: Some(
                        300s,
                    ),
                },
                tls: None,
                key_prefix: "freegeoip:quota:",
                response_timeout: 1s,
            },
        )
        "#);
    }

    #[test]
    fn deserialize_quota_with_redis() {
        let toml = r#"
            limit = 50
            window = "30s"

            [storage]
            type = "redis"
            url = "rediss://cache.internal:6380/1"
            key_prefix = "geo:"
            response_timeout = "250ms"

            [storage.pool]
            max_size = 4

            [storage.tls]
            ca_cert_path = "/etc/redis/ca.crt"
        "#;
        let config: QuotaConfig = toml::from_str(toml).unwrap();
        insta::assert_debug_snapshot!(config, @r#"
        QuotaConfig {
            enabled: true,
            limit: 50,
            window: 30s,
            storage: Redis(
                RedisConfig {
                    url: "rediss://cache.internal:6380/1",
                    pool: RedisPoolConfig {
                        max_size: 4,
                        timeout_create: Some(
                            5s,
                        ),
                        timeout_wait: Some(
                            5s,
                        ),
                        timeout_recycle: Some(
                            300s,
                        ),
                    },
                    tls: Some(
                        RedisTlsConfig {
                            insecure: false,
                            ca_cert_path: Some(
                                "/etc/redis/ca.crt",
                            ),
                            client_cert_path: None,
                            client_key_path: None,
                        },
                    ),
                    key_prefix: "geo:",
                    response_timeout: 250ms,
                },
            ),
        }
        "#);
    }
}
