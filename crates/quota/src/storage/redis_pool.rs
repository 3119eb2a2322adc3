//! Pooled multiplexed Redis connections.

use std::{
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
};

use config::{RedisConfig, RedisTlsConfig};
use deadpool::managed::{self, Metrics, PoolConfig};
use redis::{Client, ClientTlsConfig, ErrorKind, RedisError, RedisResult, TlsCertificates, aio::MultiplexedConnection};

pub(super) type Pool = managed::Pool<Manager>;

#[derive(Debug)]
pub(super) struct Manager {
    client: Client,
    ping_number: AtomicUsize,
}

impl Manager {
    fn new(config: &RedisConfig) -> RedisResult<Self> {
        let client = match &config.tls {
            Some(tls) => Client::build_with_tls(config.url.as_str(), tls_certificates(tls)?)?,
            None => Client::open(config.url.as_str())?,
        };

        Ok(Self {
            client,
            ping_number: AtomicUsize::new(0),
        })
    }
}

impl managed::Manager for Manager {
    type Type = MultiplexedConnection;
    type Error = RedisError;

    async fn create(&self) -> Result<MultiplexedConnection, Self::Error> {
        self.client.get_multiplexed_async_connection().await
    }

    async fn recycle(&self, conn: &mut MultiplexedConnection, _: &Metrics) -> managed::RecycleResult<Self::Error> {
        let ping_number = self.ping_number.fetch_add(1, Ordering::Relaxed).to_string();

        let (pong,) = redis::Pipeline::with_capacity(2)
            .cmd("UNWATCH")
            .ignore()
            .cmd("PING")
            .arg(&ping_number)
            .query_async::<(String,)>(conn)
            .await?;

        if pong == ping_number {
            Ok(())
        } else {
            Err(managed::RecycleError::message("Invalid PING response"))
        }
    }
}

fn read(path: &Path, what: &'static str) -> RedisResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| RedisError::from((ErrorKind::IoError, what, format!("{}: {e}", path.display()))))
}

/// Insecure mode trusts the configured CA alone and never presents a client
/// certificate. Otherwise a client certificate is sent when both halves are set.
fn tls_certificates(config: &RedisTlsConfig) -> RedisResult<TlsCertificates> {
    let root_cert = config
        .ca_cert_path
        .as_deref()
        .map(|path| read(path, "Failed to read CA certificate"))
        .transpose()?;

    if config.insecure {
        return Ok(TlsCertificates {
            client_tls: None,
            root_cert,
        });
    }

    let client_tls = match (&config.client_cert_path, &config.client_key_path) {
        (Some(cert_path), Some(key_path)) => Some(ClientTlsConfig {
            client_cert: read(cert_path, "Failed to read client certificate")?,
            client_key: read(key_path, "Failed to read client key")?,
        }),
        _ => None,
    };

    Ok(TlsCertificates { client_tls, root_cert })
}

pub(super) fn create_pool(config: &RedisConfig) -> RedisResult<Pool> {
    let mut pool_config = PoolConfig::new(config.pool.max_size);
    pool_config.timeouts.create = config.pool.timeout_create;
    pool_config.timeouts.wait = config.pool.timeout_wait;
    pool_config.timeouts.recycle = config.pool.timeout_recycle;

    Pool::builder(Manager::new(config)?)
        .config(pool_config)
        .runtime(deadpool::Runtime::Tokio1)
        .build()
        .map_err(|e| RedisError::from((ErrorKind::IoError, "Failed to create pool", e.to_string())))
}
