//! freegeoip server library.
//!
//! Provides a reusable server function to serve freegeoip either for the binary, or for the integration tests.

#![deny(missing_docs)]

mod client_ip;
mod error;
mod format;
mod health;
mod lookup;
mod quota;
mod static_files;

use std::{net::SocketAddr, sync::Arc};

use ::quota::QuotaLimiter;
use anyhow::anyhow;
use axum::{Router, routing::get};
use axum_server::tls_rustls::RustlsConfig;
use config::Config;
use geoip::Resolver;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::quota::QuotaLayer;

/// Configuration for serving freegeoip.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to
    pub listen_address: SocketAddr,
    /// The deserialized freegeoip TOML configuration.
    pub config: Config,
}

/// Shared by every request handler.
#[derive(Clone)]
pub(crate) struct AppState {
    resolver: Arc<Resolver>,
    trust_forwarded_headers: bool,
}

/// Opens the dataset, builds the quota store and serves until the listener fails.
pub async fn serve(ServeConfig { listen_address, config }: ServeConfig) -> anyhow::Result<()> {
    let resolver = Resolver::from_config(&config.geoip).await.map_err(|e| {
        anyhow!(
            "Failed to open the geolocation database at {}: {e}",
            config.geoip.database.display()
        )
    })?;

    let trust_forwarded_headers = config.server.trust_forwarded_headers;

    let state = AppState {
        resolver: Arc::new(resolver),
        trust_forwarded_headers,
    };

    let mut lookups = lookup::router();

    if config.server.quota.enabled {
        let quota = &config.server.quota;
        let limiter = QuotaLimiter::from_config(quota)
            .await
            .map_err(|e| anyhow!("Failed to initialize the request quota: {e}"))?;

        log::debug!(
            "Allowing {} lookups per client every {:?}",
            quota.limit,
            quota.window
        );

        lookups = lookups.layer(QuotaLayer::new(Arc::new(limiter), trust_forwarded_headers));
    } else {
        log::debug!("Request quota disabled");
    }

    let lookups = lookups.layer(CorsLayer::new().allow_origin(Any));

    let mut app = Router::new()
        .merge(lookups)
        .merge(static_files::router(&config.server.static_dir));

    // The health route stays outside the quota.
    if config.server.health.enabled {
        if let Some(listen) = config.server.health.listen {
            let tls = config.server.tls.clone();
            let health_config = config.server.health.clone();

            tokio::spawn(async move {
                if let Err(e) = health::serve_separately(listen, tls, health_config).await {
                    log::error!("{e}");
                }
            });
        } else {
            app = app.route(&config.server.health.path, get(health::health));
        }
    }

    let app = app
        .with_state(state)
        .into_make_service_with_connect_info::<SocketAddr>();

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    match &config.server.tls {
        Some(tls_config) => {
            let rustls_config = RustlsConfig::from_pem_file(&tls_config.certificate, &tls_config.key)
                .await
                .map_err(|e| anyhow!("Failed to load TLS certificate and key: {e}"))?;

            log::info!("freegeoip listening on https://{listen_address}");

            axum_server::from_tcp_rustls(listener.into_std()?, rustls_config)
                .serve(app)
                .await
                .map_err(|e| anyhow!("Failed to start HTTPS server: {e}"))?;
        }
        None => {
            log::info!("freegeoip listening on http://{listen_address}");

            axum::serve(listener, app)
                .await
                .map_err(|e| anyhow!("Failed to start HTTP server: {e}"))?;
        }
    }

    Ok(())
}

#[cfg(test)]
impl AppState {
    fn for_tests() -> Self {
        use geoip::{MemoryRangeTable, RangeStore, ReservedRanges};

        Self {
            resolver: Arc::new(Resolver::new(
                ReservedRanges::default(),
                RangeStore::Memory(MemoryRangeTable::default()),
            )),
            trust_forwarded_headers: false,
        }
    }
}
