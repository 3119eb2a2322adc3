use std::net::SocketAddr;

use anyhow::anyhow;
use axum::{Json, Router, routing::get};
use axum_server::tls_rustls::RustlsConfig;
use config::{HealthConfig, TlsServerConfig};

#[derive(Debug, serde::Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub(crate) enum HealthState {
    /// The process is up and serving lookups.
    Healthy,
}

pub(crate) async fn health() -> Json<HealthState> {
    Json(HealthState::Healthy)
}

/// Serves the health route on its own listener, next to the main one.
pub(super) async fn serve_separately(
    addr: SocketAddr,
    tls: Option<TlsServerConfig>,
    config: HealthConfig,
) -> anyhow::Result<()> {
    let scheme = if tls.is_some() { "https" } else { "http" };
    let app = Router::new().route(&config.path, get(health)).into_make_service();

    log::info!("Health endpoint listening on {scheme}://{addr}{}", config.path);

    let result = match tls {
        Some(tls) => {
            let rustls = RustlsConfig::from_pem_file(&tls.certificate, &tls.key)
                .await
                .map_err(|e| anyhow!("Failed to load TLS certificate and key: {e}"))?;

            axum_server::bind_rustls(addr, rustls).serve(app).await
        }
        None => axum_server::bind(addr).serve(app).await,
    };

    result.map_err(|e| anyhow!("Health endpoint on {addr} stopped: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_healthy() {
        let Json(state) = health().await;

        insta::assert_snapshot!(serde_json::to_string(&state).unwrap(), @r#"{"status":"healthy"}"#);
    }
}
