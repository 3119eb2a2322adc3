//! Lookup routes: `/{format}/` for the caller's own address and
//! `/{format}/{address}` for an address or host name.

use std::net::{IpAddr, Ipv4Addr};

use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;

use crate::{
    AppState,
    client_ip::ClientAddr,
    error::ApiError,
    format::{self, Format, Rendered},
};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LookupParams {
    callback: Option<String>,
}

pub(crate) fn router() -> Router<AppState> {
    Format::ALL.into_iter().fold(Router::new(), |router, format| {
        router
            .route(&format!("/{format}/"), get(lookup_client).layer(Extension(format)))
            .route(&format!("/{format}/{{address}}"), get(lookup_address).layer(Extension(format)))
    })
}

async fn lookup_client(
    Extension(format): Extension<Format>,
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    Query(params): Query<LookupParams>,
) -> Result<Rendered, ApiError> {
    let client = client.ok_or(ApiError::NoClientAddress)?;
    let record = state.resolver.lookup(&client.to_string()).await?;

    format::render(format, &record, params.callback.as_deref())
}

async fn lookup_address(
    Extension(format): Extension<Format>,
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(params): Query<LookupParams>,
) -> Result<Rendered, ApiError> {
    let record = match address.parse::<IpAddr>() {
        Ok(_) => state.resolver.lookup(&address).await?,
        Err(_) => {
            let ip = resolve_host(&address).await?;
            state.resolver.lookup_addr(ip).await?
        }
    };

    format::render(format, &record, params.callback.as_deref())
}

/// First IPv4 address `host` resolves to.
async fn resolve_host(host: &str) -> Result<Ipv4Addr, ApiError> {
    let addrs = tokio::net::lookup_host((host, 0)).await.map_err(|e| {
        log::debug!("Could not resolve '{host}': {e}");
        ApiError::UnknownHost(host.to_string())
    })?;

    addrs
        .filter_map(|addr| match addr.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| ApiError::UnknownHost(host.to_string()))
}
