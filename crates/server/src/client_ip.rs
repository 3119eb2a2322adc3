//! Client address of a request.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use http::{Extensions, HeaderMap, request::Parts};

use crate::AppState;

/// The address a request is attributed to.
///
/// With `trust_forwarded_headers` the first `X-Forwarded-For` entry wins, then
/// `X-Real-IP`; the peer address is the fallback. Without it the headers are
/// ignored, since any client can set them.
pub(crate) fn extract(headers: &HeaderMap, extensions: &Extensions, trust_forwarded_headers: bool) -> Option<IpAddr> {
    if trust_forwarded_headers && let Some(ip) = forwarded(headers) {
        return Some(ip);
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

fn forwarded(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse().ok());

    forwarded_for.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
    })
}

/// Extractor for the client address of the current request.
pub(crate) struct ClientAddr(pub(crate) Option<IpAddr>);

impl FromRequestParts<AppState> for ClientAddr {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self(extract(
            &parts.headers,
            &parts.extensions,
            state.trust_forwarded_headers,
        )))
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    fn peer(addr: &str) -> Extensions {
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(addr.parse::<SocketAddr>().unwrap()));
        extensions
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        pairs
            .iter()
            .map(|(name, value)| (http::HeaderName::from_static(name), HeaderValue::from_static(value)))
            .collect()
    }

    fn ip(s: &str) -> Option<IpAddr> {
        Some(s.parse().unwrap())
    }

    #[test]
    fn peer_address_without_port() {
        assert_eq!(extract(&HeaderMap::new(), &peer("203.0.113.7:51234"), false), ip("203.0.113.7"));
        assert_eq!(extract(&HeaderMap::new(), &Extensions::new(), true), None);
    }

    #[test]
    fn forwarded_headers_are_ignored_unless_trusted() {
        let headers = headers(&[("x-forwarded-for", "198.51.100.1")]);

        assert_eq!(extract(&headers, &peer("10.0.0.2:80"), false), ip("10.0.0.2"));
        assert_eq!(extract(&headers, &peer("10.0.0.2:80"), true), ip("198.51.100.1"));
    }

    #[test]
    fn first_forwarded_entry_wins() {
        let headers = headers(&[
            ("x-forwarded-for", " 198.51.100.1 , 10.0.0.1, 10.0.0.2"),
            ("x-real-ip", "198.51.100.99"),
        ]);

        assert_eq!(extract(&headers, &Extensions::new(), true), ip("198.51.100.1"));
    }

    #[test]
    fn real_ip_is_the_second_choice() {
        let headers = headers(&[("x-forwarded-for", "garbage"), ("x-real-ip", "198.51.100.99")]);

        assert_eq!(extract(&headers, &peer("10.0.0.2:80"), true), ip("198.51.100.99"));
    }

    #[test]
    fn unusable_headers_fall_back_to_the_peer() {
        let headers = headers(&[("x-real-ip", "not-an-ip")]);

        assert_eq!(extract(&headers, &peer("[2001:db8::1]:443"), true), ip("2001:db8::1"));
    }
}
