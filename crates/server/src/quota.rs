//! Per-client quota middleware for the lookup routes.

use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use ::quota::{Decision, QuotaLimiter};
use axum::body::Body;
use http::{Request, Response, StatusCode};
use tower::Layer;

use crate::{client_ip, error::plain_text};

#[derive(Clone)]
pub(crate) struct QuotaLayer {
    limiter: Arc<QuotaLimiter>,
    trust_forwarded_headers: bool,
}

impl QuotaLayer {
    pub(crate) fn new(limiter: Arc<QuotaLimiter>, trust_forwarded_headers: bool) -> Self {
        Self {
            limiter,
            trust_forwarded_headers,
        }
    }
}

impl<Service> Layer<Service> for QuotaLayer
where
    Service: Send + Clone,
{
    type Service = QuotaService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        QuotaService {
            next,
            limiter: self.limiter.clone(),
            trust_forwarded_headers: self.trust_forwarded_headers,
        }
    }
}

#[derive(Clone)]
pub(crate) struct QuotaService<Service> {
    next: Service,
    limiter: Arc<QuotaLimiter>,
    trust_forwarded_headers: bool,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for QuotaService<Service>
where
    Service: tower::Service<Request<ReqBody>, Response = Response<Body>> + Send + Clone + 'static,
    Service::Future: Send,
    Service::Error: Display + 'static,
    ReqBody: http_body::Body + Send + 'static,
{
    type Response = Response<Body>;
    type Error = Service::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let mut next = self.next.clone();
        let limiter = self.limiter.clone();
        let client = client_ip::extract(req.headers(), req.extensions(), self.trust_forwarded_headers);

        Box::pin(async move {
            let Some(client) = client else {
                log::warn!("Request to {} has no client address, quota not applied", req.uri().path());
                return next.call(req).await;
            };

            let key = client.to_string();

            match limiter.check(&key).await {
                Ok(Decision::Allowed { .. }) => next.call(req).await,
                Ok(Decision::Denied { count }) => {
                    log::debug!("Quota exceeded for {key} after {count} requests");
                    Ok(plain_text(StatusCode::FORBIDDEN, "Quota exceeded"))
                }
                Err(err) => {
                    log::warn!("Quota check for {key} failed: {err}");
                    Ok(plain_text(StatusCode::SERVICE_UNAVAILABLE, "Service unavailable"))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{net::SocketAddr, time::Duration};

    use ::quota::{InMemoryStorage, Storage};
    use axum::{Router, extract::ConnectInfo, routing::get};
    use tower::ServiceExt;

    use super::*;

    fn app(limit: u64, trust_forwarded_headers: bool) -> Router {
        let limiter = QuotaLimiter::new(
            Storage::Memory(InMemoryStorage::new()),
            limit,
            Duration::from_secs(3600),
        );

        Router::new()
            .route("/json/", get(|| async { "ok" }))
            .layer(QuotaLayer::new(Arc::new(limiter), trust_forwarded_headers))
    }

    fn request(peer: &str, forwarded_for: Option<&str>) -> Request<Body> {
        let mut builder = Request::get("/json/");

        if let Some(value) = forwarded_for {
            builder = builder.header("x-forwarded-for", value);
        }

        let mut request = builder.body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));

        request
    }

    #[tokio::test]
    async fn denies_with_forbidden_once_exhausted() {
        let app = app(2, false);

        let mut statuses = Vec::new();
        for _ in 0..4 {
            let response = app.clone().oneshot(request("192.0.2.1:1000", None)).await.unwrap();
            statuses.push(response.status().as_u16());
        }

        assert_eq!(statuses, [200, 200, 403, 403]);
    }

    #[tokio::test]
    async fn ports_do_not_split_a_client() {
        let app = app(1, false);

        let first = app.clone().oneshot(request("192.0.2.1:1000", None)).await.unwrap();
        let second = app.clone().oneshot(request("192.0.2.1:2000", None)).await.unwrap();
        let other = app.oneshot(request("192.0.2.2:1000", None)).await.unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::FORBIDDEN);
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn trusted_forwarded_for_is_the_key() {
        let app = app(1, true);

        let first = app
            .clone()
            .oneshot(request("10.0.0.1:1000", Some("198.51.100.1")))
            .await
            .unwrap();
        let second = app
            .clone()
            .oneshot(request("10.0.0.1:1000", Some("198.51.100.2")))
            .await
            .unwrap();
        let third = app
            .oneshot(request("10.0.0.1:1000", Some("198.51.100.1")))
            .await
            .unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(third.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn requests_without_an_address_pass() {
        let app = app(1, false);

        for _ in 0..3 {
            let request = Request::get("/json/").body(Body::empty()).unwrap();
            let response = app.clone().oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
