use axum::response::{IntoResponse, Response};
use geoip::ResolveError;
use http::{StatusCode, header::CONTENT_TYPE};

/// Errors a lookup request can end with. Rendered as `text/plain`.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ApiError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Could not resolve host '{0}'")]
    UnknownHost(String),

    #[error("Invalid callback '{0}'")]
    InvalidCallback(String),

    #[error("Could not determine the client address")]
    NoClientAddress,

    #[error("Failed to render the response: {0}")]
    Render(String),
}

impl ApiError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            ApiError::Resolve(ResolveError::InvalidAddress(_) | ResolveError::UnsupportedAddress(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Resolve(ResolveError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Resolve(ResolveError::Lookup(_)) | ApiError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::UnknownHost(_) | ApiError::InvalidCallback(_) | ApiError::NoClientAddress => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() {
            log::error!("Lookup failed: {self}");
            "Internal server error".to_string()
        } else {
            log::debug!("Lookup rejected: {self}");
            self.to_string()
        };

        plain_text(status, message)
    }
}

pub(crate) fn plain_text(status: StatusCode, message: impl Into<String>) -> Response {
    (status, [(CONTENT_TYPE, "text/plain; charset=utf-8")], message.into()).into_response()
}
