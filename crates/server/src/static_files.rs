//! The bundled web page and `crossdomain.xml`.

use std::path::Path;

use axum::{Router, response::Redirect, routing::get};
use tower_http::services::{ServeDir, ServeFile};

use crate::AppState;

pub(crate) fn router(static_dir: &Path) -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { Redirect::to("/static/") }))
        .route_service("/crossdomain.xml", ServeFile::new(static_dir.join("crossdomain.xml")))
        .nest_service("/static", ServeDir::new(static_dir))
}
