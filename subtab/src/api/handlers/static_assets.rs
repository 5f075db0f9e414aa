//! Embedded static asset serving and the unknown-route fallback.

use axum::{
    body::Body,
    http::{Response, Uri},
    response::IntoResponse,
};
use tracing::instrument;

use crate::static_assets;

/// Serve an embedded asset, or the 404 page for anything we don't know.
///
/// Registered as the router fallback: it covers `/cm.css`, `/js/*` and every
/// unrecognised path in one place.
#[instrument]
pub async fn serve_embedded_asset(uri: Uri) -> impl IntoResponse {
    let path = uri.path().trim_start_matches('/');

    if let Some(content) = static_assets::Assets::get(path) {
        let mime = mime_guess::from_path(path).first_or_octet_stream();

        return Response::builder()
            .header(axum::http::header::CONTENT_TYPE, mime.as_ref())
            .header(axum::http::header::CACHE_CONTROL, "public, max-age=3600")
            .body(Body::from(content.data.into_owned()))
            .unwrap();
    }

    crate::views::not_found_page()
}
