//! Static informational pages.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::instrument;

use super::js_conf;
use crate::{AppState, errors::Result, views};

/// `GET /privacy`
#[instrument(skip_all)]
pub async fn privacy(State(state): State<AppState>) -> Result<Response> {
    let html = views::render("privacy.html", &json!({ "js_conf": js_conf(&state, None) }))?;
    Ok(html.into_response())
}
