//! HTTP request handlers.
//!
//! - [`auth`]: OAuth start/callback/failure, logout, and the deauthorize webhook
//! - [`settings`]: the page-admin configuration flow and its JSON endpoints
//! - [`subscribe`]: the embedded page-tab form and visitor submissions
//! - [`pages`]: static informational pages
//! - [`static_assets`]: embedded stylesheet/script serving and the 404 fallback
//!
//! Handlers return [`crate::errors::Error`], which renders the generic error
//! pages for internal failures and a 302 to OAuth when a session is missing.

pub mod auth;
pub mod pages;
pub mod settings;
pub mod static_assets;
pub mod subscribe;

use axum::http::header;
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;

use crate::{AppState, auth::FbSession};

/// Query/form parameters every canvas request may carry.
#[derive(Debug, Default, Deserialize)]
pub struct CanvasParams {
    /// Facebook's signed context for canvas and page-tab requests
    pub signed_request: Option<String>,
}

impl CanvasParams {
    /// Decode and verify the signed_request, if one was sent
    pub fn decoded(&self, state: &AppState) -> Option<crate::facebook::signed_request::SignedRequest> {
        let raw = self.signed_request.as_deref()?;
        match crate::facebook::signed_request::parse(raw, &state.config.facebook.secret) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::debug!("Ignoring undecodable signed_request: {}", e);
                None
            }
        }
    }
}

/// Append Set-Cookie headers to a response
pub fn with_cookies(mut response: Response, cookies: Vec<String>) -> Response {
    for cookie in cookies {
        if let Ok(value) = cookie.parse() {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

/// Configuration blob embedded into every rendered page for the client script
pub fn js_conf(state: &AppState, session: Option<&FbSession>) -> String {
    json!({
        "appId": state.config.facebook.app_id,
        "canvasName": state.config.facebook.canvas_name,
        "userIdOnServer": session.map(|s| s.uid.clone()),
    })
    .to_string()
}
