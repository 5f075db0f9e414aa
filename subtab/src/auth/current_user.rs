//! Axum extractors for the Facebook session.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::trace;

use crate::{
    AppState,
    auth::session::{self, FbSession},
    errors::Error,
};

/// Read and verify the session cookie from request headers, if present
fn session_from_parts(parts: &Parts, state: &AppState) -> Option<FbSession> {
    let cookie_header = parts.headers.get(axum::http::header::COOKIE)?;
    let cookie_str = cookie_header.to_str().ok()?;
    let token = session::cookie_value(cookie_str, &state.config.session.cookie_name)?;

    match session::verify_session_token(token, &state.config) {
        Ok(fb_session) => Some(fb_session),
        Err(_) => {
            // Expired or tampered token: treat as no session at all
            trace!("Session cookie present but not valid");
            None
        }
    }
}

impl FromRequestParts<AppState> for FbSession {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        session_from_parts(parts, state).ok_or(Error::Unauthenticated)
    }
}

/// Like [`FbSession`] but never rejects; handlers that gate on session state
/// themselves (the settings page, the API-key exchange) use this.
#[derive(Debug, Clone)]
pub struct OptionalFbSession(pub Option<FbSession>);

impl FromRequestParts<AppState> for OptionalFbSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(OptionalFbSession(session_from_parts(parts, state)))
    }
}
