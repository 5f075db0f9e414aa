//! OAuth round trip, logout and the Facebook deauthorize webhook.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::{CanvasParams, with_cookies};
use crate::{
    AppState,
    auth::session::{
        self, FB_ERROR_COOKIE, FbSession, OAUTH_STATE_COOKIE, clear_session_cookies, clearing_cookie, transient_cookie,
    },
    db::handlers::Accounts,
    errors::{Error, Result, found},
    facebook,
};

/// `GET /auth/facebook` - send the browser into the OAuth dialog
#[instrument(skip_all)]
pub async fn oauth_start(State(state): State<AppState>) -> Response {
    let nonce: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();

    let url = facebook::authorize_url(&state.config.facebook, &state.config.oauth_redirect_uri(), &nonce);
    with_cookies(found(&url), vec![transient_cookie(OAUTH_STATE_COOKIE, &nonce)])
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// `GET /auth/facebook/callback` - finish the OAuth round trip.
///
/// Any wrinkle (denied dialog, stale state nonce, failed exchange) lands on
/// `/auth/failure`; only a clean exchange establishes a session.
#[instrument(skip_all)]
pub async fn oauth_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    if params.error.is_some() {
        return Ok(found("/auth/failure"));
    }
    let Some(code) = params.code.as_deref() else {
        return Ok(found("/auth/failure"));
    };

    let expected_state = headers
        .get(axum::http::header::COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookies| session::cookie_value(cookies, OAUTH_STATE_COOKIE))
        .map(str::to_string);
    if expected_state.is_none() || params.state != expected_state {
        warn!("OAuth callback with missing or mismatched state");
        return Ok(found("/auth/failure"));
    }

    let redirect_uri = state.config.oauth_redirect_uri();
    let fb_session = match establish_session(&state, code, &redirect_uri).await {
        Ok(fb_session) => fb_session,
        Err(e) => {
            warn!("OAuth exchange failed: {}", e);
            return Ok(found("/auth/failure"));
        }
    };

    info!("Facebook user {} authenticated", fb_session.uid);
    let token = session::create_session_token(&fb_session, &state.config)?;
    Ok(with_cookies(
        found("/"),
        vec![
            session::session_cookie(&token, &state.config),
            clearing_cookie(FB_ERROR_COOKIE),
            clearing_cookie(OAUTH_STATE_COOKIE),
        ],
    ))
}

async fn establish_session(state: &AppState, code: &str, redirect_uri: &str) -> facebook::Result<FbSession> {
    let access_token = state.facebook.exchange_code(code, redirect_uri).await?;
    let user = state.facebook.me(&access_token).await?;
    Ok(FbSession {
        uid: user.id,
        access_token,
    })
}

/// `GET /auth/failure` - clear the session and flag the permission error
#[instrument(skip_all)]
pub async fn auth_failure(State(state): State<AppState>) -> Response {
    let mut cookies = clear_session_cookies(&state.config);
    cookies.push(transient_cookie(FB_ERROR_COOKIE, "denied"));
    with_cookies(found("/"), cookies)
}

/// `GET /logout` - clear the session
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> Response {
    with_cookies(found("/"), clear_session_cookies(&state.config))
}

/// `GET /ondeauth` - Facebook reports the app was removed by a user.
///
/// Deletes every account stored for that user (forms and custom fields
/// cascade). Always answers 200, even when there was nothing to delete:
/// Facebook only wants an acknowledgement.
#[instrument(skip_all)]
pub async fn ondeauth(State(state): State<AppState>, Query(params): Query<CanvasParams>) -> Result<()> {
    let Some(decoded) = params.decoded(&state) else {
        return Ok(());
    };
    let Some(user_id) = decoded.user_id else {
        return Ok(());
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    match Accounts::new(&mut conn).delete_for_user(&user_id).await {
        Ok(removed) => info!("Deauthorized Facebook user {}: removed {} account(s)", user_id, removed),
        Err(e) => warn!("Deauthorize cleanup for {} failed: {}", user_id, e),
    }

    Ok(())
}
