//! Signed session cookie for the Facebook identity.
//!
//! The uid and Graph access token live in a JWT set as an HttpOnly cookie.
//! Clearing the session means expiring that cookie (plus the OAuth state and
//! error-flag cookies that ride alongside it).

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::Config, errors::Error};

/// Cookie flagging a failed/denied OAuth attempt; read by the settings page.
/// The cookie carries only a flag (cookie values cannot hold free text); the
/// message itself lives here.
pub const FB_ERROR_COOKIE: &str = "fb_error";

/// Message rendered when the OAuth dialog was denied.
pub const PERMISSION_MESSAGE: &str = "To use this application you must permit access to your basic information.";

/// Cookie carrying the OAuth `state` nonce across the dialog round trip.
pub const OAUTH_STATE_COOKIE: &str = "fb_oauth_state";

/// An authenticated Facebook session: who the admin is and the token to act
/// on their behalf.
#[derive(Debug, Clone, PartialEq)]
pub struct FbSession {
    pub uid: String,
    pub access_token: String,
}

/// JWT session claims
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String, // Facebook user id
    pub fbt: String, // Graph API access token
    pub exp: i64,    // Expiration time
    pub iat: i64,    // Issued at
}

impl SessionClaims {
    fn new(session: &FbSession, config: &Config) -> Self {
        let now = Utc::now();
        let exp = now + config.session.expiry;

        Self {
            sub: session.uid.clone(),
            fbt: session.access_token.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

impl From<SessionClaims> for FbSession {
    fn from(claims: SessionClaims) -> Self {
        Self {
            uid: claims.sub,
            access_token: claims.fbt,
        }
    }
}

fn secret_key(config: &Config) -> Result<&str, Error> {
    config.secret_key.as_deref().ok_or_else(|| Error::Internal {
        operation: "sign session: secret_key is required".to_string(),
    })
}

/// Create a JWT for a freshly authenticated Facebook identity
pub fn create_session_token(session: &FbSession, config: &Config) -> Result<String, Error> {
    let claims = SessionClaims::new(session, config);
    let key = EncodingKey::from_secret(secret_key(config)?.as_bytes());
    encode(&Header::default(), &claims, &key).map_err(|e| Error::Internal {
        operation: format!("create session JWT: {e}"),
    })
}

/// Verify and decode a session token. Expired or tampered tokens are simply
/// not a session; the caller redirects to OAuth.
pub fn verify_session_token(token: &str, config: &Config) -> Result<FbSession, Error> {
    let key = DecodingKey::from_secret(secret_key(config)?.as_bytes());
    let validation = Validation::default();

    let token_data =
        decode::<SessionClaims>(token, &key, &validation).map_err(|_| Error::Unauthenticated)?;

    Ok(FbSession::from(token_data.claims))
}

/// Cookie storing the session token
pub fn session_cookie(token: &str, config: &Config) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; Secure; SameSite=None; Max-Age={}",
        config.session.cookie_name,
        token,
        config.session.expiry.as_secs()
    )
}

/// Expire a cookie immediately
pub fn clearing_cookie(name: &str) -> String {
    format!("{name}=; Path=/; HttpOnly; Secure; SameSite=None; Max-Age=0")
}

/// Short-lived cookie (non-session), e.g. the OAuth state nonce or error flag
pub fn transient_cookie(name: &str, value: &str) -> String {
    format!("{name}={value}; Path=/; HttpOnly; Secure; SameSite=None; Max-Age=600")
}

/// The cookies to clear when a session ends (logout, failure, uid mismatch)
pub fn clear_session_cookies(config: &Config) -> Vec<String> {
    vec![
        clearing_cookie(&config.session.cookie_name),
        clearing_cookie(FB_ERROR_COOKIE),
    ]
}

/// Pull a named cookie out of a Cookie header value
pub fn cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    for cookie in cookie_header.split(';') {
        let cookie = cookie.trim();
        if let Some((cookie_name, value)) = cookie.split_once('=') {
            if cookie_name == name {
                return Some(value);
            }
        }
    }
    None
}
