//! Facebook gateway: OAuth exchange, Graph API reads and signed_request parsing.
//!
//! The Graph calls are behind the [`FacebookApi`] trait so tests can inject a
//! canned implementation; [`GraphClient`] is the reqwest-backed one used in
//! production.

pub mod signed_request;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::config::FacebookConfig;

/// Errors from the Facebook Graph/OAuth APIs.
///
/// These surface to the browser as the generic error page: there is nothing
/// actionable a page admin can do with a Graph error payload.
#[derive(Debug, thiserror::Error)]
pub enum FacebookError {
    #[error("Graph API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("OAuth exchange response had no access token")]
    MissingToken,

    #[error("invalid Graph API response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FacebookError>;

/// The authenticated Facebook user ("me").
#[derive(Debug, Clone, Deserialize)]
pub struct FbUser {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A Facebook Page as the settings flow sees it.
#[derive(Debug, Clone, Deserialize)]
pub struct FbPage {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub has_added_app: bool,
}

/// Facebook Graph/OAuth operations the app needs.
#[async_trait]
pub trait FacebookApi: Send + Sync {
    /// Exchange an OAuth code for a user access token
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String>;

    /// Resolve the authenticated user behind an access token
    async fn me(&self, access_token: &str) -> Result<FbUser>;

    /// Pages the authenticated user administers (`/me/accounts`)
    async fn pages(&self, access_token: &str) -> Result<Vec<FbPage>>;

    /// Page metadata: name, canonical link and whether the tab app was added
    async fn page(&self, page_id: &str, access_token: Option<&str>) -> Result<FbPage>;
}

/// Build the OAuth dialog URL the unauthenticated flow redirects to.
pub fn authorize_url(config: &FacebookConfig, redirect_uri: &str, state: &str) -> String {
    let mut url = config.oauth_base_url.join("dialog/oauth").expect("static path");
    url.query_pairs_mut()
        .append_pair("client_id", &config.app_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", "manage_pages,offline_access")
        .append_pair("state", state);
    url.to_string()
}

/// Reqwest-backed [`FacebookApi`] implementation.
pub struct GraphClient {
    client: Client,
    base_url: Url,
    app_id: String,
    app_secret: String,
}

impl GraphClient {
    pub fn new(config: &FacebookConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url: config.graph_base_url.clone(),
            app_id: config.app_id.clone(),
            app_secret: config.secret.clone(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("Graph request: {}", url);
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FacebookError::Api { status, body });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageList {
    #[serde(default)]
    data: Vec<FbPage>,
}

#[async_trait]
impl FacebookApi for GraphClient {
    #[instrument(skip_all)]
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String> {
        let mut url = self.base_url.join("oauth/access_token").expect("static path");
        url.query_pairs_mut()
            .append_pair("client_id", &self.app_id)
            .append_pair("client_secret", &self.app_secret)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("code", code);

        let response: AccessTokenResponse = self.get_json(url).await?;
        response.access_token.ok_or(FacebookError::MissingToken)
    }

    #[instrument(skip_all)]
    async fn me(&self, access_token: &str) -> Result<FbUser> {
        let mut url = self.base_url.join("me").expect("static path");
        url.query_pairs_mut().append_pair("access_token", access_token);
        self.get_json(url).await
    }

    #[instrument(skip_all)]
    async fn pages(&self, access_token: &str) -> Result<Vec<FbPage>> {
        let mut url = self.base_url.join("me/accounts").expect("static path");
        url.query_pairs_mut().append_pair("access_token", access_token);
        let list: PageList = self.get_json(url).await?;
        Ok(list.data)
    }

    #[instrument(skip(self, access_token))]
    async fn page(&self, page_id: &str, access_token: Option<&str>) -> Result<FbPage> {
        let mut url = self.base_url.join(page_id).expect("page id is a plain id");
        url.query_pairs_mut().append_pair("fields", "name,link,has_added_app");
        if let Some(token) = access_token {
            url.query_pairs_mut().append_pair("access_token", token);
        }
        self.get_json(url).await
    }
}
