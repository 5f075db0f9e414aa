//! CreateSend gateway: the slice of the Campaign Monitor v3 API the app uses.
//!
//! Authentication is HTTP basic auth: `username:password` for the API-key
//! exchange, `apikey:x` for everything else. All methods return typed errors;
//! the handlers decide which of them collapse to the "empty list / generic
//! message" fallbacks the embedded UI expects.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;
use utoipa::ToSchema;

use crate::config::CreateSendConfig;

#[derive(Debug, thiserror::Error)]
pub enum CreateSendError {
    #[error("CreateSend API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("invalid CreateSend response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CreateSendError>;

/// A client under the linked Campaign Monitor account.
///
/// Field names mirror the vendor JSON exactly; the read-through endpoints
/// return these bodies unmodified.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Client {
    #[serde(rename = "ClientID")]
    pub client_id: String,
    #[serde(rename = "Name")]
    pub name: String,
}

/// A subscriber list belonging to a client.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MailingList {
    #[serde(rename = "ListID")]
    pub list_id: String,
    #[serde(rename = "Name")]
    pub name: String,
}

/// A custom field definition on a subscriber list.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomFieldDef {
    #[serde(rename = "FieldName")]
    pub field_name: String,
    /// Bracketed key, e.g. `[favouritecolour]`
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "DataType")]
    pub data_type: String,
    #[serde(rename = "FieldOptions", default)]
    pub field_options: Vec<String>,
}

/// One custom-field value attached to a subscription. A multi-select option
/// produces several of these sharing the same key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriberField {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

/// CreateSend operations the app needs.
#[async_trait]
pub trait CreateSendApi: Send + Sync {
    /// Exchange site credentials for the account's long-lived API key
    async fn api_key(&self, site_url: &str, username: &str, password: &str) -> Result<String>;

    /// Clients visible to an API key
    async fn clients(&self, api_key: &str) -> Result<Vec<Client>>;

    /// Subscriber lists of a client
    async fn lists(&self, api_key: &str, client_id: &str) -> Result<Vec<MailingList>>;

    /// Custom field definitions of a list
    async fn custom_fields(&self, api_key: &str, list_id: &str) -> Result<Vec<CustomFieldDef>>;

    /// Add a subscriber to a list
    async fn add_subscriber(
        &self,
        api_key: &str,
        list_id: &str,
        email: &str,
        name: &str,
        custom_fields: &[SubscriberField],
        resubscribe: bool,
    ) -> Result<()>;
}

/// Reqwest-backed [`CreateSendApi`] implementation.
pub struct CreateSendClient {
    client: HttpClient,
    base_url: Url,
}

impl CreateSendClient {
    pub fn new(config: &CreateSendConfig) -> Self {
        let client = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url: config.base_url.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> Url {
        self.base_url.join(path).expect("endpoint paths are static")
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            debug!("CreateSend call failed: {} {}", status, body);
            return Err(CreateSendError::Api { status, body });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[derive(Debug, Deserialize)]
struct ApiKeyResponse {
    #[serde(rename = "ApiKey")]
    api_key: String,
}

#[async_trait]
impl CreateSendApi for CreateSendClient {
    #[instrument(skip(self, password))]
    async fn api_key(&self, site_url: &str, username: &str, password: &str) -> Result<String> {
        let mut url = self.endpoint("apikey.json");
        url.query_pairs_mut().append_pair("siteurl", site_url);

        let response = self
            .client
            .get(url)
            .basic_auth(username, Some(password))
            .send()
            .await?;
        let body: ApiKeyResponse = Self::decode(response).await?;
        Ok(body.api_key)
    }

    #[instrument(skip_all)]
    async fn clients(&self, api_key: &str) -> Result<Vec<Client>> {
        let response = self
            .client
            .get(self.endpoint("clients.json"))
            .basic_auth(api_key, Some("x"))
            .send()
            .await?;
        Self::decode(response).await
    }

    #[instrument(skip(self, api_key))]
    async fn lists(&self, api_key: &str, client_id: &str) -> Result<Vec<MailingList>> {
        let response = self
            .client
            .get(self.endpoint(&format!("clients/{client_id}/lists.json")))
            .basic_auth(api_key, Some("x"))
            .send()
            .await?;
        Self::decode(response).await
    }

    #[instrument(skip(self, api_key))]
    async fn custom_fields(&self, api_key: &str, list_id: &str) -> Result<Vec<CustomFieldDef>> {
        let response = self
            .client
            .get(self.endpoint(&format!("lists/{list_id}/customfields.json")))
            .basic_auth(api_key, Some("x"))
            .send()
            .await?;
        Self::decode(response).await
    }

    #[instrument(skip(self, api_key, custom_fields))]
    async fn add_subscriber(
        &self,
        api_key: &str,
        list_id: &str,
        email: &str,
        name: &str,
        custom_fields: &[SubscriberField],
        resubscribe: bool,
    ) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint(&format!("subscribers/{list_id}.json")))
            .basic_auth(api_key, Some("x"))
            .json(&json!({
                "EmailAddress": email,
                "Name": name,
                "CustomFields": custom_fields,
                "Resubscribe": resubscribe,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            debug!("CreateSend subscribe failed: {} {}", status, body);
            return Err(CreateSendError::Api { status, body });
        }

        Ok(())
    }
}
