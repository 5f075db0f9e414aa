//! API models for the settings flow.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::createsend;
use crate::db::models::forms::{CustomFieldDBResponse, FormDBResponse};
use crate::types::{AccountId, FormId};

/// CreateSend site credentials submitted by the settings page.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ApiKeyRequest {
    #[serde(default)]
    pub site_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// The linked account as the settings page scripting sees it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccountPayload {
    pub api_key: String,
    pub user_id: String,
    pub clients: Vec<createsend::Client>,
}

/// Body of a successful `POST /apikey`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiKeyResponse {
    pub account: AccountPayload,
}

/// Status body used by the save and subscribe endpoints. The HTTP status is
/// 200 either way; clients branch on `status`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: "failure".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

/// A saved form in the settings page payload.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SavedFormPayload {
    pub id: FormId,
    pub account_id: AccountId,
    pub page_id: String,
    pub client_id: String,
    pub list_id: String,
    pub intro_message: String,
    pub thanks_message: String,
}

impl From<FormDBResponse> for SavedFormPayload {
    fn from(form: FormDBResponse) -> Self {
        Self {
            id: form.id,
            account_id: form.account_id,
            page_id: form.page_id,
            client_id: form.client_id,
            list_id: form.list_id,
            intro_message: form.intro_message,
            thanks_message: form.thanks_message,
        }
    }
}

/// A stored custom field with its options unpacked, for rendering and for
/// the settings page payload.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CustomFieldPayload {
    pub name: String,
    pub field_key: String,
    pub data_type: String,
    pub options: Vec<String>,
}

impl From<CustomFieldDBResponse> for CustomFieldPayload {
    fn from(field: CustomFieldDBResponse) -> Self {
        let options = field.options().iter().map(|s| s.to_string()).collect();
        Self {
            name: field.name,
            field_key: field.field_key,
            data_type: field.data_type,
            options,
        }
    }
}

/// Parameters of `POST /page/:page_id`, parsed from the raw pair list so the
/// dynamic `cf-` fields survive.
#[derive(Debug, Clone, Default)]
pub struct PageSaveParams {
    pub api_key: String,
    pub client_id: String,
    pub list_id: String,
    pub intro_message: String,
    pub thanks_message: String,
    /// Bracketed keys of the submitted custom fields, in submission order
    pub field_keys: Vec<String>,
}

impl PageSaveParams {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (name, value) in pairs {
            match name.as_str() {
                "api_key" => params.api_key = value,
                "client_id" => params.client_id = value,
                "list_id" => params.list_id = value,
                "intro_message" => params.intro_message = value,
                "thanks_message" => params.thanks_message = value,
                other => {
                    if let Some(key) = super::bracketed_field_key(other) {
                        params.field_keys.push(key);
                    }
                }
            }
        }
        params
    }
}
