//! OpenAPI description of the JSON endpoints.
//!
//! The HTML pages are not part of the API contract and are left out; what is
//! documented here is exactly what the settings page scripting talks to.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::settings::exchange_api_key,
        crate::api::handlers::settings::list_clients,
        crate::api::handlers::settings::list_lists,
        crate::api::handlers::settings::list_custom_fields,
        crate::api::handlers::settings::save_page,
        crate::api::handlers::subscribe::subscribe,
    ),
    components(schemas(
        crate::api::models::settings::ApiKeyRequest,
        crate::api::models::settings::ApiKeyResponse,
        crate::api::models::settings::AccountPayload,
        crate::api::models::settings::StatusResponse,
        crate::createsend::Client,
        crate::createsend::MailingList,
        crate::createsend::CustomFieldDef,
    )),
    tags(
        (name = "settings", description = "Page-admin configuration endpoints"),
        (name = "subscribe", description = "Visitor subscription endpoint"),
    )
)]
pub struct ApiDoc;
