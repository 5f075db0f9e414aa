//! The embedded page-tab form and visitor submissions.

use axum::Json;
use axum::extract::{Path, Query, RawForm, State};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{debug, instrument, warn};

use super::{CanvasParams, js_conf};
use crate::{
    AppState,
    api::models::settings::{CustomFieldPayload, StatusResponse},
    api::models::subscribe::SubscribeParams,
    db::handlers::{Accounts, Forms},
    errors::{Error, Result},
    views,
};

/// Message for every subscribe failure; visitors get nothing more specific.
const SUBSCRIBE_ERROR: &str = "Sorry, there was a problem subscribing you to our list. Please try again.";

/// `GET /tab` - render the subscribe form for the embedding page.
///
/// The page id comes from the signed page-tab context; without one (or for a
/// page with no saved form) the "not configured" state renders instead.
#[instrument(skip_all)]
pub async fn show_tab(
    State(state): State<AppState>,
    Query(params): Query<CanvasParams>,
) -> Result<Response> {
    let page_id = params
        .decoded(&state)
        .and_then(|d| d.page.map(|p| p.id))
        .unwrap_or_default();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut forms_repo = Forms::new(&mut conn);

    let form = forms_repo.get_by_page_id(&page_id).await?;
    let fields: Vec<CustomFieldPayload> = match &form {
        Some(form) => forms_repo
            .custom_fields(form.id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect(),
        None => Vec::new(),
    };

    let html = views::render(
        "subscribe_form.html",
        &json!({
            "js_conf": js_conf(&state, None),
            "js_data": json!({ "page_id": page_id }).to_string(),
            "page_id": page_id,
            "form": form.as_ref().map(|f| json!({ "intro_message": f.intro_message })),
            "fields": fields,
        }),
    )?;
    Ok(html.into_response())
}

/// `POST /subscribe/:page_id` - add a visitor to the page's list.
///
/// Every outcome is HTTP 200; the body's `status` string is the contract.
/// A missing form, a vanished account and a CreateSend rejection all read
/// the same from the outside.
#[utoipa::path(
    post,
    path = "/subscribe/{page_id}",
    tag = "subscribe",
    responses((status = 200, description = "Subscription outcome", body = StatusResponse))
)]
#[instrument(skip(state, form), fields(page_id = %page_id))]
pub async fn subscribe(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
    RawForm(form): RawForm,
) -> Json<StatusResponse> {
    let params = match serde_urlencoded::from_bytes::<Vec<(String, String)>>(&form) {
        Ok(pairs) => SubscribeParams::from_pairs(pairs),
        Err(e) => {
            debug!("Unreadable subscribe body: {}", e);
            return Json(StatusResponse::error(SUBSCRIBE_ERROR));
        }
    };

    match add_subscriber(&state, &page_id, params).await {
        Ok(thanks_message) => Json(StatusResponse::success(thanks_message)),
        Err(e) => {
            warn!("Subscribe for page {} failed: {}", page_id, e);
            Json(StatusResponse::error(SUBSCRIBE_ERROR))
        }
    }
}

/// The fallible part of the subscribe flow; any error collapses to the
/// generic message in the caller.
async fn add_subscriber(state: &AppState, page_id: &str, params: SubscribeParams) -> anyhow::Result<String> {
    let mut conn = state.db.acquire().await?;

    let form = Forms::new(&mut conn)
        .get_by_page_id(page_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no form saved for page {page_id}"))?;

    let account = Accounts::new(&mut conn)
        .get_by_id(form.account_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("form {} has no account", form.id))?;

    state
        .createsend
        .add_subscriber(
            &account.api_key,
            &form.list_id,
            params.email.trim(),
            params.name.trim(),
            &params.custom_fields,
            true,
        )
        .await?;

    Ok(form.thanks_message)
}
