//! The page-admin configuration flow.

use axum::Json;
use axum::extract::{Form, Path, Query, RawForm, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::collections::HashMap;
use tracing::{info, instrument, warn};

use super::{CanvasParams, js_conf, with_cookies};
use crate::{
    AppState,
    api::models::settings::{
        AccountPayload, ApiKeyRequest, ApiKeyResponse, CustomFieldPayload, PageSaveParams, SavedFormPayload,
        StatusResponse,
    },
    auth::{FbSession, OptionalFbSession, session},
    db::handlers::{Accounts, Forms},
    db::models::forms::{CustomFieldCreateDBRequest, FIELD_OPTIONS_DELIMITER, FormSaveDBRequest},
    errors::{Error, Result, found},
    views,
};

/// `GET /` - the settings page.
///
/// Three gates, in order: no session redirects into OAuth; a session whose
/// uid disagrees with the embedding canvas context is cleared and
/// re-redirected; otherwise the page renders, populated with whatever is
/// already linked and saved.
#[instrument(skip_all)]
pub async fn show_settings(
    State(state): State<AppState>,
    OptionalFbSession(fb_session): OptionalFbSession,
    headers: HeaderMap,
    Query(params): Query<CanvasParams>,
) -> Result<Response> {
    let Some(fb_session) = fb_session else {
        return Ok(found("/auth/facebook"));
    };

    if let Some(context_uid) = params.decoded(&state).and_then(|d| d.user_id) {
        if context_uid != fb_session.uid {
            info!("Session uid does not match canvas uid, clearing session");
            return Ok(with_cookies(
                found("/auth/facebook"),
                session::clear_session_cookies(&state.config),
            ));
        }
    }

    // Graph failures here propagate: without the user there is no page to render
    let user = state.facebook.me(&fb_session.access_token).await?;
    let pages = state.facebook.pages(&fb_session.access_token).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let account = Accounts::new(&mut conn).find_by_user(&user.id).await?;

    let js_data = match &account {
        Some(account) => {
            let clients = state.createsend.clients(&account.api_key).await.unwrap_or_else(|e| {
                warn!("Listing clients failed, rendering without: {}", e);
                Vec::new()
            });

            let mut forms_repo = Forms::new(&mut conn);
            let forms = forms_repo.list_for_account(account.id).await?;
            let mut saved_forms: HashMap<String, SavedFormPayload> = HashMap::new();
            let mut form_fields: HashMap<String, Vec<CustomFieldPayload>> = HashMap::new();
            for form in forms {
                let fields = forms_repo.custom_fields(form.id).await?;
                form_fields.insert(form.id.to_string(), fields.into_iter().map(Into::into).collect());
                saved_forms.insert(form.page_id.clone(), form.into());
            }

            json!({
                "account": {
                    "api_key": account.api_key,
                    "user_id": user.id,
                    "clients": clients,
                    "saved_forms": { "forms": saved_forms, "fields": form_fields },
                }
            })
            .to_string()
        }
        None => String::new(),
    };

    let fb_error = headers
        .get(axum::http::header::COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookies| session::cookie_value(cookies, session::FB_ERROR_COOKIE))
        .filter(|v| !v.is_empty())
        .map(|_| session::PERMISSION_MESSAGE.to_string());

    let html = views::render(
        "settings.html",
        &json!({
            "js_conf": js_conf(&state, Some(&fb_session)),
            "signed_in": account.is_some(),
            "fb_error": fb_error,
            "pages": pages.iter().map(|p| json!({ "id": p.id, "name": p.name })).collect::<Vec<_>>(),
            "js_data": js_data,
        }),
    )?;
    Ok(html.into_response())
}

/// `GET /saved/:page_id` - the post-save page, linking either to the page
/// itself or to Facebook's "add app to page" flow.
#[instrument(skip(state, fb_session))]
pub async fn show_saved(
    State(state): State<AppState>,
    OptionalFbSession(fb_session): OptionalFbSession,
    Path(page_id): Path<String>,
) -> Result<Response> {
    let token = fb_session.as_ref().map(|s| s.access_token.as_str());
    let page = state.facebook.page(&page_id, token).await?;

    let next_url = if page.has_added_app {
        page.link.clone().unwrap_or_else(|| state.config.canvas_url())
    } else {
        format!(
            "http://www.facebook.com/add.php?api_key={}&pages=1&page={}",
            state.config.facebook.api_key, page.id
        )
    };

    let html = views::render(
        "settings_saved.html",
        &json!({
            "js_conf": js_conf(&state, fb_session.as_ref()),
            "page": { "name": page.name, "has_added_app": page.has_added_app },
            "next_url": next_url,
        }),
    )?;
    Ok(html.into_response())
}

/// `POST /apikey` - exchange CreateSend site credentials for an API key and
/// link the resulting account to the authenticated Facebook user.
#[utoipa::path(
    post,
    path = "/apikey",
    tag = "settings",
    responses(
        (status = 200, description = "Account linked", body = ApiKeyResponse),
        (status = 400, description = "Credential exchange failed or no authenticated user"),
    )
)]
#[instrument(skip_all)]
pub async fn exchange_api_key(
    State(state): State<AppState>,
    OptionalFbSession(fb_session): OptionalFbSession,
    Form(request): Form<ApiKeyRequest>,
) -> Result<Json<ApiKeyResponse>> {
    let api_key = match state
        .createsend
        .api_key(&request.site_url, &request.username, &request.password)
        .await
    {
        Ok(api_key) => Some(api_key),
        Err(e) => {
            warn!("API key exchange failed: {}", e);
            None
        }
    };

    let user = match &fb_session {
        Some(fb_session) => Some(state.facebook.me(&fb_session.access_token).await?),
        None => None,
    };

    let (Some(api_key), Some(user)) = (api_key, user) else {
        return Err(Error::BadRequest {
            message: "Error getting API key...".to_string(),
        });
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let account = Accounts::new(&mut conn).find_or_create(&user.id, &api_key).await?;

    let clients = state.createsend.clients(&account.api_key).await.unwrap_or_default();

    Ok(Json(ApiKeyResponse {
        account: AccountPayload {
            api_key: account.api_key,
            user_id: user.id,
            clients,
        },
    }))
}

/// `GET /clients/:api_key` - read-through to CreateSend; failures collapse
/// to an empty list rather than an error status.
#[utoipa::path(
    get,
    path = "/clients/{api_key}",
    tag = "settings",
    responses((status = 200, description = "Clients visible to the key", body = [crate::createsend::Client]))
)]
#[instrument(skip_all)]
pub async fn list_clients(
    State(state): State<AppState>,
    Path(api_key): Path<String>,
) -> Json<Vec<crate::createsend::Client>> {
    Json(state.createsend.clients(&api_key).await.unwrap_or_default())
}

/// `GET /lists/:api_key/:client_id`
#[utoipa::path(
    get,
    path = "/lists/{api_key}/{client_id}",
    tag = "settings",
    responses((status = 200, description = "Subscriber lists of the client", body = [crate::createsend::MailingList]))
)]
#[instrument(skip_all)]
pub async fn list_lists(
    State(state): State<AppState>,
    Path((api_key, client_id)): Path<(String, String)>,
) -> Json<Vec<crate::createsend::MailingList>> {
    Json(state.createsend.lists(&api_key, &client_id).await.unwrap_or_default())
}

/// `GET /customfields/:api_key/:list_id`
#[utoipa::path(
    get,
    path = "/customfields/{api_key}/{list_id}",
    tag = "settings",
    responses((status = 200, description = "Custom fields of the list", body = [crate::createsend::CustomFieldDef]))
)]
#[instrument(skip_all)]
pub async fn list_custom_fields(
    State(state): State<AppState>,
    Path((api_key, list_id)): Path<(String, String)>,
) -> Json<Vec<crate::createsend::CustomFieldDef>> {
    Json(state.createsend.custom_fields(&api_key, &list_id).await.unwrap_or_default())
}

/// `POST /page/:page_id` - save the subscribe form for a page.
///
/// Submitted `cf-` parameters are matched against the list's live custom
/// field definitions; unmatched ones are silently dropped. The stored field
/// set is replaced wholesale. CreateSend trouble mid-save reports failure in
/// the body but still answers 200 - the settings page branches on `status`.
#[utoipa::path(
    post,
    path = "/page/{page_id}",
    tag = "settings",
    responses(
        (status = 200, description = "Save outcome", body = StatusResponse),
        (status = 400, description = "Validation failed"),
    )
)]
#[instrument(skip(state, fb_session, form), fields(page_id = %page_id))]
pub async fn save_page(
    State(state): State<AppState>,
    fb_session: FbSession,
    Path(page_id): Path<String>,
    RawForm(form): RawForm,
) -> Result<Json<StatusResponse>> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&form).map_err(|e| Error::BadRequest {
        message: format!("Unreadable form body: {e}"),
    })?;
    let params = PageSaveParams::from_pairs(pairs);

    let user = state.facebook.me(&fb_session.access_token).await?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let account = Accounts::new(&mut conn)
        .find_by_user_and_key(&user.id, &params.api_key)
        .await?
        .ok_or_else(|| Error::BadRequest {
            message: "No Campaign Monitor account is linked for this user".to_string(),
        })?;

    let page = state.facebook.page(&page_id, Some(&fb_session.access_token)).await?;

    let mut request = FormSaveDBRequest {
        account_id: account.id,
        page_id: page_id.clone(),
        client_id: params.client_id.clone(),
        list_id: params.list_id.clone(),
        intro_message: params.intro_message.trim().to_string(),
        thanks_message: params.thanks_message.trim().to_string(),
        custom_fields: Vec::new(),
    };

    let blank = request.blank_fields();
    if !blank.is_empty() {
        return Err(Error::Validation {
            message: format!("Please fill in: {}", blank.join(", ")),
        });
    }

    let definitions = match state.createsend.custom_fields(&account.api_key, &request.list_id).await {
        Ok(definitions) => definitions,
        Err(e) => {
            warn!("Fetching custom fields failed, save aborted: {}", e);
            return Ok(Json(StatusResponse::failure(format!(
                "Sorry, something went wrong while saving your subscribe form for {}. Please try again.",
                page.name
            ))));
        }
    };

    // Keep only submitted fields that still exist on the chosen list
    request.custom_fields = params
        .field_keys
        .iter()
        .filter_map(|key| definitions.iter().find(|def| &def.key == key))
        .map(|def| CustomFieldCreateDBRequest {
            name: def.field_name.clone(),
            field_key: def.key.clone(),
            data_type: def.data_type.clone(),
            field_options: def.field_options.join(FIELD_OPTIONS_DELIMITER),
        })
        .collect();

    Forms::new(&mut conn).save(&request).await?;

    Ok(Json(StatusResponse::success(format!(
        "Thanks, you successfully saved your subscribe form for {}.",
        page.name
    ))))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::SqlitePool;
    use std::sync::Arc;

    #[sqlx::test]
    #[test_log::test]
    async fn test_settings_without_session_redirects_to_oauth(pool: SqlitePool) {
        let server = create_test_app(create_test_state(pool, create_test_config()));

        let response = server.get("/").await;
        response.assert_status(StatusCode::FOUND);
        assert_eq!(response.headers().get("location").unwrap(), "/auth/facebook");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_settings_uid_mismatch_clears_session_and_redirects(pool: SqlitePool) {
        let config = create_test_config();
        let server = create_test_app(create_test_state(pool, config.clone()));

        // Session says one user, the embedding canvas context says another
        let cookie = session_cookie_for("1234567", TEST_TOKEN, &config);
        let signed_request = signed_request_for(
            json!({ "algorithm": "HMAC-SHA256", "user_id": TEST_UID }),
            &config.facebook.secret,
        );

        for _ in 0..2 {
            // Idempotent under repeated calls
            let response = server
                .get("/")
                .add_query_param("signed_request", &signed_request)
                .add_header("cookie", cookie.as_str())
                .await;
            response.assert_status(StatusCode::FOUND);
            assert_eq!(response.headers().get("location").unwrap(), "/auth/facebook");

            let cleared: Vec<_> = response
                .headers()
                .get_all("set-cookie")
                .iter()
                .map(|v| v.to_str().unwrap().to_string())
                .collect();
            assert!(
                cleared
                    .iter()
                    .any(|c| c.starts_with(&format!("{}=;", config.session.cookie_name))),
                "session cookie should be cleared, got {cleared:?}"
            );
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_settings_without_linked_account_prompts_login(pool: SqlitePool) {
        let config = create_test_config();
        let server = create_test_app(create_test_state(pool, config.clone()));

        let response = server
            .get("/")
            .add_header("cookie", session_cookie_for(TEST_UID, TEST_TOKEN, &config))
            .await;
        response.assert_status_ok();
        assert!(response.text().contains("Log into your account"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_settings_with_account_embeds_saved_forms(pool: SqlitePool) {
        let config = create_test_config();
        seed_form(&pool, "111", vec![stored_field("Town", "[town]", "Text", "")]).await;
        let server = create_test_app(create_test_state(pool, config.clone()));

        let response = server
            .get("/")
            .add_header("cookie", session_cookie_for(TEST_UID, TEST_TOKEN, &config))
            .await;
        response.assert_status_ok();

        let body = response.text();
        assert!(body.contains("Test Page"));
        assert!(body.contains(TEST_API_KEY));
        assert!(body.contains("saved_forms"));
        assert!(!body.contains("Log into your account"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_apikey_links_account_without_duplicates(pool: SqlitePool) {
        let config = create_test_config();
        let server = create_test_app(create_test_state(pool.clone(), config.clone()));
        let cookie = session_cookie_for(TEST_UID, TEST_TOKEN, &config);

        let form = [
            ("site_url", "https://acme.createsend.com"),
            ("username", "admin"),
            ("password", "hunter2"),
        ];

        let response = server.post("/apikey").add_header("cookie", cookie.as_str()).form(&form).await;
        response.assert_status_ok();

        let body: serde_json::Value = response.json();
        assert_eq!(body["account"]["api_key"], TEST_API_KEY);
        assert_eq!(body["account"]["user_id"], TEST_UID);
        assert_eq!(body["account"]["clients"][0]["ClientID"], "clientid");

        // Linking again with the same key does not create a second account
        server.post("/apikey").add_header("cookie", cookie.as_str()).form(&form).await;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_apikey_vendor_failure_is_400(pool: SqlitePool) {
        let config = create_test_config();
        let createsend = MockCreateSend {
            api_key: None,
            ..Default::default()
        };
        let state = create_test_state_with(
            pool,
            config.clone(),
            Arc::new(MockFacebook::default()),
            Arc::new(createsend),
        );
        let server = create_test_app(state);

        let response = server
            .post("/apikey")
            .add_header("cookie", session_cookie_for(TEST_UID, TEST_TOKEN, &config))
            .form(&[("site_url", "x"), ("username", "y"), ("password", "z")])
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: serde_json::Value = response.json();
        assert!(body["message"].as_str().unwrap().contains("API key"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_apikey_without_session_is_400(pool: SqlitePool) {
        let server = create_test_app(create_test_state(pool, create_test_config()));

        let response = server
            .post("/apikey")
            .form(&[("site_url", "x"), ("username", "y"), ("password", "z")])
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_clients_read_through_passes_vendor_body(pool: SqlitePool) {
        let server = create_test_app(create_test_state(pool, create_test_config()));

        let response = server.get("/clients/testapikey").await;
        response.assert_status_ok();
        assert_eq!(response.text(), r#"[{"ClientID":"clientid","Name":"client name"}]"#);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_read_throughs_fall_back_to_empty_arrays(pool: SqlitePool) {
        let createsend = MockCreateSend {
            clients: None,
            lists: None,
            custom_fields: None,
            ..Default::default()
        };
        let state = create_test_state_with(
            pool,
            create_test_config(),
            Arc::new(MockFacebook::default()),
            Arc::new(createsend),
        );
        let server = create_test_app(state);

        for path in ["/clients/testapikey", "/lists/testapikey/clientid", "/customfields/testapikey/listid"] {
            let response = server.get(path).await;
            response.assert_status_ok();
            assert_eq!(response.text(), "[]", "expected empty array for {path}");
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_save_page_requires_session(pool: SqlitePool) {
        let server = create_test_app(create_test_state(pool, create_test_config()));

        let response = server.post("/page/111").form(&[("api_key", TEST_API_KEY)]).await;
        response.assert_status(StatusCode::FOUND);
        assert_eq!(response.headers().get("location").unwrap(), "/auth/facebook");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_save_page_trims_messages_and_matches_fields(pool: SqlitePool) {
        let config = create_test_config();
        seed_account(&pool).await;
        let server = create_test_app(create_test_state(pool.clone(), config.clone()));

        let response = server
            .post("/page/111")
            .add_header("cookie", session_cookie_for(TEST_UID, TEST_TOKEN, &config))
            .form(&[
                ("api_key", TEST_API_KEY),
                ("client_id", "clientid"),
                ("list_id", "listid"),
                ("intro_message", " Hi "),
                ("thanks_message", " Bye "),
                ("cf-town", "on"),
                ("cf-notafield", "on"),
            ])
            .await;
        response.assert_status_ok();

        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "success");
        assert!(body["message"].as_str().unwrap().contains("Test Page"));

        let mut conn = pool.acquire().await.unwrap();
        let mut forms = crate::db::handlers::Forms::new(&mut conn);
        let form = forms.get_by_page_id("111").await.unwrap().unwrap();
        assert_eq!(form.intro_message, "Hi");
        assert_eq!(form.thanks_message, "Bye");

        // cf-town matched the live definitions; cf-notafield was dropped
        let fields = forms.custom_fields(form.id).await.unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_key, "[town]");
        assert_eq!(fields[0].name, "Town");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_resave_leaves_only_the_new_field_set(pool: SqlitePool) {
        let config = create_test_config();
        seed_account(&pool).await;
        let server = create_test_app(create_test_state(pool.clone(), config.clone()));
        let cookie = session_cookie_for(TEST_UID, TEST_TOKEN, &config);

        let base = [
            ("api_key", TEST_API_KEY),
            ("client_id", "clientid"),
            ("list_id", "listid"),
            ("intro_message", "Hi"),
            ("thanks_message", "Bye"),
        ];

        let mut first = base.to_vec();
        first.push(("cf-town", "on"));
        server.post("/page/111").add_header("cookie", cookie.as_str()).form(&first).await;

        let mut second = base.to_vec();
        second.push(("cf-favouritecolour", "on"));
        server.post("/page/111").add_header("cookie", cookie.as_str()).form(&second).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut forms = crate::db::handlers::Forms::new(&mut conn);
        let form = forms.get_by_page_id("111").await.unwrap().unwrap();
        let fields = forms.custom_fields(form.id).await.unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_key, "[favouritecolour]");
        assert_eq!(fields[0].field_options, "red^green^blue");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_save_page_blank_message_is_400(pool: SqlitePool) {
        let config = create_test_config();
        seed_account(&pool).await;
        let server = create_test_app(create_test_state(pool, config.clone()));

        let response = server
            .post("/page/111")
            .add_header("cookie", session_cookie_for(TEST_UID, TEST_TOKEN, &config))
            .form(&[
                ("api_key", TEST_API_KEY),
                ("client_id", "clientid"),
                ("list_id", "listid"),
                ("intro_message", "   "),
                ("thanks_message", "Bye"),
            ])
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("intro_message"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_save_page_vendor_failure_reports_failure_status(pool: SqlitePool) {
        let config = create_test_config();
        seed_account(&pool).await;
        let createsend = MockCreateSend {
            custom_fields: None,
            ..Default::default()
        };
        let state = create_test_state_with(
            pool,
            config.clone(),
            Arc::new(MockFacebook::default()),
            Arc::new(createsend),
        );
        let server = create_test_app(state);

        let response = server
            .post("/page/111")
            .add_header("cookie", session_cookie_for(TEST_UID, TEST_TOKEN, &config))
            .form(&[
                ("api_key", TEST_API_KEY),
                ("client_id", "clientid"),
                ("list_id", "listid"),
                ("intro_message", "Hi"),
                ("thanks_message", "Bye"),
            ])
            .await;

        // The endpoint reports trouble in the body, never the HTTP status
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "failure");
        assert!(body["message"].as_str().unwrap().contains("Test Page"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_saved_page_offers_add_app_url_until_added(pool: SqlitePool) {
        let config = create_test_config();
        let server = create_test_app(create_test_state(pool.clone(), config.clone()));

        let response = server.get("/saved/111").await;
        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("http://www.facebook.com/add.php?api_key=fbapikey&amp;pages=1&amp;page=111"));

        // Once the tab is added, the page's own link is the destination
        let facebook = MockFacebook {
            page_template: crate::facebook::FbPage {
                id: "111".to_string(),
                name: "Test Page".to_string(),
                link: Some("http://www.facebook.com/pages/test-page/111".to_string()),
                has_added_app: true,
            },
            ..Default::default()
        };
        let state = create_test_state_with(
            pool,
            config,
            Arc::new(facebook),
            Arc::new(MockCreateSend::default()),
        );
        let server = create_test_app(state);

        let response = server.get("/saved/111").await;
        response.assert_status_ok();
        assert!(response.text().contains("http://www.facebook.com/pages/test-page/111"));
    }

    async fn seed_account(pool: &SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        crate::db::handlers::Accounts::new(&mut conn)
            .find_or_create(TEST_UID, TEST_API_KEY)
            .await
            .unwrap();
    }
}
