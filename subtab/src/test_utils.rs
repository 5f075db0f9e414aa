//! Shared test helpers: canned vendor gateways and app builders.

use std::sync::{Arc, Mutex};

use axum_test::TestServer;
use sqlx::SqlitePool;

use crate::{
    AppState, Config, build_router,
    auth::session::{self, FbSession},
    config::FacebookConfig,
    createsend::{Client, CreateSendApi, CreateSendError, CustomFieldDef, MailingList, SubscriberField},
    db::handlers::{Accounts, Forms},
    db::models::forms::{CustomFieldCreateDBRequest, FormDBResponse, FormSaveDBRequest},
    facebook::{FacebookApi, FacebookError, FbPage, FbUser},
};

pub const TEST_UID: &str = "7654321";
pub const TEST_TOKEN: &str = "xxxx";
pub const TEST_API_KEY: &str = "testapikey";

pub fn create_test_config() -> Config {
    Config {
        secret_key: Some("test-secret-key".to_string()),
        facebook: FacebookConfig {
            app_id: "fbappid".to_string(),
            api_key: "fbapikey".to_string(),
            secret: "app-secret".to_string(),
            canvas_name: "subscribeform".to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Canned Facebook gateway.
pub struct MockFacebook {
    /// Token handed out by the OAuth exchange
    pub token: String,
    pub user: FbUser,
    pub pages: Vec<FbPage>,
    /// Template for `page()` responses; the requested id is substituted in
    pub page_template: FbPage,
    /// When set, every call fails the way a Graph outage would
    pub fail: bool,
}

impl Default for MockFacebook {
    fn default() -> Self {
        let page = FbPage {
            id: "111".to_string(),
            name: "Test Page".to_string(),
            link: Some("http://www.facebook.com/pages/test-page/111".to_string()),
            has_added_app: false,
        };
        Self {
            token: TEST_TOKEN.to_string(),
            user: FbUser {
                id: TEST_UID.to_string(),
                name: Some("Page Admin".to_string()),
            },
            pages: vec![page.clone()],
            page_template: page,
            fail: false,
        }
    }
}

impl MockFacebook {
    fn check(&self) -> Result<(), FacebookError> {
        if self.fail {
            Err(FacebookError::Api {
                status: 500,
                body: "graph down".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl FacebookApi for MockFacebook {
    async fn exchange_code(&self, _code: &str, _redirect_uri: &str) -> Result<String, FacebookError> {
        self.check()?;
        Ok(self.token.clone())
    }

    async fn me(&self, _access_token: &str) -> Result<FbUser, FacebookError> {
        self.check()?;
        Ok(self.user.clone())
    }

    async fn pages(&self, _access_token: &str) -> Result<Vec<FbPage>, FacebookError> {
        self.check()?;
        Ok(self.pages.clone())
    }

    async fn page(&self, page_id: &str, _access_token: Option<&str>) -> Result<FbPage, FacebookError> {
        self.check()?;
        Ok(FbPage {
            id: page_id.to_string(),
            ..self.page_template.clone()
        })
    }
}

/// One recorded `add_subscriber` call.
#[derive(Debug, Clone)]
pub struct SubscribeCall {
    pub api_key: String,
    pub list_id: String,
    pub email: String,
    pub name: String,
    pub custom_fields: Vec<SubscriberField>,
    pub resubscribe: bool,
}

/// Canned CreateSend gateway. `None` in a field makes that call fail the way
/// a vendor 500 would.
pub struct MockCreateSend {
    pub api_key: Option<String>,
    pub clients: Option<Vec<Client>>,
    pub lists: Option<Vec<MailingList>>,
    pub custom_fields: Option<Vec<CustomFieldDef>>,
    pub subscribe_ok: bool,
    pub subscriptions: Mutex<Vec<SubscribeCall>>,
}

impl Default for MockCreateSend {
    fn default() -> Self {
        Self {
            api_key: Some(TEST_API_KEY.to_string()),
            clients: Some(vec![Client {
                client_id: "clientid".to_string(),
                name: "client name".to_string(),
            }]),
            lists: Some(vec![MailingList {
                list_id: "listid".to_string(),
                name: "list name".to_string(),
            }]),
            custom_fields: Some(vec![
                CustomFieldDef {
                    field_name: "Town".to_string(),
                    key: "[town]".to_string(),
                    data_type: "Text".to_string(),
                    field_options: vec![],
                },
                CustomFieldDef {
                    field_name: "Favourite colour".to_string(),
                    key: "[favouritecolour]".to_string(),
                    data_type: "MultiSelectMany".to_string(),
                    field_options: vec!["red".to_string(), "green".to_string(), "blue".to_string()],
                },
            ]),
            subscribe_ok: true,
            subscriptions: Mutex::new(Vec::new()),
        }
    }
}

fn vendor_error() -> CreateSendError {
    CreateSendError::Api {
        status: 500,
        body: r#"[{"Code":"500","Message":"Sorry."}]"#.to_string(),
    }
}

#[async_trait::async_trait]
impl CreateSendApi for MockCreateSend {
    async fn api_key(&self, _site_url: &str, _username: &str, _password: &str) -> Result<String, CreateSendError> {
        self.api_key.clone().ok_or_else(vendor_error)
    }

    async fn clients(&self, _api_key: &str) -> Result<Vec<Client>, CreateSendError> {
        self.clients.clone().ok_or_else(vendor_error)
    }

    async fn lists(&self, _api_key: &str, _client_id: &str) -> Result<Vec<MailingList>, CreateSendError> {
        self.lists.clone().ok_or_else(vendor_error)
    }

    async fn custom_fields(&self, _api_key: &str, _list_id: &str) -> Result<Vec<CustomFieldDef>, CreateSendError> {
        self.custom_fields.clone().ok_or_else(vendor_error)
    }

    async fn add_subscriber(
        &self,
        api_key: &str,
        list_id: &str,
        email: &str,
        name: &str,
        custom_fields: &[SubscriberField],
        resubscribe: bool,
    ) -> Result<(), CreateSendError> {
        if !self.subscribe_ok {
            return Err(vendor_error());
        }
        self.subscriptions.lock().unwrap().push(SubscribeCall {
            api_key: api_key.to_string(),
            list_id: list_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            custom_fields: custom_fields.to_vec(),
            resubscribe,
        });
        Ok(())
    }
}

/// App state with default canned vendors
pub fn create_test_state(pool: SqlitePool, config: Config) -> AppState {
    create_test_state_with(
        pool,
        config,
        Arc::new(MockFacebook::default()),
        Arc::new(MockCreateSend::default()),
    )
}

/// App state with explicit vendors (tests keep their own Arc to inspect them)
pub fn create_test_state_with(
    pool: SqlitePool,
    config: Config,
    facebook: Arc<dyn FacebookApi>,
    createsend: Arc<dyn CreateSendApi>,
) -> AppState {
    AppState::builder()
        .db(pool)
        .config(config)
        .facebook(facebook)
        .createsend(createsend)
        .build()
}

/// Test server over the full router
pub fn create_test_app(state: AppState) -> TestServer {
    TestServer::new(build_router(state)).expect("Failed to create test server")
}

/// Cookie header value for an authenticated session
pub fn session_cookie_for(uid: &str, access_token: &str, config: &Config) -> String {
    let fb_session = FbSession {
        uid: uid.to_string(),
        access_token: access_token.to_string(),
    };
    let token = session::create_session_token(&fb_session, config).expect("sign test session");
    format!("{}={}", config.session.cookie_name, token)
}

/// A signed_request the way Facebook would produce it
pub fn signed_request_for(payload: serde_json::Value, secret: &str) -> String {
    crate::facebook::signed_request::encode(&payload, secret)
}

/// Store an account and a saved form for `page_id`, the way the settings
/// flow would have
pub async fn seed_form(
    pool: &SqlitePool,
    page_id: &str,
    custom_fields: Vec<CustomFieldCreateDBRequest>,
) -> FormDBResponse {
    let mut conn = pool.acquire().await.unwrap();
    let account = Accounts::new(&mut conn)
        .find_or_create(TEST_UID, TEST_API_KEY)
        .await
        .unwrap();
    Forms::new(&mut conn)
        .save(&FormSaveDBRequest {
            account_id: account.id,
            page_id: page_id.to_string(),
            client_id: "clientid".to_string(),
            list_id: "listid".to_string(),
            intro_message: "Hi there".to_string(),
            thanks_message: "Thanks for subscribing!".to_string(),
            custom_fields,
        })
        .await
        .unwrap()
}

pub fn stored_field(name: &str, key: &str, data_type: &str, options: &str) -> CustomFieldCreateDBRequest {
    CustomFieldCreateDBRequest {
        name: name.to_string(),
        field_key: key.to_string(),
        data_type: data_type.to_string(),
        field_options: options.to_string(),
    }
}
