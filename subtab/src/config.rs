//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `SUBTAB_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `SUBTAB_` override YAML values
//! 3. **Legacy environment variables** - `DATABASE_URL`, `APP_ID`, `APP_API_KEY`, `APP_SECRET`
//!    and `APP_CANVAS_NAME`, as set on the production host
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `SUBTAB_FACEBOOK__APP_ID=123` sets the `facebook.app_id` field.

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "SUBTAB_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Deployment environment name; also names the fallback database file
    pub environment: String,
    /// Base URL the app is reachable at from a browser. OAuth redirects are
    /// built against this; when unset, the Facebook canvas URL is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Secret key for signing the session cookie (required outside tests)
    pub secret_key: Option<String>,
    /// Deprecated: use `database` instead. Kept so `DATABASE_URL` keeps working.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Database configuration - either a local file or an external connection string
    pub database: DatabaseConfig,
    /// Facebook app credentials and Graph endpoints
    pub facebook: FacebookConfig,
    /// CreateSend API endpoint and timeouts
    pub createsend: CreateSendConfig,
    /// Session cookie configuration
    pub session: SessionConfig,
    // Legacy flat environment variables used by the production host. They are
    // folded into `facebook` during load and never read afterwards.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) app_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) app_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) app_canvas_name: Option<String>,
}

/// Database configuration.
///
/// Supports either a local SQLite file (the default, named after the
/// environment) or an external connection string.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatabaseConfig {
    /// Local file-backed SQLite database
    File {
        /// Path to the database file (default: `<environment>.db`)
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
    /// External database connection string
    External {
        /// SQLite connection string, e.g. `sqlite:///var/lib/subtab/production.db`
        url: String,
    },
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig::File { path: None }
    }
}

impl DatabaseConfig {
    /// Resolve the connection string, falling back to a file named after the environment
    pub fn connection_string(&self, environment: &str) -> String {
        match self {
            DatabaseConfig::External { url } => url.clone(),
            DatabaseConfig::File { path } => {
                let path = path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(format!("{environment}.db")));
                format!("sqlite://{}?mode=rwc", path.display())
            }
        }
    }
}

/// Facebook app credentials and API endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FacebookConfig {
    /// Facebook application id
    pub app_id: String,
    /// Facebook application API key (used in "add app to page" URLs)
    pub api_key: String,
    /// Facebook application secret (signs OAuth exchanges and signed_requests)
    pub secret: String,
    /// Canvas app name, as in `https://apps.facebook.com/<canvas_name>`
    pub canvas_name: String,
    /// Graph API base URL (overridable for tests)
    pub graph_base_url: Url,
    /// OAuth dialog base URL (overridable for tests)
    pub oauth_base_url: Url,
    /// Fixed timeout applied to every Graph request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for FacebookConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            api_key: String::new(),
            secret: String::new(),
            canvas_name: String::new(),
            graph_base_url: Url::parse("https://graph.facebook.com/").unwrap(),
            oauth_base_url: Url::parse("https://www.facebook.com/").unwrap(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// CreateSend API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CreateSendConfig {
    /// CreateSend v3 API base URL (overridable for tests)
    pub base_url: Url,
    /// Fixed timeout applied to every CreateSend request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for CreateSendConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://api.createsend.com/api/v3/").unwrap(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Cookie name for the session token
    pub cookie_name: String,
    /// How long a session token stays valid
    #[serde(with = "humantime_serde")]
    pub expiry: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "subtab_session".to_string(),
            expiry: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4567,
            environment: "development".to_string(),
            base_url: None,
            secret_key: None,
            database_url: None,
            database: DatabaseConfig::default(),
            facebook: FacebookConfig::default(),
            createsend: CreateSendConfig::default(),
            session: SessionConfig::default(),
            app_id: None,
            app_api_key: None,
            app_secret: None,
            app_canvas_name: None,
        }
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // if DATABASE_URL is set, it wins over whatever the file configured
        if let Some(url) = config.database_url.take() {
            config.database = DatabaseConfig::External { url };
        }

        // Fold the legacy flat APP_* variables into the facebook section
        if let Some(app_id) = config.app_id.take() {
            config.facebook.app_id = app_id;
        }
        if let Some(api_key) = config.app_api_key.take() {
            config.facebook.api_key = api_key;
        }
        if let Some(secret) = config.app_secret.take() {
            config.facebook.secret = secret;
        }
        if let Some(canvas_name) = config.app_canvas_name.take() {
            config.facebook.canvas_name = canvas_name;
        }

        Ok(config)
    }

    fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("SUBTAB_").split("__"))
            // Flat variables as set on the production host
            .merge(Env::raw().only(&["DATABASE_URL", "APP_ID", "APP_API_KEY", "APP_SECRET", "APP_CANVAS_NAME"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The canvas URL the app is served under on Facebook
    pub fn canvas_url(&self) -> String {
        format!("https://apps.facebook.com/{}", self.facebook.canvas_name)
    }

    /// Redirect URI registered with Facebook for the OAuth round trip
    pub fn oauth_redirect_uri(&self) -> String {
        let base = self.base_url.clone().unwrap_or_else(|| self.canvas_url());
        format!("{}/auth/facebook/callback", base.trim_end_matches('/'))
    }
}
