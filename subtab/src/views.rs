//! Server-rendered HTML pages (minijinja templates compiled into the binary).

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use minijinja::Environment;
use std::sync::OnceLock;

use crate::errors::Error;

static TEMPLATES: OnceLock<Environment<'static>> = OnceLock::new();

fn environment() -> &'static Environment<'static> {
    TEMPLATES.get_or_init(|| {
        let mut env = Environment::new();
        env.add_template("layout.html", include_str!("../templates/layout.html"))
            .expect("layout template parses");
        env.add_template("settings.html", include_str!("../templates/settings.html"))
            .expect("settings template parses");
        env.add_template("settings_saved.html", include_str!("../templates/settings_saved.html"))
            .expect("settings_saved template parses");
        env.add_template("subscribe_form.html", include_str!("../templates/subscribe_form.html"))
            .expect("subscribe_form template parses");
        env.add_template("privacy.html", include_str!("../templates/privacy.html"))
            .expect("privacy template parses");
        env.add_template("error.html", include_str!("../templates/error.html"))
            .expect("error template parses");
        env.add_template("not_found.html", include_str!("../templates/not_found.html"))
            .expect("not_found template parses");
        env
    })
}

/// Render a template against a serializable context
pub fn render<S: serde::Serialize>(name: &str, ctx: &S) -> Result<Html<String>, Error> {
    let template = environment().get_template(name).map_err(|e| Error::Internal {
        operation: format!("load template {name}: {e}"),
    })?;
    let body = template
        .render(minijinja::value::Value::from_serialize(ctx))
        .map_err(|e| Error::Internal {
            operation: format!("render template {name}: {e}"),
        })?;
    Ok(Html(body))
}

/// The generic 500 page. Infallible: falls back to plain text if the
/// template itself is the problem.
pub fn error_page() -> Response {
    match render("error.html", &serde_json::json!({})) {
        Ok(html) => (StatusCode::INTERNAL_SERVER_ERROR, html).into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.").into_response(),
    }
}

/// The generic 404 page
pub fn not_found_page() -> Response {
    match render("not_found.html", &serde_json::json!({})) {
        Ok(html) => (StatusCode::NOT_FOUND, html).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Not found.").into_response(),
    }
}
