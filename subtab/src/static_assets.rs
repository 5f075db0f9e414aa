//! Embedded static assets (stylesheet and settings-page script).

use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "static/"]
pub struct Assets;
