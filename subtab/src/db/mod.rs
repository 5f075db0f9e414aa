//! Database layer for data persistence and access.
//!
//! SQLx over SQLite, following the repository pattern: `handlers` hold the
//! queries, `models` the row types and write requests. Connection strings
//! come from configuration; migrations run at startup.

pub mod errors;
pub mod handlers;
pub mod models;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Get the database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Open the pool and bring the schema up to date
pub async fn connect(connection_string: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(connection_string)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    migrator().run(&pool).await?;
    Ok(pool)
}
