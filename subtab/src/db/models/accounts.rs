//! Database models for linked Campaign Monitor accounts.

use crate::types::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A stored account row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccountDBResponse {
    pub id: AccountId,
    /// Facebook user id of the page admin who linked the account
    pub user_id: String,
    /// Campaign Monitor API key
    pub api_key: String,
    pub created_at: DateTime<Utc>,
}

/// Request to create an account row.
#[derive(Debug, Clone)]
pub struct AccountCreateDBRequest {
    pub user_id: String,
    pub api_key: String,
}
