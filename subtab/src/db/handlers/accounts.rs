//! Database repository for linked accounts.

use crate::db::{
    errors::{DbError, Result},
    models::accounts::{AccountCreateDBRequest, AccountDBResponse},
};
use crate::types::AccountId;
use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::instrument;

pub struct Accounts<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Accounts<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(user_id = %request.user_id), err)]
    pub async fn create(&mut self, request: &AccountCreateDBRequest) -> Result<AccountDBResponse> {
        let account = sqlx::query_as::<_, AccountDBResponse>(
            r#"
            INSERT INTO accounts (user_id, api_key, created_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&request.user_id)
        .bind(&request.api_key)
        .bind(Utc::now())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(account)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: AccountId) -> Result<Option<AccountDBResponse>> {
        let account = sqlx::query_as::<_, AccountDBResponse>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(account)
    }

    /// Find the account for a (user, api key) pair, creating it on first use.
    ///
    /// The UNIQUE index on the pair backs this up under concurrent saves: a
    /// losing insert is retried as a lookup.
    #[instrument(skip(self, api_key), fields(user_id = %user_id), err)]
    pub async fn find_or_create(&mut self, user_id: &str, api_key: &str) -> Result<AccountDBResponse> {
        if let Some(account) = self.find_by_user_and_key(user_id, api_key).await? {
            return Ok(account);
        }

        let request = AccountCreateDBRequest {
            user_id: user_id.to_string(),
            api_key: api_key.to_string(),
        };
        match self.create(&request).await {
            Ok(account) => Ok(account),
            Err(DbError::UniqueViolation { .. }) => self
                .find_by_user_and_key(user_id, api_key)
                .await?
                .ok_or(DbError::NotFound),
            Err(e) => Err(e),
        }
    }

    /// First account linked by a Facebook user, if any
    #[instrument(skip(self), err)]
    pub async fn find_by_user(&mut self, user_id: &str) -> Result<Option<AccountDBResponse>> {
        let account =
            sqlx::query_as::<_, AccountDBResponse>("SELECT * FROM accounts WHERE user_id = $1 ORDER BY id LIMIT 1")
                .bind(user_id)
                .fetch_optional(&mut *self.db)
                .await?;

        Ok(account)
    }

    #[instrument(skip(self, api_key), fields(user_id = %user_id), err)]
    pub async fn find_by_user_and_key(&mut self, user_id: &str, api_key: &str) -> Result<Option<AccountDBResponse>> {
        let account =
            sqlx::query_as::<_, AccountDBResponse>("SELECT * FROM accounts WHERE user_id = $1 AND api_key = $2")
                .bind(user_id)
                .bind(api_key)
                .fetch_optional(&mut *self.db)
                .await?;

        Ok(account)
    }

    /// Remove every account a Facebook user linked. Forms and custom fields
    /// cascade. Returns the number of accounts removed.
    #[instrument(skip(self), err)]
    pub async fn delete_for_user(&mut self, user_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM accounts WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
