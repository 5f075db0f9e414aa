//! Database repository for subscribe forms and their custom fields.

use crate::db::{
    errors::Result,
    models::forms::{CustomFieldDBResponse, FormDBResponse, FormSaveDBRequest},
};
use crate::types::{AccountId, FormId};
use chrono::Utc;
use sqlx::{Connection, SqliteConnection};
use tracing::instrument;

pub struct Forms<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Forms<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// The form embedded on a Facebook Page. The subscribe flow uses the
    /// first match, so duplicate page ids resolve deterministically.
    #[instrument(skip(self), err)]
    pub async fn get_by_page_id(&mut self, page_id: &str) -> Result<Option<FormDBResponse>> {
        let form = sqlx::query_as::<_, FormDBResponse>("SELECT * FROM forms WHERE page_id = $1 ORDER BY id LIMIT 1")
            .bind(page_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(form)
    }

    /// All forms saved by an account
    #[instrument(skip(self), err)]
    pub async fn list_for_account(&mut self, account_id: AccountId) -> Result<Vec<FormDBResponse>> {
        let forms = sqlx::query_as::<_, FormDBResponse>("SELECT * FROM forms WHERE account_id = $1 ORDER BY id")
            .bind(account_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(forms)
    }

    /// Custom fields of a form, ordered by display name
    #[instrument(skip(self), err)]
    pub async fn custom_fields(&mut self, form_id: FormId) -> Result<Vec<CustomFieldDBResponse>> {
        let fields = sqlx::query_as::<_, CustomFieldDBResponse>(
            "SELECT * FROM custom_fields WHERE form_id = $1 ORDER BY name ASC",
        )
        .bind(form_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(fields)
    }

    /// Save a form and replace its custom field set.
    ///
    /// Upserts on (account, page): a page admin re-saving settings updates
    /// the existing row. The delete-and-reinsert of custom fields runs in
    /// the same transaction as the form row, so a failed save leaves the
    /// previous field set intact.
    #[instrument(skip(self, request), fields(page_id = %request.page_id), err)]
    pub async fn save(&mut self, request: &FormSaveDBRequest) -> Result<FormDBResponse> {
        let mut tx = self.db.begin().await?;
        let now = Utc::now();

        let existing = sqlx::query_as::<_, FormDBResponse>(
            "SELECT * FROM forms WHERE account_id = $1 AND page_id = $2 ORDER BY id LIMIT 1",
        )
        .bind(request.account_id)
        .bind(&request.page_id)
        .fetch_optional(&mut *tx)
        .await?;

        let form = match existing {
            Some(existing) => {
                sqlx::query_as::<_, FormDBResponse>(
                    r#"
                    UPDATE forms SET
                        client_id = $2,
                        list_id = $3,
                        intro_message = $4,
                        thanks_message = $5,
                        updated_at = $6
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(existing.id)
                .bind(&request.client_id)
                .bind(&request.list_id)
                .bind(&request.intro_message)
                .bind(&request.thanks_message)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, FormDBResponse>(
                    r#"
                    INSERT INTO forms (account_id, page_id, client_id, list_id, intro_message, thanks_message, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
                    RETURNING *
                    "#,
                )
                .bind(request.account_id)
                .bind(&request.page_id)
                .bind(&request.client_id)
                .bind(&request.list_id)
                .bind(&request.intro_message)
                .bind(&request.thanks_message)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        // The field set is owned wholesale: no partial updates
        sqlx::query("DELETE FROM custom_fields WHERE form_id = $1")
            .bind(form.id)
            .execute(&mut *tx)
            .await?;

        for field in &request.custom_fields {
            sqlx::query(
                r#"
                INSERT INTO custom_fields (form_id, name, field_key, data_type, field_options)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(form.id)
            .bind(&field.name)
            .bind(&field.field_key)
            .bind(&field.data_type)
            .bind(&field.field_options)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(form)
    }
}
