//! Database models for subscribe forms and their custom fields.

use crate::types::{AccountId, CustomFieldId, FormId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Delimiter used to pack a custom field's option list into one column.
pub const FIELD_OPTIONS_DELIMITER: &str = "^";

/// A stored subscribe form.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FormDBResponse {
    pub id: FormId,
    pub account_id: AccountId,
    /// Facebook Page the form is embedded on
    pub page_id: String,
    /// CreateSend client owning the target list
    pub client_id: String,
    /// CreateSend list subscribers are added to
    pub list_id: String,
    pub intro_message: String,
    pub thanks_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored custom field, always owned by exactly one form.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CustomFieldDBResponse {
    pub id: CustomFieldId,
    pub form_id: FormId,
    /// Display label shown on the subscribe form
    pub name: String,
    /// Bracketed CreateSend key, e.g. `[favouritecolour]`
    pub field_key: String,
    pub data_type: String,
    /// `^`-joined option list for select fields
    pub field_options: String,
}

impl CustomFieldDBResponse {
    /// Split the packed option list back into its values
    pub fn options(&self) -> Vec<&str> {
        if self.field_options.is_empty() {
            Vec::new()
        } else {
            self.field_options.split(FIELD_OPTIONS_DELIMITER).collect()
        }
    }
}

/// Request to save (create or fully update) a form together with its
/// replacement custom field set.
#[derive(Debug, Clone)]
pub struct FormSaveDBRequest {
    pub account_id: AccountId,
    pub page_id: String,
    pub client_id: String,
    pub list_id: String,
    pub intro_message: String,
    pub thanks_message: String,
    pub custom_fields: Vec<CustomFieldCreateDBRequest>,
}

/// One custom field in a [`FormSaveDBRequest`].
#[derive(Debug, Clone)]
pub struct CustomFieldCreateDBRequest {
    pub name: String,
    pub field_key: String,
    pub data_type: String,
    pub field_options: String,
}

impl FormSaveDBRequest {
    /// A form is valid when both messages survive trimming.
    ///
    /// Returns the names of the blank fields, empty when valid.
    pub fn blank_fields(&self) -> Vec<&'static str> {
        let mut blank = Vec::new();
        if self.intro_message.trim().is_empty() {
            blank.push("intro_message");
        }
        if self.thanks_message.trim().is_empty() {
            blank.push("thanks_message");
        }
        blank
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_round_trip() {
        let field = CustomFieldDBResponse {
            id: 1,
            form_id: 1,
            name: "Favourite colour".to_string(),
            field_key: "[favouritecolour]".to_string(),
            data_type: "MultiSelectOne".to_string(),
            field_options: "red^green^blue".to_string(),
        };
        assert_eq!(field.options(), vec!["red", "green", "blue"]);
    }

    #[test]
    fn test_empty_options() {
        let field = CustomFieldDBResponse {
            id: 1,
            form_id: 1,
            name: "Age".to_string(),
            field_key: "[age]".to_string(),
            data_type: "Number".to_string(),
            field_options: String::new(),
        };
        assert!(field.options().is_empty());
    }

    #[test]
    fn test_blank_fields() {
        let mut request = FormSaveDBRequest {
            account_id: 1,
            page_id: "111".to_string(),
            client_id: "c".to_string(),
            list_id: "l".to_string(),
            intro_message: "   ".to_string(),
            thanks_message: "Bye".to_string(),
            custom_fields: vec![],
        };
        assert_eq!(request.blank_fields(), vec!["intro_message"]);

        request.intro_message = "Hi".to_string();
        assert!(request.blank_fields().is_empty());
    }
}
