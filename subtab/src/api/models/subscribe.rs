//! API models for the visitor subscribe flow.

use crate::createsend::SubscriberField;

/// Parameters of `POST /subscribe/:page_id`, parsed from the raw pair list.
///
/// Multi-select fields submit several values under one name; each becomes
/// its own `{Key, Value}` pair sharing the bracketed key.
#[derive(Debug, Clone, Default)]
pub struct SubscribeParams {
    pub email: String,
    pub name: String,
    pub custom_fields: Vec<SubscriberField>,
}

impl SubscribeParams {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (name, value) in pairs {
            match name.as_str() {
                "email" => params.email = value,
                "name" => params.name = value,
                other => {
                    if let Some(key) = super::bracketed_field_key(other) {
                        params.custom_fields.push(SubscriberField { key, value });
                    }
                }
            }
        }
        params
    }
}
