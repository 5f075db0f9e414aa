//! API request and response data models.
//!
//! Request payloads arrive form-encoded from the canvas pages; responses are
//! JSON. API models stay distinct from database models so the embedded
//! JavaScript contract and the storage schema can evolve independently.

pub mod settings;
pub mod subscribe;

/// Map a submitted parameter name to a CreateSend custom-field key.
///
/// Custom field inputs are named `cf-<key>` with the surrounding square
/// brackets stripped, because `[`/`]` are not form-safe in element ids
/// (a field with key `[town]` is submitted as `cf-town`). Matching against
/// the vendor definitions re-adds the brackets. Multi-select inputs may
/// carry a trailing `[]`, which is not part of the key either.
pub fn bracketed_field_key(param_name: &str) -> Option<String> {
    let suffix = param_name.strip_prefix("cf-")?.trim_end_matches("[]");
    if suffix.is_empty() {
        return None;
    }
    Some(format!("[{suffix}]"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracketed_field_key() {
        assert_eq!(bracketed_field_key("cf-town"), Some("[town]".to_string()));
        assert_eq!(bracketed_field_key("cf-colours[]"), Some("[colours]".to_string()));
        assert_eq!(bracketed_field_key("email"), None);
        assert_eq!(bracketed_field_key("cf-"), None);
    }
}
