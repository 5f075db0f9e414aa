//! Shared identifier types.
//!
//! Facebook and CreateSend identifiers are opaque strings owned by the
//! vendors; only our own rows get numeric ids.

/// Row id of a linked Campaign Monitor account.
pub type AccountId = i64;

/// Row id of a saved subscribe form.
pub type FormId = i64;

/// Row id of a custom field attached to a form.
pub type CustomFieldId = i64;
