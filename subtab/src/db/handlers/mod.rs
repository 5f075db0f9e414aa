//! Database repositories.
//!
//! Each repository wraps a `&mut SqliteConnection` and exposes the queries
//! one entity needs. With only two entities, both with bespoke operations
//! (find-or-create, upsert-with-replacement), a shared CRUD trait would be
//! mostly dead weight; the structs keep the connection-borrowing shape.

pub mod accounts;
pub mod forms;

pub use accounts::Accounts;
pub use forms::Forms;
