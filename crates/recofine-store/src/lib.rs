//! RecoFine Store: SQLite catalog, change log, checkpoints and edge tables.

pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::SqliteStore;
pub use types::*;
