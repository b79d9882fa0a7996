//! SQLite backend for the fitm link index.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Listing queries are assembled by the
//! [`query`] composer; nothing the caller supplies is spliced into SQL text.

mod encode;
mod schema;
mod settings;
mod store;

pub mod error;
pub mod query;

pub use error::{Error, Result};
pub use query::CategoryMatching;
pub use settings::StoreSettings;
pub use store::SqliteStore;
