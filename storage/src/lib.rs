//! Storage crate: persistence of style profiles, audit messages, statistics and session context.
//!
//! ## Modules
//!
//! - [`error`] – Storage error types
//! - [`models`] – MessageRecord, RecordScope, MessageStats
//! - [`store`] – StyleStore trait (the persistence contract used by the engine)
//! - [`sqlite_store`] – SqliteStyleStore (sqlx)
//! - [`inmemory_store`] – InMemoryStyleStore
//! - [`sqlite_pool`] – SqlitePoolManager

mod error;
mod inmemory_store;
mod models;
mod sqlite_pool;
mod sqlite_store;
mod store;

#[cfg(test)]
mod inmemory_store_test;

pub use error::StorageError;
pub use inmemory_store::InMemoryStyleStore;
pub use models::{MessageRecord, MessageStats, RecordScope};
pub use sqlite_pool::SqlitePoolManager;
pub use sqlite_store::SqliteStyleStore;
pub use store::StyleStore;
