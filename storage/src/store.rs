//! # Style Store
//!
//! Persistence contract used by the learning engine. Implementations must make
//! `put_profile` atomic for one key: either every profile field is replaced or none is.
//!
//! ## Implementations
//!
//! - [`crate::SqliteStyleStore`]: SQLite via sqlx
//! - [`crate::InMemoryStyleStore`]: process memory, for tests and ephemeral runs

use std::collections::HashMap;

use async_trait::async_trait;
use mimic_core::{ContextMessage, StyleKey, UserStyleProfile};

use crate::error::StorageError;
use crate::models::{MessageRecord, MessageStats, RecordScope};

#[async_trait]
pub trait StyleStore: Send + Sync {
    /// Returns the committed profile for a key, `None` if never committed.
    async fn get_profile(&self, key: &StyleKey) -> Result<Option<UserStyleProfile>, StorageError>;

    /// Inserts or replaces the profile for its key in one atomic write.
    async fn put_profile(&self, profile: &UserStyleProfile) -> Result<(), StorageError>;

    /// Profiles within scope, ordered by (user_id, session_id).
    async fn list_profiles(&self, scope: &RecordScope)
        -> Result<Vec<UserStyleProfile>, StorageError>;

    /// Deletes profiles within scope; returns the number removed.
    async fn delete_profiles(&self, scope: &RecordScope) -> Result<u64, StorageError>;

    async fn count_profiles(&self) -> Result<u64, StorageError>;

    /// Appends an audit row for an accepted message.
    async fn append_message(&self, record: &MessageRecord) -> Result<(), StorageError>;

    /// Deletes audit rows within scope; returns the number removed.
    async fn delete_messages(&self, scope: &RecordScope) -> Result<u64, StorageError>;

    async fn message_stats(&self, scope: &RecordScope) -> Result<MessageStats, StorageError>;

    /// All persisted statistic counters.
    async fn load_statistics(&self) -> Result<HashMap<String, i64>, StorageError>;

    /// Upserts statistic counters.
    async fn save_statistics(&self, values: &[(String, i64)]) -> Result<(), StorageError>;

    async fn put_session_context(
        &self,
        session_id: &str,
        context: &[ContextMessage],
    ) -> Result<(), StorageError>;

    /// Stored context for a session; empty when none was stored.
    async fn get_session_context(&self, session_id: &str)
        -> Result<Vec<ContextMessage>, StorageError>;
}
