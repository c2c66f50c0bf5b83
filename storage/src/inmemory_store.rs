//! # In-Memory Style Store
//!
//! Implementation of [`StyleStore`] that keeps everything in process memory.
//!
//! Useful for tests and for running the engine without a database file; data is lost on
//! restart. Each collection sits behind its own `Arc<RwLock<>>`, so a profile write only
//! ever replaces one map entry and is therefore atomic per key.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use mimic_core::{ContextMessage, StyleKey, UserStyleProfile};
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::models::{MessageRecord, MessageStats, RecordScope};
use crate::store::StyleStore;

#[derive(Debug, Clone, Default)]
pub struct InMemoryStyleStore {
    profiles: Arc<RwLock<BTreeMap<StyleKey, UserStyleProfile>>>,
    messages: Arc<RwLock<Vec<MessageRecord>>>,
    statistics: Arc<RwLock<HashMap<String, i64>>>,
    session_context: Arc<RwLock<HashMap<String, Vec<ContextMessage>>>>,
}

impl InMemoryStyleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored audit messages.
    pub async fn message_count(&self) -> usize {
        self.messages.read().await.len()
    }

    /// Snapshot of all stored audit messages in insertion order.
    pub async fn messages(&self) -> Vec<MessageRecord> {
        self.messages.read().await.clone()
    }
}

#[async_trait]
impl StyleStore for InMemoryStyleStore {
    async fn get_profile(&self, key: &StyleKey) -> Result<Option<UserStyleProfile>, StorageError> {
        Ok(self.profiles.read().await.get(key).cloned())
    }

    async fn put_profile(&self, profile: &UserStyleProfile) -> Result<(), StorageError> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.key(), profile.clone());
        Ok(())
    }

    async fn list_profiles(
        &self,
        scope: &RecordScope,
    ) -> Result<Vec<UserStyleProfile>, StorageError> {
        let profiles = self.profiles.read().await;
        Ok(profiles
            .values()
            .filter(|p| scope.matches(&p.user_id, &p.session_id))
            .cloned()
            .collect())
    }

    async fn delete_profiles(&self, scope: &RecordScope) -> Result<u64, StorageError> {
        let mut profiles = self.profiles.write().await;
        let before = profiles.len();
        profiles.retain(|key, _| !scope.matches(&key.user_id, &key.session_id));
        Ok((before - profiles.len()) as u64)
    }

    async fn count_profiles(&self) -> Result<u64, StorageError> {
        Ok(self.profiles.read().await.len() as u64)
    }

    async fn append_message(&self, record: &MessageRecord) -> Result<(), StorageError> {
        self.messages.write().await.push(record.clone());
        Ok(())
    }

    async fn delete_messages(&self, scope: &RecordScope) -> Result<u64, StorageError> {
        let mut messages = self.messages.write().await;
        let before = messages.len();
        messages.retain(|m| !scope.matches(&m.user_id, &m.session_id));
        Ok((before - messages.len()) as u64)
    }

    async fn message_stats(&self, scope: &RecordScope) -> Result<MessageStats, StorageError> {
        let messages = self.messages.read().await;
        let in_scope: Vec<&MessageRecord> = messages
            .iter()
            .filter(|m| scope.matches(&m.user_id, &m.session_id))
            .collect();

        let mut users: Vec<&str> = in_scope.iter().map(|m| m.user_id.as_str()).collect();
        users.sort_unstable();
        users.dedup();
        let mut sessions: Vec<&str> = in_scope.iter().map(|m| m.session_id.as_str()).collect();
        sessions.sort_unstable();
        sessions.dedup();

        Ok(MessageStats {
            total_messages: in_scope.len() as i64,
            unique_users: users.len() as i64,
            unique_sessions: sessions.len() as i64,
            first_message: in_scope.iter().map(|m| m.ts).min(),
            last_message: in_scope.iter().map(|m| m.ts).max(),
        })
    }

    async fn load_statistics(&self) -> Result<HashMap<String, i64>, StorageError> {
        Ok(self.statistics.read().await.clone())
    }

    async fn save_statistics(&self, values: &[(String, i64)]) -> Result<(), StorageError> {
        let mut statistics = self.statistics.write().await;
        for (key, value) in values {
            statistics.insert(key.clone(), *value);
        }
        Ok(())
    }

    async fn put_session_context(
        &self,
        session_id: &str,
        context: &[ContextMessage],
    ) -> Result<(), StorageError> {
        self.session_context
            .write()
            .await
            .insert(session_id.to_string(), context.to_vec());
        Ok(())
    }

    async fn get_session_context(
        &self,
        session_id: &str,
    ) -> Result<Vec<ContextMessage>, StorageError> {
        Ok(self
            .session_context
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }
}
