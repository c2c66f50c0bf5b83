//! Shared test helpers.
//!
//! [`FlakyStore`] wraps an InMemoryStyleStore; its profile writes can be made to fail or
//! stall to exercise commit failure, timeout and retry paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mimic_core::{ContextMessage, StyleKey, UserStyleProfile};
use storage::{
    InMemoryStyleStore, MessageRecord, MessageStats, RecordScope, StorageError, StyleStore,
};

#[derive(Debug, Clone, Default)]
pub struct FlakyStore {
    inner: InMemoryStyleStore,
    fail_puts: Arc<AtomicBool>,
    put_delay_ms: Arc<AtomicU64>,
    put_calls: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every `put_profile` returns a database error.
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Delay applied to every `put_profile` before it completes.
    pub fn set_put_delay(&self, delay: Duration) {
        self.put_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &InMemoryStyleStore {
        &self.inner
    }
}

#[async_trait]
impl StyleStore for FlakyStore {
    async fn get_profile(&self, key: &StyleKey) -> Result<Option<UserStyleProfile>, StorageError> {
        self.inner.get_profile(key).await
    }

    async fn put_profile(&self, profile: &UserStyleProfile) -> Result<(), StorageError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.put_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Database("injected write failure".to_string()));
        }
        self.inner.put_profile(profile).await
    }

    async fn list_profiles(
        &self,
        scope: &RecordScope,
    ) -> Result<Vec<UserStyleProfile>, StorageError> {
        self.inner.list_profiles(scope).await
    }

    async fn delete_profiles(&self, scope: &RecordScope) -> Result<u64, StorageError> {
        self.inner.delete_profiles(scope).await
    }

    async fn count_profiles(&self) -> Result<u64, StorageError> {
        self.inner.count_profiles().await
    }

    async fn append_message(&self, record: &MessageRecord) -> Result<(), StorageError> {
        self.inner.append_message(record).await
    }

    async fn delete_messages(&self, scope: &RecordScope) -> Result<u64, StorageError> {
        self.inner.delete_messages(scope).await
    }

    async fn message_stats(&self, scope: &RecordScope) -> Result<MessageStats, StorageError> {
        self.inner.message_stats(scope).await
    }

    async fn load_statistics(&self) -> Result<HashMap<String, i64>, StorageError> {
        self.inner.load_statistics().await
    }

    async fn save_statistics(&self, values: &[(String, i64)]) -> Result<(), StorageError> {
        self.inner.save_statistics(values).await
    }

    async fn put_session_context(
        &self,
        session_id: &str,
        context: &[ContextMessage],
    ) -> Result<(), StorageError> {
        self.inner.put_session_context(session_id, context).await
    }

    async fn get_session_context(
        &self,
        session_id: &str,
    ) -> Result<Vec<ContextMessage>, StorageError> {
        self.inner.get_session_context(session_id).await
    }
}
