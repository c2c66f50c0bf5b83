//! InMemoryStyleStore unit tests.

use chrono::{TimeZone, Utc};
use mimic_core::{ContextMessage, Message, StyleKey, UserStyleProfile};

use crate::{InMemoryStyleStore, MessageRecord, RecordScope, StyleStore};

fn profile(user: &str, session: &str, count: u64) -> UserStyleProfile {
    let mut profile = UserStyleProfile::empty(&StyleKey::new(user, session));
    profile.message_count = count;
    profile
}

fn message(user: &str, session: &str, content: &str, secs: i64) -> Message {
    Message {
        user_id: user.to_string(),
        user_name: user.to_string(),
        session_id: session.to_string(),
        content: content.to_string(),
        timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        is_group: false,
        reply_to: None,
    }
}

#[tokio::test]
async fn test_put_then_get_replaces_whole_profile() {
    let store = InMemoryStyleStore::new();
    let key = StyleKey::new("u1", "s1");

    store.put_profile(&profile("u1", "s1", 3)).await.unwrap();
    store.put_profile(&profile("u1", "s1", 7)).await.unwrap();

    let stored = store.get_profile(&key).await.unwrap().unwrap();
    assert_eq!(stored.message_count, 7);
    assert_eq!(store.count_profiles().await.unwrap(), 1);
}

#[tokio::test]
async fn test_get_unknown_profile_is_none() {
    let store = InMemoryStyleStore::new();
    let found = store.get_profile(&StyleKey::new("nobody", "s")).await.unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_delete_profiles_by_user_scope() {
    let store = InMemoryStyleStore::new();
    store.put_profile(&profile("u1", "s1", 1)).await.unwrap();
    store.put_profile(&profile("u1", "s2", 1)).await.unwrap();
    store.put_profile(&profile("u2", "s1", 1)).await.unwrap();

    let removed = store.delete_profiles(&RecordScope::user("u1")).await.unwrap();

    assert_eq!(removed, 2);
    let remaining = store.list_profiles(&RecordScope::all()).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].user_id, "u2");
}

#[tokio::test]
async fn test_message_stats_counts_distinct_users_and_sessions() {
    let store = InMemoryStyleStore::new();
    for (user, session, secs) in [("u1", "s1", 100), ("u1", "s2", 200), ("u2", "s1", 300)] {
        let record = MessageRecord::new(&message(user, session, "hello there", secs), None);
        store.append_message(&record).await.unwrap();
    }

    let stats = store.message_stats(&RecordScope::all()).await.unwrap();

    assert_eq!(stats.total_messages, 3);
    assert_eq!(stats.unique_users, 2);
    assert_eq!(stats.unique_sessions, 2);
    assert_eq!(stats.first_message.unwrap().timestamp(), 100);
    assert_eq!(stats.last_message.unwrap().timestamp(), 300);

    let scoped = store.message_stats(&RecordScope::user("u2")).await.unwrap();
    assert_eq!(scoped.total_messages, 1);
}

#[tokio::test]
async fn test_statistics_upsert() {
    let store = InMemoryStyleStore::new();
    store
        .save_statistics(&[("messages_seen".to_string(), 3)])
        .await
        .unwrap();
    store
        .save_statistics(&[("messages_seen".to_string(), 5), ("commits".to_string(), 1)])
        .await
        .unwrap();

    let stats = store.load_statistics().await.unwrap();
    assert_eq!(stats.get("messages_seen"), Some(&5));
    assert_eq!(stats.get("commits"), Some(&1));
}

#[tokio::test]
async fn test_session_context_roundtrip_and_default() {
    let store = InMemoryStyleStore::new();
    let context = vec![ContextMessage::new("alice", "hi"), ContextMessage::new("bob", "yo")];

    store.put_session_context("s1", &context).await.unwrap();

    assert_eq!(store.get_session_context("s1").await.unwrap(), context);
    assert!(store.get_session_context("other").await.unwrap().is_empty());
}
