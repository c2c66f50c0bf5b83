//! SQLite style store: profiles, audit messages, statistics and session context.
//!
//! Uses SqlitePoolManager and the models (MessageRecord, RecordScope, MessageStats).
//! External: SQLite via sqlx; timestamps are stored as unix seconds.
//!
//! ## Database Schema
//!
//! ```sql
//! CREATE TABLE messages (id TEXT PRIMARY KEY, user_id TEXT, session_id TEXT, user_name TEXT,
//!                        content TEXT, ts INTEGER, is_group INTEGER, reply_to TEXT,
//!                        signal_json TEXT);
//! CREATE TABLE style_features (user_id TEXT, session_id TEXT, formality REAL, sentiment REAL,
//!                              punctuation_json TEXT, catchphrases_json TEXT, message_count INTEGER,
//!                              last_batch_at INTEGER, ..., PRIMARY KEY (user_id, session_id));
//! CREATE TABLE statistics (key TEXT PRIMARY KEY, value INTEGER, updated_at INTEGER);
//! CREATE TABLE session_context (session_id TEXT PRIMARY KEY, context_json TEXT, updated_at INTEGER);
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mimic_core::{ContextMessage, StyleKey, UserStyleProfile};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::models::{MessageRecord, MessageStats, RecordScope};
use crate::sqlite_pool::SqlitePoolManager;
use crate::store::StyleStore;

#[derive(Clone)]
pub struct SqliteStyleStore {
    pool_manager: SqlitePoolManager,
}

impl SqliteStyleStore {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool_manager = SqlitePoolManager::new(database_url).await?;
        let store = Self { pool_manager };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), StorageError> {
        info!("Creating database tables if not exist");

        let pool = self.pool_manager.pool();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                user_name TEXT NOT NULL,
                content TEXT NOT NULL,
                ts INTEGER NOT NULL,
                is_group INTEGER NOT NULL DEFAULT 0,
                reply_to TEXT,
                signal_json TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_messages_user_id ON messages(user_id);
            CREATE INDEX IF NOT EXISTS idx_messages_session_id ON messages(session_id);
            CREATE INDEX IF NOT EXISTS idx_messages_ts ON messages(ts);

            CREATE TABLE IF NOT EXISTS style_features (
                user_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                formality REAL NOT NULL,
                sentiment REAL NOT NULL,
                punctuation_json TEXT NOT NULL,
                catchphrases_json TEXT NOT NULL,
                message_count INTEGER NOT NULL,
                last_batch_at INTEGER,
                punctuation_total INTEGER NOT NULL,
                avg_sentence_length REAL NOT NULL,
                emoji_rate REAL NOT NULL,
                question_ratio REAL NOT NULL,
                reply_ratio REAL NOT NULL DEFAULT 0,
                confidence REAL NOT NULL,
                commit_seq INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, session_id)
            );

            CREATE TABLE IF NOT EXISTS statistics (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS session_context (
                session_id TEXT PRIMARY KEY,
                context_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        info!("Database tables created successfully");
        Ok(())
    }

    fn row_to_profile(row: &SqliteRow) -> Result<UserStyleProfile, StorageError> {
        let punctuation_json: String = row.try_get("punctuation_json")?;
        let catchphrases_json: String = row.try_get("catchphrases_json")?;
        let message_count: i64 = row.try_get("message_count")?;
        let last_batch_at: Option<i64> = row.try_get("last_batch_at")?;
        let punctuation_total: i64 = row.try_get("punctuation_total")?;
        let commit_seq: i64 = row.try_get("commit_seq")?;

        Ok(UserStyleProfile {
            user_id: row.try_get("user_id")?,
            session_id: row.try_get("session_id")?,
            formality: row.try_get("formality")?,
            sentiment: row.try_get("sentiment")?,
            catchphrases: serde_json::from_str(&catchphrases_json)?,
            punctuation: serde_json::from_str(&punctuation_json)?,
            punctuation_total: punctuation_total.max(0) as u64,
            avg_sentence_length: row.try_get("avg_sentence_length")?,
            emoji_rate: row.try_get("emoji_rate")?,
            question_ratio: row.try_get("question_ratio")?,
            reply_ratio: row.try_get("reply_ratio")?,
            message_count: message_count.max(0) as u64,
            last_batch_at: last_batch_at.and_then(|ts| DateTime::from_timestamp(ts, 0)),
            confidence: row.try_get("confidence")?,
            commit_seq: commit_seq.max(0) as u64,
        })
    }
}

/// Builds ` WHERE ...` for a scope plus its bind parameters, in order.
fn scope_clause(scope: &RecordScope) -> (String, Vec<String>) {
    let mut sql = String::from(" WHERE 1=1");
    let mut params = Vec::new();

    if let Some(uid) = &scope.user_id {
        sql.push_str(" AND user_id = ?");
        params.push(uid.clone());
    }

    if let Some(sid) = &scope.session_id {
        sql.push_str(" AND session_id = ?");
        params.push(sid.clone());
    }

    (sql, params)
}

#[async_trait]
impl StyleStore for SqliteStyleStore {
    async fn get_profile(&self, key: &StyleKey) -> Result<Option<UserStyleProfile>, StorageError> {
        let pool = self.pool_manager.pool();

        let row = sqlx::query("SELECT * FROM style_features WHERE user_id = ? AND session_id = ?")
            .bind(&key.user_id)
            .bind(&key.session_id)
            .fetch_optional(pool)
            .await?;

        row.as_ref().map(Self::row_to_profile).transpose()
    }

    async fn put_profile(&self, profile: &UserStyleProfile) -> Result<(), StorageError> {
        let pool = self.pool_manager.pool();
        let punctuation_json = serde_json::to_string(&profile.punctuation)?;
        let catchphrases_json = serde_json::to_string(&profile.catchphrases)?;

        sqlx::query(
            r#"
            INSERT INTO style_features (
                user_id, session_id, formality, sentiment, punctuation_json, catchphrases_json,
                message_count, last_batch_at, punctuation_total, avg_sentence_length, emoji_rate,
                question_ratio, reply_ratio, confidence, commit_seq, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, session_id) DO UPDATE SET
                formality = excluded.formality,
                sentiment = excluded.sentiment,
                punctuation_json = excluded.punctuation_json,
                catchphrases_json = excluded.catchphrases_json,
                message_count = excluded.message_count,
                last_batch_at = excluded.last_batch_at,
                punctuation_total = excluded.punctuation_total,
                avg_sentence_length = excluded.avg_sentence_length,
                emoji_rate = excluded.emoji_rate,
                question_ratio = excluded.question_ratio,
                reply_ratio = excluded.reply_ratio,
                confidence = excluded.confidence,
                commit_seq = excluded.commit_seq,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&profile.user_id)
        .bind(&profile.session_id)
        .bind(profile.formality)
        .bind(profile.sentiment)
        .bind(&punctuation_json)
        .bind(&catchphrases_json)
        .bind(profile.message_count as i64)
        .bind(profile.last_batch_at.map(|t| t.timestamp()))
        .bind(profile.punctuation_total as i64)
        .bind(profile.avg_sentence_length)
        .bind(profile.emoji_rate)
        .bind(profile.question_ratio)
        .bind(profile.reply_ratio)
        .bind(profile.confidence)
        .bind(profile.commit_seq as i64)
        .bind(Utc::now().timestamp())
        .execute(pool)
        .await?;

        debug!(
            "Saved profile: user_id={}, session_id={}, message_count={}",
            profile.user_id, profile.session_id, profile.message_count
        );
        Ok(())
    }

    async fn list_profiles(
        &self,
        scope: &RecordScope,
    ) -> Result<Vec<UserStyleProfile>, StorageError> {
        let pool = self.pool_manager.pool();
        let (where_sql, params) = scope_clause(scope);
        let sql = format!(
            "SELECT * FROM style_features{} ORDER BY user_id, session_id",
            where_sql
        );

        let mut query = sqlx::query(&sql);
        for param in &params {
            query = query.bind(param);
        }

        let rows = query.fetch_all(pool).await?;
        rows.iter().map(Self::row_to_profile).collect()
    }

    async fn delete_profiles(&self, scope: &RecordScope) -> Result<u64, StorageError> {
        let pool = self.pool_manager.pool();
        let (where_sql, params) = scope_clause(scope);
        let sql = format!("DELETE FROM style_features{}", where_sql);

        let mut query = sqlx::query(&sql);
        for param in &params {
            query = query.bind(param);
        }

        let result = query.execute(pool).await?;
        info!("Deleted {} profiles", result.rows_affected());
        Ok(result.rows_affected())
    }

    async fn count_profiles(&self) -> Result<u64, StorageError> {
        let pool = self.pool_manager.pool();
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM style_features")
            .fetch_one(pool)
            .await?;
        Ok(count.0.max(0) as u64)
    }

    async fn append_message(&self, record: &MessageRecord) -> Result<(), StorageError> {
        let pool = self.pool_manager.pool();
        let signal_json = record
            .signal
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO messages (
                id, user_id, session_id, user_name, content, ts, is_group, reply_to, signal_json
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.session_id)
        .bind(&record.user_name)
        .bind(&record.content)
        .bind(record.ts.timestamp())
        .bind(record.is_group)
        .bind(&record.reply_to)
        .bind(signal_json)
        .execute(pool)
        .await?;

        debug!("Saved message: id={}, user_id={}", record.id, record.user_id);
        Ok(())
    }

    async fn delete_messages(&self, scope: &RecordScope) -> Result<u64, StorageError> {
        let pool = self.pool_manager.pool();
        let (where_sql, params) = scope_clause(scope);
        let sql = format!("DELETE FROM messages{}", where_sql);

        let mut query = sqlx::query(&sql);
        for param in &params {
            query = query.bind(param);
        }

        let result = query.execute(pool).await?;
        info!("Deleted {} messages", result.rows_affected());
        Ok(result.rows_affected())
    }

    async fn message_stats(&self, scope: &RecordScope) -> Result<MessageStats, StorageError> {
        let pool = self.pool_manager.pool();
        let (where_sql, params) = scope_clause(scope);
        let sql = format!(
            "SELECT COUNT(*) AS total, COUNT(DISTINCT user_id) AS users, \
             COUNT(DISTINCT session_id) AS sessions, MIN(ts) AS first_ts, MAX(ts) AS last_ts \
             FROM messages{}",
            where_sql
        );

        let mut query = sqlx::query(&sql);
        for param in &params {
            query = query.bind(param);
        }

        let row = query.fetch_one(pool).await?;
        let first_ts: Option<i64> = row.try_get("first_ts")?;
        let last_ts: Option<i64> = row.try_get("last_ts")?;

        Ok(MessageStats {
            total_messages: row.try_get("total")?,
            unique_users: row.try_get("users")?,
            unique_sessions: row.try_get("sessions")?,
            first_message: first_ts.and_then(|ts| DateTime::from_timestamp(ts, 0)),
            last_message: last_ts.and_then(|ts| DateTime::from_timestamp(ts, 0)),
        })
    }

    async fn load_statistics(&self) -> Result<HashMap<String, i64>, StorageError> {
        let pool = self.pool_manager.pool();
        let rows: Vec<(String, i64)> = sqlx::query_as("SELECT key, value FROM statistics")
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    async fn save_statistics(&self, values: &[(String, i64)]) -> Result<(), StorageError> {
        let now = Utc::now().timestamp();
        let mut tx = self.pool_manager.pool().begin().await?;

        for (key, value) in values {
            sqlx::query(
                r#"
                INSERT INTO statistics (key, value, updated_at) VALUES (?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
                "#,
            )
            .bind(key)
            .bind(*value)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn put_session_context(
        &self,
        session_id: &str,
        context: &[ContextMessage],
    ) -> Result<(), StorageError> {
        let pool = self.pool_manager.pool();
        let context_json = serde_json::to_string(context)?;

        sqlx::query(
            r#"
            INSERT INTO session_context (session_id, context_json, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                context_json = excluded.context_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(session_id)
        .bind(&context_json)
        .bind(Utc::now().timestamp())
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn get_session_context(
        &self,
        session_id: &str,
    ) -> Result<Vec<ContextMessage>, StorageError> {
        let pool = self.pool_manager.pool();

        let row: Option<(String,)> =
            sqlx::query_as("SELECT context_json FROM session_context WHERE session_id = ?")
                .bind(session_id)
                .fetch_optional(pool)
                .await?;

        match row {
            Some((json,)) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }
}
