//! Core types: style key, incoming/validated messages, per-message signal, committed profile
//! and the incremental estimate kept between commits.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of one learned style: a user inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StyleKey {
    pub user_id: String,
    pub session_id: String,
}

impl StyleKey {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

impl fmt::Display for StyleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user_id, self.session_id)
    }
}

/// Message as handed over by the host. Required fields are optional here so that a
/// missing field can be detected and rejected instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub content: Option<String>,
    /// Unix seconds.
    pub send_time: Option<i64>,
    pub session_id: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    pub reply_to: Option<String>,
}

impl IncomingMessage {
    /// Builds a fully populated incoming message.
    pub fn new(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        content: impl Into<String>,
        send_time: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: Some(user_id.into()),
            user_name: None,
            content: Some(content.into()),
            send_time: Some(send_time.timestamp()),
            session_id: Some(session_id.into()),
            is_group: false,
            reply_to: None,
        }
    }

    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    pub fn with_reply_to(mut self, message_id: impl Into<String>) -> Self {
        self.reply_to = Some(message_id.into());
        self
    }

    /// Validates required fields. Returns `None` when user_id, session_id, content or
    /// send_time is absent, when an id is blank, or when send_time is out of range.
    pub fn validate(&self) -> Option<Message> {
        let user_id = self.user_id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let session_id = self
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())?;
        let content = self.content.clone()?;
        let timestamp = DateTime::from_timestamp(self.send_time?, 0)?;

        Some(Message {
            user_id: user_id.to_string(),
            user_name: self.user_name.clone().unwrap_or_else(|| user_id.to_string()),
            session_id: session_id.to_string(),
            content,
            timestamp,
            is_group: self.is_group,
            reply_to: self.reply_to.clone(),
        })
    }
}

/// A validated message. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub user_id: String,
    pub user_name: String,
    pub session_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_group: bool,
    pub reply_to: Option<String>,
}

impl Message {
    pub fn key(&self) -> StyleKey {
        StyleKey::new(self.user_id.clone(), self.session_id.clone())
    }
}

/// One line of recent conversation passed along with a prompt request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub speaker: String,
    pub content: String,
}

impl ContextMessage {
    pub fn new(speaker: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            content: content.into(),
        }
    }
}

/// Features extracted from a single message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleSignal {
    /// 0.0 (very casual) ..= 1.0 (very formal)
    pub formality: f64,
    /// -1.0 (negative) ..= 1.0 (positive)
    pub sentiment: f64,
    /// Punctuation symbol → occurrences.
    pub punctuation: BTreeMap<String, u32>,
    /// Token count; one message is treated as one utterance.
    pub token_count: u32,
    pub emoji_count: u32,
    pub is_question: bool,
    /// The message replied to another message.
    #[serde(default)]
    pub is_reply: bool,
    /// Candidate n-grams in first-appearance order, no duplicates.
    pub catchphrases: Vec<String>,
    pub observed_at: DateTime<Utc>,
}

/// A catchphrase with the number of messages it was seen in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedPhrase {
    pub phrase: String,
    pub count: u64,
    /// Commit sequence at which the profile first recorded the phrase.
    pub first_seen: u64,
}

/// Committed, durable style aggregate for one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStyleProfile {
    pub user_id: String,
    pub session_id: String,
    pub formality: f64,
    pub sentiment: f64,
    pub catchphrases: Vec<RankedPhrase>,
    /// Normalized distribution; sums to 1.0 when non-empty.
    pub punctuation: BTreeMap<String, f64>,
    /// Number of punctuation symbols the distribution was computed from.
    pub punctuation_total: u64,
    pub avg_sentence_length: f64,
    /// Average emoji per message.
    pub emoji_rate: f64,
    /// Share of messages that are questions.
    pub question_ratio: f64,
    /// Share of messages that reply to another message.
    #[serde(default)]
    pub reply_ratio: f64,
    pub message_count: u64,
    pub last_batch_at: Option<DateTime<Utc>>,
    pub confidence: f64,
    /// Number of commits merged into this profile.
    pub commit_seq: u64,
}

impl UserStyleProfile {
    /// The profile every key starts from before its first commit.
    pub fn empty(key: &StyleKey) -> Self {
        Self {
            user_id: key.user_id.clone(),
            session_id: key.session_id.clone(),
            formality: 0.5,
            sentiment: 0.0,
            catchphrases: Vec::new(),
            punctuation: BTreeMap::new(),
            punctuation_total: 0,
            avg_sentence_length: 0.0,
            emoji_rate: 0.0,
            question_ratio: 0.0,
            reply_ratio: 0.0,
            message_count: 0,
            last_batch_at: None,
            confidence: 0.0,
            commit_seq: 0,
        }
    }

    pub fn key(&self) -> StyleKey {
        StyleKey::new(self.user_id.clone(), self.session_id.clone())
    }

    /// True until the first batch has been merged.
    pub fn is_empty(&self) -> bool {
        self.message_count == 0
    }

    /// Normalized frequency of one punctuation symbol (0.0 if never seen).
    pub fn punctuation_share(&self, symbol: &str) -> f64 {
        self.punctuation.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        self.catchphrases.iter().map(|p| p.phrase.as_str())
    }
}

/// Cheap per-message estimate of formality/sentiment, updated before the batch is committed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IncrementalEstimate {
    pub formality: f64,
    pub sentiment: f64,
    /// Signals absorbed since the last successful commit.
    pub observed: u64,
}

impl IncrementalEstimate {
    /// Starts the estimate from a committed profile.
    pub fn from_profile(profile: &UserStyleProfile) -> Self {
        Self {
            formality: profile.formality,
            sentiment: profile.sentiment,
            observed: 0,
        }
    }

    /// Exponential moving average step; `alpha` is the weight of the new signal.
    pub fn absorb(&mut self, alpha: f64, signal: &StyleSignal) {
        self.formality = alpha * signal.formality + (1.0 - alpha) * self.formality;
        self.sentiment = alpha * signal.sentiment + (1.0 - alpha) * self.sentiment;
        self.observed += 1;
    }
}
