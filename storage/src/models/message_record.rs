//! Audit record for an accepted message.
//!
//! Maps to the `messages` table; carries the extracted StyleSignal so statistics and
//! re-learning can be done without re-running extraction.

use chrono::{DateTime, Utc};
use mimic_core::{Message, StyleSignal};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub user_name: String,
    pub content: String,
    pub ts: DateTime<Utc>,
    pub is_group: bool,
    pub reply_to: Option<String>,
    pub signal: Option<StyleSignal>,
}

impl MessageRecord {
    /// Creates a new record with a generated UUID.
    pub fn new(message: &Message, signal: Option<StyleSignal>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: message.user_id.clone(),
            session_id: message.session_id.clone(),
            user_name: message.user_name.clone(),
            content: message.content.clone(),
            ts: message.timestamp,
            is_group: message.is_group,
            reply_to: message.reply_to.clone(),
            signal,
        }
    }
}
