//! Aggregate statistics for stored messages.
//!
//! Returned by StyleStore::message_stats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageStats {
    pub total_messages: i64,
    pub unique_users: i64,
    pub unique_sessions: i64,
    pub first_message: Option<DateTime<Utc>>,
    pub last_message: Option<DateTime<Utc>>,
}
