//! Scope for listing / counting / deleting rows.
//!
//! `None` on a field means "any"; `RecordScope::all()` matches everything.

use mimic_core::StyleKey;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordScope {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

impl RecordScope {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(user_id: Option<&str>, session_id: Option<&str>) -> Self {
        Self {
            user_id: user_id.map(str::to_string),
            session_id: session_id.map(str::to_string),
        }
    }

    pub fn user(user_id: &str) -> Self {
        Self::new(Some(user_id), None)
    }

    pub fn key(key: &StyleKey) -> Self {
        Self::new(Some(&key.user_id), Some(&key.session_id))
    }

    pub fn matches(&self, user_id: &str, session_id: &str) -> bool {
        self.user_id.as_deref().map_or(true, |u| u == user_id)
            && self.session_id.as_deref().map_or(true, |s| s == session_id)
    }
}
