//! # Message Ingestor
//!
//! Decides whether an incoming message may be learned from. Rules run in a fixed order and
//! the first one that matches names the [`RejectReason`]:
//!
//! 1. malformed (missing field, blank id)
//! 2. command prefix
//! 3. too short
//! 4. blacklisted / not whitelisted
//! 5. contains a link
//! 6. contains a sensitive word
//! 7. duplicate within the session's recent window
//!
//! Every well-formed message, accepted or not, is appended to its session window. The
//! window entry is held for evaluate + append so concurrent messages of one session see a
//! consistent window.

use std::collections::VecDeque;
use std::fmt;
use std::sync::LazyLock;

use dashmap::DashMap;
use md5::{Digest, Md5};
use mimic_core::{IncomingMessage, Message, MessageFilterConfig};
use regex::Regex;
use serde::{Deserialize, Serialize};

static LINK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://\S+").expect("hardcoded link pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Malformed,
    Command,
    TooShort,
    Blacklisted,
    NotWhitelisted,
    ContainsLink,
    SensitiveWord,
    Duplicate,
}

impl RejectReason {
    pub const ALL: [RejectReason; 8] = [
        RejectReason::Malformed,
        RejectReason::Command,
        RejectReason::TooShort,
        RejectReason::Blacklisted,
        RejectReason::NotWhitelisted,
        RejectReason::ContainsLink,
        RejectReason::SensitiveWord,
        RejectReason::Duplicate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Malformed => "malformed",
            RejectReason::Command => "command",
            RejectReason::TooShort => "too_short",
            RejectReason::Blacklisted => "blacklisted",
            RejectReason::NotWhitelisted => "not_whitelisted",
            RejectReason::ContainsLink => "contains_link",
            RejectReason::SensitiveWord => "sensitive_word",
            RejectReason::Duplicate => "duplicate",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    Reject(RejectReason),
}

/// MD5 hex of the trimmed, lowercased content.
pub fn content_hash(content: &str) -> String {
    let normalized = content.trim().to_lowercase();
    hex::encode(Md5::digest(normalized.as_bytes()))
}

/// Bounded FIFO of recent content hashes for one session.
#[derive(Debug, Clone)]
pub struct RecentWindow {
    hashes: VecDeque<String>,
    capacity: usize,
}

impl RecentWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            hashes: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, hash: String) {
        if self.hashes.len() == self.capacity {
            self.hashes.pop_front();
        }
        self.hashes.push_back(hash);
    }

    pub fn occurrences(&self, hash: &str) -> usize {
        self.hashes.iter().filter(|h| h.as_str() == hash).count()
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

pub struct MessageIngestor {
    config: MessageFilterConfig,
    windows: DashMap<String, RecentWindow>,
}

impl MessageIngestor {
    pub fn new(config: MessageFilterConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Applies the admission rules to a validated message against a session window.
    /// Does not modify the window.
    pub fn evaluate(&self, message: &Message, window: &RecentWindow) -> Admission {
        let filter = &self.config;
        let content = message.content.trim();

        if filter
            .command_prefix
            .iter()
            .any(|p| !p.is_empty() && content.starts_with(p.as_str()))
        {
            return Admission::Reject(RejectReason::Command);
        }
        if content.chars().count() < filter.min_message_length {
            return Admission::Reject(RejectReason::TooShort);
        }
        if filter.blacklist_users.contains(&message.user_id) {
            return Admission::Reject(RejectReason::Blacklisted);
        }
        if !filter.whitelist_users.is_empty() && !filter.whitelist_users.contains(&message.user_id)
        {
            return Admission::Reject(RejectReason::NotWhitelisted);
        }
        if filter.block_links && LINK_PATTERN.is_match(content) {
            return Admission::Reject(RejectReason::ContainsLink);
        }
        let lowered = content.to_lowercase();
        if filter
            .sensitive_words
            .iter()
            .any(|w| !w.is_empty() && lowered.contains(&w.to_lowercase()))
        {
            return Admission::Reject(RejectReason::SensitiveWord);
        }
        if window.occurrences(&content_hash(content)) >= filter.max_duplicate_count {
            return Admission::Reject(RejectReason::Duplicate);
        }
        Admission::Accept
    }

    /// Validates, evaluates and records a message in its session window.
    pub fn admit(&self, incoming: &IncomingMessage) -> Result<Message, RejectReason> {
        let message = incoming.validate().ok_or(RejectReason::Malformed)?;

        let mut window = self
            .windows
            .entry(message.session_id.clone())
            .or_insert_with(|| RecentWindow::new(self.config.window_capacity()));
        let admission = self.evaluate(&message, &window);
        window.push(content_hash(&message.content));
        drop(window);

        match admission {
            Admission::Accept => Ok(message),
            Admission::Reject(reason) => Err(reason),
        }
    }

    pub fn reset_session(&self, session_id: &str) {
        self.windows.remove(session_id);
    }

    pub fn reset_all(&self) {
        self.windows.clear();
    }

    /// Number of hashes currently held for a session.
    pub fn window_len(&self, session_id: &str) -> usize {
        self.windows.get(session_id).map_or(0, |w| w.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn incoming(user: &str, content: &str) -> IncomingMessage {
        IncomingMessage::new(user, "s1", content, Utc.timestamp_opt(1_700_000_000, 0).unwrap())
    }

    fn ingestor() -> MessageIngestor {
        MessageIngestor::new(MessageFilterConfig::default())
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let mut message = incoming("u1", "hello there");
        message.session_id = None;
        assert_eq!(ingestor().admit(&message), Err(RejectReason::Malformed));

        let message = incoming("  ", "hello there");
        assert_eq!(ingestor().admit(&message), Err(RejectReason::Malformed));
    }

    #[test]
    fn test_malformed_does_not_touch_window() {
        let ingestor = ingestor();
        let mut message = incoming("u1", "hello there");
        message.content = None;
        let _ = ingestor.admit(&message);
        assert_eq!(ingestor.window_len("s1"), 0);
    }

    #[test]
    fn test_command_prefixes() {
        let ingestor = ingestor();
        assert_eq!(ingestor.admit(&incoming("u1", "/help me")), Err(RejectReason::Command));
        assert_eq!(ingestor.admit(&incoming("u1", "  !roll")), Err(RejectReason::Command));
        assert_eq!(ingestor.admit(&incoming("u1", "！签到")), Err(RejectReason::Command));
    }

    #[test]
    fn test_too_short_counts_chars() {
        let ingestor = ingestor();
        assert_eq!(ingestor.admit(&incoming("u1", " a ")), Err(RejectReason::TooShort));
        assert!(ingestor.admit(&incoming("u1", "好的")).is_ok());
    }

    #[test]
    fn test_blacklist_and_whitelist() {
        let config = MessageFilterConfig {
            blacklist_users: vec!["spam".to_string()],
            whitelist_users: vec!["u1".to_string(), "spam".to_string()],
            ..MessageFilterConfig::default()
        };
        let ingestor = MessageIngestor::new(config);
        assert_eq!(ingestor.admit(&incoming("spam", "buy now")), Err(RejectReason::Blacklisted));
        assert_eq!(ingestor.admit(&incoming("u2", "hi all")), Err(RejectReason::NotWhitelisted));
        assert!(ingestor.admit(&incoming("u1", "hi all")).is_ok());
    }

    #[test]
    fn test_links_and_sensitive_words() {
        let config = MessageFilterConfig {
            sensitive_words: vec!["Secret".to_string()],
            ..MessageFilterConfig::default()
        };
        let ingestor = MessageIngestor::new(config);
        assert_eq!(
            ingestor.admit(&incoming("u1", "look at https://example.com")),
            Err(RejectReason::ContainsLink)
        );
        assert_eq!(
            ingestor.admit(&incoming("u1", "this is a SECRET plan")),
            Err(RejectReason::SensitiveWord)
        );
    }

    #[test]
    fn test_links_allowed_when_not_blocked() {
        let config = MessageFilterConfig {
            block_links: false,
            ..MessageFilterConfig::default()
        };
        let ingestor = MessageIngestor::new(config);
        assert!(ingestor.admit(&incoming("u1", "see http://x.y")).is_ok());
    }

    #[test]
    fn test_duplicate_after_max_count() {
        let ingestor = ingestor();
        for _ in 0..3 {
            assert!(ingestor.admit(&incoming("u1", "Good night")).is_ok());
        }
        assert_eq!(
            ingestor.admit(&incoming("u2", "  good NIGHT ")),
            Err(RejectReason::Duplicate)
        );
    }

    #[test]
    fn test_rejected_messages_still_enter_window() {
        let ingestor = ingestor();
        let _ = ingestor.admit(&incoming("u1", "/cmd"));
        let _ = ingestor.admit(&incoming("u1", "x"));
        assert_eq!(ingestor.window_len("s1"), 2);
    }

    #[test]
    fn test_evaluate_is_pure() {
        let ingestor = ingestor();
        let message = incoming("u1", "same words").validate().unwrap();
        let mut window = RecentWindow::new(5);
        for _ in 0..3 {
            window.push(content_hash("same words"));
        }
        let first = ingestor.evaluate(&message, &window);
        let second = ingestor.evaluate(&message, &window);
        assert_eq!(first, Admission::Reject(RejectReason::Duplicate));
        assert_eq!(first, second);
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut window = RecentWindow::new(2);
        window.push("a".into());
        window.push("b".into());
        window.push("c".into());
        assert_eq!(window.len(), 2);
        assert_eq!(window.occurrences("a"), 0);
    }

    #[test]
    fn test_reset_session_forgets_duplicates() {
        let ingestor = ingestor();
        for _ in 0..3 {
            let _ = ingestor.admit(&incoming("u1", "again again"));
        }
        ingestor.reset_session("s1");
        assert!(ingestor.admit(&incoming("u1", "again again")).is_ok());
    }
}
