//! Engine configuration: message filter, learning, style application, lexicon, database, logging.
//!
//! Loaded from a JSON file shaped like the plugin's `config.json`; every section and every
//! field is optional and falls back to the defaults below. Env overrides: `MIMIC_CONFIG`
//! (file path), `DATABASE_URL`, `LOG_FILE`.

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MimicError, Result};

/// Default config file path when `MIMIC_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub message_filter: MessageFilterConfig,
    pub learning: LearningConfig,
    pub style_application: StyleApplicationConfig,
    pub lexicon: LexiconConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// Admission rules applied before a message is learned from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageFilterConfig {
    pub command_prefix: Vec<String>,
    pub min_message_length: usize,
    /// A normalized content seen this many times in the session window is rejected.
    pub max_duplicate_count: usize,
    /// Recent-message window size per session (never smaller than max_duplicate_count).
    pub duplicate_window: usize,
    pub whitelist_users: Vec<String>,
    pub blacklist_users: Vec<String>,
    pub sensitive_words: Vec<String>,
    /// Reject messages containing http(s) links.
    pub block_links: bool,
}

impl Default for MessageFilterConfig {
    fn default() -> Self {
        Self {
            command_prefix: vec!["!".to_string(), "！".to_string(), "/".to_string()],
            min_message_length: 2,
            max_duplicate_count: 3,
            duplicate_window: 50,
            whitelist_users: Vec::new(),
            blacklist_users: Vec::new(),
            sensitive_words: Vec::new(),
            block_links: true,
        }
    }
}

impl MessageFilterConfig {
    pub fn window_capacity(&self) -> usize {
        self.duplicate_window.max(self.max_duplicate_count)
    }
}

/// Largest accepted `learning.learning_interval`, in seconds (chrono's duration range).
pub const MAX_LEARNING_INTERVAL_SECS: u64 = (i64::MAX / 1000) as u64;

/// Batching and merge parameters of the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub batch_size: usize,
    /// Seconds since the last commit after which a non-empty batch is committed.
    pub learning_interval: u64,
    pub max_cache_size: usize,
    /// Minimum L1 change for a merge to update qualitative fields.
    pub style_update_threshold: f64,
    /// Geometric weight decay per position towards older signals in a batch.
    pub recency_decay: f64,
    /// Weight of the newest signal in the incremental estimate.
    pub ema_alpha: f64,
    pub max_catchphrases: usize,
    /// message_count at which confidence reaches 1.0.
    pub confidence_saturation: u64,
    pub persist_timeout_ms: u64,
    /// Attempts for a forced commit before giving up.
    pub max_commit_retries: u32,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            learning_interval: 3600,
            max_cache_size: 1000,
            style_update_threshold: 0.1,
            recency_decay: 0.85,
            ema_alpha: 0.3,
            max_catchphrases: 10,
            confidence_saturation: 200,
            persist_timeout_ms: 5000,
            max_commit_retries: 3,
        }
    }
}

impl LearningConfig {
    /// Interval as a duration; values beyond what chrono can represent saturate.
    pub fn learning_interval(&self) -> chrono::Duration {
        i64::try_from(self.learning_interval)
            .ok()
            .and_then(chrono::TimeDelta::try_seconds)
            .unwrap_or(chrono::TimeDelta::MAX)
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_millis(self.persist_timeout_ms)
    }
}

/// How a learned profile is turned into a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleApplicationConfig {
    pub default_imitation_level: f64,
    pub max_history_length: usize,
    /// Confidence floor: profiles with fewer messages render the generic prompt.
    pub min_confidence_messages: u64,
    pub formality_midpoint: f64,
    pub sentiment_lean_threshold: f64,
    pub punctuation_habit_threshold: f64,
    /// Most catchphrases a prompt may surface (reached at imitation level 1.0).
    pub max_prompt_phrases: usize,
}

impl Default for StyleApplicationConfig {
    fn default() -> Self {
        Self {
            default_imitation_level: 0.7,
            max_history_length: 50,
            min_confidence_messages: 5,
            formality_midpoint: 0.5,
            sentiment_lean_threshold: 0.2,
            punctuation_habit_threshold: 0.25,
            max_prompt_phrases: 5,
        }
    }
}

/// Word lists used by the feature extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    pub formal_markers: Vec<String>,
    pub informal_markers: Vec<String>,
    pub positive_words: Vec<String>,
    pub negative_words: Vec<String>,
    /// Formality of a message with no marker hits.
    pub formality_baseline: f64,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            formal_markers: words(&[
                "您好", "请问", "谢谢", "对不起", "请", "您", "麻烦", "劳驾", "please",
                "thank you", "sorry", "would you", "could you", "kindly", "regards",
                "sincerely", "appreciate",
            ]),
            informal_markers: words(&[
                "哈哈", "嘿嘿", "哦哦", "嗯", "哎", "啦", "呀", "lol", "haha", "lmao", "omg",
                "gonna", "wanna", "yeah", "yep", "nah", "btw",
            ]),
            positive_words: words(&[
                "好", "开心", "快乐", "喜欢", "不错", "棒", "优秀", "good", "great", "love",
                "nice", "awesome", "happy", "glad", "cool",
            ]),
            negative_words: words(&[
                "不好", "难过", "伤心", "讨厌", "糟糕", "差", "失望", "bad", "sad", "hate",
                "terrible", "awful", "angry", "disappointed",
            ]),
            formality_baseline: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path, or `sqlite::memory:`.
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "./data/mimic.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: "logs/mimic.log".to_string(),
        }
    }
}

impl StyleConfig {
    /// Parses a JSON document; absent sections and fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: StyleConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Loads from `path` (or `MIMIC_CONFIG`, or `config.json`), falling back to defaults when
    /// the file does not exist, then applies `DATABASE_URL` / `LOG_FILE` overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let path = path
            .map(str::to_string)
            .or_else(|| env::var("MIMIC_CONFIG").ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if Path::new(&path).exists() {
            info!("Loading config from {}", path);
            Self::from_file(&path)?
        } else {
            info!("Config file {} not found, using defaults", path);
            Self::default()
        };

        if let Ok(url) = env::var("DATABASE_URL") {
            config.database.url = url;
        }
        if let Ok(log_file) = env::var("LOG_FILE") {
            config.logging.log_file = log_file;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        let learning = &self.learning;
        let filter = &self.message_filter;
        let application = &self.style_application;

        if filter.max_duplicate_count == 0 {
            return Err(invalid("message_filter.max_duplicate_count must be at least 1"));
        }
        if learning.batch_size == 0 {
            return Err(invalid("learning.batch_size must be at least 1"));
        }
        if learning.learning_interval > MAX_LEARNING_INTERVAL_SECS {
            return Err(invalid(format!(
                "learning.learning_interval must be at most {} seconds",
                MAX_LEARNING_INTERVAL_SECS
            )));
        }
        if learning.max_cache_size < learning.batch_size {
            return Err(invalid(format!(
                "learning.max_cache_size ({}) must not be smaller than learning.batch_size ({})",
                learning.max_cache_size, learning.batch_size
            )));
        }
        if !(learning.recency_decay > 0.0 && learning.recency_decay <= 1.0) {
            return Err(invalid("learning.recency_decay must be in (0, 1]"));
        }
        if !(learning.ema_alpha > 0.0 && learning.ema_alpha <= 1.0) {
            return Err(invalid("learning.ema_alpha must be in (0, 1]"));
        }
        if !(learning.style_update_threshold >= 0.0) {
            return Err(invalid("learning.style_update_threshold must be >= 0"));
        }
        if learning.max_catchphrases == 0 {
            return Err(invalid("learning.max_catchphrases must be at least 1"));
        }
        if learning.confidence_saturation == 0 {
            return Err(invalid("learning.confidence_saturation must be at least 1"));
        }
        if learning.max_commit_retries == 0 {
            return Err(invalid("learning.max_commit_retries must be at least 1"));
        }
        if !(0.0..=1.0).contains(&application.default_imitation_level) {
            return Err(invalid(
                "style_application.default_imitation_level must be in [0, 1]",
            ));
        }
        if application.max_prompt_phrases == 0 {
            return Err(invalid("style_application.max_prompt_phrases must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.lexicon.formality_baseline) {
            return Err(invalid("lexicon.formality_baseline must be in [0, 1]"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> MimicError {
    MimicError::Config(message.into())
}
