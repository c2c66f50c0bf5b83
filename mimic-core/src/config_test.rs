//! Config tests.

use crate::config::{LearningConfig, StyleConfig, MAX_LEARNING_INTERVAL_SECS};
use serial_test::serial;
use std::env;
use std::io::Write;

#[test]
fn test_defaults_match_documented_values() {
    let config = StyleConfig::default();

    assert_eq!(config.message_filter.command_prefix, vec!["!", "！", "/"]);
    assert_eq!(config.message_filter.min_message_length, 2);
    assert_eq!(config.message_filter.max_duplicate_count, 3);
    assert_eq!(config.learning.batch_size, 20);
    assert_eq!(config.learning.learning_interval, 3600);
    assert_eq!(config.learning.max_cache_size, 1000);
    assert_eq!(config.style_application.default_imitation_level, 0.7);
    assert_eq!(config.style_application.max_history_length, 50);
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_json_keeps_defaults_for_missing_fields() {
    let json = r#"{
        "message_filter": { "min_message_length": 4, "blacklist_users": ["spam"] },
        "learning": { "batch_size": 5 }
    }"#;

    let config = StyleConfig::from_json_str(json).unwrap();

    assert_eq!(config.message_filter.min_message_length, 4);
    assert_eq!(config.message_filter.blacklist_users, vec!["spam"]);
    assert_eq!(config.message_filter.max_duplicate_count, 3);
    assert_eq!(config.learning.batch_size, 5);
    assert_eq!(config.learning.max_cache_size, 1000);
    assert_eq!(config.style_application.max_history_length, 50);
}

#[test]
fn test_validate_rejects_cache_smaller_than_batch() {
    let json = r#"{ "learning": { "batch_size": 50, "max_cache_size": 10 } }"#;
    assert!(StyleConfig::from_json_str(json).is_err());
}

#[test]
fn test_validate_rejects_out_of_range_imitation_level() {
    let json = r#"{ "style_application": { "default_imitation_level": 1.5 } }"#;
    assert!(StyleConfig::from_json_str(json).is_err());
}

#[test]
fn test_validate_rejects_huge_learning_interval() {
    let json = r#"{ "learning": { "learning_interval": 100000000000000000 } }"#;
    assert!(StyleConfig::from_json_str(json).is_err());

    let json = format!(
        r#"{{ "learning": {{ "learning_interval": {} }} }}"#,
        MAX_LEARNING_INTERVAL_SECS
    );
    assert!(StyleConfig::from_json_str(&json).is_ok());
}

#[test]
fn test_learning_interval_saturates_instead_of_panicking() {
    let config = LearningConfig {
        learning_interval: u64::MAX,
        ..LearningConfig::default()
    };
    assert_eq!(config.learning_interval(), chrono::TimeDelta::MAX);

    let config = LearningConfig {
        learning_interval: 100_000_000_000_000_000,
        ..LearningConfig::default()
    };
    assert_eq!(config.learning_interval(), chrono::TimeDelta::MAX);
    assert_eq!(
        LearningConfig::default().learning_interval(),
        chrono::TimeDelta::seconds(3600)
    );
}

#[test]
fn test_window_capacity_never_below_duplicate_count() {
    let json = r#"{ "message_filter": { "max_duplicate_count": 8, "duplicate_window": 2 } }"#;
    let config = StyleConfig::from_json_str(json).unwrap();
    assert_eq!(config.message_filter.window_capacity(), 8);
}

#[test]
#[serial]
fn test_load_missing_file_uses_defaults_and_env_overrides() {
    env::remove_var("MIMIC_CONFIG");
    env::set_var("DATABASE_URL", "custom.db");
    env::remove_var("LOG_FILE");

    let config = StyleConfig::load(Some("/nonexistent/mimic-config.json")).unwrap();

    assert_eq!(config.database.url, "custom.db");
    assert_eq!(config.logging.log_file, "logs/mimic.log");
    assert_eq!(config.learning.batch_size, 20);

    env::remove_var("DATABASE_URL");
}

#[test]
#[serial]
fn test_load_reads_file_from_env_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "learning": {{ "batch_size": 7 }} }}"#).unwrap();

    env::set_var("MIMIC_CONFIG", file.path());
    env::remove_var("DATABASE_URL");
    env::remove_var("LOG_FILE");

    let config = StyleConfig::load(None).unwrap();

    assert_eq!(config.learning.batch_size, 7);
    assert_eq!(config.database.url, "./data/mimic.db");

    env::remove_var("MIMIC_CONFIG");
}
