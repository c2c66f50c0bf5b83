//! Unit tests for `prompt::PromptSynthesizer`.
//!
//! Verifies the confidence-floor fallback, trait lines, catchphrase budget and the
//! recent conversation section. External interactions: none (pure function tests).

use std::collections::BTreeMap;

use chrono::Utc;
use mimic_core::{
    ContextMessage, IncrementalEstimate, RankedPhrase, StyleApplicationConfig, StyleKey,
    UserStyleProfile,
};
use prompt::{PromptSynthesizer, GENERIC_STYLE_PROMPT, SECTION_RECENT, STYLE_HEADER};

fn synthesizer() -> PromptSynthesizer {
    PromptSynthesizer::new(StyleApplicationConfig::default())
}

fn learned_profile() -> UserStyleProfile {
    let mut profile = UserStyleProfile::empty(&StyleKey::new("u1", "s1"));
    profile.formality = 0.2;
    profile.sentiment = 0.6;
    profile.catchphrases = vec![
        RankedPhrase {
            phrase: "no way".to_string(),
            count: 9,
            first_seen: 1,
        },
        RankedPhrase {
            phrase: "for real".to_string(),
            count: 4,
            first_seen: 1,
        },
    ];
    profile.punctuation = BTreeMap::from([
        ("!".to_string(), 0.7),
        (",".to_string(), 0.2),
        ("?".to_string(), 0.1),
    ]);
    profile.punctuation_total = 30;
    profile.avg_sentence_length = 4.0;
    profile.message_count = 40;
    profile.last_batch_at = Some(Utc::now());
    profile.commit_seq = 2;
    profile
}

/// **Test: No profile at all renders the generic prompt.**
#[test]
fn missing_profile_falls_back() {
    let out = synthesizer().render(None, None, 0.9, &[]);
    assert_eq!(out, GENERIC_STYLE_PROMPT);
}

/// **Test: An empty profile renders the generic prompt for any level and any context.**
#[test]
fn empty_profile_fallback_ignores_level_and_context() {
    let profile = UserStyleProfile::empty(&StyleKey::new("u1", "s1"));
    let context = vec![ContextMessage::new("alice", "hello")];
    let s = synthesizer();

    for level in [0.0, 0.5, 1.0, f64::NAN] {
        assert_eq!(s.render(Some(&profile), None, level, &context), GENERIC_STYLE_PROMPT);
        assert_eq!(s.render(Some(&profile), None, level, &[]), GENERIC_STYLE_PROMPT);
    }
}

/// **Test: Profiles just below the confidence floor still fall back.**
#[test]
fn below_confidence_floor_falls_back() {
    let mut profile = learned_profile();
    profile.message_count = 4;
    assert_eq!(synthesizer().render(Some(&profile), None, 1.0, &[]), GENERIC_STYLE_PROMPT);
}

/// **Test: At level 1.0 the top catchphrase appears; at 0.0 no catchphrase appears.**
#[test]
fn catchphrases_follow_imitation_level() {
    let profile = learned_profile();
    let s = synthesizer();

    let strong = s.render(Some(&profile), None, 1.0, &[]);
    assert!(strong.starts_with(STYLE_HEADER));
    assert!(strong.contains("\"no way\""));
    assert!(strong.contains("\"for real\""));

    let none = s.render(Some(&profile), None, 0.0, &[]);
    assert!(!none.contains("no way"));
    assert!(none.contains("subtle"));
}

/// **Test: Phrase budget is round(level * max_prompt_phrases).**
#[test]
fn phrase_budget_rounds() {
    let s = synthesizer();
    assert_eq!(s.phrase_budget(0.0), 0);
    assert_eq!(s.phrase_budget(0.2), 1);
    assert_eq!(s.phrase_budget(0.6), 3);
    assert_eq!(s.phrase_budget(1.0), 5);
}

/// **Test: A dominant "!" share is described as an exclamation habit; minor symbols are not.**
#[test]
fn exclamation_habit_is_mentioned() {
    let out = synthesizer().render(Some(&learned_profile()), None, 0.5, &[]);
    assert!(out.contains("exclamation marks"));
    assert!(!out.contains("question marks"));
    assert!(out.contains("Casual"));
    assert!(out.contains("Positive"));
}

/// **Test: An estimate with observed signals overrides the committed tone.**
#[test]
fn estimate_overrides_tone() {
    let profile = learned_profile();
    let estimate = IncrementalEstimate {
        formality: 0.9,
        sentiment: -0.5,
        observed: 3,
    };
    let out = synthesizer().render(Some(&profile), Some(&estimate), 0.5, &[]);
    assert!(out.contains("Formal"));
    assert!(out.contains("Cautious"));

    let stale = IncrementalEstimate { observed: 0, ..estimate };
    let out = synthesizer().render(Some(&profile), Some(&stale), 0.5, &[]);
    assert!(out.contains("Casual"));
}

/// **Test: Context is capped to the last max_history_length lines.**
#[test]
fn context_is_capped() {
    let config = StyleApplicationConfig {
        max_history_length: 2,
        ..StyleApplicationConfig::default()
    };
    let s = PromptSynthesizer::new(config);
    let context = vec![
        ContextMessage::new("alice", "first"),
        ContextMessage::new("bob", "second"),
        ContextMessage::new("alice", "third"),
    ];

    let out = s.render(Some(&learned_profile()), None, 0.5, &context);

    assert!(out.contains(SECTION_RECENT));
    assert!(!out.contains("first"));
    assert!(out.contains("bob: second"));
    assert!(out.ends_with("alice: third"));
}

/// **Test: The reply habit shows up only when most messages were replies.**
#[test]
fn reply_habit_is_mentioned_above_half() {
    let s = synthesizer();
    let mut profile = learned_profile();

    profile.reply_ratio = 0.5;
    let out = s.render(Some(&profile), None, 0.5, &[]);
    assert!(!out.contains("Often replies directly to others"));

    profile.reply_ratio = 0.75;
    let out = s.render(Some(&profile), None, 0.5, &[]);
    assert!(out.contains("- Often replies directly to others"));
}

/// **Test: Out-of-range and non-finite levels are normalized.**
#[test]
fn level_is_normalized() {
    let s = synthesizer();
    assert_eq!(s.normalize_level(3.0), 1.0);
    assert_eq!(s.normalize_level(-1.0), 0.0);
    assert_eq!(s.normalize_level(f64::INFINITY), 0.7);
}

/// **Test: Same inputs give the same output.**
#[test]
fn rendering_is_deterministic() {
    let profile = learned_profile();
    let context = vec![ContextMessage::new("alice", "hi")];
    let s = synthesizer();
    assert_eq!(
        s.render(Some(&profile), None, 0.8, &context),
        s.render(Some(&profile), None, 0.8, &context)
    );
}
