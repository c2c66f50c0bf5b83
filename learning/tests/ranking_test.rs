//! Property tests for batch merging: order-independent fields must not depend on the order
//! in which a batch's messages arrived.

use chrono::{Duration, TimeZone, Utc};
use learning::{FeatureExtractor, StyleAggregator};
use mimic_core::{LearningConfig, LexiconConfig, StyleKey, StyleSignal, UserStyleProfile};
use proptest::prelude::*;

const WORDS: &[&str] = &[
    "no", "way", "that", "is", "wild", "ok", "sure", "good", "bad", "lol", "哈", "好", "的",
];
const ENDINGS: &[&str] = &["", "!", "?", "...", ", right"];

fn message() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(prop::sample::select(WORDS), 2..6),
        prop::sample::select(ENDINGS),
    )
        .prop_map(|(words, ending)| format!("{}{}", words.join(" "), ending))
}

fn batch_and_shuffle() -> impl Strategy<Value = (Vec<String>, Vec<String>)> {
    prop::collection::vec(message(), 1..15)
        .prop_flat_map(|batch| (Just(batch.clone()), Just(batch).prop_shuffle()))
}

fn signals(messages: &[String]) -> Vec<StyleSignal> {
    let extractor = FeatureExtractor::new(&LexiconConfig::default());
    let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    messages
        .iter()
        .enumerate()
        .map(|(i, content)| extractor.extract(content, start + Duration::seconds(i as i64)))
        .collect()
}

proptest! {
    #[test]
    fn catchphrase_ranking_ignores_batch_order((batch, shuffled) in batch_and_shuffle()) {
        let aggregator = StyleAggregator::new(LearningConfig::default());
        let prior = UserStyleProfile::empty(&StyleKey::new("u1", "s1"));
        let now = Utc.timestamp_opt(1_700_001_000, 0).unwrap();

        let a = aggregator.merge(&prior, &signals(&batch), now, false).profile;
        let b = aggregator.merge(&prior, &signals(&shuffled), now, false).profile;

        prop_assert_eq!(&a.catchphrases, &b.catchphrases);
        prop_assert_eq!(&a.punctuation, &b.punctuation);
        prop_assert_eq!(a.message_count, b.message_count);
        prop_assert_eq!(a.question_ratio, b.question_ratio);
    }

    #[test]
    fn catchphrases_are_sorted_and_bounded(batch in prop::collection::vec(message(), 1..30)) {
        let config = LearningConfig::default();
        let max = config.max_catchphrases;
        let aggregator = StyleAggregator::new(config);
        let prior = UserStyleProfile::empty(&StyleKey::new("u1", "s1"));
        let now = Utc.timestamp_opt(1_700_001_000, 0).unwrap();

        let profile = aggregator.merge(&prior, &signals(&batch), now, false).profile;

        prop_assert!(profile.catchphrases.len() <= max);
        for pair in profile.catchphrases.windows(2) {
            prop_assert!(pair[0].count >= pair[1].count);
        }
        prop_assert!((0.0..=1.0).contains(&profile.formality));
        prop_assert!((-1.0..=1.0).contains(&profile.sentiment));
    }
}
