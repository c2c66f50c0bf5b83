//! # Feature Extractor
//!
//! Turns one message's content into a [`StyleSignal`]. Pure and deterministic: the only
//! inputs are the content, the timestamp and the configured [`Lexicon`].
//!
//! ## Tokenization
//!
//! - Runs of alphanumeric characters form one lowercase word token.
//! - Each CJK ideograph is a token of its own.
//! - Whitespace separates tokens; punctuation separates tokens and also splits the
//!   segments catchphrase n-grams are taken from.
//! - Emoji are counted, never tokens.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use mimic_core::{LexiconConfig, Message, StyleSignal};

/// Shortest and longest catchphrase n-gram, in tokens.
const MIN_NGRAM: usize = 2;
const MAX_NGRAM: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub cjk: bool,
}

/// Result of splitting a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokenized {
    pub tokens: Vec<Token>,
    /// Token index ranges of punctuation-free segments.
    pub segments: Vec<(usize, usize)>,
    /// Punctuation symbols in order of appearance, full-width forms folded.
    pub punctuation: Vec<String>,
    /// Runs of the same punctuation symbol of length two or more.
    pub repeated_runs: u32,
    pub emoji_count: u32,
}

pub fn is_cjk(c: char) -> bool {
    matches!(
        c as u32,
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF | 0x20000..=0x2A6DF
    )
}

pub fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F300..=0x1FAFF | 0x1F1E6..=0x1F1FF | 0x2600..=0x27BF | 0x1F000..=0x1F02F
    )
}

/// Maps a character to its punctuation symbol, folding the common full-width forms.
fn punctuation_symbol(c: char) -> Option<char> {
    let folded = match c {
        '！' => '!',
        '？' => '?',
        '，' => ',',
        '；' => ';',
        '：' => ':',
        '（' => '(',
        '）' => ')',
        other => other,
    };
    if folded.is_ascii_punctuation() {
        return Some(folded);
    }
    const CJK_PUNCTUATION: &str = "。、…—～·「」『』《》〈〉【】“”‘’";
    CJK_PUNCTUATION.contains(folded).then_some(folded)
}

pub fn tokenize(content: &str) -> Tokenized {
    let mut out = Tokenized::default();
    let mut word = String::new();
    let mut segment_start = 0;
    let mut last_symbol: Option<(char, u32)> = None;

    fn flush(word: &mut String, tokens: &mut Vec<Token>) {
        if !word.is_empty() {
            tokens.push(Token {
                text: std::mem::take(word),
                cjk: false,
            });
        }
    }

    for c in content.chars() {
        if let Some(symbol) = punctuation_symbol(c) {
            flush(&mut word, &mut out.tokens);
            if segment_start < out.tokens.len() {
                out.segments.push((segment_start, out.tokens.len()));
            }
            segment_start = out.tokens.len();
            out.punctuation.push(symbol.to_string());

            last_symbol = match last_symbol {
                Some((prev, run)) if prev == symbol => {
                    if run == 1 {
                        out.repeated_runs += 1;
                    }
                    Some((symbol, run + 1))
                }
                _ => Some((symbol, 1)),
            };
            continue;
        }
        last_symbol = None;

        if is_emoji(c) {
            flush(&mut word, &mut out.tokens);
            out.emoji_count += 1;
        } else if is_cjk(c) {
            flush(&mut word, &mut out.tokens);
            out.tokens.push(Token {
                text: c.to_string(),
                cjk: true,
            });
        } else if c.is_alphanumeric() {
            word.extend(c.to_lowercase());
        } else {
            flush(&mut word, &mut out.tokens);
        }
    }
    flush(&mut word, &mut out.tokens);
    if segment_start < out.tokens.len() {
        out.segments.push((segment_start, out.tokens.len()));
    }
    out
}

/// Joins tokens: no separator between two CJK tokens, one space otherwise.
pub fn join_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 && !(tokens[i - 1].cjk && token.cjk) {
            out.push(' ');
        }
        out.push_str(&token.text);
    }
    out
}

/// Marker lists as token sequences, longest first.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    formal: Vec<Vec<String>>,
    informal: Vec<Vec<String>>,
    positive: Vec<Vec<String>>,
    negative: Vec<Vec<String>>,
    baseline: f64,
}

fn compile(words: &[String]) -> Vec<Vec<String>> {
    let mut markers: Vec<Vec<String>> = words
        .iter()
        .map(|w| tokenize(w).tokens.into_iter().map(|t| t.text).collect::<Vec<_>>())
        .filter(|m| !m.is_empty())
        .collect();
    markers.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    markers.dedup();
    markers
}

impl Lexicon {
    pub fn new(config: &LexiconConfig) -> Self {
        Self {
            formal: compile(&config.formal_markers),
            informal: compile(&config.informal_markers),
            positive: compile(&config.positive_words),
            negative: compile(&config.negative_words),
            baseline: config.formality_baseline,
        }
    }
}

/// Counts non-overlapping marker occurrences. Positions already in `consumed` are skipped
/// and matched positions are added to it, so earlier lists take precedence.
fn count_hits(tokens: &[Token], markers: &[Vec<String>], consumed: &mut [bool]) -> u32 {
    let mut hits = 0;
    for marker in markers {
        let len = marker.len();
        if len > tokens.len() {
            continue;
        }
        let mut i = 0;
        while i + len <= tokens.len() {
            let free = !consumed[i..i + len].iter().any(|c| *c);
            if free && tokens[i..i + len].iter().zip(marker).all(|(t, m)| &t.text == m) {
                consumed[i..i + len].iter_mut().for_each(|c| *c = true);
                hits += 1;
                i += len;
            } else {
                i += 1;
            }
        }
    }
    hits
}

#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    lexicon: Lexicon,
}

impl FeatureExtractor {
    pub fn new(config: &LexiconConfig) -> Self {
        Self {
            lexicon: Lexicon::new(config),
        }
    }

    pub fn extract(&self, content: &str, observed_at: DateTime<Utc>) -> StyleSignal {
        let tokenized = tokenize(content);
        let tokens = &tokenized.tokens;

        let mut consumed = vec![false; tokens.len()];
        let formal = count_hits(tokens, &self.lexicon.formal, &mut consumed);
        let informal = count_hits(tokens, &self.lexicon.informal, &mut consumed)
            + tokenized.repeated_runs
            + tokenized.emoji_count;
        let formality = if tokens.is_empty() {
            self.lexicon.baseline
        } else {
            let delta = (formal as f64 - informal as f64) / tokens.len() as f64;
            (self.lexicon.baseline + delta).clamp(0.0, 1.0)
        };

        // negative first: "不好" must not also count as "好"
        let mut consumed = vec![false; tokens.len()];
        let negative = count_hits(tokens, &self.lexicon.negative, &mut consumed);
        let positive = count_hits(tokens, &self.lexicon.positive, &mut consumed);
        let sentiment = if positive + negative == 0 {
            0.0
        } else {
            (positive as f64 - negative as f64) / (positive + negative) as f64
        };

        let mut punctuation = BTreeMap::new();
        for symbol in &tokenized.punctuation {
            *punctuation.entry(symbol.clone()).or_insert(0u32) += 1;
        }

        let is_question = punctuation.contains_key("?")
            || tokens.last().is_some_and(|t| t.text == "吗");

        StyleSignal {
            formality,
            sentiment,
            punctuation,
            token_count: tokens.len() as u32,
            emoji_count: tokenized.emoji_count,
            is_question,
            is_reply: false,
            catchphrases: candidate_phrases(&tokenized),
            observed_at,
        }
    }

    /// Extracts a validated message; a message carrying `reply_to` is marked as a reply.
    pub fn extract_message(&self, message: &Message) -> StyleSignal {
        let mut signal = self.extract(&message.content, message.timestamp);
        signal.is_reply = message.reply_to.is_some();
        signal
    }
}

/// Every 2..=4 token n-gram inside a segment, first appearance order, no duplicates.
pub fn candidate_phrases(tokenized: &Tokenized) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut phrases = Vec::new();
    for &(start, end) in &tokenized.segments {
        let segment = &tokenized.tokens[start..end];
        for i in 0..segment.len() {
            for n in MIN_NGRAM..=MAX_NGRAM {
                if i + n > segment.len() {
                    break;
                }
                let phrase = join_tokens(&segment[i..i + n]);
                if seen.insert(phrase.clone()) {
                    phrases.push(phrase);
                }
            }
        }
    }
    phrases
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(&LexiconConfig::default())
    }

    fn at() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn texts(tokenized: &Tokenized) -> Vec<&str> {
        tokenized.tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_tokenize_mixed_script() {
        let t = tokenize("Hello 世界, OK吧");
        assert_eq!(texts(&t), vec!["hello", "世", "界", "ok", "吧"]);
        assert_eq!(t.segments, vec![(0, 3), (3, 5)]);
        assert_eq!(t.punctuation, vec![","]);
    }

    #[test]
    fn test_full_width_punctuation_folds() {
        let t = tokenize("真的？！");
        assert_eq!(t.punctuation, vec!["?", "!"]);
        assert_eq!(t.repeated_runs, 0);
    }

    #[test]
    fn test_repeated_run_counted_once() {
        let t = tokenize("wow!!! really?? ok.");
        assert_eq!(t.repeated_runs, 2);
        assert_eq!(t.punctuation.len(), 6);
    }

    #[test]
    fn test_emoji_counted_not_tokenized() {
        let t = tokenize("nice 😂😂");
        assert_eq!(texts(&t), vec!["nice"]);
        assert_eq!(t.emoji_count, 2);
    }

    #[test]
    fn test_formal_chinese_question() {
        let signal = extractor().extract("您好，请问明天开会吗？", at());
        // 9 tokens, hits: 您好 + 请问
        assert_eq!(signal.token_count, 9);
        assert!((signal.formality - (0.5 + 2.0 / 9.0)).abs() < 1e-9);
        assert!(signal.is_question);
        assert_eq!(signal.punctuation.get(","), Some(&1));
        assert_eq!(signal.punctuation.get("?"), Some(&1));
    }

    #[test]
    fn test_informal_laughter_and_exclamations() {
        let signal = extractor().extract("哈哈哈哈太好了!!!", at());
        // 7 tokens, informal: 哈哈 x2 + one "!!!" run
        assert!((signal.formality - (0.5 - 3.0 / 7.0)).abs() < 1e-9);
        assert_eq!(signal.punctuation.get("!"), Some(&3));
        assert!(signal.sentiment > 0.0);
    }

    #[test]
    fn test_english_formal_markers() {
        let signal = extractor().extract("Could you please send the report? Thank you.", at());
        assert_eq!(signal.token_count, 8);
        assert!((signal.formality - (0.5 + 3.0 / 8.0)).abs() < 1e-9);
    }

    #[test]
    fn test_formality_clamped() {
        let signal = extractor().extract("lol", at());
        assert_eq!(signal.formality, 0.0);
    }

    #[test]
    fn test_zero_tokens_use_baseline() {
        let signal = extractor().extract("!!", at());
        assert_eq!(signal.token_count, 0);
        assert_eq!(signal.formality, 0.5);
        assert_eq!(signal.sentiment, 0.0);
        assert!(signal.catchphrases.is_empty());
    }

    #[test]
    fn test_negative_masks_contained_positive() {
        assert_eq!(extractor().extract("今天不好", at()).sentiment, -1.0);
        assert_eq!(extractor().extract("今天很好", at()).sentiment, 1.0);
        assert_eq!(extractor().extract("不好但是不错", at()).sentiment, 0.0);
    }

    #[test]
    fn test_custom_baseline() {
        let config = LexiconConfig {
            formality_baseline: 0.0,
            ..LexiconConfig::default()
        };
        let signal = FeatureExtractor::new(&config).extract("please help", at());
        assert!((signal.formality - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_catchphrases_respect_segments() {
        let signal = extractor().extract("good morning team, see you", at());
        assert_eq!(
            signal.catchphrases,
            vec!["good morning", "good morning team", "morning team", "see you"]
        );
    }

    #[test]
    fn test_cjk_catchphrases_join_without_space() {
        let signal = extractor().extract("太好了", at());
        assert_eq!(signal.catchphrases, vec!["太好", "太好了", "好了"]);
    }

    #[test]
    fn test_catchphrases_deduplicated() {
        let signal = extractor().extract("ha ha ha", at());
        assert_eq!(signal.catchphrases, vec!["ha ha", "ha ha ha"]);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let a = extractor().extract("真的吗？太棒了！！", at());
        let b = extractor().extract("真的吗？太棒了！！", at());
        assert_eq!(a, b);
    }

    #[test]
    fn test_extract_message_marks_replies() {
        let mut incoming = mimic_core::IncomingMessage::new("u1", "s1", "sounds good", at());
        let plain = incoming.validate().unwrap();
        incoming.reply_to = Some("m42".to_string());
        let reply = incoming.validate().unwrap();

        assert!(!extractor().extract_message(&plain).is_reply);
        assert!(extractor().extract_message(&reply).is_reply);
        assert!(!extractor().extract("sounds good", at()).is_reply);
    }
}
