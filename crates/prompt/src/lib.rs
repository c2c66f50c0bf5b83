//! # Prompt
//!
//! Renders a committed [`UserStyleProfile`] (plus the incremental estimate kept between
//! commits) into a short style directive for a response generator.
//!
//! ## Format
//!
//! - **Header**: `Imitate the following speaking style when replying:`
//! - **Strength**: wording derived from the imitation level
//! - **Traits**: one `- ...` line per trait (tone, attitude, catchphrases, punctuation,
//!   emoji, questions, replies, message length)
//! - **Recent conversation** (optional): section title + the last `max_history_length`
//!   context lines as `speaker: content`
//!
//! Profiles below the confidence floor render [`GENERIC_STYLE_PROMPT`] regardless of
//! imitation level and context.
//!
//! Rendering is a pure function of its inputs; the same inputs always give the same string.

use mimic_core::{ContextMessage, IncrementalEstimate, StyleApplicationConfig, UserStyleProfile};

/// Returned when there is not enough history to describe a style.
pub const GENERIC_STYLE_PROMPT: &str =
    "Reply in a natural, friendly conversational tone that fits the chat.";

/// First line of every learned-style prompt.
pub const STYLE_HEADER: &str = "Imitate the following speaking style when replying:";

/// Section title for the recent conversation lines.
pub const SECTION_RECENT: &str = "Recent conversation:";

/// Emoji per message at which the emoji habit is mentioned.
const EMOJI_HABIT_RATE: f64 = 0.5;

/// Question share at which the question habit is mentioned.
const QUESTION_HABIT_RATIO: f64 = 0.3;

/// Reply share above which the reply habit is mentioned.
const REPLY_HABIT_RATIO: f64 = 0.5;

const SHORT_MESSAGE_TOKENS: f64 = 6.0;
const LONG_MESSAGE_TOKENS: f64 = 20.0;

#[derive(Debug, Clone)]
pub struct PromptSynthesizer {
    config: StyleApplicationConfig,
}

impl PromptSynthesizer {
    pub fn new(config: StyleApplicationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StyleApplicationConfig {
        &self.config
    }

    /// Clamps a caller-supplied level into [0, 1]; NaN and infinities fall back to the
    /// configured default.
    pub fn normalize_level(&self, imitation_level: f64) -> f64 {
        if imitation_level.is_finite() {
            imitation_level.clamp(0.0, 1.0)
        } else {
            self.config.default_imitation_level.clamp(0.0, 1.0)
        }
    }

    /// Number of catchphrases surfaced at a given (normalized) level.
    pub fn phrase_budget(&self, level: f64) -> usize {
        (level * self.config.max_prompt_phrases as f64).round() as usize
    }

    /// Renders the style prompt.
    ///
    /// * `profile` - Committed profile; `None` is treated as the empty profile
    /// * `estimate` - Incremental estimate; overrides tone and attitude when it has
    ///   absorbed signals since the last commit
    /// * `imitation_level` - 0.0 (hint) ..= 1.0 (mirror closely)
    /// * `context` - Recent conversation, oldest first
    pub fn render(
        &self,
        profile: Option<&UserStyleProfile>,
        estimate: Option<&IncrementalEstimate>,
        imitation_level: f64,
        context: &[ContextMessage],
    ) -> String {
        let profile = match profile {
            Some(p) if p.message_count >= self.config.min_confidence_messages => p,
            _ => return GENERIC_STYLE_PROMPT.to_string(),
        };

        let level = self.normalize_level(imitation_level);
        let (formality, sentiment) = match estimate {
            Some(e) if e.observed > 0 => (e.formality, e.sentiment),
            _ => (profile.formality, profile.sentiment),
        };

        let mut lines = vec![STYLE_HEADER.to_string(), strength_line(level).to_string()];

        if formality > self.config.formality_midpoint {
            lines.push("- Formal, polite tone".to_string());
        } else {
            lines.push("- Casual, relaxed tone".to_string());
        }

        let lean = self.config.sentiment_lean_threshold;
        if sentiment > lean {
            lines.push("- Positive, upbeat attitude".to_string());
        } else if sentiment < -lean {
            lines.push("- Cautious, reserved attitude".to_string());
        } else {
            lines.push("- Neutral, even-tempered attitude".to_string());
        }

        let phrases: Vec<String> = profile
            .phrases()
            .take(self.phrase_budget(level))
            .map(|p| format!("\"{p}\""))
            .collect();
        if !phrases.is_empty() {
            lines.push(format!("- Works in catchphrases such as {}", phrases.join(", ")));
        }

        for (symbol, share) in &profile.punctuation {
            if *share > self.config.punctuation_habit_threshold {
                lines.push(format!("- Uses {} frequently", punctuation_name(symbol)));
            }
        }

        if profile.emoji_rate >= EMOJI_HABIT_RATE {
            lines.push("- Uses emoji often".to_string());
        }
        if profile.question_ratio >= QUESTION_HABIT_RATIO {
            lines.push("- Often asks questions to keep the conversation going".to_string());
        }
        if profile.reply_ratio > REPLY_HABIT_RATIO {
            lines.push("- Often replies directly to others".to_string());
        }
        lines.push(length_line(profile.avg_sentence_length));

        let mut out = lines.join("\n");

        let keep = self.config.max_history_length;
        let recent = &context[context.len().saturating_sub(keep)..];
        if !recent.is_empty() {
            out.push_str("\n\n");
            out.push_str(SECTION_RECENT);
            for line in recent {
                out.push('\n');
                out.push_str(&line.speaker);
                out.push_str(": ");
                out.push_str(&line.content);
            }
        }
        out
    }
}

fn strength_line(level: f64) -> &'static str {
    if level < 1.0 / 3.0 {
        "Imitation strength: subtle. Keep only a light hint of the style."
    } else if level < 2.0 / 3.0 {
        "Imitation strength: moderate. Follow the style without exaggerating it."
    } else {
        "Imitation strength: strong. Mirror the style closely."
    }
}

fn length_line(avg_tokens: f64) -> String {
    let kind = if avg_tokens < SHORT_MESSAGE_TOKENS {
        "short"
    } else if avg_tokens > LONG_MESSAGE_TOKENS {
        "long"
    } else {
        "medium-length"
    };
    format!("- Writes {kind} messages (about {:.0} words)", avg_tokens)
}

fn punctuation_name(symbol: &str) -> String {
    match symbol {
        "!" => "exclamation marks".to_string(),
        "?" => "question marks".to_string(),
        "." => "periods".to_string(),
        "," => "commas".to_string(),
        "~" | "～" => "tildes".to_string(),
        "…" => "ellipses".to_string(),
        "。" => "full stops (。)".to_string(),
        "、" => "enumeration commas (、)".to_string(),
        other => format!("\"{other}\""),
    }
}
