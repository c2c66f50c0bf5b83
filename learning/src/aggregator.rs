//! # Style Aggregator
//!
//! Per-key state machine `Idle → Buffering → Committing → Idle`. Signals are buffered in a
//! bounded [`LearningBatch`] and merged into the committed [`UserStyleProfile`] when the
//! batch is full or the learning interval has passed.
//!
//! [`StyleAggregator::merge`] is pure. [`StyleAggregator::commit`] wraps it with the
//! store round trip: load prior profile, merge, persist with a timeout, then clear the batch.
//! A failed or timed-out write keeps the batch for the next trigger.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mimic_core::{
    IncrementalEstimate, LearningConfig, RankedPhrase, StyleKey, StyleSignal, UserStyleProfile,
};
use serde::Serialize;
use storage::{StorageError, StyleStore};
use tracing::{debug, warn};

use crate::error::LearningError;

/// Pause before retry `n` of a forced commit is `n * RETRY_BACKOFF`.
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Buffering,
    Committing,
}

/// Bounded FIFO of signals waiting to be merged. Oldest signals are dropped on overflow.
#[derive(Debug, Clone)]
pub struct LearningBatch {
    signals: VecDeque<StyleSignal>,
    capacity: usize,
}

impl LearningBatch {
    pub fn new(capacity: usize) -> Self {
        Self {
            signals: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Appends a signal; returns true when the oldest one had to be dropped.
    pub fn push(&mut self, signal: StyleSignal) -> bool {
        let dropped = if self.signals.len() >= self.capacity {
            self.signals.pop_front();
            true
        } else {
            false
        };
        self.signals.push_back(signal);
        dropped
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StyleSignal> {
        self.signals.iter()
    }

    /// Timestamp of the newest buffered signal.
    pub fn latest_at(&self) -> Option<DateTime<Utc>> {
        self.signals.back().map(|s| s.observed_at)
    }

    fn as_slice(&mut self) -> &[StyleSignal] {
        self.signals.make_contiguous()
    }

    fn clear(&mut self) {
        self.signals.clear();
    }
}

/// Everything the aggregator tracks for one key.
#[derive(Debug)]
pub struct KeyState {
    key: StyleKey,
    phase: Phase,
    batch: LearningBatch,
    estimate: IncrementalEstimate,
    /// Last committed profile; `None` until loaded from the store.
    profile: Option<Arc<UserStyleProfile>>,
    /// Reference point of the interval trigger: last commit, or first accepted message.
    commit_mark: Option<DateTime<Utc>>,
    /// Set when the key's data was cleared; a retired state is never written again.
    retired: bool,
}

impl KeyState {
    pub fn new(key: StyleKey, capacity: usize) -> Self {
        let estimate = IncrementalEstimate::from_profile(&UserStyleProfile::empty(&key));
        Self {
            key,
            phase: Phase::Idle,
            batch: LearningBatch::new(capacity),
            estimate,
            profile: None,
            commit_mark: None,
            retired: false,
        }
    }

    pub fn key(&self) -> &StyleKey {
        &self.key
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn batch(&self) -> &LearningBatch {
        &self.batch
    }

    pub fn estimate(&self) -> IncrementalEstimate {
        self.estimate
    }

    pub fn profile(&self) -> Option<&Arc<UserStyleProfile>> {
        self.profile.as_ref()
    }

    pub fn commit_mark(&self) -> Option<DateTime<Utc>> {
        self.commit_mark
    }

    pub fn is_loaded(&self) -> bool {
        self.profile.is_some()
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// Drops buffered signals and marks the state dead. Callers holding a handle to it
    /// must look the key up again.
    pub fn retire(&mut self) {
        self.batch.clear();
        self.retired = true;
    }

    /// Replaces the committed snapshot (profile restore). Buffered signals stay.
    pub fn replace_profile(&mut self, profile: Arc<UserStyleProfile>) {
        self.estimate = IncrementalEstimate::from_profile(&profile);
        self.profile = Some(profile);
    }
}

/// Result of the pure merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub profile: UserStyleProfile,
    /// L1 change over formality, sentiment and the punctuation distribution.
    pub magnitude: f64,
    /// False for a sub-threshold merge that only advanced the counters.
    pub applied: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// Nothing was buffered.
    Skipped,
    Applied(Arc<UserStyleProfile>),
    BelowThreshold(Arc<UserStyleProfile>),
}

impl CommitOutcome {
    pub fn profile(&self) -> Option<&Arc<UserStyleProfile>> {
        match self {
            CommitOutcome::Skipped => None,
            CommitOutcome::Applied(p) | CommitOutcome::BelowThreshold(p) => Some(p),
        }
    }
}

/// Runs a store call with a deadline; an elapsed deadline becomes [`StorageError::Timeout`].
pub(crate) async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout(limit.as_millis() as u64)),
    }
}

#[derive(Debug, Clone)]
pub struct StyleAggregator {
    config: LearningConfig,
}

impl StyleAggregator {
    pub fn new(config: LearningConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    pub fn new_state(&self, key: StyleKey) -> KeyState {
        KeyState::new(key, self.config.max_cache_size)
    }

    /// Buffers a signal and updates the incremental estimate. Returns true when the batch
    /// was full and its oldest signal was dropped.
    pub fn observe(&self, state: &mut KeyState, signal: StyleSignal) -> bool {
        if state.commit_mark.is_none() {
            state.commit_mark = Some(signal.observed_at);
        }
        state.estimate.absorb(self.config.ema_alpha, &signal);
        let dropped = state.batch.push(signal);
        if state.phase == Phase::Idle {
            state.phase = Phase::Buffering;
        }
        dropped
    }

    pub fn should_commit(&self, state: &KeyState, now: DateTime<Utc>) -> bool {
        if state.batch.is_empty() {
            return false;
        }
        if state.batch.len() >= self.config.batch_size {
            return true;
        }
        state
            .commit_mark
            .is_some_and(|mark| now - mark >= self.config.learning_interval())
    }

    /// Merges buffered signals into `prior`.
    pub fn merge(
        &self,
        prior: &UserStyleProfile,
        signals: &[StyleSignal],
        now: DateTime<Utc>,
        force: bool,
    ) -> MergeOutcome {
        let n = signals.len();
        let decay = self.config.recency_decay;

        // recency weights: newest signal 1.0, older ones decay geometrically
        let prior_weight = prior.message_count as f64 * decay.powi(n as i32);
        let mut weight_sum = prior_weight;
        let mut formality = prior.formality * prior_weight;
        let mut sentiment = prior.sentiment * prior_weight;
        for (i, signal) in signals.iter().enumerate() {
            let weight = decay.powi((n - 1 - i) as i32);
            weight_sum += weight;
            formality += signal.formality * weight;
            sentiment += signal.sentiment * weight;
        }
        let (formality, sentiment) = if weight_sum > 0.0 {
            (formality / weight_sum, sentiment / weight_sum)
        } else {
            (prior.formality, prior.sentiment)
        };

        let mut counts: BTreeMap<String, f64> = prior
            .punctuation
            .iter()
            .map(|(symbol, share)| (symbol.clone(), share * prior.punctuation_total as f64))
            .collect();
        let mut new_symbols = 0u64;
        for signal in signals {
            for (symbol, count) in &signal.punctuation {
                *counts.entry(symbol.clone()).or_insert(0.0) += *count as f64;
                new_symbols += *count as u64;
            }
        }
        let punctuation_total = prior.punctuation_total + new_symbols;
        let punctuation: BTreeMap<String, f64> = if punctuation_total == 0 {
            BTreeMap::new()
        } else {
            counts
                .into_iter()
                .filter(|(_, count)| *count > 0.0)
                .map(|(symbol, count)| (symbol, count / punctuation_total as f64))
                .collect()
        };

        let old_count = prior.message_count as f64;
        let message_count = prior.message_count + n as u64;
        let total = message_count as f64;
        let average = |old: f64, added: f64| {
            if total > 0.0 {
                (old * old_count + added) / total
            } else {
                0.0
            }
        };
        let avg_sentence_length = average(
            prior.avg_sentence_length,
            signals.iter().map(|s| s.token_count as f64).sum(),
        );
        let emoji_rate = average(
            prior.emoji_rate,
            signals.iter().map(|s| s.emoji_count as f64).sum(),
        );
        let question_ratio = average(
            prior.question_ratio,
            signals.iter().filter(|s| s.is_question).count() as f64,
        );
        let reply_ratio = average(
            prior.reply_ratio,
            signals.iter().filter(|s| s.is_reply).count() as f64,
        );

        let commit_seq = prior.commit_seq + 1;
        let catchphrases = self.rank_phrases(prior, signals, commit_seq);

        let magnitude = (formality - prior.formality).abs()
            + (sentiment - prior.sentiment).abs()
            + distribution_distance(&prior.punctuation, &punctuation);
        let applied =
            force || prior.is_empty() || magnitude >= self.config.style_update_threshold;

        let confidence = (message_count as f64 / self.config.confidence_saturation as f64)
            .min(1.0)
            .max(prior.confidence);

        let profile = if applied {
            UserStyleProfile {
                user_id: prior.user_id.clone(),
                session_id: prior.session_id.clone(),
                formality,
                sentiment,
                catchphrases,
                punctuation,
                punctuation_total,
                avg_sentence_length,
                emoji_rate,
                question_ratio,
                reply_ratio,
                message_count,
                last_batch_at: Some(now),
                confidence,
                commit_seq,
            }
        } else {
            UserStyleProfile {
                message_count,
                last_batch_at: Some(now),
                confidence,
                commit_seq,
                ..prior.clone()
            }
        };

        MergeOutcome {
            profile,
            magnitude,
            applied,
        }
    }

    /// Frequency merge of the prior ranking with the batch's phrases (one count per message
    /// containing the phrase). Ties: earlier first_seen, then lexicographic.
    fn rank_phrases(
        &self,
        prior: &UserStyleProfile,
        signals: &[StyleSignal],
        commit_seq: u64,
    ) -> Vec<RankedPhrase> {
        let mut table: HashMap<&str, (u64, u64)> = prior
            .catchphrases
            .iter()
            .map(|p| (p.phrase.as_str(), (p.count, p.first_seen)))
            .collect();
        for signal in signals {
            for phrase in &signal.catchphrases {
                table.entry(phrase.as_str()).or_insert((0, commit_seq)).0 += 1;
            }
        }

        let mut ranked: Vec<RankedPhrase> = table
            .into_iter()
            .map(|(phrase, (count, first_seen))| RankedPhrase {
                phrase: phrase.to_string(),
                count,
                first_seen,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then(a.first_seen.cmp(&b.first_seen))
                .then_with(|| a.phrase.cmp(&b.phrase))
        });
        ranked.truncate(self.config.max_catchphrases);
        ranked
    }

    /// Loads the committed profile into `state` on first use.
    pub async fn ensure_loaded(
        &self,
        state: &mut KeyState,
        store: &dyn StyleStore,
    ) -> Result<(), StorageError> {
        if state.profile.is_some() {
            return Ok(());
        }
        let loaded =
            with_timeout(self.config.persist_timeout(), store.get_profile(&state.key)).await?;
        let profile = Arc::new(loaded.unwrap_or_else(|| UserStyleProfile::empty(&state.key)));
        if state.estimate.observed == 0 {
            state.estimate = IncrementalEstimate::from_profile(&profile);
        }
        state.profile = Some(profile);
        Ok(())
    }

    /// Merges the batch into the committed profile and persists it.
    ///
    /// The commit time never moves backwards: it is at least the previous commit mark and
    /// the prior profile's `last_batch_at`, so replaying old history keeps the newer marks.
    /// On error the batch is kept and the phase returns to `Buffering`.
    pub async fn commit(
        &self,
        state: &mut KeyState,
        store: &dyn StyleStore,
        now: DateTime<Utc>,
        force: bool,
    ) -> Result<CommitOutcome, StorageError> {
        if state.batch.is_empty() {
            return Ok(CommitOutcome::Skipped);
        }
        state.phase = Phase::Committing;
        let result = self.try_commit(state, store, now, force).await;
        state.phase = if result.is_ok() {
            Phase::Idle
        } else {
            Phase::Buffering
        };
        result
    }

    async fn try_commit(
        &self,
        state: &mut KeyState,
        store: &dyn StyleStore,
        now: DateTime<Utc>,
        force: bool,
    ) -> Result<CommitOutcome, StorageError> {
        self.ensure_loaded(state, store).await?;
        let prior = match &state.profile {
            Some(profile) => Arc::clone(profile),
            None => Arc::new(UserStyleProfile::empty(&state.key)),
        };

        let now = state
            .commit_mark
            .into_iter()
            .chain(prior.last_batch_at)
            .fold(now, std::cmp::max);

        let outcome = self.merge(&prior, state.batch.as_slice(), now, force);
        debug!(
            "Merging {} signals for {}: magnitude={:.4}, applied={}",
            state.batch.len(),
            state.key,
            outcome.magnitude,
            outcome.applied
        );
        with_timeout(self.config.persist_timeout(), store.put_profile(&outcome.profile)).await?;

        let committed = Arc::new(outcome.profile);
        state.batch.clear();
        state.estimate = IncrementalEstimate::from_profile(&committed);
        state.profile = Some(Arc::clone(&committed));
        state.commit_mark = Some(now);

        Ok(if outcome.applied {
            CommitOutcome::Applied(committed)
        } else {
            CommitOutcome::BelowThreshold(committed)
        })
    }

    /// Forced commit with up to `max_commit_retries` attempts.
    pub async fn commit_with_retries(
        &self,
        state: &mut KeyState,
        store: &dyn StyleStore,
        now: DateTime<Utc>,
    ) -> Result<CommitOutcome, LearningError> {
        let attempts = self.config.max_commit_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.commit(state, store, now, true).await {
                Ok(outcome) => return Ok(outcome),
                Err(source) if attempt >= attempts => {
                    return Err(LearningError::CommitExhausted {
                        key: state.key.to_string(),
                        attempts,
                        source,
                    });
                }
                Err(e) => {
                    warn!(
                        "Commit attempt {}/{} for {} failed: {}",
                        attempt, attempts, state.key, e
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
            }
        }
    }
}

fn distribution_distance(a: &BTreeMap<String, f64>, b: &BTreeMap<String, f64>) -> f64 {
    let mut distance: f64 = a
        .iter()
        .map(|(symbol, share)| (share - b.get(symbol).copied().unwrap_or(0.0)).abs())
        .sum();
    distance += b
        .iter()
        .filter(|(symbol, _)| !a.contains_key(*symbol))
        .map(|(_, share)| share.abs())
        .sum::<f64>();
    distance
}
