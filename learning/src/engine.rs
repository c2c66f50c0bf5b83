//! # Style Engine
//!
//! Facade used by the host: feed messages in, ask for style prompts, import history, and
//! manage learned data.
//!
//! ## Concurrency
//!
//! - One `tokio::sync::Mutex<KeyState>` per (user, session): messages of one key are
//!   processed one at a time, different keys in parallel.
//! - Clearing data takes the key mutexes in key order before deleting, so it waits for
//!   in-flight commits. Cleared states are retired and later messages start from a fresh one.
//! - Prompt reads use a separate map of published snapshots (committed profile + estimate)
//!   and never wait on a key mutex.
//! - Store calls carry the configured persistence timeout.
//!
//! The live path never fails: rejected messages and commit failures are logged and counted.
//! Only forced commits that exhaust their retries (import, flush) return an error.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use mimic_core::{
    ContextMessage, IncomingMessage, IncrementalEstimate, StyleConfig, StyleKey, UserStyleProfile,
};
use prompt::{PromptSynthesizer, GENERIC_STYLE_PROMPT};
use serde::{Deserialize, Serialize};
use storage::{MessageRecord, RecordScope, StyleStore};
use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::aggregator::{with_timeout, CommitOutcome, KeyState, Phase, StyleAggregator};
use crate::error::{LearningError, Result};
use crate::extractor::FeatureExtractor;
use crate::importer::{self, ImportOptions, ImportReport};
use crate::ingestor::{MessageIngestor, RejectReason};

const STAT_MESSAGES_SEEN: &str = "messages_seen";
const STAT_MESSAGES_ACCEPTED: &str = "messages_accepted";
const STAT_MESSAGES_REJECTED: &str = "messages_rejected";
const STAT_COMMITS_APPLIED: &str = "commits_applied";
const STAT_COMMITS_BELOW_THRESHOLD: &str = "commits_below_threshold";
const STAT_COMMIT_FAILURES: &str = "commit_failures";
const STAT_SIGNALS_DROPPED: &str = "signals_dropped";
const STAT_LAST_ACTIVITY: &str = "last_activity_time";
const STAT_REJECTED_PREFIX: &str = "rejected.";

/// Committed profile plus the estimate, as seen by prompt reads.
#[derive(Debug, Clone)]
pub struct PublishedStyle {
    pub profile: Option<Arc<UserStyleProfile>>,
    pub estimate: IncrementalEstimate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineStatistics {
    pub messages_seen: u64,
    pub messages_accepted: u64,
    pub messages_rejected: u64,
    pub profiles_tracked: u64,
    pub last_activity_time: Option<DateTime<Utc>>,
    pub rejected_by_reason: BTreeMap<String, u64>,
    pub commits_applied: u64,
    pub commits_below_threshold: u64,
    pub commit_failures: u64,
    pub signals_dropped: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    pub profiles_removed: u64,
    pub messages_removed: u64,
    /// In-memory key states dropped, including their buffered signals.
    pub keys_dropped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub committed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyStatus {
    pub key: StyleKey,
    pub phase: Phase,
    /// `None` while the key is busy and could not be inspected.
    pub buffered: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub tracked_keys: usize,
    pub buffered_signals: usize,
    pub keys: Vec<KeyStatus>,
}

/// Export / restore document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileExport {
    pub exported_at: DateTime<Utc>,
    pub profiles: Vec<UserStyleProfile>,
}

#[derive(Debug, Default)]
struct Counters {
    messages_seen: AtomicU64,
    messages_accepted: AtomicU64,
    messages_rejected: AtomicU64,
    commits_applied: AtomicU64,
    commits_below_threshold: AtomicU64,
    commit_failures: AtomicU64,
    signals_dropped: AtomicU64,
    /// Unix seconds of the newest accepted message; 0 when none.
    last_activity: AtomicI64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

pub struct StyleEngine {
    config: StyleConfig,
    store: Arc<dyn StyleStore>,
    ingestor: MessageIngestor,
    extractor: FeatureExtractor,
    aggregator: StyleAggregator,
    synthesizer: PromptSynthesizer,
    keys: DashMap<StyleKey, Arc<Mutex<KeyState>>>,
    published: DashMap<StyleKey, PublishedStyle>,
    rejected: DashMap<RejectReason, u64>,
    counters: Counters,
}

impl StyleEngine {
    /// Creates an engine with fresh counters.
    pub fn new(config: StyleConfig, store: Arc<dyn StyleStore>) -> Self {
        Self {
            ingestor: MessageIngestor::new(config.message_filter.clone()),
            extractor: FeatureExtractor::new(&config.lexicon),
            aggregator: StyleAggregator::new(config.learning.clone()),
            synthesizer: PromptSynthesizer::new(config.style_application.clone()),
            config,
            store,
            keys: DashMap::new(),
            published: DashMap::new(),
            rejected: DashMap::new(),
            counters: Counters::default(),
        }
    }

    /// Creates an engine and restores the counters persisted by a previous run.
    pub async fn open(config: StyleConfig, store: Arc<dyn StyleStore>) -> Result<Self> {
        let engine = Self::new(config, store);
        let saved = with_timeout(engine.timeout(), engine.store.load_statistics()).await?;
        engine.restore_counters(&saved);
        info!(
            "Style engine ready: {} messages seen previously",
            engine.counters.messages_seen.load(Ordering::Relaxed)
        );
        Ok(engine)
    }

    pub fn config(&self) -> &StyleConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn StyleStore> {
        &self.store
    }

    fn timeout(&self) -> Duration {
        self.config.learning.persist_timeout()
    }

    fn slot(&self, key: &StyleKey) -> Arc<Mutex<KeyState>> {
        let entry = self
            .keys
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(self.aggregator.new_state(key.clone()))));
        Arc::clone(entry.value())
    }

    fn existing_slot(&self, key: &StyleKey) -> Option<Arc<Mutex<KeyState>>> {
        self.keys.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Locks the live state of a key, creating it when missing.
    async fn lock_state(&self, key: &StyleKey) -> OwnedMutexGuard<KeyState> {
        loop {
            let state = self.slot(key).lock_owned().await;
            if !state.is_retired() {
                return state;
            }
        }
    }

    /// Locks the live state of a key if one exists.
    async fn lock_existing(&self, key: &StyleKey) -> Option<OwnedMutexGuard<KeyState>> {
        let state = self.existing_slot(key)?.lock_owned().await;
        (!state.is_retired()).then_some(state)
    }

    /// Entry point for live traffic. Never fails; rejections are counted.
    pub async fn on_message_received(&self, incoming: IncomingMessage) {
        let _ = self.process(&incoming).await;
    }

    /// Runs one message through ingest → extract → aggregate.
    pub(crate) async fn process(
        &self,
        incoming: &IncomingMessage,
    ) -> std::result::Result<(), RejectReason> {
        bump(&self.counters.messages_seen);

        let message = match self.ingestor.admit(incoming) {
            Ok(message) => message,
            Err(reason) => {
                bump(&self.counters.messages_rejected);
                *self.rejected.entry(reason).or_insert(0) += 1;
                debug!(
                    "Rejected message from {:?} in {:?}: {}",
                    incoming.user_id, incoming.session_id, reason
                );
                return Err(reason);
            }
        };
        bump(&self.counters.messages_accepted);
        self.counters
            .last_activity
            .fetch_max(message.timestamp.timestamp(), Ordering::Relaxed);

        let key = message.key();
        let signal = self.extractor.extract_message(&message);

        let mut state = self.lock_state(&key).await;
        let record = MessageRecord::new(&message, Some(signal.clone()));
        if let Err(e) = with_timeout(self.timeout(), self.store.append_message(&record)).await {
            warn!("Failed to store message for {}: {}", key, e);
        }

        if !state.is_loaded() {
            if let Err(e) = self
                .aggregator
                .ensure_loaded(&mut state, self.store.as_ref())
                .await
            {
                warn!("Failed to load profile for {}: {}", key, e);
            }
        }

        if self.aggregator.observe(&mut state, signal) {
            bump(&self.counters.signals_dropped);
            debug!("Batch for {} is full, dropped oldest signal", key);
        }
        self.publish(&state);

        if self.aggregator.should_commit(&state, message.timestamp) {
            match self
                .aggregator
                .commit(&mut state, self.store.as_ref(), message.timestamp, false)
                .await
            {
                Ok(outcome) => self.on_committed(&state, &outcome).await,
                Err(e) => {
                    bump(&self.counters.commit_failures);
                    warn!(
                        "Commit for {} failed, keeping {} buffered signals: {}",
                        key,
                        state.batch().len(),
                        e
                    );
                }
            }
        }
        Ok(())
    }

    fn publish(&self, state: &KeyState) {
        let estimate = state.estimate();
        match state.profile() {
            Some(profile) => {
                self.published.insert(
                    state.key().clone(),
                    PublishedStyle {
                        profile: Some(Arc::clone(profile)),
                        estimate,
                    },
                );
            }
            None => {
                self.published
                    .entry(state.key().clone())
                    .and_modify(|style| style.estimate = estimate)
                    .or_insert(PublishedStyle {
                        profile: None,
                        estimate,
                    });
            }
        }
    }

    async fn on_committed(&self, state: &KeyState, outcome: &CommitOutcome) {
        match outcome {
            CommitOutcome::Skipped => return,
            CommitOutcome::Applied(profile) => {
                bump(&self.counters.commits_applied);
                info!(
                    "Committed style for {}: message_count={}, confidence={:.2}",
                    state.key(),
                    profile.message_count,
                    profile.confidence
                );
            }
            CommitOutcome::BelowThreshold(profile) => {
                bump(&self.counters.commits_below_threshold);
                debug!(
                    "Style change for {} below threshold, message_count={}",
                    state.key(),
                    profile.message_count
                );
            }
        }
        self.publish(state);
        self.persist_statistics().await;
    }

    /// Forced commit of one key with retries. The commit time is the newest buffered
    /// message, never earlier than the key's previous commit.
    pub(crate) async fn force_commit(&self, key: &StyleKey) -> Result<CommitOutcome> {
        let Some(mut state) = self.lock_existing(key).await else {
            return Ok(CommitOutcome::Skipped);
        };
        let now = state
            .batch()
            .latest_at()
            .into_iter()
            .chain(state.commit_mark())
            .chain(state.profile().and_then(|p| p.last_batch_at))
            .max()
            .unwrap_or_else(Utc::now);
        match self
            .aggregator
            .commit_with_retries(&mut state, self.store.as_ref(), now)
            .await
        {
            Ok(outcome) => {
                self.on_committed(&state, &outcome).await;
                Ok(outcome)
            }
            Err(e) => {
                bump(&self.counters.commit_failures);
                warn!("{}", e);
                Err(e)
            }
        }
    }

    /// Forces a commit for every key with buffered signals, then persists the counters.
    /// Every key is attempted; the first exhausted commit is returned as the error.
    pub async fn flush(&self) -> Result<FlushReport> {
        let keys: Vec<StyleKey> = self.keys.iter().map(|entry| entry.key().clone()).collect();
        let mut report = FlushReport::default();
        let mut first_error = None;

        for key in keys {
            match self.force_commit(&key).await {
                Ok(CommitOutcome::Skipped) => {}
                Ok(_) => report.committed += 1,
                Err(e) => {
                    report.failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        self.persist_statistics().await;
        info!(
            "Flush completed: committed={}, failed={}",
            report.committed, report.failed
        );
        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Style prompt at the configured default imitation level.
    pub async fn get_style_prompt(
        &self,
        user_id: &str,
        session_id: &str,
        context: &[ContextMessage],
    ) -> String {
        let level = self.config.style_application.default_imitation_level;
        self.get_style_prompt_with_level(user_id, session_id, context, level)
            .await
    }

    /// Style prompt for a key. An empty `context` falls back to the stored session context.
    /// Unknown keys, thin profiles and store failures give the generic prompt.
    pub async fn get_style_prompt_with_level(
        &self,
        user_id: &str,
        session_id: &str,
        context: &[ContextMessage],
        imitation_level: f64,
    ) -> String {
        let key = StyleKey::new(user_id, session_id);
        let cached = self.published.get(&key).map(|entry| entry.value().clone());
        let style = match cached {
            Some(style) => style,
            None => match self.load_published(&key).await {
                Some(style) => style,
                None => return GENERIC_STYLE_PROMPT.to_string(),
            },
        };

        let stored;
        let context = if context.is_empty() {
            stored = self.get_session_context(session_id).await;
            stored.as_slice()
        } else {
            context
        };

        self.synthesizer.render(
            style.profile.as_deref(),
            Some(&style.estimate),
            imitation_level,
            context,
        )
    }

    async fn load_published(&self, key: &StyleKey) -> Option<PublishedStyle> {
        match with_timeout(self.timeout(), self.store.get_profile(key)).await {
            Ok(Some(profile)) => {
                let profile = Arc::new(profile);
                let style = PublishedStyle {
                    estimate: IncrementalEstimate::from_profile(&profile),
                    profile: Some(profile),
                };
                let entry = self.published.entry(key.clone()).or_insert(style);
                Some(entry.value().clone())
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to load style for {}: {}", key, e);
                None
            }
        }
    }

    pub async fn import_chat_history(
        &self,
        user_id: &str,
        session_id: &str,
        file_path: impl AsRef<Path>,
    ) -> Result<ImportReport> {
        self.import_chat_history_with(user_id, session_id, file_path, ImportOptions::default())
            .await
    }

    pub async fn import_chat_history_with(
        &self,
        user_id: &str,
        session_id: &str,
        file_path: impl AsRef<Path>,
        options: ImportOptions,
    ) -> Result<ImportReport> {
        let path = file_path.as_ref();
        info!("Reading chat history from {}", path.display());
        let file = tokio::fs::File::open(path).await?;
        let key = StyleKey::new(user_id, session_id);
        self.import_transcript(&key, BufReader::new(file), options)
            .await
    }

    /// Imports a transcript from any buffered reader.
    pub async fn import_transcript<R>(
        &self,
        key: &StyleKey,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportReport>
    where
        R: AsyncBufRead + Unpin,
    {
        importer::import_lines(self, key, reader, &options).await
    }

    pub async fn get_statistics(&self) -> EngineStatistics {
        let profiles_tracked =
            match with_timeout(self.timeout(), self.store.count_profiles()).await {
                Ok(count) => count,
                Err(e) => {
                    warn!("Failed to count profiles: {}", e);
                    self.published.len() as u64
                }
            };
        let c = &self.counters;
        let last_activity = c.last_activity.load(Ordering::Relaxed);
        EngineStatistics {
            messages_seen: c.messages_seen.load(Ordering::Relaxed),
            messages_accepted: c.messages_accepted.load(Ordering::Relaxed),
            messages_rejected: c.messages_rejected.load(Ordering::Relaxed),
            profiles_tracked,
            last_activity_time: (last_activity > 0)
                .then(|| DateTime::from_timestamp(last_activity, 0))
                .flatten(),
            rejected_by_reason: self
                .rejected
                .iter()
                .map(|entry| (entry.key().as_str().to_string(), *entry.value()))
                .collect(),
            commits_applied: c.commits_applied.load(Ordering::Relaxed),
            commits_below_threshold: c.commits_below_threshold.load(Ordering::Relaxed),
            commit_failures: c.commit_failures.load(Ordering::Relaxed),
            signals_dropped: c.signals_dropped.load(Ordering::Relaxed),
        }
    }

    fn statistics_snapshot(&self) -> Vec<(String, i64)> {
        let c = &self.counters;
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed) as i64;
        let mut values = vec![
            (STAT_MESSAGES_SEEN.to_string(), load(&c.messages_seen)),
            (STAT_MESSAGES_ACCEPTED.to_string(), load(&c.messages_accepted)),
            (STAT_MESSAGES_REJECTED.to_string(), load(&c.messages_rejected)),
            (STAT_COMMITS_APPLIED.to_string(), load(&c.commits_applied)),
            (
                STAT_COMMITS_BELOW_THRESHOLD.to_string(),
                load(&c.commits_below_threshold),
            ),
            (STAT_COMMIT_FAILURES.to_string(), load(&c.commit_failures)),
            (STAT_SIGNALS_DROPPED.to_string(), load(&c.signals_dropped)),
            (
                STAT_LAST_ACTIVITY.to_string(),
                c.last_activity.load(Ordering::Relaxed),
            ),
        ];
        for entry in self.rejected.iter() {
            values.push((
                format!("{}{}", STAT_REJECTED_PREFIX, entry.key().as_str()),
                *entry.value() as i64,
            ));
        }
        values
    }

    async fn persist_statistics(&self) {
        let values = self.statistics_snapshot();
        if let Err(e) = with_timeout(self.timeout(), self.store.save_statistics(&values)).await {
            warn!("Failed to save statistics: {}", e);
        }
    }

    fn restore_counters(&self, saved: &HashMap<String, i64>) {
        let c = &self.counters;
        let get = |name: &str| saved.get(name).copied().unwrap_or(0).max(0) as u64;
        c.messages_seen.store(get(STAT_MESSAGES_SEEN), Ordering::Relaxed);
        c.messages_accepted
            .store(get(STAT_MESSAGES_ACCEPTED), Ordering::Relaxed);
        c.messages_rejected
            .store(get(STAT_MESSAGES_REJECTED), Ordering::Relaxed);
        c.commits_applied
            .store(get(STAT_COMMITS_APPLIED), Ordering::Relaxed);
        c.commits_below_threshold
            .store(get(STAT_COMMITS_BELOW_THRESHOLD), Ordering::Relaxed);
        c.commit_failures
            .store(get(STAT_COMMIT_FAILURES), Ordering::Relaxed);
        c.signals_dropped
            .store(get(STAT_SIGNALS_DROPPED), Ordering::Relaxed);
        c.last_activity.store(
            saved.get(STAT_LAST_ACTIVITY).copied().unwrap_or(0),
            Ordering::Relaxed,
        );
        for reason in RejectReason::ALL {
            let count = get(format!("{}{}", STAT_REJECTED_PREFIX, reason.as_str()).as_str());
            if count > 0 {
                self.rejected.insert(reason, count);
            }
        }
    }

    /// Deletes learned data in scope: in-memory state, profiles and stored messages.
    /// `None` for both clears everything.
    ///
    /// Holds the mutex of every matching key while deleting, so a commit already in flight
    /// lands before the delete instead of resurrecting the profile afterwards.
    pub async fn clear_data(
        &self,
        user_id: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<ClearReport> {
        let scope = RecordScope::new(user_id, session_id);

        let mut slots: Vec<(StyleKey, Arc<Mutex<KeyState>>)> = self
            .keys
            .iter()
            .filter(|entry| scope.matches(&entry.key().user_id, &entry.key().session_id))
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        slots.sort_by(|a, b| a.0.cmp(&b.0));

        let mut states = Vec::with_capacity(slots.len());
        for (_, slot) in &slots {
            states.push(Arc::clone(slot).lock_owned().await);
        }

        let profiles_removed =
            with_timeout(self.timeout(), self.store.delete_profiles(&scope)).await?;
        let messages_removed =
            with_timeout(self.timeout(), self.store.delete_messages(&scope)).await?;

        let mut keys_dropped = 0;
        for ((key, slot), state) in slots.iter().zip(states.iter_mut()) {
            if state.is_retired() {
                continue;
            }
            state.retire();
            self.keys.remove_if(key, |_, current| Arc::ptr_eq(current, slot));
            keys_dropped += 1;
        }
        self.published
            .retain(|key, _| !scope.matches(&key.user_id, &key.session_id));

        match (user_id, session_id) {
            (None, None) => self.ingestor.reset_all(),
            (None, Some(session)) => self.ingestor.reset_session(session),
            _ => {}
        }
        drop(states);

        info!(
            "Cleared data for user={:?} session={:?}: profiles={}, messages={}, keys={}",
            user_id, session_id, profiles_removed, messages_removed, keys_dropped
        );
        Ok(ClearReport {
            profiles_removed,
            messages_removed,
            keys_dropped,
        })
    }

    /// Committed profiles (optionally of one user) as a JSON document.
    pub async fn export_profiles(&self, user_id: Option<&str>) -> Result<String> {
        let scope = RecordScope::new(user_id, None);
        let profiles = with_timeout(self.timeout(), self.store.list_profiles(&scope)).await?;
        let export = ProfileExport {
            exported_at: Utc::now(),
            profiles,
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }

    /// Writes the profiles of an export document back, replacing existing ones.
    /// Returns the number of profiles restored.
    pub async fn restore_profiles(&self, json: &str) -> Result<usize> {
        let export: ProfileExport = serde_json::from_str(json)?;
        for profile in &export.profiles {
            validate_profile(profile)?;
        }

        let max_phrases = self.config.learning.max_catchphrases;
        for mut profile in export.profiles.iter().cloned() {
            profile.catchphrases.truncate(max_phrases);
            with_timeout(self.timeout(), self.store.put_profile(&profile)).await?;

            let key = profile.key();
            let profile = Arc::new(profile);
            if let Some(mut state) = self.lock_existing(&key).await {
                state.replace_profile(Arc::clone(&profile));
                self.publish(&state);
            } else {
                self.published.insert(
                    key,
                    PublishedStyle {
                        estimate: IncrementalEstimate::from_profile(&profile),
                        profile: Some(profile),
                    },
                );
            }
        }

        info!("Restored {} profiles", export.profiles.len());
        Ok(export.profiles.len())
    }

    /// Stores the recent conversation of a session, keeping the last `max_history_length` lines.
    pub async fn update_session_context(
        &self,
        session_id: &str,
        context: &[ContextMessage],
    ) -> Result<()> {
        let keep = self.config.style_application.max_history_length;
        let recent = &context[context.len().saturating_sub(keep)..];
        with_timeout(
            self.timeout(),
            self.store.put_session_context(session_id, recent),
        )
        .await?;
        Ok(())
    }

    /// Stored conversation of a session; empty when none or on store failure.
    pub async fn get_session_context(&self, session_id: &str) -> Vec<ContextMessage> {
        match with_timeout(self.timeout(), self.store.get_session_context(session_id)).await {
            Ok(context) => context,
            Err(e) => {
                warn!("Failed to load session context for {}: {}", session_id, e);
                Vec::new()
            }
        }
    }

    /// Snapshot of in-memory key states. Keys busy committing are reported without a count.
    pub fn status(&self) -> EngineStatus {
        let mut keys: Vec<KeyStatus> = self
            .keys
            .iter()
            .map(|entry| match entry.value().try_lock() {
                Ok(state) => KeyStatus {
                    key: entry.key().clone(),
                    phase: state.phase(),
                    buffered: Some(state.batch().len()),
                },
                Err(_) => KeyStatus {
                    key: entry.key().clone(),
                    phase: Phase::Committing,
                    buffered: None,
                },
            })
            .collect();
        keys.sort_by(|a, b| a.key.cmp(&b.key));

        EngineStatus {
            tracked_keys: keys.len(),
            buffered_signals: keys.iter().filter_map(|k| k.buffered).sum(),
            keys,
        }
    }
}

fn validate_profile(profile: &UserStyleProfile) -> Result<()> {
    let invalid = |what: &str| {
        Err(LearningError::InvalidData(format!(
            "profile {}@{}: {}",
            profile.user_id, profile.session_id, what
        )))
    };
    if profile.user_id.trim().is_empty() || profile.session_id.trim().is_empty() {
        return invalid("blank user_id or session_id");
    }
    if !(0.0..=1.0).contains(&profile.formality) {
        return invalid("formality out of [0, 1]");
    }
    if !(-1.0..=1.0).contains(&profile.sentiment) {
        return invalid("sentiment out of [-1, 1]");
    }
    if !(0.0..=1.0).contains(&profile.reply_ratio) {
        return invalid("reply_ratio out of [0, 1]");
    }
    if !(0.0..=1.0).contains(&profile.confidence) {
        return invalid("confidence out of [0, 1]");
    }
    Ok(())
}
