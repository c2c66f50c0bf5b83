//! # History Importer
//!
//! Replays a chat transcript through the same ingest → extract → aggregate path as live
//! traffic, then forces a commit so the imported style is durable.
//!
//! ## Line format
//!
//! `[YYYY-MM-DD HH:MM:SS] speaker：content`. Both the full-width `：` and the ASCII `:` are
//! accepted after the speaker. Timestamps are UTC. Blank lines are counted and skipped;
//! any other line that does not match is counted as malformed.

use std::sync::LazyLock;
use std::time::Instant;

use chrono::{DateTime, NaiveDateTime, Utc};
use mimic_core::{IncomingMessage, StyleKey};
use regex::Regex;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::engine::StyleEngine;
use crate::error::Result;
use crate::ingestor::RejectReason;

static LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})\]\s*([^：:]+?)\s*[：:]\s*(.*)$")
        .expect("hardcoded transcript pattern")
});

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Lines between two progress log entries.
const PROGRESS_EVERY: usize = 1000;

/// One parsed transcript line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub timestamp: DateTime<Utc>,
    pub speaker: String,
    pub content: String,
}

/// Parses a transcript line; `None` when the line does not match the format or the
/// timestamp is not a valid date.
pub fn parse_line(line: &str) -> Option<TranscriptLine> {
    let caps = LINE_PATTERN.captures(line.trim())?;
    let timestamp = NaiveDateTime::parse_from_str(&caps[1], TIMESTAMP_FORMAT)
        .ok()?
        .and_utc();
    let speaker = caps[2].trim();
    if speaker.is_empty() {
        return None;
    }
    Some(TranscriptLine {
        timestamp,
        speaker: speaker.to_string(),
        content: caps[3].to_string(),
    })
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Only lines by this speaker are learned from; others count as `other_speakers`.
    pub speaker: Option<String>,
    pub cancel: Option<CancelToken>,
}

impl ImportOptions {
    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

/// Outcome of one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Lines read, blank ones included.
    pub total_lines: usize,
    /// Lines accepted by the ingestor and buffered for learning.
    pub imported: usize,
    /// Well-formed lines rejected by a filter rule other than duplicate.
    pub rejected: usize,
    /// Well-formed lines rejected as duplicates.
    pub duplicates: usize,
    /// Lines by a speaker other than the requested one.
    pub other_speakers: usize,
    /// Well-formed lines not learned from: `rejected + duplicates + other_speakers`.
    pub skipped_filtered: usize,
    pub malformed: usize,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

pub(crate) async fn import_lines<R>(
    engine: &StyleEngine,
    key: &StyleKey,
    reader: R,
    options: &ImportOptions,
) -> Result<ImportReport>
where
    R: AsyncBufRead + Unpin,
{
    let start_time = Instant::now();
    info!("Starting history import for {}", key);

    let mut report = ImportReport::default();
    let mut lines = reader.lines();

    loop {
        if options.is_cancelled() {
            info!("History import for {} cancelled after {} lines", key, report.total_lines);
            report.cancelled = true;
            break;
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };
        report.total_lines += 1;
        if report.total_lines % PROGRESS_EVERY == 0 {
            info!(
                "Progress: {} lines read, {} imported for {}",
                report.total_lines, report.imported, key
            );
        }

        if line.trim().is_empty() {
            continue;
        }
        let Some(parsed) = parse_line(&line) else {
            debug!("Malformed transcript line {}", report.total_lines);
            report.malformed += 1;
            continue;
        };
        if let Some(speaker) = &options.speaker {
            if &parsed.speaker != speaker {
                report.other_speakers += 1;
                report.skipped_filtered += 1;
                continue;
            }
        }

        let incoming = IncomingMessage::new(
            key.user_id.as_str(),
            key.session_id.as_str(),
            parsed.content,
            parsed.timestamp,
        )
        .with_user_name(parsed.speaker);

        match engine.process(&incoming).await {
            Ok(()) => report.imported += 1,
            Err(RejectReason::Duplicate) => {
                report.duplicates += 1;
                report.skipped_filtered += 1;
            }
            Err(_) => {
                report.rejected += 1;
                report.skipped_filtered += 1;
            }
        }
    }

    if !report.cancelled && report.imported > 0 {
        engine.force_commit(key).await?;
    }

    report.elapsed_ms = start_time.elapsed().as_millis() as u64;
    info!(
        "History import for {} completed: total={}, imported={}, rejected={}, duplicates={}, malformed={}, filtered={}",
        key,
        report.total_lines,
        report.imported,
        report.rejected,
        report.duplicates,
        report.malformed,
        report.skipped_filtered
    );
    Ok(report)
}
