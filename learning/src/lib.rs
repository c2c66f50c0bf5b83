//! # Learning
//!
//! Per-user conversational style learning.
//!
//! ## Flow
//!
//! message → [`MessageIngestor`] (accept / reject) → [`FeatureExtractor`] (signal) →
//! [`StyleAggregator`] batch → merge into the committed profile → `StyleStore`.
//! Prompts are rendered on demand from the committed profile by the `prompt` crate.
//!
//! ## Modules
//!
//! - [`engine`] – StyleEngine facade used by the host
//! - [`ingestor`] – admission rules and per-session duplicate windows
//! - [`extractor`] – tokenizer and per-message feature extraction
//! - [`aggregator`] – per-key batching, merge and commit
//! - [`importer`] – transcript parsing and replay
//! - [`cancel`] – cooperative cancellation for imports

pub mod aggregator;
pub mod cancel;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod importer;
pub mod ingestor;

pub use aggregator::{CommitOutcome, KeyState, LearningBatch, MergeOutcome, Phase, StyleAggregator};
pub use cancel::CancelToken;
pub use engine::{
    ClearReport, EngineStatistics, EngineStatus, FlushReport, KeyStatus, ProfileExport,
    PublishedStyle, StyleEngine,
};
pub use error::{LearningError, Result};
pub use extractor::{tokenize, FeatureExtractor, Lexicon};
pub use importer::{parse_line, ImportOptions, ImportReport, TranscriptLine};
pub use ingestor::{content_hash, Admission, MessageIngestor, RecentWindow, RejectReason};
