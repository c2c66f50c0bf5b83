//! # mimic-core
//!
//! Core types for the style learning engine: the message and profile data model,
//! typed configuration, the crate-wide error type, and tracing initialization.
//! Storage-agnostic; used by `storage`, `prompt`, `learning` and `mimic-cli`.
//!
//! ## Modules
//!
//! - [`types`] – Message, StyleSignal, UserStyleProfile and friends
//! - [`config`] – StyleConfig and its sections, loaded from JSON + env
//! - [`error`] – MimicError
//! - [`logger`] – `init_tracing`

pub mod config;
pub mod error;
pub mod logger;
pub mod types;

#[cfg(test)]
mod config_test;

pub use config::{
    DatabaseConfig, LearningConfig, LexiconConfig, LoggingConfig, MessageFilterConfig,
    StyleApplicationConfig, StyleConfig,
};
pub use error::{MimicError, Result};
pub use logger::init_tracing;
pub use types::{
    ContextMessage, IncomingMessage, IncrementalEstimate, Message, RankedPhrase, StyleKey,
    StyleSignal, UserStyleProfile,
};
