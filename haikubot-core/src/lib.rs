//! # haikubot-core
//!
//! Core library for haikubot - a Nostr bot that answers posts written in
//! haiku (5-7-5) or tanka (5-7-5-7-7) meter.
//!
//! This library provides:
//! - Nostr event types, signing and the relay wire protocol
//! - Text normalization and mora-meter classification
//! - The streaming ingestion engine and the reply publisher
//! - A SQLite reply ledger, configuration and logging
//!
//! ## Architecture
//!
//! ```text
//! relay ─► IngestEngine ─► queue ─► Pipeline ─► Classifier
//!                                      │
//!                                      └─► ReplyPublisher ─► relays
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use haikubot_core::classify::Classifier;
//! use haikubot_core::{normalize, Config, Meter};
//!
//! let config = Config::load().expect("failed to load config");
//! let classifier = Classifier::from_config(&config.classifier).expect("failed to load dictionary");
//!
//! let text = normalize("古池や蛙飛び込む水の音 https://example.com");
//! assert_eq!(classifier.classify(&text), Some(Meter::Haiku));
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use ingest::{EngineReport, EngineSettings, IngestEngine, MessageProcessor};
pub use normalize::normalize;
pub use pipeline::{Pipeline, ProcessOutcome, SkipReason};
pub use publish::ReplyPublisher;
pub use types::*;

// Public modules
pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod heartbeat;
pub mod ingest;
pub mod keys;
pub mod logging;
pub mod nip19;
pub mod normalize;
pub mod pipeline;
pub mod publish;
pub mod relay;
pub mod types;
