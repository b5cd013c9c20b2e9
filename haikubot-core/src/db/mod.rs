//! Database layer for haikubot
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - The reply ledger used for duplicate detection
//! - The persisted ingestion watermark

pub mod repo;
pub mod schema;

pub use repo::{Database, ReplyRecord};
