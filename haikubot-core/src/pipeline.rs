//! Per-message pipeline run by the ingestion worker
//!
//! ```text
//! dedup ─► normalize ─► Japanese pre-check ─► classify ─► publish ─► ledger
//! ```
//!
//! Every stage but publishing is infallible from the engine's point of view:
//! a message that cannot be read is a non-match. Only a delivery that no
//! relay accepted comes back as an error, which keeps the watermark in place.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::classify::Classifier;
use crate::db::{Database, ReplyRecord};
use crate::error::Result;
use crate::ingest::MessageProcessor;
use crate::normalize::{contains_japanese, normalize};
use crate::publish::ReplyPublisher;
use crate::types::{Message, Meter, ReplyIntent, Timestamp, REPLY_MARKER};

/// What the pipeline did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Skipped(SkipReason),
    NoMatch,
    Replied {
        meter: Meter,
        reply_id: String,
        /// Relays that accepted the reply
        accepted: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Content already carries the reply marker
    AlreadyTagged,
    OwnMessage,
    /// The ledger has a reply for this event
    AlreadyReplied,
    /// Nothing left after normalization
    Empty,
    NotJapanese,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::AlreadyTagged => "already tagged",
            SkipReason::OwnMessage => "own message",
            SkipReason::AlreadyReplied => "already replied",
            SkipReason::Empty => "empty",
            SkipReason::NotJapanese => "not japanese",
        };
        f.write_str(s)
    }
}

pub struct Pipeline {
    classifier: Arc<Classifier>,
    publisher: Arc<ReplyPublisher>,
    db: Arc<Database>,
    verbose: bool,
}

impl Pipeline {
    pub fn new(classifier: Arc<Classifier>, publisher: Arc<ReplyPublisher>, db: Arc<Database>) -> Self {
        Self {
            classifier,
            publisher,
            db,
            verbose: false,
        }
    }

    /// Log a classifier trace for every analyzed message.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn skip_reason(&self, message: &Message) -> Option<SkipReason> {
        // `#n575` also covers `#n57577`
        if message.content.contains(REPLY_MARKER) {
            return Some(SkipReason::AlreadyTagged);
        }
        if message.author == self.publisher.public_key() {
            return Some(SkipReason::OwnMessage);
        }
        match self.db.has_replied(&message.id) {
            Ok(true) => Some(SkipReason::AlreadyReplied),
            Ok(false) => None,
            Err(e) => {
                // the content marker still guards against loops
                warn!(event_id = %message.id, stage = "dedup", error = %e, "Ledger lookup failed");
                None
            }
        }
    }

    fn classify(&self, text: &str) -> Option<Meter> {
        if self.verbose {
            for meter in Meter::ALL {
                let explanation = self.classifier.explain(text, meter.pattern());
                debug!(meter = %meter, "{}", explanation);
                if explanation.matched() {
                    return Some(meter);
                }
            }
            return None;
        }
        self.classifier.classify(text)
    }
}

#[async_trait]
impl MessageProcessor for Pipeline {
    async fn process(&self, message: &Message) -> Result<ProcessOutcome> {
        if let Some(reason) = self.skip_reason(message) {
            debug!(event_id = %message.id, reason = %reason, "Skipping message");
            return Ok(ProcessOutcome::Skipped(reason));
        }

        let text = normalize(&message.content);
        if text.is_empty() {
            return Ok(ProcessOutcome::Skipped(SkipReason::Empty));
        }
        if !contains_japanese(&text) {
            return Ok(ProcessOutcome::Skipped(SkipReason::NotJapanese));
        }

        let Some(meter) = self.classify(&text) else {
            return Ok(ProcessOutcome::NoMatch);
        };
        info!(event_id = %message.id, meter = %meter, text = %text, "Meter matched");

        let intent = ReplyIntent::new(message.clone(), meter, text);
        let report = self.publisher.publish(&intent).await?;

        let accepted = report.accepted();
        let record = ReplyRecord {
            event_id: message.id.clone(),
            meter,
            reply_id: report.event.id.clone(),
            relays_accepted: accepted,
            replied_at: Utc::now(),
        };
        if let Err(e) = self.db.record_reply(&record) {
            warn!(event_id = %message.id, stage = "ledger", error = %e, "Failed to record reply");
        }

        Ok(ProcessOutcome::Replied {
            meter,
            reply_id: report.event.id,
            accepted,
        })
    }

    async fn checkpoint(&self, watermark: Timestamp) {
        if let Err(e) = self.db.save_watermark(watermark) {
            warn!(watermark = %watermark, error = %e, "Failed to persist watermark");
        }
    }
}
