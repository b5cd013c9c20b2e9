//! Core domain types for haikubot
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Message** | A signed Nostr event received from or published to a relay |
//! | **Tag** | One annotation on a message, e.g. `["e", <id>, <relay>, "root"]` |
//! | **Meter** | A poetic form defined by mora counts per phrase (haiku, tanka) |
//! | **Watermark** | Timestamp up to which inbound messages are fully processed |
//! | **Reply intent** | What the pipeline hands to the publisher after a match |
//!
//! Messages are read-only once received. Nothing in the bot mutates a message
//! it did not build itself.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

// ============================================
// Timestamp / Kind
// ============================================

/// Unix timestamp in seconds, as carried in `created_at`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        Timestamp(Utc::now().timestamp())
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    /// Shift by a number of seconds (negative moves backwards).
    pub fn add_secs(&self, secs: i64) -> Self {
        Timestamp(self.0.saturating_add(secs))
    }

    /// Convert to a chrono datetime for display and storage.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.0, 0).single().unwrap_or_default()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event kind number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kind(pub u16);

impl Kind {
    /// Short text note (NIP-01)
    pub const TEXT_NOTE: Kind = Kind(1);
    /// Public channel message (NIP-28)
    pub const CHANNEL_MESSAGE: Kind = Kind(42);

    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================
// Tag
// ============================================

/// A single tag: an ordered list of strings whose first element names it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(pub Vec<String>);

impl Tag {
    /// Build an `e` tag referencing another event with a role marker.
    pub fn event(id: &str, marker: &str) -> Self {
        Tag(vec![
            "e".to_string(),
            id.to_string(),
            String::new(),
            marker.to_string(),
        ])
    }

    /// Tag name (`e`, `p`, `t`, ...)
    pub fn kind(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or("")
    }

    /// First value after the name.
    pub fn value(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }

    /// Role marker of an `e` tag (`root`, `reply`, `mention`).
    pub fn marker(&self) -> Option<&str> {
        self.0.get(3).map(String::as_str).filter(|m| !m.is_empty())
    }

    pub fn is_event_ref(&self) -> bool {
        self.kind() == "e"
    }
}

// ============================================
// Message
// ============================================

/// A message received from (or published to) a relay.
///
/// Field names follow the wire format so the struct serializes directly into
/// `EVENT` frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// 32-byte lowercase hex event id
    pub id: String,
    /// Author public key (x-only, hex)
    #[serde(rename = "pubkey")]
    pub author: String,
    /// Creation time claimed by the author
    pub created_at: Timestamp,
    /// Event kind
    pub kind: Kind,
    /// Ordered annotations
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Text content
    pub content: String,
    /// Schnorr signature (hex)
    #[serde(default)]
    pub sig: String,
}

impl Message {
    /// Tags that reference other events.
    pub fn event_refs(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter().filter(|t| t.is_event_ref())
    }

    /// Recompute the id from the other fields and compare.
    pub fn has_valid_id(&self) -> bool {
        compute_event_id(
            &self.author,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        ) == self.id
    }
}

/// SHA-256 over the canonical `[0, pubkey, created_at, kind, tags, content]`
/// serialization, hex encoded.
pub fn compute_event_id(
    author: &str,
    created_at: Timestamp,
    kind: Kind,
    tags: &[Tag],
    content: &str,
) -> String {
    let canonical = serde_json::json!([0, author, created_at, kind, tags, content]);
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

// ============================================
// Subscription filter
// ============================================

/// Subscription filter sent in a `REQ` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub kinds: Vec<Kind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<Timestamp>,
}

impl Filter {
    pub fn new(kinds: Vec<Kind>) -> Self {
        Self { kinds, since: None }
    }

    pub fn since(mut self, since: Timestamp) -> Self {
        self.since = Some(since);
        self
    }
}

// ============================================
// Meter
// ============================================

/// Poetic meter recognised by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Meter {
    /// 5-7-5
    Haiku,
    /// 5-7-5-7-7
    Tanka,
}

/// Marker present in every reply the bot writes; `#n57577` starts with it too.
pub const REPLY_MARKER: &str = "#n575";

impl Meter {
    /// All meters, in the order they are tried.
    pub const ALL: [Meter; 2] = [Meter::Haiku, Meter::Tanka];

    /// Required mora count per phrase.
    pub fn pattern(&self) -> &'static [usize] {
        match self {
            Meter::Haiku => &[5, 7, 5],
            Meter::Tanka => &[5, 7, 5, 7, 7],
        }
    }

    /// Hashtags appended to a reply.
    pub fn reply_tag(&self) -> &'static str {
        match self {
            Meter::Haiku => "#n575 #haiku",
            Meter::Tanka => "#n57577 #tanka",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Meter::Haiku => "haiku",
            Meter::Tanka => "tanka",
        }
    }
}

impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Meter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "haiku" => Ok(Meter::Haiku),
            "tanka" => Ok(Meter::Tanka),
            _ => Err(format!("unknown meter: {}", s)),
        }
    }
}

// ============================================
// Reply intent
// ============================================

/// Produced by the pipeline on a match and consumed by the publisher.
#[derive(Debug, Clone)]
pub struct ReplyIntent {
    /// The message that matched
    pub original: Message,
    /// Which meter it matched
    pub meter: Meter,
    /// Normalized text quoted back in the reply
    pub text: String,
    /// Hashtags appended to the reply
    pub tag: String,
}

impl ReplyIntent {
    pub fn new(original: Message, meter: Meter, text: String) -> Self {
        Self {
            original,
            meter,
            text,
            tag: meter.reply_tag().to_string(),
        }
    }
}
