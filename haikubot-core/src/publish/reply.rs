//! Reply composition
//!
//! Text notes are answered with a quote: the poem, its hashtags and a
//! `nostr:nevent1…` reference, tagged as a `mention`. Anything else (channel
//! messages, threaded kinds) gets a threaded reply that keeps the original's
//! root reference, so the reply lands in the same thread or channel.

use crate::keys::Draft;
use crate::nip19;
use crate::types::{Kind, Message, ReplyIntent, Tag};

/// How the reply refers to the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    Quote,
    Thread,
}

impl ReplyMode {
    pub fn for_kind(kind: Kind) -> Self {
        if kind == Kind::TEXT_NOTE {
            ReplyMode::Quote
        } else {
            ReplyMode::Thread
        }
    }
}

/// Build the unsigned reply for a matched message.
///
/// `hint_relays` go into the `nevent` reference of a quote.
pub fn build_reply(intent: &ReplyIntent, hint_relays: &[String]) -> Draft {
    let original = &intent.original;
    let body = format!("{} {}", intent.text, intent.tag);

    let (content, tags) = match ReplyMode::for_kind(original.kind) {
        ReplyMode::Quote => {
            let content = match nip19::encode_nevent(&original.id, hint_relays, Some(&original.author)) {
                Ok(nevent) => format!("{}\nnostr:{}", body, nevent),
                Err(e) => {
                    tracing::debug!(event_id = %original.id, error = %e, "nevent encoding failed, using inline mention");
                    format!("#[0]\n{}", body)
                }
            };
            // `#[0]` points at this tag, so it must stay first
            (content, vec![Tag::event(&original.id, "mention")])
        }
        ReplyMode::Thread => (body, thread_tags(original)),
    };

    Draft {
        // relays reject an author's events that do not move forward in time
        created_at: original.created_at.add_secs(1),
        kind: original.kind,
        tags,
        content,
    }
}

/// Root references of the original, a `reply` reference to it, then the
/// thread's `p` tags.
///
/// Root and `p` tags are deduplicated by value. Other `e` tags are replaced
/// by the `reply` reference. Without a root the original becomes the root.
fn thread_tags(original: &Message) -> Vec<Tag> {
    let mut tags: Vec<Tag> = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    for tag in original.event_refs().filter(|t| t.marker() == Some("root")) {
        let Some(id) = tag.value() else { continue };
        if !seen.contains(&id) {
            seen.push(id);
            tags.push(tag.clone());
        }
    }
    if tags.is_empty() {
        tags.push(Tag::event(&original.id, "root"));
    }
    tags.push(Tag::event(&original.id, "reply"));

    let mut people: Vec<&str> = Vec::new();
    for tag in original.tags.iter().filter(|t| t.kind() == "p") {
        let Some(pubkey) = tag.value() else { continue };
        if !people.contains(&pubkey) {
            people.push(pubkey);
            tags.push(tag.clone());
        }
    }
    tags
}
