//! Feed abstraction consumed by the ingestion engine.
//!
//! A [`FeedConnector`] opens sessions; a [`FeedSession`] carries one
//! subscription. The engine never sees sockets or frames, only
//! [`FeedSignal`]s, which keeps its state machine testable with scripted
//! in-memory feeds.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Filter, Message};

/// What a live subscription can report.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedSignal {
    /// A message matching the filter
    Message(Box<Message>),
    /// Historical backfill is complete; live messages follow
    EndOfStoredEvents,
    /// Human-readable notice from the feed
    Notice(String),
    /// The feed ended the subscription
    Closed(String),
    /// The transport failed; the session is unusable
    TransportError(String),
}

/// Opens sessions against one feed endpoint.
#[async_trait]
pub trait FeedConnector: Send + Sync {
    type Session: FeedSession;

    /// Endpoint for logs.
    fn endpoint(&self) -> &str;

    async fn connect(&self) -> Result<Self::Session>;
}

/// One connected session.
#[async_trait]
pub trait FeedSession: Send {
    /// Start the subscription.
    async fn subscribe(&mut self, filter: &Filter) -> Result<()>;

    /// Wait for the next signal. `None` means the transport ended.
    ///
    /// Must be cancel safe: the engine races it against timers and drops the
    /// future when they fire.
    async fn next_signal(&mut self) -> Option<FeedSignal>;

    /// Unsubscribe and release the transport. Errors are swallowed.
    async fn close(&mut self);
}
