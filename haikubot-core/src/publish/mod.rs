//! Reply publishing
//!
//! A reply is built, signed once, then offered to every configured relay
//! concurrently. All attempts finish before the outcome is decided: one
//! acceptance is enough, zero is a [`Error::Delivery`].

mod reply;

pub use reply::{build_reply, ReplyMode};

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::keys::Signer;
use crate::types::{Message, ReplyIntent};

/// One publish attempt against one relay.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// `Ok` when the relay accepted the event.
    async fn send(&self, relay: &str, event: &Message) -> Result<()>;
}

/// Result of offering an event to one relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    pub relay: String,
    /// `None` when accepted
    pub error: Option<String>,
}

impl RelayOutcome {
    pub fn accepted(&self) -> bool {
        self.error.is_none()
    }
}

/// What happened to a published reply.
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub event: Message,
    pub outcomes: Vec<RelayOutcome>,
}

impl PublishReport {
    pub fn accepted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.accepted()).count()
    }

    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }
}

/// Signs replies and broadcasts them to the outbound relays.
pub struct ReplyPublisher {
    signer: Arc<dyn Signer>,
    transport: Arc<dyn RelayTransport>,
    relays: Vec<String>,
}

impl ReplyPublisher {
    pub fn new(
        signer: Arc<dyn Signer>,
        transport: Arc<dyn RelayTransport>,
        relays: Vec<String>,
    ) -> Self {
        Self {
            signer,
            transport,
            relays,
        }
    }

    /// Public key replies are signed with.
    pub fn public_key(&self) -> &str {
        self.signer.public_key()
    }

    pub fn relays(&self) -> &[String] {
        &self.relays
    }

    /// Build and sign the reply without sending it.
    pub fn build(&self, intent: &ReplyIntent) -> Result<Message> {
        build_reply(intent, &self.relays).sign(self.signer.as_ref())
    }

    /// Build, sign and broadcast. Succeeds when at least one relay accepted.
    pub async fn publish(&self, intent: &ReplyIntent) -> Result<PublishReport> {
        let event = self.build(intent)?;
        let report = self.broadcast(event).await;

        if report.accepted() == 0 {
            return Err(Error::Delivery {
                attempted: report.attempted(),
            });
        }
        info!(
            event_id = %intent.original.id,
            reply_id = %report.event.id,
            meter = %intent.meter,
            accepted = report.accepted(),
            attempted = report.attempted(),
            "Reply published"
        );
        Ok(report)
    }

    /// Offer a signed event to every relay and wait for all of them.
    pub async fn broadcast(&self, event: Message) -> PublishReport {
        let attempts = self.relays.iter().map(|relay| {
            let transport = self.transport.clone();
            let event = &event;
            async move {
                let result = transport.send(relay, event).await;
                match &result {
                    Ok(()) => debug!(relay = %relay, event_id = %event.id, "Relay accepted event"),
                    Err(e) => warn!(relay = %relay, event_id = %event.id, error = %e, "Relay attempt failed"),
                }
                RelayOutcome {
                    relay: relay.clone(),
                    error: result.err().map(|e| e.to_string()),
                }
            }
        });
        let outcomes = join_all(attempts).await;
        PublishReport { event, outcomes }
    }
}
