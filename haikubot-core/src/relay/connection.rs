//! WebSocket relay client
//!
//! [`RelayConnector`] feeds the ingestion engine; [`WsRelayTransport`] makes
//! one-shot publish attempts. Both speak the frames in [`super::protocol`].

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use super::protocol::{ClientMessage, RelayMessage};
use crate::error::{Error, Result};
use crate::ingest::{FeedConnector, FeedSession, FeedSignal};
use crate::keys::verify_event;
use crate::publish::RelayTransport;
use crate::types::{Filter, Message};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on CLOSE plus the WebSocket close handshake.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(3);

async fn open(url: &str, timeout: Duration) -> Result<WsStream> {
    match tokio::time::timeout(timeout, connect_async(url)).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(Error::transport(url, e)),
        Err(_) => Err(Error::transport(
            url,
            format!("connect timed out after {}s", timeout.as_secs()),
        )),
    }
}

async fn send_frame(stream: &mut WsStream, url: &str, frame: &ClientMessage) -> Result<()> {
    let text = frame.to_json()?;
    stream
        .send(WsMessage::Text(text))
        .await
        .map_err(|e| Error::transport(url, e))
}

// ============================================
// Subscription side
// ============================================

/// Connects to the inbound relay.
#[derive(Debug, Clone)]
pub struct RelayConnector {
    url: String,
    connect_timeout: Duration,
}

impl RelayConnector {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl FeedConnector for RelayConnector {
    type Session = RelaySession;

    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn connect(&self) -> Result<RelaySession> {
        let stream = open(&self.url, self.connect_timeout).await?;
        Ok(RelaySession {
            url: self.url.clone(),
            stream,
            subscription_id: None,
        })
    }
}

/// A live WebSocket session with at most one subscription.
pub struct RelaySession {
    url: String,
    stream: WsStream,
    subscription_id: Option<String>,
}

impl RelaySession {
    /// Translate a relay frame, or `None` for frames the engine ignores.
    fn translate(&self, frame: RelayMessage) -> Option<FeedSignal> {
        let ours = |id: &str| self.subscription_id.as_deref() == Some(id);
        match frame {
            RelayMessage::Event {
                subscription_id,
                event,
            } if ours(&subscription_id) => match verify_event(&event) {
                Ok(()) => Some(FeedSignal::Message(event)),
                Err(e) => {
                    warn!(relay = %self.url, event_id = %event.id, error = %e, "Dropping unverifiable event");
                    None
                }
            },
            RelayMessage::EndOfStoredEvents { subscription_id } if ours(&subscription_id) => {
                Some(FeedSignal::EndOfStoredEvents)
            }
            RelayMessage::Closed {
                subscription_id,
                message,
            } if ours(&subscription_id) => Some(FeedSignal::Closed(message)),
            RelayMessage::Notice(message) => Some(FeedSignal::Notice(message)),
            other => {
                debug!(relay = %self.url, frame = ?other, "Ignoring frame");
                None
            }
        }
    }
}

#[async_trait]
impl FeedSession for RelaySession {
    async fn subscribe(&mut self, filter: &Filter) -> Result<()> {
        let subscription_id = uuid::Uuid::new_v4().simple().to_string();
        let frame = ClientMessage::Req {
            subscription_id: subscription_id.clone(),
            filter: filter.clone(),
        };
        send_frame(&mut self.stream, &self.url, &frame).await?;
        self.subscription_id = Some(subscription_id);
        Ok(())
    }

    async fn next_signal(&mut self) -> Option<FeedSignal> {
        loop {
            match self.stream.next().await? {
                Ok(WsMessage::Text(text)) => match RelayMessage::from_json(&text) {
                    Ok(frame) => {
                        if let Some(signal) = self.translate(frame) {
                            return Some(signal);
                        }
                    }
                    Err(e) => warn!(relay = %self.url, error = %e, "Unparseable frame"),
                },
                Ok(WsMessage::Close(frame)) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .unwrap_or_else(|| "connection closed".to_string());
                    return Some(FeedSignal::Closed(reason));
                }
                // ping/pong are answered by tungstenite; binary frames are not part of the protocol
                Ok(_) => {}
                Err(e) => return Some(FeedSignal::TransportError(e.to_string())),
            }
        }
    }

    async fn close(&mut self) {
        let url = self.url.clone();
        let teardown = async {
            if let Some(subscription_id) = self.subscription_id.take() {
                let frame = ClientMessage::Close { subscription_id };
                if let Err(e) = send_frame(&mut self.stream, &self.url, &frame).await {
                    debug!(relay = %self.url, error = %e, "CLOSE not delivered");
                }
            }
            if let Err(e) = self.stream.close(None).await {
                debug!(relay = %self.url, error = %e, "WebSocket close failed");
            }
        };
        // the socket is dropped with the session either way
        if tokio::time::timeout(TEARDOWN_TIMEOUT, teardown).await.is_err() {
            warn!(relay = %url, "Teardown timed out");
        }
    }
}

// ============================================
// Publish side
// ============================================

/// One connection per publish attempt: connect, `EVENT`, wait for `OK`.
#[derive(Debug, Clone)]
pub struct WsRelayTransport {
    timeout: Duration,
}

impl WsRelayTransport {
    /// `timeout` bounds the whole attempt, connect included.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn attempt(&self, relay: &str, event: &Message) -> Result<()> {
        let mut stream = open(relay, self.timeout).await?;
        let frame = ClientMessage::Event(Box::new(event.clone()));
        send_frame(&mut stream, relay, &frame).await?;

        let outcome = loop {
            match stream.next().await {
                Some(Ok(WsMessage::Text(text))) => match RelayMessage::from_json(&text) {
                    Ok(RelayMessage::Ok {
                        event_id,
                        accepted,
                        message,
                    }) if event_id == event.id => {
                        break if accepted {
                            Ok(())
                        } else {
                            Err(Error::Rejected {
                                relay: relay.to_string(),
                                reason: message,
                            })
                        };
                    }
                    Ok(RelayMessage::Notice(message)) => {
                        debug!(relay, notice = %message, "Relay notice while publishing");
                    }
                    Ok(_) => {}
                    Err(e) => debug!(relay, error = %e, "Unparseable frame while publishing"),
                },
                Some(Ok(WsMessage::Close(_))) | None => {
                    break Err(Error::transport(relay, "closed before OK"));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break Err(Error::transport(relay, e)),
            }
        };

        let _ = stream.close(None).await;
        outcome
    }
}

#[async_trait]
impl RelayTransport for WsRelayTransport {
    async fn send(&self, relay: &str, event: &Message) -> Result<()> {
        match tokio::time::timeout(self.timeout, self.attempt(relay, event)).await {
            Ok(result) => result,
            Err(_) => Err(Error::transport(
                relay,
                format!("no OK within {}s", self.timeout.as_secs()),
            )),
        }
    }
}
