//! Nostr relay client: wire frames and WebSocket sessions.

mod connection;
pub mod protocol;

pub use connection::{RelayConnector, RelaySession, WsRelayTransport};
pub use protocol::{ClientMessage, RelayMessage};

/// Check that a relay URL uses a WebSocket scheme.
pub fn is_relay_url(url: &str) -> bool {
    let url = url.trim();
    url.strip_prefix("wss://")
        .or_else(|| url.strip_prefix("ws://"))
        .is_some_and(|host| !host.is_empty())
}
