//! Relay wire frames (NIP-01)
//!
//! Every frame is a JSON array whose first element names it:
//!
//! | Direction | Frame |
//! |-----------|-------|
//! | client → relay | `["REQ", sub_id, filter]`, `["CLOSE", sub_id]`, `["EVENT", event]` |
//! | relay → client | `["EVENT", sub_id, event]`, `["EOSE", sub_id]`, `["OK", event_id, accepted, message]`, `["NOTICE", message]`, `["CLOSED", sub_id, message]` |

use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::{Filter, Message};

/// Frames the bot sends.
#[derive(Debug, Clone)]
pub enum ClientMessage {
    Req {
        subscription_id: String,
        filter: Filter,
    },
    Close {
        subscription_id: String,
    },
    Event(Box<Message>),
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String> {
        let value = match self {
            ClientMessage::Req {
                subscription_id,
                filter,
            } => serde_json::json!(["REQ", subscription_id, filter]),
            ClientMessage::Close { subscription_id } => serde_json::json!(["CLOSE", subscription_id]),
            ClientMessage::Event(event) => serde_json::json!(["EVENT", event]),
        };
        Ok(serde_json::to_string(&value)?)
    }
}

/// Frames a relay sends.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    Event {
        subscription_id: String,
        event: Box<Message>,
    },
    EndOfStoredEvents {
        subscription_id: String,
    },
    Ok {
        event_id: String,
        accepted: bool,
        message: String,
    },
    Notice(String),
    Closed {
        subscription_id: String,
        message: String,
    },
}

impl RelayMessage {
    /// Parse one text frame.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let items = value
            .as_array()
            .ok_or_else(|| protocol_error("frame is not an array"))?;
        let label = items
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| protocol_error("frame has no label"))?;

        match label {
            "EVENT" => {
                let subscription_id = string_at(items, 1)?;
                let raw = items
                    .get(2)
                    .cloned()
                    .ok_or_else(|| protocol_error("EVENT without event"))?;
                let event: Message = serde_json::from_value(raw)?;
                Ok(RelayMessage::Event {
                    subscription_id,
                    event: Box::new(event),
                })
            }
            "EOSE" => Ok(RelayMessage::EndOfStoredEvents {
                subscription_id: string_at(items, 1)?,
            }),
            "OK" => Ok(RelayMessage::Ok {
                event_id: string_at(items, 1)?,
                accepted: items
                    .get(2)
                    .and_then(Value::as_bool)
                    .ok_or_else(|| protocol_error("OK without status"))?,
                message: optional_string_at(items, 3),
            }),
            "NOTICE" => Ok(RelayMessage::Notice(optional_string_at(items, 1))),
            "CLOSED" => Ok(RelayMessage::Closed {
                subscription_id: string_at(items, 1)?,
                message: optional_string_at(items, 2),
            }),
            other => Err(protocol_error(&format!("unknown frame {:?}", other))),
        }
    }
}

fn string_at(items: &[Value], idx: usize) -> Result<String> {
    items
        .get(idx)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| protocol_error(&format!("missing string at position {}", idx)))
}

fn optional_string_at(items: &[Value], idx: usize) -> String {
    items
        .get(idx)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn protocol_error(msg: &str) -> Error {
    Error::Protocol(msg.to_string())
}
