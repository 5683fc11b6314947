use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message on its way to the broker.
///
/// `tag` is only set when the driver multiplexes logical queues over a
/// shared topic, and `deliver_at` only when a positive delay was requested.
/// The broker, not the driver, holds the message back until `deliver_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub payload: String,
    pub tag: Option<String>,
    pub deliver_at: Option<DateTime<Utc>>,
}

impl OutboundMessage {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            tag: None,
            deliver_at: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn deliver_at(mut self, at: DateTime<Utc>) -> Self {
        self.deliver_at = Some(at);
        self
    }
}

/// What the broker hands back after accepting a publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHandle {
    pub message_id: String,
    pub topic: String,
    pub tag: Option<String>,
}

/// Opaque token naming one delivery of a message. Only the handle from the
/// most recent delivery can acknowledge it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message received from a consumer poll.
///
/// `consumed_times` starts at 1 and grows every time the broker redelivers
/// the message because it was not acknowledged in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedMessage {
    pub id: String,
    pub body: String,
    pub tag: Option<String>,
    pub receipt_handle: ReceiptHandle,
    pub consumed_times: u32,
    pub published_at: DateTime<Utc>,
}
