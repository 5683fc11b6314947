//! Broker client seam
//!
//! The driver never speaks the broker's wire protocol. It only needs a
//! [`BrokerClient`] that can hand out producer and consumer handles for an
//! instance/topic/group, which keeps the transport swappable and lets tests
//! run against [`crate::broker::InMemoryBroker`].

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::broker::message::{ConsumedMessage, MessageHandle, OutboundMessage, ReceiptHandle};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// No message became available within the wait window.
    #[error("Message not exist")]
    MessageNotExist,

    #[error("Broker rejected request: {message}")]
    Rejected { message: String },

    #[error("Broker transport error: {message}")]
    Transport { message: String },

    #[error("Invalid or expired receipt handle: {handle}")]
    InvalidReceipt { handle: String },
}

impl BrokerError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn is_message_not_exist(&self) -> bool {
        matches!(self, Self::MessageNotExist)
    }
}

/// Endpoint and access keys used to open a broker client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub endpoint: String,
    pub access_id: String,
    pub access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("endpoint", &self.endpoint)
            .field("access_id", &self.access_id)
            .field("access_key", &"<redacted>")
            .finish()
    }
}

pub trait Producer: Send + Sync {
    fn topic(&self) -> &str;

    fn publish(&self, message: OutboundMessage) -> Result<MessageHandle, BrokerError>;
}

pub trait Consumer: Send + Sync {
    fn topic(&self) -> &str;

    fn tag(&self) -> Option<&str>;

    /// Long-poll for up to `max_count` messages, waiting at most
    /// `wait_seconds`. Returns `BrokerError::MessageNotExist` when nothing
    /// arrived in time.
    fn consume(
        &self,
        max_count: usize,
        wait_seconds: u32,
    ) -> Result<Vec<ConsumedMessage>, BrokerError>;

    fn ack(&self, receipt_handles: &[ReceiptHandle]) -> Result<(), BrokerError>;
}

pub trait BrokerClient: Send + Sync {
    fn producer(&self, instance_id: &str, topic: &str) -> Arc<dyn Producer>;

    fn consumer(
        &self,
        instance_id: &str,
        topic: &str,
        group_id: &str,
        tag: Option<&str>,
    ) -> Arc<dyn Consumer>;
}

impl<C: BrokerClient + ?Sized> BrokerClient for Arc<C> {
    fn producer(&self, instance_id: &str, topic: &str) -> Arc<dyn Producer> {
        (**self).producer(instance_id, topic)
    }

    fn consumer(
        &self,
        instance_id: &str,
        topic: &str,
        group_id: &str,
        tag: Option<&str>,
    ) -> Arc<dyn Consumer> {
        (**self).consumer(instance_id, topic, group_id, tag)
    }
}
