//! The `broker` module describes the message broker as the driver sees it:
//! producer and consumer handles obtained from a [`BrokerClient`], plus the
//! message records that cross that boundary.

pub mod client;
pub mod memory;
pub mod message;

pub use client::{BrokerClient, BrokerError, Consumer, Credentials, Producer};
pub use memory::InMemoryBroker;
pub use message::{ConsumedMessage, MessageHandle, OutboundMessage, ReceiptHandle};

#[cfg(test)]
mod tests;
