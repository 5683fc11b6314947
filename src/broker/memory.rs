//! In-process broker client
//!
//! `InMemoryBroker` keeps everything behind one mutex and mimics the parts of
//! the broker the driver relies on:
//! - per-topic message logs with optional tags and delayed delivery
//! - per-group delivery state, so two groups each see every message
//! - a visibility timeout after which unacknowledged messages are redelivered
//!   with `consumed_times` incremented and a fresh receipt handle
//! - bounded long-polling through a condition variable
//!
//! Instance ids are accepted but not used for routing; every handle shares
//! one namespace of topics.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::broker::client::{BrokerClient, BrokerError, Consumer, Producer};
use crate::broker::message::{ConsumedMessage, MessageHandle, OutboundMessage, ReceiptHandle};

type GroupKey = (String, String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: String,
    pub topic: String,
    pub body: String,
    pub tag: Option<String>,
    pub published_at: DateTime<Utc>,
    pub deliver_at: Option<DateTime<Utc>>,
}

impl StoredMessage {
    fn matches(&self, tag: Option<&str>) -> bool {
        match tag {
            Some(tag) => self.tag.as_deref() == Some(tag),
            None => true,
        }
    }

    fn ready_at(&self) -> DateTime<Utc> {
        self.deliver_at.unwrap_or(self.published_at)
    }
}

#[derive(Debug, Clone)]
struct Delivery {
    consumed_times: u32,
    invisible_until: DateTime<Utc>,
    receipt: ReceiptHandle,
    acked: bool,
}

#[derive(Debug, Default)]
struct BrokerState {
    topics: HashMap<String, Vec<StoredMessage>>,
    deliveries: HashMap<GroupKey, HashMap<String, Delivery>>,
    receipts: HashMap<ReceiptHandle, (GroupKey, String)>,
    publish_fault: Option<BrokerError>,
    consume_fault: Option<BrokerError>,
}

impl BrokerState {
    /// Hand out up to `max_count` messages that are due, matching and not
    /// currently leased to another delivery.
    fn take_visible(
        &mut self,
        key: &GroupKey,
        tag: Option<&str>,
        max_count: usize,
        now: DateTime<Utc>,
        visibility_timeout: chrono::Duration,
    ) -> Vec<ConsumedMessage> {
        let Some(messages) = self.topics.get(&key.0) else {
            return Vec::new();
        };
        let deliveries = self.deliveries.entry(key.clone()).or_default();
        let mut batch = Vec::new();

        for message in messages {
            if batch.len() >= max_count {
                break;
            }
            if !message.matches(tag) || message.ready_at() > now {
                continue;
            }

            let receipt = ReceiptHandle::new(Uuid::new_v4().to_string());
            let delivery = deliveries
                .entry(message.id.clone())
                .or_insert_with(|| Delivery {
                    consumed_times: 0,
                    invisible_until: now,
                    receipt: receipt.clone(),
                    acked: false,
                });
            if delivery.acked || delivery.invisible_until > now {
                continue;
            }
            if delivery.consumed_times > 0 {
                self.receipts.remove(&delivery.receipt);
            }
            delivery.consumed_times += 1;
            delivery.invisible_until = now + visibility_timeout;
            delivery.receipt = receipt.clone();
            self.receipts
                .insert(receipt.clone(), (key.clone(), message.id.clone()));

            batch.push(ConsumedMessage {
                id: message.id.clone(),
                body: message.body.clone(),
                tag: message.tag.clone(),
                receipt_handle: receipt,
                consumed_times: delivery.consumed_times,
                published_at: message.published_at,
            });
        }

        batch
    }

    /// Earliest future instant at which a matching message could become
    /// visible to this group.
    fn next_wake(&self, key: &GroupKey, tag: Option<&str>, now: DateTime<Utc>) -> Option<Duration> {
        let messages = self.topics.get(&key.0)?;
        let deliveries = self.deliveries.get(key);

        messages
            .iter()
            .filter(|m| m.matches(tag))
            .filter_map(|m| {
                match deliveries.and_then(|d| d.get(&m.id)) {
                    Some(delivery) if delivery.acked => None,
                    Some(delivery) => Some(delivery.invisible_until.max(m.ready_at())),
                    None => Some(m.ready_at()),
                }
            })
            .filter(|at| *at > now)
            .min()
            .and_then(|at| (at - now).to_std().ok())
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<BrokerState>,
    arrived: Condvar,
    visibility_timeout: Duration,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, BrokerState>, BrokerError> {
        self.state
            .lock()
            .map_err(|_| BrokerError::transport("broker state lock poisoned"))
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

impl InMemoryBroker {
    /// Redelivery delay for unacknowledged messages when none is given.
    pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new() -> Self {
        Self::with_visibility_timeout(Self::DEFAULT_VISIBILITY_TIMEOUT)
    }

    pub fn with_visibility_timeout(visibility_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(BrokerState::default()),
                arrived: Condvar::new(),
                visibility_timeout,
            }),
        }
    }

    /// Every message ever published to `topic`, in publish order.
    pub fn published(&self, topic: &str) -> Vec<StoredMessage> {
        self.shared
            .lock()
            .map(|state| state.topics.get(topic).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Messages on `topic` that `group_id` has not acknowledged yet.
    pub fn pending(&self, topic: &str, group_id: &str) -> usize {
        let Ok(state) = self.shared.lock() else {
            return 0;
        };
        let key = (topic.to_string(), group_id.to_string());
        let deliveries = state.deliveries.get(&key);
        state
            .topics
            .get(topic)
            .map(|messages| {
                messages
                    .iter()
                    .filter(|m| {
                        !deliveries
                            .and_then(|d| d.get(&m.id))
                            .is_some_and(|d| d.acked)
                    })
                    .count()
            })
            .unwrap_or(0)
    }

    /// Make the next publish on any topic fail with `err`.
    pub fn fail_next_publish(&self, err: BrokerError) {
        if let Ok(mut state) = self.shared.lock() {
            state.publish_fault = Some(err);
        }
    }

    /// Make the next consume on any topic fail with `err`.
    pub fn fail_next_consume(&self, err: BrokerError) {
        if let Ok(mut state) = self.shared.lock() {
            state.consume_fault = Some(err);
        }
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerClient for InMemoryBroker {
    fn producer(&self, _instance_id: &str, topic: &str) -> Arc<dyn Producer> {
        Arc::new(MemoryProducer {
            shared: Arc::clone(&self.shared),
            topic: topic.to_string(),
        })
    }

    fn consumer(
        &self,
        _instance_id: &str,
        topic: &str,
        group_id: &str,
        tag: Option<&str>,
    ) -> Arc<dyn Consumer> {
        Arc::new(MemoryConsumer {
            shared: Arc::clone(&self.shared),
            key: (topic.to_string(), group_id.to_string()),
            tag: tag.map(str::to_string),
        })
    }
}

#[derive(Debug)]
struct MemoryProducer {
    shared: Arc<Shared>,
    topic: String,
}

impl Producer for MemoryProducer {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn publish(&self, message: OutboundMessage) -> Result<MessageHandle, BrokerError> {
        let mut state = self.shared.lock()?;
        if let Some(err) = state.publish_fault.take() {
            return Err(err);
        }

        let stored = StoredMessage {
            id: Uuid::new_v4().simple().to_string().to_uppercase(),
            topic: self.topic.clone(),
            body: message.payload,
            tag: message.tag,
            published_at: Utc::now(),
            deliver_at: message.deliver_at,
        };
        let handle = MessageHandle {
            message_id: stored.id.clone(),
            topic: self.topic.clone(),
            tag: stored.tag.clone(),
        };
        debug!(topic = %self.topic, message_id = %handle.message_id, "stored message");

        state
            .topics
            .entry(self.topic.clone())
            .or_default()
            .push(stored);
        drop(state);
        self.shared.arrived.notify_all();

        Ok(handle)
    }
}

#[derive(Debug)]
struct MemoryConsumer {
    shared: Arc<Shared>,
    key: GroupKey,
    tag: Option<String>,
}

impl Consumer for MemoryConsumer {
    fn topic(&self) -> &str {
        &self.key.0
    }

    fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    fn consume(
        &self,
        max_count: usize,
        wait_seconds: u32,
    ) -> Result<Vec<ConsumedMessage>, BrokerError> {
        let deadline = Instant::now() + Duration::from_secs(u64::from(wait_seconds));
        let visibility_timeout = chrono::Duration::from_std(self.shared.visibility_timeout)
            .map_err(|e| BrokerError::transport(e.to_string()))?;
        let mut state = self.shared.lock()?;
        if let Some(err) = state.consume_fault.take() {
            return Err(err);
        }

        loop {
            let now = Utc::now();
            let batch = state.take_visible(
                &self.key,
                self.tag.as_deref(),
                max_count,
                now,
                visibility_timeout,
            );
            if !batch.is_empty() {
                return Ok(batch);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BrokerError::MessageNotExist);
            }
            let wait = state
                .next_wake(&self.key, self.tag.as_deref(), now)
                .map_or(remaining, |wake| wake.min(remaining));

            state = self
                .shared
                .arrived
                .wait_timeout(state, wait)
                .map_err(|_| BrokerError::transport("broker state lock poisoned"))?
                .0;
        }
    }

    fn ack(&self, receipt_handles: &[ReceiptHandle]) -> Result<(), BrokerError> {
        let mut state = self.shared.lock()?;

        // All handles must be live for this group before any is retired.
        let mut retired = Vec::with_capacity(receipt_handles.len());
        for handle in receipt_handles {
            match state.receipts.get(handle) {
                Some((key, message_id)) if *key == self.key => {
                    retired.push((handle, message_id.clone()));
                }
                _ => {
                    return Err(BrokerError::InvalidReceipt {
                        handle: handle.to_string(),
                    });
                }
            }
        }

        for (handle, message_id) in retired {
            state.receipts.remove(handle);
            if let Some(delivery) = state
                .deliveries
                .get_mut(&self.key)
                .and_then(|d| d.get_mut(&message_id))
            {
                delivery.acked = true;
            }
            debug!(topic = %self.key.0, group = %self.key.1, message_id = %message_id, "acknowledged");
        }

        Ok(())
    }
}
