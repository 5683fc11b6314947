//! Queue driver
//!
//! `RocketQueue` presents the broker as an ordinary job queue. Every publish
//! goes through the same encode → resolve → transmit path, so plain and
//! structured jobs get identical tag and delay handling. Calls are
//! synchronous; `pop` blocks for at most `wait_seconds`.
//!
//! Producer and consumer handles are fetched per call and nothing is cached
//! between calls, so any number of workers may poll the same queue. Which
//! worker receives which message is decided by the broker alone.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::broker::{BrokerClient, BrokerError, Consumer, MessageHandle, OutboundMessage, Producer};
use crate::config::QueueSettings;
use crate::jobs::{JobFramework, JobOrigin, RocketJob};
use crate::queue::delay::Delay;
use crate::queue::payload::PayloadEncoder;
use crate::queue::topic::TopicResolver;
use crate::utils::{QueueError, QueueResult};

/// Options for [`RocketQueue::push_raw`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOptions {
    /// Seconds before the broker may deliver the message.
    pub delay: Option<u64>,
}

impl PushOptions {
    pub fn delayed(seconds: u64) -> Self {
        Self {
            delay: Some(seconds),
        }
    }
}

pub struct RocketQueue<C, F> {
    client: C,
    settings: QueueSettings,
    resolver: TopicResolver,
    encoder: PayloadEncoder<F>,
    framework: Arc<F>,
    connection_name: Option<String>,
}

impl<C: BrokerClient, F: JobFramework> RocketQueue<C, F> {
    pub fn new(client: C, settings: QueueSettings, framework: Arc<F>) -> Self {
        let encoder = PayloadEncoder::new(
            Arc::clone(&framework),
            settings.plain.enable,
            settings.payload_shape,
        );
        Self {
            client,
            resolver: TopicResolver::from_settings(&settings),
            settings,
            encoder,
            framework,
            connection_name: None,
        }
    }

    pub fn with_connection_name(mut self, name: impl Into<String>) -> Self {
        self.connection_name = Some(name.into());
        self
    }

    pub fn connection_name(&self) -> Option<&str> {
        self.connection_name.as_deref()
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    pub fn resolver(&self) -> &TopicResolver {
        &self.resolver
    }

    pub fn is_plain(&self) -> bool {
        self.settings.plain.enable
    }

    pub fn plain_job(&self) -> Option<&str> {
        self.settings.plain_job()
    }

    /// Queue depth is not observable on the broker; `1` means "unknown,
    /// possibly non-empty" and must not be read as an exact count.
    pub fn size(&self, _queue: Option<&str>) -> usize {
        1
    }

    pub fn push(&self, job: &F::Job, data: &Value, queue: Option<&str>) -> QueueResult<MessageHandle> {
        let payload = self.encoder.encode(job, queue, data)?;
        self.push_raw(&payload, queue, PushOptions::default())
    }

    pub fn push_raw(
        &self,
        payload: &str,
        queue: Option<&str>,
        options: PushOptions,
    ) -> QueueResult<MessageHandle> {
        let route = self.resolver.resolve(queue);
        let mut message = OutboundMessage::new(payload);
        message.tag = route.tag.clone();

        if let Some(delay) = options.delay.filter(|d| *d > 0) {
            let deliver_at = i64::try_from(delay)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .and_then(|offset| Utc::now().checked_add_signed(offset))
                .ok_or_else(|| {
                    QueueError::publish(&route.topic, format!("delay of {delay}s is out of range"))
                })?;
            message.deliver_at = Some(deliver_at);
        }

        debug!(
            topic = %route.topic,
            tag = ?route.tag,
            deliver_at = ?message.deliver_at,
            "publishing message"
        );

        self.producer(Some(&route.topic))
            .publish(message)
            .map_err(|e| QueueError::from_publish(&route.topic, e))
    }

    /// Push a job that the broker should deliver after `delay`.
    ///
    /// The delay is normalized to seconds from now first; zero or a past
    /// instant makes this behave exactly like [`RocketQueue::push`].
    pub fn later(
        &self,
        delay: impl Into<Delay>,
        job: &F::Job,
        data: &Value,
        queue: Option<&str>,
    ) -> QueueResult<MessageHandle> {
        let seconds = delay.into().seconds_from(Utc::now());
        let payload = self.encoder.encode(job, queue, data)?;
        self.push_raw(&payload, queue, PushOptions::delayed(seconds))
    }

    /// Take at most one job off the queue, waiting up to `wait_seconds`.
    pub fn pop(&self, queue: Option<&str>) -> QueueResult<Option<RocketJob<F>>> {
        let route = self.resolver.resolve(queue);
        let consumer = self.consumer(Some(&route.topic), route.tag.as_deref());

        let messages = match consumer.consume(1, self.settings.wait_seconds) {
            Ok(messages) => messages,
            Err(BrokerError::MessageNotExist) => return Ok(None),
            Err(e) => return Err(QueueError::consume(&route.topic, e.to_string())),
        };
        let Some(message) = messages.into_iter().next() else {
            return Ok(None);
        };

        debug!(
            topic = %route.topic,
            tag = ?route.tag,
            message_id = %message.id,
            consumed_times = message.consumed_times,
            "consumed message"
        );

        let origin = JobOrigin {
            queue: self.resolver.logical_queue(queue).to_string(),
            route,
            connection_name: self.connection_name.clone(),
        };
        Ok(Some(RocketJob::new(
            Arc::clone(&self.framework),
            consumer,
            message,
            origin,
            self.plain_job().map(str::to_string),
        )))
    }

    /// Producer for `topic`, or for the default topic when `None`.
    pub fn producer(&self, topic: Option<&str>) -> Arc<dyn Producer> {
        let topic = topic.filter(|t| !t.is_empty()).unwrap_or(self.settings.queue.as_str());
        self.client.producer(&self.settings.instance_id, topic)
    }

    /// Consumer for `topic` (default topic when `None`) filtered by `tag`.
    pub fn consumer(&self, topic: Option<&str>, tag: Option<&str>) -> Arc<dyn Consumer> {
        let topic = topic.filter(|t| !t.is_empty()).unwrap_or(self.settings.queue.as_str());
        self.client.consumer(
            &self.settings.instance_id,
            topic,
            &self.settings.group_id,
            tag,
        )
    }
}

impl<C, F> fmt::Debug for RocketQueue<C, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RocketQueue")
            .field("settings", &self.settings)
            .field("resolver", &self.resolver)
            .field("connection_name", &self.connection_name)
            .finish()
    }
}
