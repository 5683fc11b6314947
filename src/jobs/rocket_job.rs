//! Job wrapper
//!
//! A `RocketJob` wraps one consumed message for one execution attempt:
//!
//! ```text
//! Consumed ──fire──▶ Fired ──delete──▶ Deleted
//!    │                 │
//!    └──────release────┴─────────────▶ Released
//! ```
//!
//! `delete` acknowledges through the same consumer that received the
//! message. Without that acknowledgment the broker redelivers after its
//! visibility timeout with a higher attempt count. `release` never talks to
//! the broker: redelivery timing is the broker's visibility timeout, not the
//! requested delay.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::broker::{ConsumedMessage, Consumer, ReceiptHandle};
use crate::jobs::contract::{JobContract, JobFramework};
use crate::queue::{DecodedPayload, Route};
use crate::utils::{QueueError, QueueResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Consumed,
    Fired,
    Deleted,
    Released,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Consumed => "consumed",
            JobState::Fired => "fired",
            JobState::Deleted => "deleted",
            JobState::Released => "released",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Deleted | JobState::Released)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a consumed message came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOrigin {
    pub queue: String,
    pub route: Route,
    pub connection_name: Option<String>,
}

pub struct RocketJob<F> {
    framework: Arc<F>,
    consumer: Arc<dyn Consumer>,
    message: ConsumedMessage,
    origin: JobOrigin,
    plain_job: Option<String>,
    state: JobState,
    // Set once `on_delete` has run, so a retried delete after a failed ack
    // does not repeat the framework bookkeeping.
    delete_recorded: bool,
}

impl<F: JobFramework> RocketJob<F> {
    pub fn new(
        framework: Arc<F>,
        consumer: Arc<dyn Consumer>,
        message: ConsumedMessage,
        origin: JobOrigin,
        plain_job: Option<String>,
    ) -> Self {
        Self {
            framework,
            consumer,
            message,
            origin,
            plain_job,
            state: JobState::Consumed,
            delete_recorded: false,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn message(&self) -> &ConsumedMessage {
        &self.message
    }

    pub fn route(&self) -> &Route {
        &self.origin.route
    }

    pub fn receipt_handle(&self) -> &ReceiptHandle {
        &self.message.receipt_handle
    }

    fn invalid(&self, action: &'static str) -> QueueError {
        QueueError::InvalidTransition {
            job_id: self.message.id.clone(),
            action,
            state: self.state.as_str(),
        }
    }
}

impl<F: JobFramework> JobContract for RocketJob<F> {
    fn job_id(&self) -> &str {
        &self.message.id
    }

    fn raw_body(&self) -> &str {
        &self.message.body
    }

    fn attempts(&self) -> u32 {
        self.message.consumed_times
    }

    fn queue(&self) -> &str {
        &self.origin.queue
    }

    fn connection_name(&self) -> Option<&str> {
        self.origin.connection_name.as_deref()
    }

    fn payload(&self) -> QueueResult<DecodedPayload> {
        DecodedPayload::decode(&self.message.body, self.plain_job.as_deref()).inspect_err(|e| {
            warn!(job_id = %self.message.id, error = %e, "undecodable job payload");
        })
    }

    fn fire(&mut self) -> QueueResult<()> {
        if self.state != JobState::Consumed {
            return Err(self.invalid("fire"));
        }

        let payload = self.payload()?;
        self.state = JobState::Fired;

        let framework = Arc::clone(&self.framework);
        if framework.supports_payload_dispatch() {
            framework.resolve_and_fire(&*self, &payload)
        } else {
            framework.fire_default(&*self, payload.job(), &payload.data())
        }
    }

    fn delete(&mut self) -> QueueResult<()> {
        if self.state.is_terminal() {
            return Err(self.invalid("delete"));
        }

        if !self.delete_recorded {
            let framework = Arc::clone(&self.framework);
            framework.on_delete(&*self)?;
            self.delete_recorded = true;
        }

        self.consumer
            .ack(std::slice::from_ref(&self.message.receipt_handle))
            .map_err(|e| QueueError::acknowledge(self.consumer.topic(), e.to_string()))?;
        self.state = JobState::Deleted;

        debug!(
            job_id = %self.message.id,
            topic = %self.consumer.topic(),
            "job deleted and acknowledged"
        );
        Ok(())
    }

    fn release(&mut self, delay_seconds: u64) -> QueueResult<()> {
        if self.state.is_terminal() {
            return Err(self.invalid("release"));
        }

        let framework = Arc::clone(&self.framework);
        framework.on_release(&*self, delay_seconds)?;
        self.state = JobState::Released;

        warn!(
            job_id = %self.message.id,
            requested_delay = delay_seconds,
            attempts = self.message.consumed_times,
            "job released; redelivery follows the broker visibility timeout"
        );
        Ok(())
    }

    fn is_deleted(&self) -> bool {
        self.state == JobState::Deleted
    }

    fn is_released(&self) -> bool {
        self.state == JobState::Released
    }
}

impl<F> fmt::Debug for RocketJob<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RocketJob")
            .field("message", &self.message)
            .field("origin", &self.origin)
            .field("plain_job", &self.plain_job)
            .field("state", &self.state)
            .finish()
    }
}
