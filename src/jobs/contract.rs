//! Contracts shared with the job-execution framework
//!
//! [`JobFramework`] is everything the driver asks of the framework: building
//! payloads on the way in and dispatching plus bookkeeping on the way out.
//! [`JobContract`] is what the framework may ask of a consumed job.

use serde_json::Value;

use crate::queue::{DecodedPayload, PayloadShape};
use crate::utils::{QueueError, QueueResult};

pub trait JobContract {
    /// Broker-assigned message id.
    fn job_id(&self) -> &str;

    fn raw_body(&self) -> &str;

    /// Delivery count reported by the broker, 1 on first delivery.
    fn attempts(&self) -> u32;

    /// Logical queue the job was popped from.
    fn queue(&self) -> &str;

    fn connection_name(&self) -> Option<&str>;

    fn payload(&self) -> QueueResult<DecodedPayload>;

    fn fire(&mut self) -> QueueResult<()>;

    fn delete(&mut self) -> QueueResult<()>;

    fn release(&mut self, delay_seconds: u64) -> QueueResult<()>;

    fn is_deleted(&self) -> bool;

    fn is_released(&self) -> bool;

    fn is_deleted_or_released(&self) -> bool {
        self.is_deleted() || self.is_released()
    }
}

pub trait JobFramework: Send + Sync {
    /// Whatever callers hand to `push`/`later`.
    type Job;

    /// Serializer signature this framework version offers, if it declares one.
    fn payload_shape(&self) -> Option<PayloadShape> {
        None
    }

    fn create_payload(
        &self,
        _job: &Self::Job,
        _queue: Option<&str>,
        _data: &Value,
    ) -> QueueResult<String> {
        Err(QueueError::compatibility(
            "framework has no (job, queue, data) serializer",
        ))
    }

    fn create_legacy_payload(&self, _job: &Self::Job, _data: &Value) -> QueueResult<String> {
        Err(QueueError::compatibility(
            "framework has no (job, data) serializer",
        ))
    }

    /// The job's own pre-serialized representation, used in plain mode.
    fn plain_payload(&self, job: &Self::Job) -> QueueResult<String>;

    fn supports_payload_dispatch(&self) -> bool {
        true
    }

    fn resolve_and_fire(&self, job: &dyn JobContract, payload: &DecodedPayload) -> QueueResult<()>;

    /// Dispatch by target descriptor alone, for frameworks without
    /// payload-based dispatch.
    fn fire_default(&self, _job: &dyn JobContract, descriptor: &str, _data: &Value) -> QueueResult<()> {
        Err(QueueError::framework(format!(
            "no default dispatch available for {descriptor}"
        )))
    }

    fn on_delete(&self, _job: &dyn JobContract) -> QueueResult<()> {
        Ok(())
    }

    fn on_release(&self, _job: &dyn JobContract, _delay_seconds: u64) -> QueueResult<()> {
        Ok(())
    }
}
