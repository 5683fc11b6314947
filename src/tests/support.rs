//! Test doubles shared by the module tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use crate::broker::{
    BrokerClient, BrokerError, ConsumedMessage, Consumer, InMemoryBroker, Producer, ReceiptHandle,
};
use crate::config::QueueSettings;
use crate::jobs::{JobContract, JobFramework};
use crate::queue::{DecodedPayload, JobEnvelope, PayloadShape, RocketQueue};
use crate::utils::{QueueError, QueueResult};

#[derive(Debug, Clone)]
pub struct TestJob {
    pub name: String,
    pub raw: String,
}

impl TestJob {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            raw: format!("raw:{name}"),
        }
    }

    pub fn plain(raw: &str) -> Self {
        Self {
            name: "plain".to_string(),
            raw: raw.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreatePayload { queue: Option<String> },
    CreateLegacyPayload,
    PlainPayload,
    Fire { job_id: String, attempts: u32, payload: DecodedPayload },
    FireDefault { job_id: String, descriptor: String, data: Value },
    Delete { job_id: String },
    Release { job_id: String, delay: u64 },
}

#[derive(Debug, Default)]
pub struct RecordingFramework {
    shape: Option<PayloadShape>,
    no_payload_dispatch: bool,
    fail_fire: bool,
    calls: Mutex<Vec<Call>>,
}

impl RecordingFramework {
    pub fn with_shape(shape: PayloadShape) -> Self {
        Self {
            shape: Some(shape),
            ..Self::default()
        }
    }

    pub fn without_payload_dispatch(mut self) -> Self {
        self.no_payload_dispatch = true;
        self
    }

    pub fn failing_fire(mut self) -> Self {
        self.fail_fire = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn envelope(job: &TestJob, data: &Value) -> JobEnvelope {
        let mut envelope = JobEnvelope::new(format!("{}@handle", job.name), data.clone());
        envelope.max_tries = Some(3);
        envelope.timeout = Some(60);
        envelope
    }
}

impl JobFramework for RecordingFramework {
    type Job = TestJob;

    fn payload_shape(&self) -> Option<PayloadShape> {
        self.shape
    }

    fn create_payload(&self, job: &TestJob, queue: Option<&str>, data: &Value) -> QueueResult<String> {
        self.record(Call::CreatePayload {
            queue: queue.map(str::to_string),
        });
        let mut envelope = Self::envelope(job, data);
        envelope.extra.insert("queue".to_string(), json!(queue));
        Ok(serde_json::to_string(&envelope)?)
    }

    fn create_legacy_payload(&self, job: &TestJob, data: &Value) -> QueueResult<String> {
        self.record(Call::CreateLegacyPayload);
        Ok(serde_json::to_string(&Self::envelope(job, data))?)
    }

    fn plain_payload(&self, job: &TestJob) -> QueueResult<String> {
        self.record(Call::PlainPayload);
        Ok(job.raw.clone())
    }

    fn supports_payload_dispatch(&self) -> bool {
        !self.no_payload_dispatch
    }

    fn resolve_and_fire(&self, job: &dyn JobContract, payload: &DecodedPayload) -> QueueResult<()> {
        self.record(Call::Fire {
            job_id: job.job_id().to_string(),
            attempts: job.attempts(),
            payload: payload.clone(),
        });
        if self.fail_fire {
            return Err(QueueError::framework("handler failed"));
        }
        Ok(())
    }

    fn fire_default(&self, job: &dyn JobContract, descriptor: &str, data: &Value) -> QueueResult<()> {
        self.record(Call::FireDefault {
            job_id: job.job_id().to_string(),
            descriptor: descriptor.to_string(),
            data: data.clone(),
        });
        Ok(())
    }

    fn on_delete(&self, job: &dyn JobContract) -> QueueResult<()> {
        self.record(Call::Delete {
            job_id: job.job_id().to_string(),
        });
        Ok(())
    }

    fn on_release(&self, job: &dyn JobContract, delay_seconds: u64) -> QueueResult<()> {
        self.record(Call::Release {
            job_id: job.job_id().to_string(),
            delay: delay_seconds,
        });
        Ok(())
    }
}

/// Wraps an [`InMemoryBroker`] and records every consumer opened and every
/// acknowledgment attempted.
#[derive(Debug, Clone, Default)]
pub struct CountingClient {
    pub broker: InMemoryBroker,
    acks: Arc<Mutex<Vec<ReceiptHandle>>>,
    consumers: Arc<Mutex<Vec<(String, Option<String>)>>>,
    fail_acks: Arc<AtomicBool>,
}

impl CountingClient {
    pub fn new(broker: InMemoryBroker) -> Self {
        Self {
            broker,
            ..Self::default()
        }
    }

    pub fn acks(&self) -> Vec<ReceiptHandle> {
        self.acks.lock().unwrap().clone()
    }

    pub fn consumers(&self) -> Vec<(String, Option<String>)> {
        self.consumers.lock().unwrap().clone()
    }

    pub fn fail_acks(&self, fail: bool) {
        self.fail_acks.store(fail, Ordering::SeqCst);
    }
}

impl BrokerClient for CountingClient {
    fn producer(&self, instance_id: &str, topic: &str) -> Arc<dyn Producer> {
        self.broker.producer(instance_id, topic)
    }

    fn consumer(
        &self,
        instance_id: &str,
        topic: &str,
        group_id: &str,
        tag: Option<&str>,
    ) -> Arc<dyn Consumer> {
        self.consumers
            .lock()
            .unwrap()
            .push((topic.to_string(), tag.map(str::to_string)));
        Arc::new(CountingConsumer {
            inner: self.broker.consumer(instance_id, topic, group_id, tag),
            acks: Arc::clone(&self.acks),
            fail_acks: Arc::clone(&self.fail_acks),
        })
    }
}

struct CountingConsumer {
    inner: Arc<dyn Consumer>,
    acks: Arc<Mutex<Vec<ReceiptHandle>>>,
    fail_acks: Arc<AtomicBool>,
}

impl Consumer for CountingConsumer {
    fn topic(&self) -> &str {
        self.inner.topic()
    }

    fn tag(&self) -> Option<&str> {
        self.inner.tag()
    }

    fn consume(
        &self,
        max_count: usize,
        wait_seconds: u32,
    ) -> Result<Vec<ConsumedMessage>, BrokerError> {
        self.inner.consume(max_count, wait_seconds)
    }

    fn ack(&self, receipt_handles: &[ReceiptHandle]) -> Result<(), BrokerError> {
        self.acks.lock().unwrap().extend_from_slice(receipt_handles);
        if self.fail_acks.load(Ordering::SeqCst) {
            return Err(BrokerError::transport("connection reset"));
        }
        self.inner.ack(receipt_handles)
    }
}

/// Settings tuned for tests: no long-poll wait.
pub fn settings() -> QueueSettings {
    QueueSettings {
        instance_id: "MQ_INST_test".to_string(),
        group_id: "GID_test".to_string(),
        wait_seconds: 0,
        ..QueueSettings::default()
    }
}

pub type TestQueue = RocketQueue<CountingClient, RecordingFramework>;

pub fn queue_with(
    settings: QueueSettings,
    framework: RecordingFramework,
) -> (TestQueue, CountingClient, Arc<RecordingFramework>) {
    let client = CountingClient::new(InMemoryBroker::new());
    let framework = Arc::new(framework);
    let queue = RocketQueue::new(client.clone(), settings, Arc::clone(&framework));
    (queue, client, framework)
}
