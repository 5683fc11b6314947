//! Payload encoding and decoding
//!
//! Outbound jobs are either passed through verbatim (plain mode) or turned
//! into the job framework's JSON envelope. Which serializer signature the
//! framework offers is declared up front through [`PayloadShape`]; nothing is
//! guessed at runtime.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::jobs::JobFramework;
use crate::utils::{QueueError, QueueResult};

/// Call shape of the framework's payload serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadShape {
    /// `(job, queue, data)`
    WithQueue,
    /// `(job, data)`
    Legacy,
}

/// Structured job envelope. Only the fields the driver reads are typed;
/// everything else the framework writes is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEnvelope {
    #[serde(default)]
    pub display_name: Option<String>,
    pub job: String,
    pub data: Value,
    #[serde(default)]
    pub max_tries: Option<u32>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobEnvelope {
    pub fn new(job: impl Into<String>, data: Value) -> Self {
        let job = job.into();
        Self {
            display_name: display_name(&job),
            job,
            data,
            max_tries: None,
            timeout: None,
            extra: Map::new(),
        }
    }
}

/// Payload synthesized for a plain-mode message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainPayload {
    pub display_name: Option<String>,
    pub job: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPayload {
    Plain(PlainPayload),
    Structured(JobEnvelope),
}

impl DecodedPayload {
    /// Decode a consumed body. With a plain target the body is carried as
    /// data untouched; otherwise it must parse as a [`JobEnvelope`].
    pub fn decode(raw_body: &str, plain_target: Option<&str>) -> QueueResult<Self> {
        match plain_target {
            Some(target) => Ok(DecodedPayload::Plain(PlainPayload {
                display_name: display_name(target),
                job: target.to_string(),
                data: raw_body.to_string(),
            })),
            None => serde_json::from_str(raw_body)
                .map(DecodedPayload::Structured)
                .map_err(|e| QueueError::payload_decode(e.to_string())),
        }
    }

    pub fn display_name(&self) -> Option<&str> {
        match self {
            DecodedPayload::Plain(p) => p.display_name.as_deref(),
            DecodedPayload::Structured(e) => e.display_name.as_deref(),
        }
    }

    pub fn job(&self) -> &str {
        match self {
            DecodedPayload::Plain(p) => &p.job,
            DecodedPayload::Structured(e) => &e.job,
        }
    }

    /// Plain bodies come back as a JSON string holding the raw body.
    pub fn data(&self) -> Value {
        match self {
            DecodedPayload::Plain(p) => Value::String(p.data.clone()),
            DecodedPayload::Structured(e) => e.data.clone(),
        }
    }

    pub fn max_tries(&self) -> Option<u32> {
        match self {
            DecodedPayload::Plain(_) => None,
            DecodedPayload::Structured(e) => e.max_tries,
        }
    }

    pub fn timeout(&self) -> Option<u64> {
        match self {
            DecodedPayload::Plain(_) => None,
            DecodedPayload::Structured(e) => e.timeout,
        }
    }

    pub fn is_plain(&self) -> bool {
        matches!(self, DecodedPayload::Plain(_))
    }
}

/// The part of a `Class@method` target before the `@`; `None` for an empty target.
pub fn display_name(target: &str) -> Option<String> {
    let name = target.split('@').next().unwrap_or_default().trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[derive(Debug)]
pub struct PayloadEncoder<F> {
    framework: Arc<F>,
    plain: bool,
    configured_shape: Option<PayloadShape>,
}

impl<F: JobFramework> PayloadEncoder<F> {
    pub fn new(framework: Arc<F>, plain: bool, configured_shape: Option<PayloadShape>) -> Self {
        Self {
            framework,
            plain,
            configured_shape,
        }
    }

    /// Configured shape first, then whatever the framework declares.
    pub fn shape(&self) -> QueueResult<PayloadShape> {
        self.configured_shape
            .or_else(|| self.framework.payload_shape())
            .ok_or_else(|| {
                QueueError::compatibility(
                    "neither the connection settings nor the job framework declare a payload shape",
                )
            })
    }

    pub fn encode(&self, job: &F::Job, queue: Option<&str>, data: &Value) -> QueueResult<String> {
        if self.plain {
            return self.framework.plain_payload(job);
        }

        match self.shape()? {
            PayloadShape::WithQueue => self.framework.create_payload(job, queue, data),
            PayloadShape::Legacy => self.framework.create_legacy_payload(job, data),
        }
    }
}
