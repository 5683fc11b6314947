//! The `error` module defines the error types used throughout the queue driver.
//!
//! Broker failures, payload problems and framework incompatibilities all
//! surface as [`QueueError`]. The single exception is an empty topic, which the
//! driver translates into `Ok(None)` instead of an error.

use thiserror::Error;

use crate::broker::BrokerError;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Publish failed: {topic}: {message}")]
    Publish { topic: String, message: String },

    #[error("Consume failed: {topic}: {message}")]
    Consume { topic: String, message: String },

    #[error("Acknowledge failed: {topic}: {message}")]
    Acknowledge { topic: String, message: String },

    #[error("Payload decode error: {message}")]
    PayloadDecode { message: String },

    #[error("Payload encode error: {message}")]
    PayloadEncode { message: String },

    #[error("Serializer call shape cannot be determined: {message}")]
    Compatibility { message: String },

    #[error("Job {job_id} cannot {action} while {state}")]
    InvalidTransition {
        job_id: String,
        action: &'static str,
        state: &'static str,
    },

    #[error("Job framework error: {message}")]
    Framework { message: String },

    #[error("Configuration error: {field}: {message}")]
    Configuration { field: String, message: String },

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

impl QueueError {
    pub fn publish(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            topic: topic.into(),
            message: message.into(),
        }
    }

    pub fn consume(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Consume {
            topic: topic.into(),
            message: message.into(),
        }
    }

    pub fn acknowledge(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Acknowledge {
            topic: topic.into(),
            message: message.into(),
        }
    }

    pub fn payload_decode(message: impl Into<String>) -> Self {
        Self::PayloadDecode {
            message: message.into(),
        }
    }

    pub fn payload_encode(message: impl Into<String>) -> Self {
        Self::PayloadEncode {
            message: message.into(),
        }
    }

    pub fn compatibility(message: impl Into<String>) -> Self {
        Self::Compatibility {
            message: message.into(),
        }
    }

    pub fn framework(message: impl Into<String>) -> Self {
        Self::Framework {
            message: message.into(),
        }
    }

    pub fn configuration(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Map a broker failure raised while publishing to `topic`.
    pub fn from_publish(topic: &str, err: BrokerError) -> Self {
        Self::publish(topic, err.to_string())
    }
}

/// Conversion from serde_json::Error to QueueError
impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() || err.is_eof() || err.is_data() {
            QueueError::payload_decode(err.to_string())
        } else {
            QueueError::payload_encode(err.to_string())
        }
    }
}

pub type QueueResult<T> = Result<T, QueueError>;
