use std::fmt;

use serde::Deserialize;

use crate::broker::Credentials;
use crate::queue::PayloadShape;
use crate::utils::{QueueError, QueueResult};

/// Top-level configuration settings for the application.
///
/// Includes settings for the queue connection and for logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub queue: QueueSettings,
    pub logging: LoggingSettings,
}

/// Configuration for one queue connection.
///
/// When `use_message_tag` is set, every logical queue is published to the
/// `queue` topic and told apart by a tag carrying the logical queue name.
#[derive(Deserialize, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub endpoint: String,
    pub access_id: String,
    pub access_key: String,
    pub instance_id: String,
    pub group_id: String,
    pub queue: String,
    pub use_message_tag: bool,
    pub wait_seconds: u32,
    pub payload_shape: Option<PayloadShape>,
    pub plain: PlainSettings,
}

/// Plain mode ships caller-prepared payloads verbatim and dispatches every
/// consumed message to the `job` target.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PlainSettings {
    pub enable: bool,
    pub job: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

impl QueueSettings {
    /// Longest long-poll window the broker accepts.
    pub const MAX_WAIT_SECONDS: u32 = 30;

    pub fn credentials(&self) -> Credentials {
        Credentials {
            endpoint: self.endpoint.clone(),
            access_id: self.access_id.clone(),
            access_key: self.access_key.clone(),
        }
    }

    /// The plain-mode job target, if plain mode is enabled.
    pub fn plain_job(&self) -> Option<&str> {
        self.plain.enable.then_some(self.plain.job.as_str())
    }

    pub fn validate(&self) -> QueueResult<()> {
        if self.queue.trim().is_empty() {
            return Err(QueueError::configuration(
                "queue",
                "a default topic is required",
            ));
        }
        if self.wait_seconds > Self::MAX_WAIT_SECONDS {
            return Err(QueueError::configuration(
                "wait_seconds",
                format!(
                    "{} exceeds the broker limit of {}",
                    self.wait_seconds,
                    Self::MAX_WAIT_SECONDS
                ),
            ));
        }
        if self.plain.enable && self.plain.job.trim().is_empty() {
            return Err(QueueError::configuration(
                "plain.job",
                "plain mode needs a job target",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for QueueSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueSettings")
            .field("endpoint", &self.endpoint)
            .field("access_id", &self.access_id)
            .field("access_key", &"<redacted>")
            .field("instance_id", &self.instance_id)
            .field("group_id", &self.group_id)
            .field("queue", &self.queue)
            .field("use_message_tag", &self.use_message_tag)
            .field("wait_seconds", &self.wait_seconds)
            .field("payload_shape", &self.payload_shape)
            .field("plain", &self.plain)
            .finish()
    }
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub queue: Option<PartialQueueSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialQueueSettings {
    pub endpoint: Option<String>,
    pub access_id: Option<String>,
    pub access_key: Option<String>,
    pub instance_id: Option<String>,
    pub group_id: Option<String>,
    pub queue: Option<String>,
    pub use_message_tag: Option<bool>,
    pub wait_seconds: Option<u32>,
    pub payload_shape: Option<PayloadShape>,
    pub plain: Option<PartialPlainSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialPlainSettings {
    pub enable: Option<bool>,
    pub job: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl PartialSettings {
    /// Fill every missing value from `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let queue = self.queue;
        let plain = queue.as_ref().and_then(|q| q.plain.as_ref());
        let default_queue = default.queue;

        Settings {
            queue: QueueSettings {
                endpoint: queue
                    .as_ref()
                    .and_then(|q| q.endpoint.clone())
                    .unwrap_or(default_queue.endpoint),
                access_id: queue
                    .as_ref()
                    .and_then(|q| q.access_id.clone())
                    .unwrap_or(default_queue.access_id),
                access_key: queue
                    .as_ref()
                    .and_then(|q| q.access_key.clone())
                    .unwrap_or(default_queue.access_key),
                instance_id: queue
                    .as_ref()
                    .and_then(|q| q.instance_id.clone())
                    .unwrap_or(default_queue.instance_id),
                group_id: queue
                    .as_ref()
                    .and_then(|q| q.group_id.clone())
                    .unwrap_or(default_queue.group_id),
                queue: queue
                    .as_ref()
                    .and_then(|q| q.queue.clone())
                    .unwrap_or(default_queue.queue),
                use_message_tag: queue
                    .as_ref()
                    .and_then(|q| q.use_message_tag)
                    .unwrap_or(default_queue.use_message_tag),
                wait_seconds: queue
                    .as_ref()
                    .and_then(|q| q.wait_seconds)
                    .unwrap_or(default_queue.wait_seconds),
                payload_shape: queue
                    .as_ref()
                    .and_then(|q| q.payload_shape)
                    .or(default_queue.payload_shape),
                plain: PlainSettings {
                    enable: plain
                        .and_then(|p| p.enable)
                        .unwrap_or(default_queue.plain.enable),
                    job: plain
                        .and_then(|p| p.job.clone())
                        .unwrap_or(default_queue.plain.job),
                },
            },
            logging: LoggingSettings {
                level: self
                    .logging
                    .and_then(|l| l.level)
                    .unwrap_or(default.logging.level),
            },
        }
    }
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            queue: QueueSettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080".to_string(),
            access_id: String::new(),
            access_key: String::new(),
            instance_id: String::new(),
            group_id: "GID_default".to_string(),
            queue: "default".to_string(),
            use_message_tag: false,
            wait_seconds: 3,
            payload_shape: None,
            plain: PlainSettings {
                enable: false,
                job: String::new(),
            },
        }
    }
}
