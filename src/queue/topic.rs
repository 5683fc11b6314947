//! Topic resolution
//!
//! Maps a logical queue name to the physical topic and optional tag used on
//! the broker. With message tags enabled, every logical queue shares the
//! configured default topic and is told apart by a tag equal to its name;
//! ordering across logical queues on that shared topic is not guaranteed.

use crate::config::QueueSettings;

/// Physical address of a logical queue on the broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    pub topic: String,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicResolver {
    default_queue: String,
    use_message_tag: bool,
}

impl TopicResolver {
    pub fn new(default_queue: impl Into<String>, use_message_tag: bool) -> Self {
        Self {
            default_queue: default_queue.into(),
            use_message_tag,
        }
    }

    pub fn from_settings(settings: &QueueSettings) -> Self {
        Self::new(settings.queue.clone(), settings.use_message_tag)
    }

    pub fn uses_message_tag(&self) -> bool {
        self.use_message_tag
    }

    /// The logical queue name, falling back to the default for `None` or "".
    pub fn logical_queue<'a>(&'a self, queue: Option<&'a str>) -> &'a str {
        requested(queue).unwrap_or(self.default_queue.as_str())
    }

    pub fn resolve_topic(&self, queue: Option<&str>) -> String {
        if self.use_message_tag {
            self.default_queue.clone()
        } else {
            self.logical_queue(queue).to_string()
        }
    }

    pub fn resolve_tag(&self, queue: Option<&str>) -> Option<String> {
        if self.use_message_tag {
            requested(queue).map(str::to_string)
        } else {
            None
        }
    }

    pub fn resolve(&self, queue: Option<&str>) -> Route {
        Route {
            topic: self.resolve_topic(queue),
            tag: self.resolve_tag(queue),
        }
    }
}

fn requested(queue: Option<&str>) -> Option<&str> {
    queue.filter(|q| !q.is_empty())
}
