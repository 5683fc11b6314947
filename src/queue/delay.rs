use std::time::Duration;

use chrono::{DateTime, Utc};

/// A requested delivery delay, either relative or as a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    Seconds(i64),
    At(DateTime<Utc>),
}

impl Delay {
    /// Whole seconds between `now` and the requested delivery. Negative
    /// delays and instants in the past clamp to zero. A partial second
    /// before an absolute instant rounds up, so it is never reached early.
    pub fn seconds_from(&self, now: DateTime<Utc>) -> u64 {
        let seconds = match self {
            Delay::Seconds(seconds) => *seconds,
            Delay::At(at) => {
                let millis = (*at - now).num_milliseconds();
                millis / 1000 + i64::from(millis % 1000 > 0)
            }
        };
        u64::try_from(seconds).unwrap_or(0)
    }
}

impl From<i64> for Delay {
    fn from(seconds: i64) -> Self {
        Delay::Seconds(seconds)
    }
}

impl From<i32> for Delay {
    fn from(seconds: i32) -> Self {
        Delay::Seconds(i64::from(seconds))
    }
}

impl From<u32> for Delay {
    fn from(seconds: u32) -> Self {
        Delay::Seconds(i64::from(seconds))
    }
}

impl From<u64> for Delay {
    fn from(seconds: u64) -> Self {
        Delay::Seconds(i64::try_from(seconds).unwrap_or(i64::MAX))
    }
}

impl From<Duration> for Delay {
    fn from(duration: Duration) -> Self {
        duration.as_secs().into()
    }
}

impl From<chrono::Duration> for Delay {
    fn from(duration: chrono::Duration) -> Self {
        Delay::Seconds(duration.num_seconds())
    }
}

impl From<DateTime<Utc>> for Delay {
    fn from(at: DateTime<Utc>) -> Self {
        Delay::At(at)
    }
}
