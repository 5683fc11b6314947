//! The `queue` module is the driver proper: topic resolution, payload
//! encoding, delay normalization and the [`RocketQueue`] entry points.

pub mod delay;
pub mod driver;
pub mod payload;
pub mod topic;

pub use delay::Delay;
pub use driver::{PushOptions, RocketQueue};
pub use payload::{DecodedPayload, JobEnvelope, PayloadEncoder, PayloadShape, PlainPayload};
pub use topic::{Route, TopicResolver};
