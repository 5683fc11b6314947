//! # RocketMQ Queue
//!
//! `rocketmq_queue` is a job-queue driver that runs background jobs over a
//! publish/subscribe message broker. It lets a job framework push, delay,
//! pop and acknowledge work while the broker behaves like an ordinary queue.
//!
//! ## Core Modules
//!
//! The library is structured into several modules, each with a distinct responsibility:
//!
//! - `broker`: Producer/consumer seams to the broker, message records and an in-process broker.
//! - `queue`: The driver itself: topic resolution, payload encoding and push/later/pop.
//! - `jobs`: The job framework contract and the wrapper around one consumed message.
//! - `connector`: Builds a driver from settings and a broker client factory.
//! - `config`: Handles loading and managing configuration.
//! - `utils`: Contains shared utilities, such as error handling and logging.

pub mod broker;
pub mod config;
pub mod connector;
pub mod jobs;
pub mod queue;
pub mod utils;

pub use connector::RocketConnector;
pub use jobs::{JobContract, JobFramework, RocketJob};
pub use queue::RocketQueue;
pub use utils::{QueueError, QueueResult};

#[cfg(test)]
mod tests;
