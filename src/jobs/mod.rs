//! The `jobs` module bridges consumed broker messages to the job-execution
//! framework.
//!
//! It provides the framework-facing contracts and [`RocketJob`], the wrapper
//! that carries one message through fire, delete or release.

pub mod contract;
pub mod rocket_job;

pub use contract::{JobContract, JobFramework};
pub use rocket_job::{JobOrigin, JobState, RocketJob};
