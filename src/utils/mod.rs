//! The `utils` module holds the pieces shared by every other module: the
//! error taxonomy and logging initialization.

pub mod error;
pub mod logging;

pub use error::{QueueError, QueueResult};
