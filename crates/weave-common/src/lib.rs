//! Shared ids and error taxonomy used across the `weave-*` crates that make
//! up the concurrency-testing runtime core.

pub mod error;
pub mod ids;
pub mod outcome;

pub use error::TestError;
pub use outcome::IterationOutcome;
