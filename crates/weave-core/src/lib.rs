//! Cooperative scheduler, controlled primitives, controlled collections,
//! and the deadlock oracle that make up the core of the systematic
//! concurrency-testing runtime.
//!
//! Higher layers (`weave-actors`, `weave-report`) build on top of the
//! types here without this crate ever depending back on them --
//! `scheduler::LivenessProbe` and `timer::TimerSink` are the two seams
//! that let the actor runtime feed liveness information and timer
//! deliveries back through without a circular dependency.

pub mod collections;
pub mod config;
pub mod deadlock;
pub mod operation;
pub mod primitives;
pub mod racecheck;
pub mod resource;
pub mod scheduler;
pub mod timer;

pub use config::Config;
pub use operation::{ControlledOperation, OperationRegistry, OperationStatus};
pub use resource::{Resource, ResourceTable};
pub use scheduler::{LivenessProbe, Scheduler};
pub use timer::{TimerService, TimerSink};
