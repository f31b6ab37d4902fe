//! Actor, state-machine, and specification-monitor runtime layered on
//! `weave_core`'s controlled scheduler.
//!
//! An actor is one controlled operation running an event loop over an
//! inbox (`mailbox`); its behavior is declared as a `StateMachine`
//! (`state_machine`) built once and dispatched by the loop in `runtime`.
//! A `SpecMonitor` (`monitor`) is the same declarative shape dispatched
//! synchronously instead, feeding `weave_core::LivenessProbe` so the
//! scheduler can detect liveness bugs without depending back on this
//! crate.

pub mod actor;
pub mod event;
pub mod mailbox;
pub mod monitor;
pub mod runtime;
pub mod state_machine;

pub use actor::{ActionContext, Actor, ActorSpec, ExceptionHook, ExceptionOutcome};
pub use event::{Envelope, Event, EventKind};
pub use mailbox::Mailbox;
pub use monitor::{MonitorRegistry, SpecMonitor, Temperature};
pub use runtime::ActorRuntime;
pub use state_machine::{Handler, HandlerOutcome, State, StateGroup, StateMachine, StateMachineBuilder};
