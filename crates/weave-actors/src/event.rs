//! Events carried through actor inboxes and state-machine dispatch.
//!
//! Grounded on `snow-rt/src/actor/process.rs`'s `Message { buffer:
//! MessageBuffer }`, generalized from a tagged byte buffer (needed there
//! for a compiled binary ABI) to a typed `Box<dyn Any + Send>` payload,
//! since nothing here crosses a codegen boundary.

use std::any::Any;
use std::fmt;

use weave_common::ids::{ActorId, GroupId, StateId, TimerId};

/// The tag used for handler-table lookup and defer/ignore membership.
/// Internal kinds get their own variant so they can never collide with a
/// user-declared one; user kinds are named by a `&'static str` (an event
/// name, the same way the teacher tags messages by a compile-time type
/// tag rather than a runtime string comparison).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Halt,
    GotoState,
    PushState,
    PopState,
    DefaultTimeout,
    TimerElapsed,
    Register,
    Custom(&'static str),
}

impl fmt::Debug for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Halt => write!(f, "Halt"),
            EventKind::GotoState => write!(f, "GotoState"),
            EventKind::PushState => write!(f, "PushState"),
            EventKind::PopState => write!(f, "PopState"),
            EventKind::DefaultTimeout => write!(f, "DefaultTimeout"),
            EventKind::TimerElapsed => write!(f, "TimerElapsed"),
            EventKind::Register => write!(f, "Register"),
            EventKind::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// An immutable event. Once enqueued in an inbox it is never mutated,
/// only moved (spec §3 "Events are immutable once enqueued").
pub enum Event {
    Halt,
    GotoState(StateId),
    PushState(StateId),
    PopState,
    DefaultTimeout,
    TimerElapsed(TimerId),
    Register(ActorId),
    Custom { kind: &'static str, payload: Box<dyn Any + Send> },
}

impl Event {
    pub fn custom(kind: &'static str, payload: impl Any + Send) -> Self {
        Event::Custom { kind, payload: Box::new(payload) }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::Halt => EventKind::Halt,
            Event::GotoState(_) => EventKind::GotoState,
            Event::PushState(_) => EventKind::PushState,
            Event::PopState => EventKind::PopState,
            Event::DefaultTimeout => EventKind::DefaultTimeout,
            Event::TimerElapsed(_) => EventKind::TimerElapsed,
            Event::Register(_) => EventKind::Register,
            Event::Custom { kind, .. } => EventKind::Custom(kind),
        }
    }

    /// Downcast a custom event's payload. Returns `None` for every
    /// internal kind and for a payload of the wrong type.
    pub fn payload<T: 'static>(&self) -> Option<&T> {
        match self {
            Event::Custom { payload, .. } => payload.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event::{:?}", self.kind())
    }
}

/// An event together with the group id it was sent under (spec §4.H
/// "Group ids"). Kept separate from `Event` itself so internal kinds
/// constructed without a sender (e.g. `TimerElapsed`) don't need a dummy
/// group.
#[derive(Debug)]
pub struct Envelope {
    pub event: Event,
    pub group: Option<GroupId>,
}

impl Envelope {
    pub fn new(event: Event, group: Option<GroupId>) -> Self {
        Envelope { event, group }
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}
