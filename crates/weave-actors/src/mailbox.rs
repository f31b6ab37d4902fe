//! FIFO inbox for actor event delivery.
//!
//! Grounded on `snow-rt/src/actor/mailbox.rs`'s `Mailbox`: a
//! `parking_lot::Mutex<VecDeque<_>>` with push-back/pop-front, generalized
//! with the reordering operations `receive_event` and state-change defer
//! (spec §4.H, §4.I) need -- pulling the first envelope matching a filter
//! out of the middle of the queue, and parking one back at the front.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::event::{Envelope, EventKind};

/// A thread-safe FIFO inbox of `Envelope`s.
pub struct Mailbox {
    queue: Mutex<VecDeque<Envelope>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Mailbox { queue: Mutex::new(VecDeque::new()) }
    }

    /// Append an envelope to the back (FIFO enqueue).
    pub fn push(&self, envelope: Envelope) {
        self.queue.lock().push_back(envelope);
    }

    /// Park an envelope back at the front, used by defer-on-state-change
    /// (spec §4.I "parks the event back on the inbox for reconsideration
    /// after any state change").
    pub fn push_front(&self, envelope: Envelope) {
        self.queue.lock().push_front(envelope);
    }

    /// Remove and return the front envelope in plain FIFO order.
    pub fn pop_front(&self) -> Option<Envelope> {
        self.queue.lock().pop_front()
    }

    /// Remove and return the first envelope whose kind is deferred by
    /// `deferred`; used when a state change makes a previously parked
    /// event eligible for reconsideration.
    pub fn take_first_not_deferred(&self, deferred: &std::collections::HashSet<EventKind>) -> Option<Envelope> {
        let mut queue = self.queue.lock();
        let pos = queue.iter().position(|e| !deferred.contains(&e.kind()))?;
        queue.remove(pos)
    }

    /// Remove and return the first envelope matching one of `kinds`,
    /// wherever it sits in the queue (spec §4.H `receive_event`:
    /// "reorders the inbox to pull the matching event first").
    pub fn take_matching(&self, kinds: &[EventKind]) -> Option<Envelope> {
        let mut queue = self.queue.lock();
        let pos = queue.iter().position(|e| kinds.contains(&e.kind()))?;
        queue.remove(pos)
    }

    pub fn contains_any(&self, kinds: &[EventKind]) -> bool {
        self.queue.lock().iter().any(|e| kinds.contains(&e.kind()))
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn env(kind: &'static str) -> Envelope {
        Envelope::new(crate::event::Event::custom(kind, ()), None)
    }

    #[test]
    fn push_pop_is_fifo() {
        let mb = Mailbox::new();
        mb.push(env("a"));
        mb.push(env("b"));
        assert_eq!(mb.pop_front().unwrap().kind(), EventKind::Custom("a"));
        assert_eq!(mb.pop_front().unwrap().kind(), EventKind::Custom("b"));
        assert!(mb.pop_front().is_none());
    }

    #[test]
    fn take_matching_reorders_around_the_match() {
        let mb = Mailbox::new();
        mb.push(env("a"));
        mb.push(env("b"));
        mb.push(env("c"));
        let matched = mb.take_matching(&[EventKind::Custom("b")]).unwrap();
        assert_eq!(matched.kind(), EventKind::Custom("b"));
        assert_eq!(mb.pop_front().unwrap().kind(), EventKind::Custom("a"));
        assert_eq!(mb.pop_front().unwrap().kind(), EventKind::Custom("c"));
    }

    #[test]
    fn take_first_not_deferred_skips_deferred_kinds() {
        let mb = Mailbox::new();
        mb.push(env("a"));
        mb.push(env("b"));
        let mut deferred = HashSet::new();
        deferred.insert(EventKind::Custom("a"));
        let taken = mb.take_first_not_deferred(&deferred).unwrap();
        assert_eq!(taken.kind(), EventKind::Custom("b"));
        assert_eq!(mb.len(), 1);
    }
}
