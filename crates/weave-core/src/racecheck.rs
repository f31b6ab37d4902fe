//! Shared read/write race tracking for controlled collections and
//! interlocked fields (spec "controlled collections ... optional
//! race-checking: read/write conflict detection without intervening
//! synchronization").
//!
//! A race is flagged when two *different* operations touch the same
//! tracked object back to back with no call to [`RaceTracker::clear`] in
//! between (which a wrapper makes once it knows a synchronization
//! primitive -- a mutex, an event -- has established a happens-before
//! edge) and at least one of the two accesses was a write. This does not
//! detect memory unsafety under this crate's own cooperative scheduler,
//! which always serializes accesses; it flags the access pattern that
//! would be a genuine data race under the uncontrolled concurrency the
//! code under test is meant to run with in production.

use parking_lot::Mutex;

use weave_common::ids::{CollectionId, OperationId};
use weave_common::TestError;

struct RaceState {
    last_op: Option<OperationId>,
    last_was_write: bool,
}

pub struct RaceTracker {
    state: Mutex<RaceState>,
}

impl RaceTracker {
    pub fn new() -> Self {
        RaceTracker { state: Mutex::new(RaceState { last_op: None, last_was_write: false }) }
    }

    pub fn record_access(&self, op: OperationId, is_write: bool, collection: CollectionId) -> Result<(), TestError> {
        let mut state = self.state.lock();
        if let Some(last) = state.last_op {
            if last != op && (is_write || state.last_was_write) {
                return Err(TestError::DataRace { collection, first: last, second: op });
            }
        }
        state.last_op = Some(op);
        state.last_was_write = is_write;
        Ok(())
    }

    /// Record that a synchronization primitive established a
    /// happens-before edge since the last access; the next access will
    /// not be compared against whatever came before.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.last_op = None;
        state.last_was_write = false;
    }
}

impl Default for RaceTracker {
    fn default() -> Self {
        Self::new()
    }
}
