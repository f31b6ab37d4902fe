//! Stable integer identifiers for run-scoped objects.
//!
//! Every controlled object (operation, resource, actor, timer, monitor,
//! state, ...) is referred to by one of these ids rather than by a shared
//! reference, so that ownership can live in a single run-scoped arena
//! (see `weave-core::arena`). Each id type wraps a `u64` assigned from a
//! private, per-type atomic counter -- the same shape as `ProcessId` in
//! the actor runtime this crate generalizes from, minus the node/creation
//! bit-packing that runtime needed for distributed PIDs and we do not.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
        pub struct $name(u64);

        impl $name {
            /// Generate a fresh, process-wide unique id of this kind.
            pub fn next() -> Self {
                static COUNTER: AtomicU64 = AtomicU64::new(0);
                $name(COUNTER.fetch_add(1, Ordering::Relaxed))
            }

            /// The raw numeric value.
            pub fn as_u64(self) -> u64 {
                self.0
            }

            /// Reconstruct an id from a raw value (used when replaying a
            /// schedule trace that recorded ids literally).
            pub fn from_u64(raw: u64) -> Self {
                $name(raw)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "#{}"), self.0)
            }
        }
    };
}

define_id!(OperationId, "Identifies a controlled operation (task/thread).");
define_id!(ResourceId, "Identifies a sync-primitive resource (mutex, semaphore, event, ...).");
define_id!(CollectionId, "Identifies a controlled collection instance, for race tracking.");
define_id!(ActorId, "Identifies an actor.");
define_id!(TimerId, "Identifies a virtual timer.");
define_id!(MachineId, "Identifies a state machine (actor-owned or a spec monitor).");
define_id!(StateId, "Identifies a single declared state within a state machine.");
define_id!(GroupId, "Correlation token propagated through actor sends.");
define_id!(RunId, "Identifies one run (a full exploration across iterations).");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_within_type() {
        let a = OperationId::next();
        let b = OperationId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn ids_of_different_types_do_not_collide_in_counters() {
        // Each id type has its own counter, so two freshly created ids of
        // different kinds may legitimately carry the same raw value.
        let op = OperationId::next();
        let res = ResourceId::from_u64(op.as_u64());
        assert_eq!(res.as_u64(), op.as_u64());
    }

    #[test]
    fn display_and_debug_are_stable_shapes() {
        let id = ActorId::from_u64(7);
        assert_eq!(format!("{id}"), "ActorId#7");
        assert_eq!(format!("{id:?}"), "ActorId(7)");
    }
}
