use std::fmt;

use crate::ids::{CollectionId, MachineId, OperationId, ResourceId, StateId};

/// The error taxonomy a systematic-testing iteration can end with.
///
/// Collected rather than thrown-and-forgotten: an iteration keeps every
/// distinct `TestError` it observed so the run report can list them all
/// (spec §7 "the iteration's aggregated report lists every distinct
/// error"). Kept as a plain enum with a manual `Display` impl, matching
/// `LexError`/`LexErrorKind` in the teacher's shared-types crate, rather
/// than reaching for `thiserror` -- the teacher never depends on it.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "kind")]
pub enum TestError {
    /// A user-level invariant (`spec_assert!`, a monitor's own `assert`)
    /// was violated. Fatal to the iteration.
    AssertionFailure { message: String },

    /// The deadlock oracle fired: every controlled operation is blocked.
    /// Carries, for each blocked operation, the resources it is waiting on.
    DeadlockDetected {
        blocked: Vec<(OperationId, Vec<ResourceId>)>,
    },

    /// A specification monitor was still in a hot state when a fair
    /// schedule terminated.
    LivenessViolation {
        machine: MachineId,
        state: StateId,
        state_name: String,
    },

    /// A controlled operation awaited a task, or invoked a primitive, that
    /// was never routed through the controlled facade. The iteration is
    /// tainted but not otherwise failed.
    UncontrolledConcurrency { call_site: String },

    /// Two conflicting accesses to a race-checked collection or
    /// interlocked field, with no intervening controlled synchronization.
    DataRace {
        collection: CollectionId,
        first: OperationId,
        second: OperationId,
    },

    /// Illegal use of the API surface: popping with no matching push,
    /// calling a restricted API from `OnHalt`/`on-exit`, duplicate handler
    /// declarations, a negative timer delay, releasing a semaphore past
    /// its max count, and so on.
    MisuseError { message: String },

    /// A scheduler invariant was broken. Always a bug in this crate, never
    /// in user code under test.
    InternalError { message: String },
}

impl TestError {
    pub fn assertion(message: impl Into<String>) -> Self {
        TestError::AssertionFailure { message: message.into() }
    }

    pub fn misuse(message: impl Into<String>) -> Self {
        TestError::MisuseError { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        TestError::InternalError { message: message.into() }
    }

    /// Whether this error kind must freeze the current iteration
    /// immediately (spec §4.C "A bug freezes the iteration"), as opposed
    /// to `UncontrolledConcurrency`, which only taints it.
    pub fn is_fatal_to_iteration(&self) -> bool {
        !matches!(self, TestError::UncontrolledConcurrency { .. })
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestError::AssertionFailure { message } => {
                write!(f, "assertion failure: {message}")
            }
            TestError::DeadlockDetected { blocked } => {
                write!(f, "deadlock detected among {} operation(s):", blocked.len())?;
                for (op, resources) in blocked {
                    let resources = resources
                        .iter()
                        .map(|r| r.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    write!(f, " [{op} waiting on {{{resources}}}]")?;
                }
                Ok(())
            }
            TestError::LivenessViolation { machine, state, state_name } => {
                write!(
                    f,
                    "liveness violation: machine {machine} ended in hot state {state} ({state_name})"
                )
            }
            TestError::UncontrolledConcurrency { call_site } => {
                write!(f, "uncontrolled concurrency at {call_site}")
            }
            TestError::DataRace { collection, first, second } => {
                write!(
                    f,
                    "data race on collection {collection} between operations {first} and {second}"
                )
            }
            TestError::MisuseError { message } => write!(f, "misuse error: {message}"),
            TestError::InternalError { message } => write!(f, "internal error: {message}"),
        }
    }
}

impl std::error::Error for TestError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadlock_display_names_every_blocked_operation() {
        let op1 = OperationId::from_u64(1);
        let op2 = OperationId::from_u64(2);
        let r1 = ResourceId::from_u64(10);
        let r2 = ResourceId::from_u64(11);
        let err = TestError::DeadlockDetected {
            blocked: vec![(op1, vec![r1]), (op2, vec![r2, r1])],
        };
        let rendered = err.to_string();
        assert!(rendered.contains("OperationId#1"));
        assert!(rendered.contains("OperationId#2"));
        assert!(rendered.contains("ResourceId#10"));
        assert!(rendered.contains("ResourceId#11"));
    }

    #[test]
    fn liveness_violation_names_the_state() {
        let err = TestError::LivenessViolation {
            machine: MachineId::from_u64(1),
            state: StateId::from_u64(2),
            state_name: "Busy".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "liveness violation: machine MachineId#1 ended in hot state StateId#2 (Busy)"
        );
    }

    #[test]
    fn uncontrolled_concurrency_is_not_fatal() {
        let err = TestError::UncontrolledConcurrency { call_site: "foo.rs:1".into() };
        assert!(!err.is_fatal_to_iteration());
        let err = TestError::assertion("boom");
        assert!(err.is_fatal_to_iteration());
    }
}
