//! [MODULE L] Deadlock oracle.
//!
//! Fires whenever the scheduler finds zero `Enabled` operations while at
//! least one operation is blocked (spec §7 "DeadlockDetected ... triggered
//! when zero operations are Enabled and at least one is Blocked"). The
//! oracle itself does no polling or timing; `Scheduler::schedule_point`
//! calls it exactly once, at the moment it would otherwise have nothing
//! left to run.

use crate::operation::OperationRegistry;
use weave_common::TestError;

pub fn detect(registry: &OperationRegistry) -> TestError {
    let blocked = registry.blocked();
    TestError::DeadlockDetected { blocked }
}
