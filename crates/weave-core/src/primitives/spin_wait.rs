//! Controlled spin-wait, for lock-free algorithms under test (spec
//! "SpinWait": a bounded busy-wait that still has to pass through a
//! scheduling point on every iteration, otherwise the interleavings a
//! spin loop depends on would never get explored).

use std::sync::Arc;

use weave_common::ids::OperationId;
use weave_common::TestError;

use crate::scheduler::Scheduler;

pub struct SpinWait {
    scheduler: Arc<Scheduler>,
    spins: u32,
}

impl SpinWait {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        SpinWait { scheduler, spins: 0 }
    }

    pub fn spin_count(&self) -> u32 {
        self.spins
    }

    /// One iteration of the spin loop: always a scheduling point, so the
    /// strategy gets a chance to run some other operation between every
    /// poll of the condition being spun on.
    pub fn spin_once(&mut self, op_id: OperationId) -> Result<(), TestError> {
        self.spins += 1;
        self.scheduler.schedule_point(op_id)
    }

    pub fn reset(&mut self) {
        self.spins = 0;
    }
}
