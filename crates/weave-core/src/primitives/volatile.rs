//! Controlled volatile field: a plain shared value, instrumented with a
//! scheduling point on every access but no atomicity guarantee beyond
//! what the cooperative scheduler's serialization already gives it.
//! Stands in for Coyote's `Volatile<T>` wrapper -- used where production
//! code reads/writes a field without any lock and relies on memory-model
//! guarantees this runtime doesn't need to model, since only one
//! operation ever actually executes at a time.

use std::sync::Arc;

use weave_common::ids::OperationId;
use weave_common::TestError;
use parking_lot::Mutex;

use crate::scheduler::Scheduler;

pub struct ControlledCell<T> {
    scheduler: Arc<Scheduler>,
    value: Mutex<T>,
}

impl<T: Clone> ControlledCell<T> {
    pub fn new(scheduler: Arc<Scheduler>, initial: T) -> Self {
        ControlledCell { scheduler, value: Mutex::new(initial) }
    }

    pub fn get(&self, op_id: OperationId) -> Result<T, TestError> {
        self.scheduler.schedule_point(op_id)?;
        Ok(self.value.lock().clone())
    }

    pub fn set(&self, op_id: OperationId, new_value: T) -> Result<(), TestError> {
        self.scheduler.schedule_point(op_id)?;
        *self.value.lock() = new_value;
        Ok(())
    }
}
