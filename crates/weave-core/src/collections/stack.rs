use std::sync::Arc;

use parking_lot::Mutex;
use weave_common::ids::{CollectionId, OperationId};
use weave_common::TestError;

use crate::racecheck::RaceTracker;
use crate::scheduler::Scheduler;

/// LIFO stack instrumented with a scheduling point and optional race
/// checking on every operation.
pub struct ControlledStack<T> {
    scheduler: Arc<Scheduler>,
    id: CollectionId,
    items: Mutex<Vec<T>>,
    race: Option<RaceTracker>,
}

impl<T> ControlledStack<T> {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        let check = scheduler.config().check_collection_races;
        ControlledStack { scheduler, id: CollectionId::next(), items: Mutex::new(Vec::new()), race: check.then(RaceTracker::new) }
    }

    fn touch(&self, op_id: OperationId, is_write: bool) -> Result<(), TestError> {
        self.scheduler.schedule_point(op_id)?;
        if let Some(race) = &self.race {
            race.record_access(op_id, is_write, self.id)?;
        }
        Ok(())
    }

    pub fn push(&self, op_id: OperationId, value: T) -> Result<(), TestError> {
        self.touch(op_id, true)?;
        self.items.lock().push(value);
        Ok(())
    }

    pub fn pop(&self, op_id: OperationId) -> Result<Option<T>, TestError> {
        self.touch(op_id, true)?;
        Ok(self.items.lock().pop())
    }

    pub fn len(&self, op_id: OperationId) -> Result<usize, TestError> {
        self.touch(op_id, false)?;
        Ok(self.items.lock().len())
    }
}
