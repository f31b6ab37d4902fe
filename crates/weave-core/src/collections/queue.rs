use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use weave_common::ids::{CollectionId, OperationId};
use weave_common::TestError;

use crate::racecheck::RaceTracker;
use crate::scheduler::Scheduler;

/// FIFO queue instrumented with a scheduling point and optional race
/// checking on every operation (spec "controlled collections").
pub struct ControlledQueue<T> {
    scheduler: Arc<Scheduler>,
    id: CollectionId,
    items: Mutex<VecDeque<T>>,
    race: Option<RaceTracker>,
}

impl<T> ControlledQueue<T> {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        let check = scheduler.config().check_collection_races;
        ControlledQueue { scheduler, id: CollectionId::next(), items: Mutex::new(VecDeque::new()), race: check.then(RaceTracker::new) }
    }

    fn touch(&self, op_id: OperationId, is_write: bool) -> Result<(), TestError> {
        self.scheduler.schedule_point(op_id)?;
        if let Some(race) = &self.race {
            race.record_access(op_id, is_write, self.id)?;
        }
        Ok(())
    }

    pub fn enqueue(&self, op_id: OperationId, value: T) -> Result<(), TestError> {
        self.touch(op_id, true)?;
        self.items.lock().push_back(value);
        Ok(())
    }

    pub fn dequeue(&self, op_id: OperationId) -> Result<Option<T>, TestError> {
        self.touch(op_id, true)?;
        Ok(self.items.lock().pop_front())
    }

    pub fn len(&self, op_id: OperationId) -> Result<usize, TestError> {
        self.touch(op_id, false)?;
        Ok(self.items.lock().len())
    }

    pub fn is_empty(&self, op_id: OperationId) -> Result<bool, TestError> {
        Ok(self.len(op_id)? == 0)
    }
}
