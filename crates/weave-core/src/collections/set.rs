use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use weave_common::ids::{CollectionId, OperationId};
use weave_common::TestError;

use crate::racecheck::RaceTracker;
use crate::scheduler::Scheduler;

pub struct ControlledSet<T> {
    scheduler: Arc<Scheduler>,
    id: CollectionId,
    items: Mutex<FxHashSet<T>>,
    race: Option<RaceTracker>,
}

impl<T: Eq + Hash> ControlledSet<T> {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        let check = scheduler.config().check_collection_races;
        ControlledSet { scheduler, id: CollectionId::next(), items: Mutex::new(FxHashSet::default()), race: check.then(RaceTracker::new) }
    }

    fn touch(&self, op_id: OperationId, is_write: bool) -> Result<(), TestError> {
        self.scheduler.schedule_point(op_id)?;
        if let Some(race) = &self.race {
            race.record_access(op_id, is_write, self.id)?;
        }
        Ok(())
    }

    pub fn insert(&self, op_id: OperationId, value: T) -> Result<bool, TestError> {
        self.touch(op_id, true)?;
        Ok(self.items.lock().insert(value))
    }

    pub fn remove(&self, op_id: OperationId, value: &T) -> Result<bool, TestError> {
        self.touch(op_id, true)?;
        Ok(self.items.lock().remove(value))
    }

    pub fn contains(&self, op_id: OperationId, value: &T) -> Result<bool, TestError> {
        self.touch(op_id, false)?;
        Ok(self.items.lock().contains(value))
    }

    pub fn len(&self, op_id: OperationId) -> Result<usize, TestError> {
        self.touch(op_id, false)?;
        Ok(self.items.lock().len())
    }
}
