use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use weave_common::ids::{CollectionId, OperationId};
use weave_common::TestError;

use crate::racecheck::RaceTracker;
use crate::scheduler::Scheduler;

/// Hash-based key/value store (spec "Dictionary"). Unordered iteration,
/// O(1) average lookup -- the counterpart to `ControlledMap`'s ordered,
/// comparison-based key space.
pub struct ControlledDictionary<K, V> {
    scheduler: Arc<Scheduler>,
    id: CollectionId,
    entries: Mutex<FxHashMap<K, V>>,
    race: Option<RaceTracker>,
}

impl<K: Eq + Hash + Clone, V: Clone> ControlledDictionary<K, V> {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        let check = scheduler.config().check_collection_races;
        ControlledDictionary { scheduler, id: CollectionId::next(), entries: Mutex::new(FxHashMap::default()), race: check.then(RaceTracker::new) }
    }

    fn touch(&self, op_id: OperationId, is_write: bool) -> Result<(), TestError> {
        self.scheduler.schedule_point(op_id)?;
        if let Some(race) = &self.race {
            race.record_access(op_id, is_write, self.id)?;
        }
        Ok(())
    }

    pub fn insert(&self, op_id: OperationId, key: K, value: V) -> Result<Option<V>, TestError> {
        self.touch(op_id, true)?;
        Ok(self.entries.lock().insert(key, value))
    }

    pub fn get(&self, op_id: OperationId, key: &K) -> Result<Option<V>, TestError> {
        self.touch(op_id, false)?;
        Ok(self.entries.lock().get(key).cloned())
    }

    pub fn remove(&self, op_id: OperationId, key: &K) -> Result<Option<V>, TestError> {
        self.touch(op_id, true)?;
        Ok(self.entries.lock().remove(key))
    }

    pub fn len(&self, op_id: OperationId) -> Result<usize, TestError> {
        self.touch(op_id, false)?;
        Ok(self.entries.lock().len())
    }
}
