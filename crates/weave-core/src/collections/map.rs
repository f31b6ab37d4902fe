use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use weave_common::ids::{CollectionId, OperationId};
use weave_common::TestError;

use crate::racecheck::RaceTracker;
use crate::scheduler::Scheduler;

/// Ordered key/value store (spec "Map"): keys iterate in sorted order,
/// unlike `ControlledDictionary`'s hash-based, unordered one. Useful for
/// programs under test whose correctness depends on deterministic
/// iteration order over a key space.
pub struct ControlledMap<K, V> {
    scheduler: Arc<Scheduler>,
    id: CollectionId,
    entries: Mutex<BTreeMap<K, V>>,
    race: Option<RaceTracker>,
}

impl<K: Ord + Clone, V: Clone> ControlledMap<K, V> {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        let check = scheduler.config().check_collection_races;
        ControlledMap { scheduler, id: CollectionId::next(), entries: Mutex::new(BTreeMap::new()), race: check.then(RaceTracker::new) }
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

    /// Keys in ascending order, as of this call.
    pub fn keys(&self, op_id: OperationId) -> Result<Vec<K>, TestError> {
        self.touch(op_id, false)?;
        Ok(self.entries.lock().keys().cloned().collect())
    }
}
