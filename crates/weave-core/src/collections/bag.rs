use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use weave_common::ids::{CollectionId, OperationId};
use weave_common::TestError;

use crate::racecheck::RaceTracker;
use crate::scheduler::Scheduler;

/// Multiset: tracks a count per distinct value rather than a single
/// membership bit, the way `ControlledSet` does.
pub struct ControlledBag<T> {
    scheduler: Arc<Scheduler>,
    id: CollectionId,
    counts: Mutex<FxHashMap<T, usize>>,
    race: Option<RaceTracker>,
}

impl<T: Eq + Hash> ControlledBag<T> {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        let check = scheduler.config().check_collection_races;
        ControlledBag { scheduler, id: CollectionId::next(), counts: Mutex::new(FxHashMap::default()), race: check.then(RaceTracker::new) }
    }

    fn touch(&self, op_id: OperationId, is_write: bool) -> Result<(), TestError> {
        self.scheduler.schedule_point(op_id)?;
        if let Some(race) = &self.race {
            race.record_access(op_id, is_write, self.id)?;
        }
        Ok(())
    }

    pub fn add(&self, op_id: OperationId, value: T) -> Result<(), TestError> {
        self.touch(op_id, true)?;
        *self.counts.lock().entry(value).or_insert(0) += 1;
        Ok(())
    }

    /// Remove one occurrence of `value`. Returns `false` if none remained.
    pub fn remove_one(&self, op_id: OperationId, value: &T) -> Result<bool, TestError> {
        self.touch(op_id, true)?;
        let mut counts = self.counts.lock();
        match counts.get_mut(value) {
            Some(count) if *count > 1 => {
                *count -= 1;
                Ok(true)
            }
            Some(_) => {
                counts.remove(value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn count(&self, op_id: OperationId, value: &T) -> Result<usize, TestError> {
        self.touch(op_id, false)?;
        Ok(self.counts.lock().get(value).copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use weave_strategies::RandomStrategy;

    #[test]
    fn counts_accumulate_and_drain_to_zero() {
        let sched = Arc::new(Scheduler::new(Config::default(), Box::new(RandomStrategy::new(1))));
        let op = sched.register_operation(None, "main");
        let bag = ControlledBag::new(Arc::clone(&sched));
        bag.add(op, "x").unwrap();
        bag.add(op, "x").unwrap();
        assert_eq!(bag.count(op, &"x").unwrap(), 2);
        assert!(bag.remove_one(op, &"x").unwrap());
        assert_eq!(bag.count(op, &"x").unwrap(), 1);
        assert!(bag.remove_one(op, &"x").unwrap());
        assert_eq!(bag.count(op, &"x").unwrap(), 0);
        assert!(!bag.remove_one(op, &"x").unwrap());
    }
}
