//! Controlled interlocked (atomic) operations.
//!
//! A real `Interlocked`/`Atomic*` field is lock-free -- callers don't
//! acquire anything before touching it, which is exactly the access
//! pattern the race checker is for. `ControlledAtomic64` routes every
//! access through a scheduling point (so interleavings around it are
//! explored) and, when `Config::check_atomic_races` is set, through the
//! same `RaceTracker` the controlled collections use.

use std::sync::Arc;

use weave_common::ids::{CollectionId, OperationId};
use weave_common::TestError;
use parking_lot::Mutex as PlMutex;

use crate::racecheck::RaceTracker;
use crate::scheduler::Scheduler;

pub struct ControlledAtomic64 {
    scheduler: Arc<Scheduler>,
    value: PlMutex<i64>,
    race: Option<RaceTracker>,
    collection_id: CollectionId,
}

impl ControlledAtomic64 {
    pub fn new(scheduler: Arc<Scheduler>, initial: i64) -> Self {
        let check = scheduler.config().check_atomic_races;
        ControlledAtomic64 {
            scheduler,
            value: PlMutex::new(initial),
            race: check.then(RaceTracker::new),
            collection_id: CollectionId::next(),
        }
    }

    fn touch(&self, op_id: OperationId, is_write: bool) -> Result<(), TestError> {
        self.scheduler.schedule_point(op_id)?;
        if let Some(race) = &self.race {
            race.record_access(op_id, is_write, self.collection_id)?;
        }
        Ok(())
    }

    pub fn load(&self, op_id: OperationId) -> Result<i64, TestError> {
        self.touch(op_id, false)?;
        Ok(*self.value.lock())
    }

    pub fn store(&self, op_id: OperationId, v: i64) -> Result<(), TestError> {
        self.touch(op_id, true)?;
        *self.value.lock() = v;
        Ok(())
    }

    pub fn fetch_add(&self, op_id: OperationId, delta: i64) -> Result<i64, TestError> {
        self.touch(op_id, true)?;
        let mut guard = self.value.lock();
        let old = *guard;
        *guard = old.wrapping_add(delta);
        Ok(old)
    }

    /// `Interlocked::Exchange`: unconditionally store `new`, returning the
    /// prior value.
    pub fn swap(&self, op_id: OperationId, new: i64) -> Result<i64, TestError> {
        self.touch(op_id, true)?;
        let mut guard = self.value.lock();
        let old = *guard;
        *guard = new;
        Ok(old)
    }

    pub fn fetch_and(&self, op_id: OperationId, mask: i64) -> Result<i64, TestError> {
        self.touch(op_id, true)?;
        let mut guard = self.value.lock();
        let old = *guard;
        *guard = old & mask;
        Ok(old)
    }

    pub fn fetch_or(&self, op_id: OperationId, mask: i64) -> Result<i64, TestError> {
        self.touch(op_id, true)?;
        let mut guard = self.value.lock();
        let old = *guard;
        *guard = old | mask;
        Ok(old)
    }

    /// A failed compare-exchange performed no store, so it is recorded as
    /// a read for race-checking purposes -- otherwise a correctly
    /// synchronized CAS retry loop contended by two threads would flag a
    /// false-positive race on every losing attempt.
    pub fn compare_exchange(&self, op_id: OperationId, expected: i64, new: i64) -> Result<Result<i64, i64>, TestError> {
        self.scheduler.schedule_point(op_id)?;
        let mut guard = self.value.lock();
        let result = if *guard == expected {
            *guard = new;
            Ok(expected)
        } else {
            Err(*guard)
        };
        let succeeded = result.is_ok();
        drop(guard);
        if let Some(race) = &self.race {
            race.record_access(op_id, succeeded, self.collection_id)?;
        }
        Ok(result)
    }
}
