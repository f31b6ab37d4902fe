//! Controlled, possibly-reentrant mutual exclusion (spec §3 "Resource").

use std::sync::Arc;

use weave_common::ids::{OperationId, ResourceId};
use weave_common::TestError;

use crate::operation::OperationStatus;
use crate::resource::{MutexState, Resource};
use crate::scheduler::Scheduler;

/// A mutex whose acquire/release pair is mediated by the scheduler: a
/// contended `lock` blocks the calling operation and hands control
/// elsewhere instead of blocking the host thread's OS mutex.
pub struct ControlledMutex {
    scheduler: Arc<Scheduler>,
    id: ResourceId,
    reentrant: bool,
}

impl ControlledMutex {
    pub fn new(scheduler: Arc<Scheduler>, reentrant: bool) -> Self {
        let id = scheduler.resources().insert(Resource::Mutex(MutexState::default()));
        ControlledMutex { scheduler, id, reentrant }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn lock(&self, op_id: OperationId) -> Result<(), TestError> {
        self.scheduler.schedule_point(op_id)?;
        loop {
            let acquired = self.scheduler.resources().with(self.id, |r| {
                let Resource::Mutex(state) = r else { unreachable!() };
                match state.owner {
                    None => {
                        state.owner = Some(op_id);
                        state.reentries = 1;
                        true
                    }
                    Some(owner) if owner == op_id && self.reentrant => {
                        state.reentries += 1;
                        true
                    }
                    Some(_) => {
                        if !state.waiters.contains(&op_id) {
                            state.waiters.push_back(op_id);
                        }
                        false
                    }
                }
            });

            if acquired {
                return self.scheduler.schedule_point(op_id);
            }

            self.scheduler.block_on(op_id, OperationStatus::BlockedOnResource, vec![self.id])?;
        }
    }

    pub fn unlock(&self, op_id: OperationId) -> Result<(), TestError> {
        let next_waiter = self.scheduler.resources().with(self.id, |r| {
            let Resource::Mutex(state) = r else { unreachable!() };
            if state.owner != Some(op_id) {
                return Err(TestError::misuse("unlock called by an operation that does not own the mutex"));
            }
            state.reentries -= 1;
            if state.reentries > 0 {
                return Ok(None);
            }
            state.owner = None;
            Ok(state.waiters.pop_front())
        })?;

        if let Some(waiter) = next_waiter {
            self.scheduler.resources().with(self.id, |r| {
                let Resource::Mutex(state) = r else { unreachable!() };
                state.owner = Some(waiter);
                state.reentries = 1;
            });
            self.scheduler.wake(waiter);
        }

        self.scheduler.schedule_point(op_id)
    }

    pub fn is_locked(&self) -> bool {
        self.scheduler.resources().with(self.id, |r| {
            let Resource::Mutex(state) = r else { unreachable!() };
            state.owner.is_some()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use weave_strategies::RandomStrategy;

    fn scheduler() -> Arc<Scheduler> {
        Arc::new(Scheduler::new(Config::default(), Box::new(RandomStrategy::new(1))))
    }

    #[test]
    fn uncontended_lock_and_unlock_round_trips() {
        let sched = scheduler();
        let op = sched.register_operation(None, "main");
        sched.schedule_point(op).unwrap();
        let m = ControlledMutex::new(Arc::clone(&sched), false);
        m.lock(op).unwrap();
        assert!(m.is_locked());
        m.unlock(op).unwrap();
        assert!(!m.is_locked());
    }

    #[test]
    fn reentrant_mutex_allows_nested_acquisition_by_the_owner() {
        let sched = scheduler();
        let op = sched.register_operation(None, "main");
        sched.schedule_point(op).unwrap();
        let m = ControlledMutex::new(Arc::clone(&sched), true);
        m.lock(op).unwrap();
        m.lock(op).unwrap();
        m.unlock(op).unwrap();
        assert!(m.is_locked());
        m.unlock(op).unwrap();
        assert!(!m.is_locked());
    }

    #[test]
    fn unlock_by_a_non_owner_is_a_misuse_error() {
        let sched = scheduler();
        let op = sched.register_operation(None, "main");
        let other = OperationId::next();
        sched.schedule_point(op).unwrap();
        let m = ControlledMutex::new(Arc::clone(&sched), false);
        m.lock(op).unwrap();
        let err = m.unlock(other).unwrap_err();
        assert!(matches!(err, TestError::MisuseError { .. }));
    }

    #[test]
    fn a_second_operation_acquires_after_the_first_releases() {
        use std::thread;

        let sched = scheduler();
        let a = sched.register_operation(None, "a");
        let b = sched.register_operation(None, "b");
        sched.schedule_point(a).unwrap();
        let mutex = Arc::new(ControlledMutex::new(Arc::clone(&sched), false));

        mutex.lock(a).unwrap();

        let sb = Arc::clone(&sched);
        let mb = Arc::clone(&mutex);
        let tb = thread::spawn(move || {
            mb.lock(b).unwrap();
            sb.complete(b);
        });

        // give b a chance to actually park on the mutex
        std::thread::sleep(std::time::Duration::from_millis(5));
        mutex.unlock(a).unwrap();
        sched.complete(a);

        tb.join().unwrap();
        assert!(sched.registry().all_completed());
    }
}
