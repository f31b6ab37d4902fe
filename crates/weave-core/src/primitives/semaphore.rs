//! Controlled counting semaphore.

use std::sync::Arc;

use weave_common::ids::{OperationId, ResourceId};
use weave_common::TestError;

use crate::operation::OperationStatus;
use crate::resource::{Resource, SemaphoreState};
use crate::scheduler::Scheduler;

pub struct ControlledSemaphore {
    scheduler: Arc<Scheduler>,
    id: ResourceId,
}

impl ControlledSemaphore {
    pub fn new(scheduler: Arc<Scheduler>, initial: u32, max: u32) -> Self {
        let id = scheduler
            .resources()
            .insert(Resource::Semaphore(SemaphoreState { count: initial.min(max), max, waiters: Default::default() }));
        ControlledSemaphore { scheduler, id }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn acquire(&self, op_id: OperationId) -> Result<(), TestError> {
        self.scheduler.schedule_point(op_id)?;
        loop {
            let acquired = self.scheduler.resources().with(self.id, |r| {
                let Resource::Semaphore(state) = r else { unreachable!() };
                if state.count > 0 {
                    state.count -= 1;
                    true
                } else {
                    if !state.waiters.contains(&op_id) {
                        state.waiters.push_back(op_id);
                    }
                    false
                }
            });
            if acquired {
                return self.scheduler.schedule_point(op_id);
            }
            self.scheduler.block_on(op_id, OperationStatus::BlockedOnResource, vec![self.id])?;
        }
    }

    pub fn release(&self, op_id: OperationId) -> Result<(), TestError> {
        let woken = self.scheduler.resources().with(self.id, |r| {
            let Resource::Semaphore(state) = r else { unreachable!() };
            if state.count >= state.max && state.waiters.is_empty() {
                return Err(TestError::misuse("semaphore released past its max count"));
            }
            match state.waiters.pop_front() {
                Some(waiter) => Ok(Some(waiter)),
                None => {
                    state.count += 1;
                    Ok(None)
                }
            }
        })?;

        if let Some(waiter) = woken {
            self.scheduler.wake(waiter);
        }
        self.scheduler.schedule_point(op_id)
    }

    pub fn available(&self) -> u32 {
        self.scheduler.resources().with(self.id, |r| {
            let Resource::Semaphore(state) = r else { unreachable!() };
            state.count
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
    fn acquire_drains_and_release_refills_the_count() {
        let sched = scheduler();
        let op = sched.register_operation(None, "main");
        let sem = ControlledSemaphore::new(Arc::clone(&sched), 2, 2);
        sem.acquire(op).unwrap();
        assert_eq!(sem.available(), 1);
        sem.acquire(op).unwrap();
        assert_eq!(sem.available(), 0);
        sem.release(op).unwrap();
        assert_eq!(sem.available(), 1);
    }

    #[test]
    fn releasing_past_max_with_no_waiters_is_a_misuse_error() {
        let sched = scheduler();
        let op = sched.register_operation(None, "main");
        let sem = ControlledSemaphore::new(Arc::clone(&sched), 1, 1);
        let err = sem.release(op).unwrap_err();
        assert!(matches!(err, TestError::MisuseError { .. }));
    }

    #[test]
    fn three_tasks_run_under_a_three_permit_semaphore() {
        use std::thread;

        let sched = scheduler();
        let sem = Arc::new(ControlledSemaphore::new(Arc::clone(&sched), 3, 3));
        let handles: Vec<_> = (0..3)
            .map(|i| {
                let s = Arc::clone(&sched);
                let sm = Arc::clone(&sem);
                thread::spawn(move || {
                    let op = s.register_operation(None, format!("worker-{i}"));
                    sm.acquire(op).unwrap();
                    sm.release(op).unwrap();
                    s.complete(op);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(sem.available(), 3);
        assert!(sched.registry().all_completed());
    }
}
