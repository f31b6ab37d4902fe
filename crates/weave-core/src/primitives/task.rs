//! Controlled task: a unit of work run on its own host thread as a
//! controlled operation, with a `TaskCompletion` resource standing in for
//! its join handle (spec Design Notes: "a `ControlledTask`/continuation
//! abstraction sits between the raw operation registry and user code").

use std::sync::Arc;
use std::thread::JoinHandle;

use weave_common::ids::{OperationId, ResourceId};
use weave_common::TestError;

use crate::primitives::wait_handle;
use crate::resource::{CompletionState, Resource};
use crate::scheduler::Scheduler;

pub struct ControlledTask<T> {
    op_id: OperationId,
    completion: ResourceId,
    handle: JoinHandle<Result<T, TestError>>,
}

impl<T: Send + 'static> ControlledTask<T> {
    pub fn spawn<F>(scheduler: &Arc<Scheduler>, name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(OperationId) -> T + Send + 'static,
    {
        let op_id = scheduler.register_operation(None, name);
        let completion = scheduler.resources().insert(Resource::TaskCompletion(CompletionState::default()));

        let sched = Arc::clone(scheduler);
        let handle = std::thread::spawn(move || {
            let result = sched.run_controlled(op_id, || body(op_id));
            sched.resources().with(completion, |r| {
                if let Resource::TaskCompletion(state) = r {
                    state.completed = true;
                }
            });
            let waiters = sched.resources().with(completion, |r| {
                if let Resource::TaskCompletion(state) = r {
                    state.waiters.drain(..).collect::<Vec<_>>()
                } else {
                    Vec::new()
                }
            });
            for w in waiters {
                sched.wake(w);
            }
            sched.complete(op_id);
            result
        });

        ControlledTask { op_id, completion, handle }
    }

    pub fn completion_resource(&self) -> ResourceId {
        self.completion
    }

    /// Block the calling operation until this task finishes, then return
    /// its result (or propagate its panic/failure).
    pub fn join(self, scheduler: &Arc<Scheduler>, caller: OperationId) -> Result<T, TestError> {
        wait_handle::wait_all(scheduler, caller, &[self.completion])?;
        self.handle.join().unwrap_or_else(|_| Err(TestError::internal("controlled task thread panicked joining")))
    }

    pub fn operation_id(&self) -> OperationId {
        self.op_id
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
    fn a_spawned_task_can_be_joined_for_its_result() {
        let sched = scheduler();
        let caller = sched.register_operation(None, "caller");
        sched.schedule_point(caller).unwrap();

        let task = ControlledTask::spawn(&sched, "worker", |_op| 41 + 1);
        let result = task.join(&sched, caller).unwrap();
        assert_eq!(result, 42);
        sched.complete(caller);
    }

    #[test]
    fn a_panicking_task_surfaces_as_an_assertion_failure() {
        let sched = scheduler();
        let caller = sched.register_operation(None, "caller");
        sched.schedule_point(caller).unwrap();

        let task = ControlledTask::spawn(&sched, "worker", |_op| -> i32 { panic!("boom") });
        let err = task.join(&sched, caller).unwrap_err();
        assert!(matches!(err, TestError::AssertionFailure { .. }));
    }
}
