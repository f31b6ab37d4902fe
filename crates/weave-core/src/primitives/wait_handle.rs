//! WaitAll / WaitAny over a set of awaitable resources (task completions,
//! events). Each handle is a `ResourceId` backing a `Resource` whose
//! `waiters` queue this module manages directly, rather than going
//! through `ControlledEvent`/`ControlledTask`'s own wait methods, since
//! WaitAll/WaitAny need to register the same operation against several
//! resources at once and be woken by whichever condition completes.

use std::sync::Arc;

use weave_common::ids::{OperationId, ResourceId};
use weave_common::TestError;

use crate::operation::OperationStatus;
use crate::resource::Resource;
use crate::scheduler::Scheduler;

fn is_ready(resource: &Resource) -> bool {
    match resource {
        Resource::TaskCompletion(s) => s.completed,
        Resource::ManualResetEvent(s) | Resource::AutoResetEvent(s) => s.signaled,
        _ => false,
    }
}

fn register_waiter(resource: &mut Resource, op_id: OperationId) {
    let waiters = resource.waiters_mut();
    if !waiters.contains(&op_id) {
        waiters.push_back(op_id);
    }
}

/// An auto-reset event release is a one-shot grant: consuming it through
/// WaitAll/WaitAny must clear `signaled` the same as `ControlledEvent::wait`
/// does, or the handle would still read ready for the next waiter (spec
/// §4.E "consume each handle atomically").  Manual-reset events and task
/// completions stay as they are.
fn consume_if_auto_event(resource: &mut Resource) {
    if let Resource::AutoResetEvent(state) = resource {
        state.signaled = false;
    }
}

/// Block `op_id` until every handle in `handles` is ready, then consume
/// each of them (resetting any auto-reset event among them).
pub fn wait_all(scheduler: &Arc<Scheduler>, op_id: OperationId, handles: &[ResourceId]) -> Result<(), TestError> {
    scheduler.schedule_point(op_id)?;
    loop {
        let all_ready = handles.iter().all(|h| scheduler.resources().with(*h, is_ready));
        if all_ready {
            for h in handles {
                scheduler.resources().with(*h, consume_if_auto_event);
            }
            return scheduler.schedule_point(op_id);
        }
        for h in handles {
            scheduler.resources().with(*h, |r| register_waiter(r, op_id));
        }
        scheduler.block_on(op_id, OperationStatus::BlockedOnWaitAll, handles.to_vec())?;
    }
}

/// Block `op_id` until at least one handle in `handles` is ready; consumes
/// only that one handle and returns its index.
pub fn wait_any(scheduler: &Arc<Scheduler>, op_id: OperationId, handles: &[ResourceId]) -> Result<usize, TestError> {
    scheduler.schedule_point(op_id)?;
    loop {
        if let Some(idx) = handles.iter().position(|h| scheduler.resources().with(*h, is_ready)) {
            scheduler.resources().with(handles[idx], consume_if_auto_event);
            scheduler.schedule_point(op_id)?;
            return Ok(idx);
        }
        for h in handles {
            scheduler.resources().with(*h, |r| register_waiter(r, op_id));
        }
        scheduler.block_on(op_id, OperationStatus::BlockedOnWaitAny, handles.to_vec())?;
    }
}
