//! Controlled manual-reset and auto-reset events.

use std::sync::Arc;

use weave_common::ids::{OperationId, ResourceId};
use weave_common::TestError;

use crate::operation::OperationStatus;
use crate::resource::{EventState, Resource};
use crate::scheduler::Scheduler;

enum Kind {
    Manual,
    Auto,
}

/// A signal an operation can wait on. `Manual` events stay signaled until
/// explicitly reset; `Auto` events release exactly one waiter per `set`
/// and reset themselves immediately (spec "ManualResetEvent" /
/// "AutoResetEvent").
pub struct ControlledEvent {
    scheduler: Arc<Scheduler>,
    id: ResourceId,
    kind: Kind,
}

impl ControlledEvent {
    pub fn manual(scheduler: Arc<Scheduler>, initially_signaled: bool) -> Self {
        Self::new(scheduler, initially_signaled, Kind::Manual)
    }

    pub fn auto(scheduler: Arc<Scheduler>, initially_signaled: bool) -> Self {
        Self::new(scheduler, initially_signaled, Kind::Auto)
    }

    fn new(scheduler: Arc<Scheduler>, initially_signaled: bool, kind: Kind) -> Self {
        let state = EventState { signaled: initially_signaled, waiters: Default::default() };
        let resource = match kind {
            Kind::Manual => Resource::ManualResetEvent(state),
            Kind::Auto => Resource::AutoResetEvent(state),
        };
        let id = scheduler.resources().insert(resource);
        ControlledEvent { scheduler, id, kind }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn set(&self, op_id: OperationId) -> Result<(), TestError> {
        let woken = self.scheduler.resources().with(self.id, |r| {
            let state = event_state_mut(r);
            match self.kind {
                Kind::Manual => {
                    state.signaled = true;
                    let all: Vec<OperationId> = state.waiters.drain(..).collect();
                    all
                }
                Kind::Auto => {
                    if let Some(waiter) = state.waiters.pop_front() {
                        vec![waiter]
                    } else {
                        state.signaled = true;
                        Vec::new()
                    }
                }
            }
        });
        for waiter in woken {
            self.scheduler.wake(waiter);
        }
        self.scheduler.schedule_point(op_id)
    }

    pub fn reset(&self, op_id: OperationId) -> Result<(), TestError> {
        self.scheduler.resources().with(self.id, |r| {
            event_state_mut(r).signaled = false;
        });
        self.scheduler.schedule_point(op_id)
    }

    pub fn wait(&self, op_id: OperationId) -> Result<(), TestError> {
        self.scheduler.schedule_point(op_id)?;
        loop {
            let passed = self.scheduler.resources().with(self.id, |r| {
                let state = event_state_mut(r);
                if state.signaled {
                    if matches!(self.kind, Kind::Auto) {
                        state.signaled = false;
                    }
                    true
                } else {
                    if !state.waiters.contains(&op_id) {
                        state.waiters.push_back(op_id);
                    }
                    false
                }
            });
            if passed {
                return self.scheduler.schedule_point(op_id);
            }
            self.scheduler.block_on(op_id, OperationStatus::BlockedOnResource, vec![self.id])?;
        }
    }

    pub fn is_signaled(&self) -> bool {
        self.scheduler.resources().with(self.id, |r| event_state_mut(r).signaled)
    }
}

fn event_state_mut(r: &mut Resource) -> &mut EventState {
    match r {
        Resource::ManualResetEvent(s) | Resource::AutoResetEvent(s) => s,
        _ => unreachable!("resource id did not back an event"),
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
    fn manual_event_stays_signaled_for_every_waiter() {
        let sched = scheduler();
        let op = sched.register_operation(None, "main");
        let ev = ControlledEvent::manual(Arc::clone(&sched), false);
        ev.set(op).unwrap();
        ev.wait(op).unwrap();
        ev.wait(op).unwrap();
        assert!(ev.is_signaled());
    }

    #[test]
    fn auto_event_resets_itself_after_releasing_one_waiter() {
        let sched = scheduler();
        let op = sched.register_operation(None, "main");
        let ev = ControlledEvent::auto(Arc::clone(&sched), false);
        ev.set(op).unwrap();
        ev.wait(op).unwrap();
        assert!(!ev.is_signaled());
    }

    #[test]
    fn ping_pong_between_two_auto_reset_events() {
        use std::thread;

        let sched = scheduler();
        let ping = Arc::new(ControlledEvent::auto(Arc::clone(&sched), true));
        let pong = Arc::new(ControlledEvent::auto(Arc::clone(&sched), false));

        let s1 = Arc::clone(&sched);
        let p1 = Arc::clone(&ping);
        let g1 = Arc::clone(&pong);
        let t1 = thread::spawn(move || {
            let op = s1.register_operation(None, "pinger");
            for _ in 0..5 {
                p1.wait(op).unwrap();
                g1.set(op).unwrap();
            }
            s1.complete(op);
        });

        let s2 = Arc::clone(&sched);
        let p2 = Arc::clone(&ping);
        let g2 = Arc::clone(&pong);
        let t2 = thread::spawn(move || {
            let op = s2.register_operation(None, "ponger");
            for _ in 0..5 {
                g2.wait(op).unwrap();
                p2.set(op).unwrap();
            }
            s2.complete(op);
        });

        t1.join().unwrap();
        t2.join().unwrap();
        assert!(sched.registry().all_completed());
    }
}
