//! [MODULE G] Virtual timer service.
//!
//! Real wall-clock delays would make a run's outcome depend on host
//! scheduling noise, so a timer here never actually sleeps: its
//! background operation keeps yielding at scheduling points and, on each
//! turn, asks the run's strategy for a fresh coin flip (the same seeded
//! stream every other nondeterministic choice comes from) on whether the
//! timer has elapsed. This keeps the operation `Enabled` throughout
//! rather than `Blocked`, so a timer pending forever never registers as
//! a deadlock -- only an actual absence of progress does (spec
//! "TimerElapsed", "DefaultTimeout").
//!
//! `start_one_shot`/`start_periodic` fire into an actor's inbox, which is
//! a `weave-actors` concept this crate never depends on -- the same
//! one-way seam `LivenessProbe` draws for liveness: callers hand in an
//! `Arc<dyn TimerSink>` and the service calls back through it rather than
//! knowing what an actor or an inbox is.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use weave_common::ids::{ActorId, OperationId, TimerId};
use weave_common::TestError;

use crate::primitives::ControlledTask;
use crate::scheduler::Scheduler;

/// Where a timer delivers its elapsed notification. Implemented by
/// `weave-actors`' runtime, mirroring `LivenessProbe`.
pub trait TimerSink: Send + Sync {
    fn deliver_timer_elapsed(&self, actor: ActorId, timer_id: TimerId);
}

pub struct TimerService {
    scheduler: Arc<Scheduler>,
    stopped: Arc<Mutex<HashSet<TimerId>>>,
    tasks: Mutex<Vec<ControlledTask<()>>>,
}

impl TimerService {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        TimerService { scheduler, stopped: Arc::new(Mutex::new(HashSet::default())), tasks: Mutex::new(Vec::new()) }
    }

    /// Block `op_id` at scheduling points until a virtual timer with the
    /// given (informational) delay elapses. Negative delays are a misuse
    /// error -- there is no such thing as a timer that fires before it
    /// was started.
    pub fn delay(&self, op_id: OperationId, delay_ticks: i64) -> Result<TimerId, TestError> {
        if delay_ticks < 0 {
            return Err(TestError::misuse("negative timer delay"));
        }
        let timer_id = TimerId::next();
        loop {
            self.scheduler.schedule_point(op_id)?;
            if self.scheduler.strategy_next_bool() {
                return Ok(timer_id);
            }
        }
    }

    /// A timeout that races against some other event: fires the first
    /// time `poll_ready` reports true, or nondeterministically on its
    /// own, whichever the strategy picks first (spec "DefaultTimeout").
    pub fn delay_or<F>(&self, op_id: OperationId, mut poll_ready: F) -> Result<bool, TestError>
    where
        F: FnMut() -> bool,
    {
        loop {
            self.scheduler.schedule_point(op_id)?;
            if poll_ready() {
                return Ok(false);
            }
            if self.scheduler.strategy_next_bool() {
                return Ok(true);
            }
        }
    }

    /// Arm a one-shot timer: delivers exactly one `TimerElapsed` to
    /// `actor` and then retires (spec §4.G `start_one_shot`).
    pub fn start_one_shot(&self, sink: Arc<dyn TimerSink>, actor: ActorId, delay_ticks: i64) -> Result<TimerId, TestError> {
        self.arm(sink, actor, delay_ticks, None)
    }

    /// Arm a periodic timer: delivers a `TimerElapsed` to `actor` and
    /// re-arms itself every `period_ticks` until `stop`ped (spec §4.G
    /// `start_periodic`).
    pub fn start_periodic(&self, sink: Arc<dyn TimerSink>, actor: ActorId, due_ticks: i64, period_ticks: i64) -> Result<TimerId, TestError> {
        if period_ticks < 0 {
            return Err(TestError::misuse("negative timer period"));
        }
        self.arm(sink, actor, due_ticks, Some(period_ticks))
    }

    /// Cancel a timer. A delivery already past its coin flip when `stop`
    /// is called still lands once -- cancellation is only checked between
    /// scheduling points -- but no delivery happens after that (spec
    /// §4.G `stop`).
    pub fn stop(&self, timer_id: TimerId) {
        self.stopped.lock().insert(timer_id);
    }

    /// The completion handle of every timer armed so far, for callers
    /// (e.g. `ActorRuntime::join_all`) that want to wait on timers
    /// alongside other controlled work.
    pub fn completion_resources(&self) -> Vec<weave_common::ids::ResourceId> {
        self.tasks.lock().iter().map(|t| t.completion_resource()).collect()
    }

    /// Block `caller` until every timer armed so far has retired (one-shot
    /// fired, or periodic stopped). Mirrors `ActorRuntime::join_all`.
    pub fn join_all(&self, caller: OperationId) -> Result<(), TestError> {
        crate::primitives::wait_handle::wait_all(&self.scheduler, caller, &self.completion_resources())
    }

    fn arm(&self, sink: Arc<dyn TimerSink>, actor: ActorId, first_delay: i64, period: Option<i64>) -> Result<TimerId, TestError> {
        if first_delay < 0 {
            return Err(TestError::misuse("negative timer delay"));
        }
        let timer_id = TimerId::next();
        let stopped = Arc::clone(&self.stopped);
        let sched = Arc::clone(&self.scheduler);
        let task = ControlledTask::spawn(&self.scheduler, "timer", move |op_id| {
            run_timer_loop(&sched, op_id, &stopped, timer_id, &*sink, actor, period)
        });
        self.tasks.lock().push(task);
        Ok(timer_id)
    }
}

/// The background operation body for one armed timer: coin-flip-wait,
/// deliver, and for a periodic timer loop back around, until either
/// `stop` marks the timer cancelled or (one-shot) the single delivery is
/// done. Runs on its own controlled operation so its scheduling points
/// interleave with everything else in the run.
fn run_timer_loop(
    sched: &Arc<Scheduler>,
    op_id: OperationId,
    stopped: &Mutex<HashSet<TimerId>>,
    timer_id: TimerId,
    sink: &dyn TimerSink,
    actor: ActorId,
    period: Option<i64>,
) {
    loop {
        loop {
            if sched.schedule_point(op_id).is_err() || stopped.lock().contains(&timer_id) {
                return;
            }
            if sched.strategy_next_bool() {
                break;
            }
        }
        sink.deliver_timer_elapsed(actor, timer_id);
        if period.is_none() || stopped.lock().contains(&timer_id) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use weave_strategies::RandomStrategy;

    struct RecordingSink {
        deliveries: Mutex<Vec<(ActorId, TimerId)>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(RecordingSink { deliveries: Mutex::new(Vec::new()) })
        }
    }

    impl TimerSink for RecordingSink {
        fn deliver_timer_elapsed(&self, actor: ActorId, timer_id: TimerId) {
            self.deliveries.lock().push((actor, timer_id));
        }
    }

    fn scheduler() -> Arc<Scheduler> {
        Arc::new(Scheduler::new(Config::default(), Box::new(RandomStrategy::new(1))))
    }

    #[test]
    fn one_shot_timer_delivers_exactly_once() {
        let sched = scheduler();
        let timers = TimerService::new(Arc::clone(&sched));
        let sink = RecordingSink::new();
        let actor = ActorId::next();
        let target_sink: Arc<dyn TimerSink> = Arc::clone(&sink);
        let timer_id = timers.start_one_shot(target_sink, actor, 3).unwrap();

        let caller = sched.register_operation(None, "caller");
        sched.schedule_point(caller).unwrap();
        timers.join_all(caller).unwrap();

        let deliveries = sink.deliveries.lock();
        assert_eq!(*deliveries, vec![(actor, timer_id)]);
    }

    #[test]
    fn periodic_timer_stops_delivering_once_stopped() {
        let sched = scheduler();
        let timers = TimerService::new(Arc::clone(&sched));
        let sink = RecordingSink::new();
        let actor = ActorId::next();
        let target_sink: Arc<dyn TimerSink> = Arc::clone(&sink);
        let timer_id = timers.start_periodic(target_sink, actor, 0, 1).unwrap();

        // Let a handful of deliveries land, then cancel; the background
        // operation notices `stopped` right after its next delivery and
        // retires instead of re-arming again.
        let spinner = sched.register_operation(None, "spinner");
        loop {
            sched.schedule_point(spinner).unwrap();
            if sink.deliveries.lock().len() >= 3 {
                break;
            }
        }
        sched.complete(spinner);
        timers.stop(timer_id);

        let caller = sched.register_operation(None, "caller");
        sched.schedule_point(caller).unwrap();
        timers.join_all(caller).unwrap();

        let delivered = sink.deliveries.lock().len();
        assert!(delivered >= 3, "expected at least the deliveries observed before stop, got {delivered}");
        assert!(sink.deliveries.lock().iter().all(|(a, t)| *a == actor && *t == timer_id));
    }

    #[test]
    fn negative_delay_is_a_misuse_error() {
        let sched = Arc::new(Scheduler::new(Config::default(), Box::new(RandomStrategy::new(1))));
        let op = sched.register_operation(None, "main");
        let timers = TimerService::new(Arc::clone(&sched));
        let err = timers.delay(op, -1).unwrap_err();
        assert!(matches!(err, TestError::MisuseError { .. }));
    }

    #[test]
    fn a_positive_delay_eventually_elapses() {
        let sched = Arc::new(Scheduler::new(Config::default(), Box::new(RandomStrategy::new(1))));
        let op = sched.register_operation(None, "main");
        let timers = TimerService::new(Arc::clone(&sched));
        assert!(timers.delay(op, 5).is_ok());
    }

    #[test]
    fn delay_or_stops_as_soon_as_the_condition_is_ready() {
        let sched = Arc::new(Scheduler::new(Config::default(), Box::new(RandomStrategy::new(1))));
        let op = sched.register_operation(None, "main");
        let timers = TimerService::new(Arc::clone(&sched));
        let mut calls = 0;
        let timed_out = timers
            .delay_or(op, || {
                calls += 1;
                calls >= 3
            })
            .unwrap();
        assert!(!timed_out);
        assert_eq!(calls, 3);
    }
}
