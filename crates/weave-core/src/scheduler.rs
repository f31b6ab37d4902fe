//! [MODULE C] Scheduler.
//!
//! The cooperative core. Every controlled operation gets its own host
//! thread, but a single `Mutex<SchedulerState>` plus a `Condvar` per
//! operation serialize them: only the operation named by
//! `SchedulerState::current` is allowed to be off doing work, and every
//! other controlled thread is parked in `Condvar::wait_while` on its own
//! condvar (spec §4.C). A controlled primitive calls `schedule_point`
//! at every point its real-world counterpart would yield -- lock
//! acquisition, a blocking wait, a send, a delay -- and the strategy in
//! `weave-strategies` decides who gets to run next.
//!
//! This mirrors the teacher's own split of concerns -- a `ProcessTable`
//! behind one lock, per-`Process` state behind another, a `Mailbox`
//! behind a third -- rather than one monolithic struct; here the turn-
//! taking token (`SchedulerState`), the operation registry, and the
//! resource table each keep their own lock, and `schedule_point` is the
//! only place all three get touched together.

use std::panic::{self, AssertUnwindSafe};

use parking_lot::{Condvar, Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use weave_common::ids::{MachineId, OperationId, StateId};
use weave_common::TestError;
use weave_strategies::Strategy;

use crate::config::Config;
use crate::deadlock;
use crate::operation::{OperationRegistry, OperationStatus};
use crate::resource::ResourceTable;

/// Queried by the scheduler when the fair step bound is hit and at the
/// end of a fair iteration, to ask whether any specification monitor is
/// still in a hot state (spec §7 "LivenessViolation"). Implemented by
/// `weave-actors`'s monitor runtime; kept as a trait here so `weave-core`
/// never has to depend on the actor/state-machine layer above it.
pub trait LivenessProbe: Send {
    fn hot_states(&self) -> Vec<(MachineId, StateId, String)>;
}

enum Decision {
    Run(OperationId),
    /// Nothing left to schedule -- every operation has either completed
    /// or the fair step bound was hit with no outstanding hot monitor.
    Finished,
}

struct SchedulerState {
    current: Option<OperationId>,
    fair_steps: u64,
    unfair_steps: u64,
    frozen: Option<TestError>,
}

pub struct Scheduler {
    registry: OperationRegistry,
    resources: ResourceTable,
    state: Mutex<SchedulerState>,
    conds: RwLock<FxHashMap<OperationId, Condvar>>,
    strategy: Mutex<Box<dyn Strategy>>,
    liveness_probe: Mutex<Option<Box<dyn LivenessProbe>>>,
    config: Config,
}

impl Scheduler {
    pub fn new(config: Config, strategy: Box<dyn Strategy>) -> Self {
        Scheduler {
            registry: OperationRegistry::new(),
            resources: ResourceTable::new(),
            state: Mutex::new(SchedulerState { current: None, fair_steps: 0, unfair_steps: 0, frozen: None }),
            conds: RwLock::new(FxHashMap::default()),
            strategy: Mutex::new(strategy),
            liveness_probe: Mutex::new(None),
            config,
        }
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_liveness_probe(&self, probe: Box<dyn LivenessProbe>) {
        *self.liveness_probe.lock() = Some(probe);
    }

    /// Whether this run's strategy actually serializes operations, or
    /// lets them run concurrently and only injects delays (fuzzing).
    pub fn serializes(&self) -> bool {
        self.strategy.lock().serializes()
    }

    /// A single nondeterministic boolean draw from the run's strategy,
    /// exposed for controlled primitives (the timer service's "has this
    /// delay elapsed yet" coin flip) that need a scheduler-seeded choice
    /// without going through a full scheduling decision.
    pub fn strategy_next_bool(&self) -> bool {
        self.strategy.lock().next_bool()
    }

    /// A single nondeterministic integer draw in `[0, max)`, exposed the
    /// same way as `strategy_next_bool` for user-facing "random choice"
    /// calls (actor/monitor code, not scheduling decisions themselves).
    pub fn strategy_next_int(&self, max: u64) -> u64 {
        self.strategy.lock().next_int(max)
    }

    /// Register a controlled operation and give it a condvar to park on.
    /// May be called before the operation's own host thread starts
    /// running -- status stays `None` (excluded from scheduling
    /// decisions) until that thread makes its first `schedule_point`
    /// call, which is the only thing allowed to flip it to `Enabled`.
    /// This avoids a window where another operation's decision could pick
    /// an operation whose thread isn't alive yet to honor it.
    pub fn register_operation(&self, parent: Option<OperationId>, name: impl Into<String>) -> OperationId {
        let id = self.registry.create(parent, name);
        self.conds.write().insert(id, Condvar::new());
        debug!(operation = %id, "registered controlled operation");
        id
    }

    /// Block `op_id` with the given status/dependencies and hand control
    /// to the scheduler. Returns once some other call flips `op_id` back
    /// to `Enabled` and the strategy picks it.
    pub fn block_on(
        &self,
        op_id: OperationId,
        status: OperationStatus,
        dependencies: Vec<weave_common::ids::ResourceId>,
    ) -> Result<(), TestError> {
        self.registry.set_status(op_id, status);
        self.registry.set_dependencies(op_id, dependencies);
        self.schedule_point(op_id)
    }

    /// Flip `op_id` back to `Enabled` (its wait condition was satisfied)
    /// without itself yielding control. The caller is expected to follow
    /// up with its own `schedule_point` call.
    pub fn wake(&self, op_id: OperationId) {
        self.registry.set_status(op_id, OperationStatus::Enabled);
        self.registry.set_dependencies(op_id, Vec::new());
    }

    /// Mark `op_id` finished and hand control to whoever the strategy
    /// picks next. Does not park the caller -- a completed operation has
    /// nothing left to wait for.
    pub fn complete(&self, op_id: OperationId) {
        self.registry.set_status(op_id, OperationStatus::Completed);
        self.registry.set_dependencies(op_id, Vec::new());
        let _ = self.decide_and_notify(op_id);
    }

    /// The one choke point every controlled primitive routes through.
    /// Blocks until `op_id` is chosen to run again, or returns the
    /// iteration's bug if one was observed while waiting.
    pub fn schedule_point(&self, op_id: OperationId) -> Result<(), TestError> {
        if self.registry.status(op_id) == Some(OperationStatus::None) {
            self.registry.set_status(op_id, OperationStatus::Enabled);
        }

        if !self.serializes() {
            // Fuzzing: no turn-taking, just a short random perturbation.
            let delay = self.strategy.lock().fuzz_delay();
            if let Some(delay) = delay {
                std::thread::sleep(delay);
            }
            return Ok(());
        }

        match self.decide_and_notify(op_id)? {
            Decision::Finished => Ok(()),
            Decision::Run(chosen) if chosen == op_id => Ok(()),
            Decision::Run(_) => {
                let conds = self.conds.read();
                let cond = conds.get(&op_id).expect("operation has no condvar registered");
                let mut guard = self.state.lock();
                cond.wait_while(&mut guard, |s| s.current != Some(op_id) && s.frozen.is_none());
                let frozen = guard.frozen.clone();
                drop(guard);
                match frozen {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }
        }
    }

    fn decide_and_notify(&self, op_id: OperationId) -> Result<Decision, TestError> {
        let mut guard = self.state.lock();
        if let Some(err) = &guard.frozen {
            return Err(err.clone());
        }

        let enabled = self.registry.enabled();
        if enabled.is_empty() {
            let blocked = self.registry.blocked();
            if blocked.is_empty() {
                return Ok(Decision::Finished);
            }
            let err = deadlock::detect(&self.registry);
            warn!(error = %err, "deadlock detected");
            guard.frozen = Some(err.clone());
            drop(guard);
            self.wake_everyone();
            return Err(err);
        }

        guard.unfair_steps += 1;
        if enabled.len() > 1 {
            guard.fair_steps += 1;
        }

        if guard.unfair_steps > self.config.unfair_step_bound {
            let err = TestError::internal("unfair scheduling step bound exceeded");
            guard.frozen = Some(err.clone());
            drop(guard);
            self.wake_everyone();
            return Err(err);
        }

        if guard.fair_steps > self.config.fair_step_bound {
            if let Some(probe) = self.liveness_probe.lock().as_ref() {
                let hot = probe.hot_states();
                if !hot.is_empty() && self.strategy.lock().is_fair() {
                    let (machine, state, state_name) = hot[0].clone();
                    let err = TestError::LivenessViolation { machine, state, state_name };
                    guard.frozen = Some(err.clone());
                    drop(guard);
                    self.wake_everyone();
                    return Err(err);
                }
            }
            return Ok(Decision::Finished);
        }

        let idx = self.strategy.lock().next_choice(&enabled);
        let chosen = enabled[idx.min(enabled.len() - 1)];
        trace!(operation = %chosen, candidates = enabled.len(), "scheduling decision");
        guard.current = Some(chosen);

        if chosen != op_id {
            if let Some(cond) = self.conds.read().get(&chosen) {
                cond.notify_one();
            }
        }

        Ok(Decision::Run(chosen))
    }

    fn wake_everyone(&self) {
        for cond in self.conds.read().values() {
            cond.notify_all();
        }
    }

    /// Run a controlled operation's body, converting an unwinding panic
    /// into an `AssertionFailure` and freezing the iteration on it,
    /// rather than letting the panic take down the whole process.
    pub fn run_controlled<F, R>(&self, op_id: OperationId, body: F) -> Result<R, TestError>
    where
        F: FnOnce() -> R,
    {
        match panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(value) => Ok(value),
            Err(payload) => {
                let message = panic_message(&payload);
                let err = TestError::assertion(message);
                self.registry.record_failure(op_id, err.clone());
                self.state.lock().frozen.get_or_insert_with(|| err.clone());
                self.wake_everyone();
                Err(err)
            }
        }
    }

    /// Freeze the whole iteration on `err` without going through a panic,
    /// for callers above this crate that detect a fatal condition
    /// themselves (spec §7: a Misuse/Internal error surfaced by an
    /// actor's exception policy terminates the iteration, not just the
    /// actor).
    pub fn fail_iteration(&self, err: TestError) {
        self.state.lock().frozen.get_or_insert_with(|| err.clone());
        self.wake_everyone();
    }

    /// Expose a cheap snapshot of iteration progress, used by the report
    /// builder and by tests.
    pub fn step_counts(&self) -> (u64, u64) {
        let guard = self.state.lock();
        (guard.fair_steps, guard.unfair_steps)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "controlled operation panicked with a non-string payload".to_string()
    }
}
