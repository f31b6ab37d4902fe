//! [MODULE H/I/J glue] The actor runtime: owns every live `Actor`, the
//! registry of actor "kinds" `create_actor` instantiates by name, and the
//! `MonitorRegistry` wired into the scheduler's `LivenessProbe` seam.
//!
//! Grounded on `snow-rt/src/actor/process.rs`'s per-process event loop:
//! an actor's controlled operation dequeues, dispatches to its current
//! state, runs the resulting transition, and loops until halted. The
//! dequeue is the loop's only scheduling point as seen by `weave_core`;
//! everything else (handler bodies, `on_exception`, `OnHalt`) is plain
//! Rust run on that operation's own host thread, exactly as the
//! teacher's process loop runs a dispatched handler between scheduler
//! yields.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};
use weave_common::ids::{ActorId, GroupId, MachineId, OperationId, StateId, TimerId};
use weave_common::TestError;
use weave_core::primitives::ControlledTask;
use weave_core::{LivenessProbe, Scheduler, TimerService, TimerSink};

use crate::actor::{ActionContext, Actor, ActorSpec, ExceptionOutcome};
use crate::event::{Envelope, Event, EventKind};
use crate::monitor::MonitorRegistry;
use crate::state_machine::HandlerOutcome;

pub type ActorFactory = Arc<dyn Fn() -> ActorSpec + Send + Sync>;

/// Adapts a shared `MonitorRegistry` to the `weave_core::LivenessProbe`
/// seam -- kept as its own type so `ActorRuntime` can hand the scheduler
/// a `Box<dyn LivenessProbe>` while still holding its own `Arc` to the
/// same registry for `register_monitor`/lookups.
struct LivenessHandle(Arc<MonitorRegistry>);

impl LivenessProbe for LivenessHandle {
    fn hot_states(&self) -> Vec<(MachineId, StateId, String)> {
        self.0.hot_states()
    }
}

/// Owns every actor spawned in one iteration and the kind registry
/// `create_actor` instantiates from (spec §4.H "Actor runtime").
pub struct ActorRuntime {
    scheduler: Arc<Scheduler>,
    actors: Mutex<FxHashMap<ActorId, Arc<Actor>>>,
    kinds: Mutex<FxHashMap<String, ActorFactory>>,
    monitors: Arc<MonitorRegistry>,
    timers: TimerService,
    tasks: Mutex<Vec<ControlledTask<()>>>,
}

impl ActorRuntime {
    pub fn new(scheduler: Arc<Scheduler>) -> Arc<Self> {
        let monitors = Arc::new(MonitorRegistry::new());
        scheduler.set_liveness_probe(Box::new(LivenessHandle(Arc::clone(&monitors))));
        let timers = TimerService::new(Arc::clone(&scheduler));
        Arc::new(ActorRuntime {
            scheduler,
            actors: Mutex::new(FxHashMap::default()),
            kinds: Mutex::new(FxHashMap::default()),
            monitors,
            timers,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn monitors(&self) -> &Arc<MonitorRegistry> {
        &self.monitors
    }

    pub fn timers(&self) -> &TimerService {
        &self.timers
    }

    /// Arm a one-shot virtual timer that delivers `TimerElapsed` to
    /// `target`'s inbox once it elapses (spec §4.G `start_one_shot`).
    pub fn start_timer(self: &Arc<Self>, target: ActorId, delay_ticks: i64) -> Result<TimerId, TestError> {
        let sink: Arc<dyn TimerSink> = Arc::clone(self);
        self.timers.start_one_shot(sink, target, delay_ticks)
    }

    /// Arm a periodic virtual timer that re-arms itself on every delivery
    /// until `stop_timer` cancels it (spec §4.G `start_periodic`).
    pub fn start_periodic_timer(self: &Arc<Self>, target: ActorId, due_ticks: i64, period_ticks: i64) -> Result<TimerId, TestError> {
        let sink: Arc<dyn TimerSink> = Arc::clone(self);
        self.timers.start_periodic(sink, target, due_ticks, period_ticks)
    }

    /// Cancel a timer started with `start_timer`/`start_periodic_timer`
    /// (spec §4.G `stop`).
    pub fn stop_timer(&self, timer_id: TimerId) {
        self.timers.stop(timer_id);
    }

    /// Register a named actor kind; `create_actor` looks factories up by
    /// this name the way the teacher's runtime resolves a process by its
    /// compiled module name.
    pub fn register_kind(&self, name: impl Into<String>, factory: impl Fn() -> ActorSpec + Send + Sync + 'static) {
        self.kinds.lock().insert(name.into(), Arc::new(factory));
    }

    pub fn register_monitor(&self, monitor: Arc<crate::monitor::SpecMonitor>) {
        self.monitors.register(monitor);
    }

    pub fn actor(&self, id: ActorId) -> Option<Arc<Actor>> {
        self.actors.lock().get(&id).cloned()
    }

    /// Allocate an id, enqueue `init_event`, and spawn the actor's event
    /// loop on its own controlled operation -- returning immediately,
    /// before that loop has processed anything (spec §4.H "returns
    /// before init completes").
    pub fn create_actor(self: &Arc<Self>, kind: &str, init_event: Event, group: Option<GroupId>) -> ActorId {
        let factory = self
            .kinds
            .lock()
            .get(kind)
            .cloned()
            .unwrap_or_else(|| panic!("unknown actor kind: {kind}"));
        let spec = factory();
        let id = ActorId::next();
        let actor = Arc::new(Actor::new(id, &self.scheduler, spec));
        actor.set_group(group);
        actor.recompute_deferred();
        actor.deliver(&self.scheduler, Envelope::new(init_event, group));
        self.actors.lock().insert(id, Arc::clone(&actor));
        debug!(actor = %id, kind, "actor created");

        let rt = Arc::clone(self);
        let task = ControlledTask::spawn(&self.scheduler, format!("actor:{kind}"), move |op_id| {
            actor.set_op_id(op_id);
            if let Err(err) = run_actor_loop(&rt, &actor, op_id) {
                warn!(actor = %actor.id, error = %err, "actor loop ended with an error");
            }
        });
        self.tasks.lock().push(task);
        id
    }

    /// Deliver `event` to `target`'s inbox. Silently dropped if the actor
    /// has already halted or was never created (spec §4.H `send_event`).
    pub fn send_event(&self, target: ActorId, event: Event, group: Option<GroupId>) {
        let Some(actor) = self.actor(target) else {
            trace!(actor = %target, "send_event targeted an unknown actor, dropped");
            return;
        };
        if actor.is_halted() {
            trace!(actor = %target, "send_event targeted a halted actor, dropped");
            return;
        }
        actor.deliver(&self.scheduler, Envelope::new(event, group));
    }

    /// Block `caller` until every actor spawned so far has halted and
    /// every timer armed so far has retired. Used by scenario harnesses
    /// to reach quiescence before asserting on final state.
    pub fn join_all(&self, caller: OperationId) -> Result<(), TestError> {
        let mut handles: Vec<_> = self.tasks.lock().iter().map(|t| t.completion_resource()).collect();
        handles.extend(self.timers.completion_resources());
        weave_core::primitives::wait_handle::wait_all(&self.scheduler, caller, &handles)
    }
}

impl TimerSink for ActorRuntime {
    fn deliver_timer_elapsed(&self, actor: ActorId, timer_id: TimerId) {
        self.send_event(actor, Event::TimerElapsed(timer_id), None);
    }
}

/// The per-actor controlled operation body: dequeue, dispatch, apply the
/// resulting transition, repeat until halted (spec §4.H/§4.I combined).
fn run_actor_loop(rt: &Arc<ActorRuntime>, actor: &Arc<Actor>, op_id: OperationId) -> Result<(), TestError> {
    loop {
        let envelope = match actor.dequeue_next(&rt.scheduler, op_id) {
            Ok(envelope) => envelope,
            Err(err) => {
                rt.scheduler.complete(op_id);
                return Err(err);
            }
        };

        let ctx = ActionContext { runtime: rt, actor: actor.id, group: envelope.group };
        let outcome = dispatch_one(rt, actor, &ctx, envelope.event);

        match outcome {
            Ok(true) => continue,
            Ok(false) => break,
            Err(err) => {
                let disposition = actor
                    .on_exception()
                    .map(|hook| hook("dispatch", &err))
                    .unwrap_or(ExceptionOutcome::Rethrow);
                match disposition {
                    ExceptionOutcome::Handled => continue,
                    ExceptionOutcome::Halt => {
                        run_halt(rt, actor, &ctx);
                        break;
                    }
                    ExceptionOutcome::Rethrow => {
                        // Misuse/Internal errors are scheduler invariants
                        // or API contract violations, not ordinary actor
                        // failures: they fail the whole iteration rather
                        // than just this actor (spec §7).
                        if matches!(err, TestError::MisuseError { .. } | TestError::InternalError { .. }) {
                            rt.scheduler.fail_iteration(err.clone());
                        }
                        actor.mark_halted();
                        rt.scheduler.complete(op_id);
                        return Err(err);
                    }
                }
            }
        }
    }

    rt.scheduler.complete(op_id);
    Ok(())
}

/// Dispatch a single event, applying raise/goto/push/pop until the
/// handler settles on `Continue` or the actor halts. Returns `Ok(true)`
/// to keep looping, `Ok(false)` once the actor has halted.
fn dispatch_one(rt: &Arc<ActorRuntime>, actor: &Arc<Actor>, ctx: &ActionContext, evt: Event) -> Result<bool, TestError> {
    if evt.kind() == EventKind::Halt {
        run_halt(rt, actor, ctx);
        return Ok(false);
    }

    if actor.is_ignored(evt.kind()) {
        return Ok(true);
    }

    let mut evt = evt;
    loop {
        let stack = actor.state_stack_snapshot();
        let Some((state_id, handler)) = actor.machine().resolve_handler(&stack, evt.kind()) else {
            // No handler anywhere on the active stack: an undeclared
            // event is silently dropped, the same as an explicitly
            // ignored one.
            return Ok(true);
        };
        let outcome = handler.invoke(ctx, &evt);
        match outcome {
            HandlerOutcome::Continue => return Ok(true),
            HandlerOutcome::Raised(next) => {
                evt = next;
                continue;
            }
            HandlerOutcome::GotoTransition(target) => {
                run_exit(actor, ctx, state_id);
                {
                    let mut stack = actor.state_stack_mut();
                    stack.pop();
                    stack.push(target);
                }
                actor.recompute_deferred();
                run_entry(actor, ctx, target);
                return Ok(true);
            }
            HandlerOutcome::PushTransition(target) => {
                actor.state_stack_mut().push(target);
                actor.recompute_deferred();
                run_entry(actor, ctx, target);
                return Ok(true);
            }
            HandlerOutcome::Pop => {
                run_exit(actor, ctx, state_id);
                {
                    let mut stack = actor.state_stack_mut();
                    if stack.len() <= 1 {
                        return Err(TestError::misuse("popped with no matching push"));
                    }
                    stack.pop();
                }
                actor.recompute_deferred();
                return Ok(true);
            }
            HandlerOutcome::Halt => {
                run_halt(rt, actor, ctx);
                return Ok(false);
            }
        }
    }
}

fn run_entry(actor: &Actor, ctx: &ActionContext, state_id: StateId) {
    if let Some(entry) = &actor.machine().state(state_id).entry {
        entry(ctx);
    }
}

fn run_exit(actor: &Actor, ctx: &ActionContext, state_id: StateId) {
    if let Some(exit) = &actor.machine().state(state_id).exit {
        exit(ctx);
    }
}

fn run_halt(rt: &Arc<ActorRuntime>, actor: &Actor, ctx: &ActionContext) {
    actor.mark_halted();
    if let Some(hook) = actor.on_halt() {
        hook(ctx);
    }
    debug!(actor = %actor.id, "actor halted");
    let _ = rt;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{Handler, StateMachineBuilder};
    use weave_core::Config;
    use weave_strategies::RandomStrategy;

    fn runtime() -> Arc<ActorRuntime> {
        let sched = Arc::new(Scheduler::new(Config::default(), Box::new(RandomStrategy::new(1))));
        ActorRuntime::new(sched)
    }

    fn single_state_spec() -> ActorSpec {
        let mut builder = StateMachineBuilder::new();
        let s = builder.state("only");
        builder.on_event(s, EventKind::Custom("ping"), Handler::action(|ctx, _evt| {
            ctx.assert(true, "ping handled");
            HandlerOutcome::Continue
        }));
        builder.start_state(s);
        ActorSpec { machine: Arc::new(builder.build().unwrap()), on_exception: None, on_halt: None }
    }

    #[test]
    fn create_actor_returns_before_init_completes() {
        let rt = runtime();
        rt.register_kind("echo", single_state_spec);
        let id = rt.create_actor("echo", Event::custom("ping", ()), None);
        assert!(rt.actor(id).is_some());
    }

    #[test]
    fn send_event_to_a_halted_actor_is_a_silent_drop() {
        let rt = runtime();
        rt.register_kind("echo", single_state_spec);
        let id = rt.create_actor("echo", Event::custom("ping", ()), None);
        if let Some(actor) = rt.actor(id) {
            actor.mark_halted();
        }
        rt.send_event(id, Event::custom("ping", ()), None);
    }

    #[test]
    fn halt_event_stops_the_dispatch_loop() {
        let rt = runtime();
        rt.register_kind("echo", single_state_spec);
        let id = rt.create_actor("echo", Event::Halt, None);
        let caller = rt.scheduler().register_operation(None, "caller");
        rt.scheduler().schedule_point(caller).unwrap();
        rt.join_all(caller).unwrap();
        assert!(rt.actor(id).unwrap().is_halted());
    }

    fn waiting_for_timer_spec(fired: Arc<std::sync::atomic::AtomicBool>) -> ActorSpec {
        let mut builder = StateMachineBuilder::new();
        let s = builder.state("waiting");
        builder.on_event(
            s,
            EventKind::TimerElapsed,
            Handler::action(move |_ctx, _evt| {
                fired.store(true, std::sync::atomic::Ordering::SeqCst);
                HandlerOutcome::Continue
            }),
        );
        builder.start_state(s);
        ActorSpec { machine: Arc::new(builder.build().unwrap()), on_exception: None, on_halt: None }
    }

    #[test]
    fn one_shot_timer_delivers_timer_elapsed_to_its_target_actor() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let rt = runtime();
        let fired = Arc::new(AtomicBool::new(false));
        let f = Arc::clone(&fired);
        rt.register_kind("waiter", move || waiting_for_timer_spec(Arc::clone(&f)));
        let id = rt.create_actor("waiter", Event::custom("init", ()), None);
        rt.start_timer(id, 2).unwrap();

        let caller = rt.scheduler().register_operation(None, "caller");
        rt.scheduler().schedule_point(caller).unwrap();
        // Join the timer alone first -- this guarantees TimerElapsed is
        // already enqueued ahead of the Halt sent next, so draining the
        // actor's inbox to Halt necessarily drains TimerElapsed first.
        rt.timers().join_all(caller).unwrap();
        rt.send_event(id, Event::Halt, None);
        rt.join_all(caller).unwrap();

        assert!(fired.load(Ordering::SeqCst));
    }

    fn counting_timer_spec(ticks: Arc<std::sync::atomic::AtomicUsize>) -> ActorSpec {
        let mut builder = StateMachineBuilder::new();
        let s = builder.state("waiting");
        builder.on_event(
            s,
            EventKind::TimerElapsed,
            Handler::action(move |_ctx, _evt| {
                ticks.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                HandlerOutcome::Continue
            }),
        );
        builder.start_state(s);
        ActorSpec { machine: Arc::new(builder.build().unwrap()), on_exception: None, on_halt: None }
    }

    #[test]
    fn stopped_periodic_timer_does_not_keep_re_arming() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let rt = runtime();
        let ticks = Arc::new(AtomicUsize::new(0));
        let t = Arc::clone(&ticks);
        rt.register_kind("waiter", move || counting_timer_spec(Arc::clone(&t)));
        let id = rt.create_actor("waiter", Event::custom("init", ()), None);

        let timer_id = rt.start_periodic_timer(id, 0, 1).unwrap();
        let spinner = rt.scheduler().register_operation(None, "spinner");
        loop {
            rt.scheduler().schedule_point(spinner).unwrap();
            if ticks.load(Ordering::SeqCst) >= 2 {
                break;
            }
        }
        rt.scheduler().complete(spinner);
        rt.stop_timer(timer_id);

        let caller = rt.scheduler().register_operation(None, "caller");
        rt.scheduler().schedule_point(caller).unwrap();
        // Joining the timer alone proves its background operation actually
        // retired rather than re-arming forever -- a broken `stop` would
        // hang here instead of failing an assertion.
        rt.timers().join_all(caller).unwrap();
        rt.send_event(id, Event::Halt, None);
        rt.join_all(caller).unwrap();

        assert!(ticks.load(Ordering::SeqCst) >= 2, "expected at least the deliveries observed before stop");
    }
}
