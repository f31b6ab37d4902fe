//! [MODULE H] Actor lifecycle, inboxes, and the send/receive/halt
//! contract.
//!
//! Grounded on `snow-rt/src/actor/{process.rs, mailbox.rs, link.rs}`:
//! `Actor` plays the role of that crate's `Process` (identity, mailbox,
//! halted flag), generalized from a fixed PCB driven by an M:N scheduler
//! to a value whose event loop runs as one `weave_core` controlled
//! operation per actor. `receive_event`'s block-and-resume shape is
//! reworked from `service.rs`'s "park the OS thread, spin-wait on the
//! caller" pattern into "block on the scheduler condvar via
//! `schedule_point`".

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use weave_common::ids::{ActorId, GroupId, OperationId, ResourceId};
use weave_common::TestError;
use weave_core::resource::{Resource, ReceiveState};
use weave_core::{OperationStatus, Scheduler};

use crate::event::{Envelope, Event, EventKind};
use crate::mailbox::Mailbox;
use crate::state_machine::StateMachine;

/// How an actor's `on_exception` hook disposes of an error its handler
/// did not itself recover from (spec §4.H "Exception policy").
pub enum ExceptionOutcome {
    /// Swallow the error; the actor keeps running.
    Handled,
    /// Terminate the actor gracefully (`OnHalt` still runs).
    Halt,
    /// Surface the error to the scheduler -- fatal to the iteration
    /// unless it is itself a `TestError::UncontrolledConcurrency`.
    Rethrow,
}

pub type ExceptionHook = Box<dyn Fn(&str, &TestError) -> ExceptionOutcome + Send + Sync>;

/// Per-kind behavior an actor is spawned with: the compiled state
/// machine it runs (a plain actor's machine has exactly one state with
/// no transitions) and the optional hooks spec §4.H calls for.
pub struct ActorSpec {
    pub machine: Arc<StateMachine>,
    pub on_exception: Option<ExceptionHook>,
    pub on_halt: Option<Box<dyn Fn(&ActionContext) + Send + Sync>>,
}

/// All of an actor's runtime state, shared between its own event-loop
/// thread and any other operation that sends it an event.
pub struct Actor {
    pub id: ActorId,
    op_id: Mutex<Option<OperationId>>,
    pub(crate) mailbox: Mailbox,
    deferred: Mutex<HashSet<EventKind>>,
    ignored: Mutex<HashSet<EventKind>>,
    state_stack: Mutex<Vec<weave_common::ids::StateId>>,
    group: Mutex<Option<GroupId>>,
    halted: AtomicBool,
    receive_resource: ResourceId,
    receive_filter: Mutex<Option<ReceiveFilter>>,
    spec: ActorSpec,
}

/// What an actor operation currently blocked on its `receive_resource` is
/// waiting for: an explicit `receive_event` filter, or the plain event
/// loop waiting for anything not currently deferred.
enum ReceiveFilter {
    AnyNotDeferred,
    Only(Vec<EventKind>),
}

impl ReceiveFilter {
    fn matches(&self, actor: &Actor, kind: EventKind) -> bool {
        match self {
            ReceiveFilter::AnyNotDeferred => !actor.is_deferred(kind),
            ReceiveFilter::Only(kinds) => kinds.contains(&kind),
        }
    }
}

impl Actor {
    pub(crate) fn new(id: ActorId, scheduler: &Arc<Scheduler>, spec: ActorSpec) -> Self {
        let receive_resource = scheduler.resources().insert(Resource::Receive(ReceiveState { actor: Some(id), waiters: Default::default() }));
        Actor {
            id,
            op_id: Mutex::new(None),
            mailbox: Mailbox::new(),
            deferred: Mutex::new(HashSet::new()),
            ignored: Mutex::new(HashSet::new()),
            state_stack: Mutex::new(vec![spec.machine.start_state()]),
            group: Mutex::new(None),
            halted: AtomicBool::new(false),
            receive_resource,
            receive_filter: Mutex::new(None),
            spec,
        }
    }

    pub(crate) fn set_op_id(&self, op_id: OperationId) {
        *self.op_id.lock() = Some(op_id);
    }

    pub fn operation_id(&self) -> Option<OperationId> {
        *self.op_id.lock()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    pub(crate) fn mark_halted(&self) {
        self.halted.store(true, Ordering::Release);
    }

    pub fn current_state(&self) -> weave_common::ids::StateId {
        *self.state_stack.lock().last().expect("state stack is never empty")
    }

    pub fn machine(&self) -> &StateMachine {
        &self.spec.machine
    }

    pub fn group(&self) -> Option<GroupId> {
        *self.group.lock()
    }

    pub(crate) fn set_group(&self, group: Option<GroupId>) {
        *self.group.lock() = group;
    }

    pub fn receive_resource(&self) -> ResourceId {
        self.receive_resource
    }

    pub(crate) fn on_exception(&self) -> Option<&ExceptionHook> {
        self.spec.on_exception.as_ref()
    }

    pub(crate) fn on_halt(&self) -> Option<&(dyn Fn(&ActionContext) + Send + Sync)> {
        self.spec.on_halt.as_deref()
    }

    /// Recompute the deferred/ignored caches from every state on the
    /// current stack (spec §3 Actor "a parallel set of currently-deferred
    /// event kinds"). Called after every push/pop/goto.
    pub(crate) fn recompute_deferred(&self) {
        let stack = self.state_stack.lock();
        let mut deferred = HashSet::new();
        let mut ignored = HashSet::new();
        for state_id in stack.iter() {
            let state = self.spec.machine.state(*state_id);
            deferred.extend(state.deferred.iter().copied());
            ignored.extend(state.ignored.iter().copied());
        }
        *self.deferred.lock() = deferred;
        *self.ignored.lock() = ignored;
    }

    pub(crate) fn is_deferred(&self, kind: EventKind) -> bool {
        self.deferred.lock().contains(&kind)
    }

    pub(crate) fn is_ignored(&self, kind: EventKind) -> bool {
        self.ignored.lock().contains(&kind)
    }

    pub(crate) fn state_stack_snapshot(&self) -> Vec<weave_common::ids::StateId> {
        self.state_stack.lock().clone()
    }

    pub(crate) fn state_stack_mut(&self) -> parking_lot::MutexGuard<'_, Vec<weave_common::ids::StateId>> {
        self.state_stack.lock()
    }

    /// Deliver an envelope into this actor's inbox, satisfying a pending
    /// `receive_event` immediately if its filter matches (spec §4.H
    /// "send_event... if the actor is currently in a Receive matching
    /// evt, the receive satisfies").
    pub(crate) fn deliver(&self, scheduler: &Arc<Scheduler>, envelope: Envelope) {
        let kind = envelope.kind();
        let matches_wait = self.receive_filter.lock().as_ref().map(|f| f.matches(self, kind)).unwrap_or(false);
        self.mailbox.push(envelope);
        if matches_wait {
            if let Some(op_id) = self.operation_id() {
                scheduler.resources().with(self.receive_resource, |r| {
                    if let Resource::Receive(state) = r {
                        state.waiters.retain(|w| *w != op_id);
                    }
                });
                scheduler.wake(op_id);
            }
        }
    }

    /// Block until some envelope satisfies `filter`, registering as a
    /// waiter on `receive_resource` while empty-handed, then hand the
    /// matching envelope to `take`.
    fn wait_for(
        &self,
        scheduler: &Arc<Scheduler>,
        op_id: OperationId,
        filter: ReceiveFilter,
        take: impl Fn(&Mailbox) -> Option<Envelope>,
    ) -> Result<Envelope, TestError> {
        loop {
            if let Some(envelope) = take(&self.mailbox) {
                *self.receive_filter.lock() = None;
                scheduler.schedule_point(op_id)?;
                return Ok(envelope);
            }

            *self.receive_filter.lock() = Some(match &filter {
                ReceiveFilter::AnyNotDeferred => ReceiveFilter::AnyNotDeferred,
                ReceiveFilter::Only(kinds) => ReceiveFilter::Only(kinds.clone()),
            });
            scheduler.resources().with(self.receive_resource, |r| {
                if let Resource::Receive(state) = r {
                    if !state.waiters.contains(&op_id) {
                        state.waiters.push_back(op_id);
                    }
                }
            });
            scheduler.block_on(op_id, OperationStatus::BlockedOnReceive, vec![self.receive_resource])?;
        }
    }

    /// Synchronously wait (blocking this actor's own operation) for an
    /// event of one of `kinds`, pulling it to the front of the inbox the
    /// moment it arrives (spec §4.H `receive_event`).
    pub fn receive_event(&self, scheduler: &Arc<Scheduler>, op_id: OperationId, kinds: &[EventKind]) -> Result<Event, TestError> {
        let kinds_owned = kinds.to_vec();
        let envelope = self.wait_for(scheduler, op_id, ReceiveFilter::Only(kinds_owned.clone()), move |mb| mb.take_matching(&kinds_owned))?;
        Ok(envelope.event)
    }

    /// Pull the next non-deferred envelope off the inbox, blocking the
    /// actor's own operation if none is currently eligible (spec §4.C
    /// "actor/state-machine event dequeue" scheduling point).
    pub(crate) fn dequeue_next(&self, scheduler: &Arc<Scheduler>, op_id: OperationId) -> Result<Envelope, TestError> {
        self.wait_for(scheduler, op_id, ReceiveFilter::AnyNotDeferred, |mb| {
            let deferred = self.deferred.lock().clone();
            mb.take_first_not_deferred(&deferred)
        })
    }
}

/// Passed to every action/entry/exit/monitor closure. Exposes exactly the
/// "safe APIs" spec §4.H allows from `OnHalt` (send, create, assert,
/// random); `ActionContext` itself has no restricted mode because no
/// action closure signature here exposes `receive`/`raise`/`goto`/`push`
/// as imperative calls in the first place -- those are only ever
/// produced by a handler's return value (`HandlerOutcome`), so the
/// restriction is structural rather than a runtime check spec §4.H
/// otherwise asks for.
pub struct ActionContext<'a> {
    pub(crate) runtime: &'a crate::runtime::ActorRuntime,
    pub(crate) actor: ActorId,
    pub(crate) group: Option<GroupId>,
}

impl<'a> ActionContext<'a> {
    pub fn actor_id(&self) -> ActorId {
        self.actor
    }

    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    /// Send `event` to `target`, inheriting this context's group id
    /// unless `group` overrides it (spec §4.H "Group ids").
    pub fn send(&self, target: ActorId, event: Event) {
        self.runtime.send_event(target, event, self.group);
    }

    pub fn send_with_group(&self, target: ActorId, event: Event, group: GroupId) {
        self.runtime.send_event(target, event, Some(group));
    }

    pub fn create_actor(&self, kind: &str, init_event: Event) -> ActorId {
        self.runtime.create_actor(kind, init_event, self.group)
    }

    /// A user-level invariant check (spec §4.J-style `assert`). Fires as
    /// a panic, caught by the scheduler's own panic boundary and reported
    /// as `TestError::AssertionFailure`, the same path `run_controlled`
    /// uses for any other controlled-operation panic.
    pub fn assert(&self, condition: bool, message: impl Into<String>) {
        if !condition {
            panic!("{}", message.into());
        }
    }

    pub fn random_bool(&self) -> bool {
        self.runtime.scheduler().strategy_next_bool()
    }

    pub fn random_int(&self, max: u64) -> u64 {
        self.runtime.scheduler().strategy_next_int(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::StateMachineBuilder;
    use weave_core::Config;
    use weave_strategies::RandomStrategy;

    fn scheduler() -> Arc<Scheduler> {
        Arc::new(Scheduler::new(Config::default(), Box::new(RandomStrategy::new(1))))
    }

    fn plain_spec() -> ActorSpec {
        let mut builder = StateMachineBuilder::new();
        let s = builder.state("only");
        builder.start_state(s);
        ActorSpec { machine: Arc::new(builder.build().unwrap()), on_exception: None, on_halt: None }
    }

    #[test]
    fn sending_before_a_receive_still_delivers_fifo() {
        let sched = scheduler();
        let actor = Actor::new(ActorId::next(), &sched, plain_spec());
        let op = sched.register_operation(None, "actor");
        actor.set_op_id(op);
        sched.schedule_point(op).unwrap();

        actor.deliver(&sched, Envelope::new(Event::custom("a", 1u32), None));
        actor.deliver(&sched, Envelope::new(Event::custom("b", 2u32), None));

        let evt = actor.receive_event(&sched, op, &[EventKind::Custom("a"), EventKind::Custom("b")]).unwrap();
        assert_eq!(evt.kind(), EventKind::Custom("a"));
    }

    #[test]
    fn receive_blocks_until_a_matching_send_arrives() {
        use std::thread;

        let sched = scheduler();
        let actor = Arc::new(Actor::new(ActorId::next(), &sched, plain_spec()));

        // A second, never-blocking operation keeps `enabled` non-empty
        // while the actor's own operation waits on its receive, so the
        // deadlock oracle has no reason to fire.
        let driver = sched.register_operation(None, "driver");
        sched.schedule_point(driver).unwrap();

        let op = sched.register_operation(None, "actor");
        actor.set_op_id(op);

        let waiter_sched = Arc::clone(&sched);
        let waiter_actor = Arc::clone(&actor);
        let waiter = thread::spawn(move || waiter_actor.receive_event(&waiter_sched, op, &[EventKind::Custom("go")]));

        std::thread::sleep(std::time::Duration::from_millis(20));
        actor.deliver(&sched, Envelope::new(Event::custom("go", ()), None));
        sched.complete(driver);

        let evt = waiter.join().unwrap().unwrap();
        assert_eq!(evt.kind(), EventKind::Custom("go"));
    }
}
