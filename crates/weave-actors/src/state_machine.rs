//! [MODULE I] Builder-table state-machine runtime, layered on the actor
//! event loop in `crate::actor`.
//!
//! Replaces the attribute-driven declarations the original dialects use
//! (per spec §9 "Design Notes") with a plain value: a `State` is
//! `{entry, exit, handlers: map<event-kind, Handler>}`, built once by
//! `StateMachineBuilder::build()` into a `StateMachine` no runtime
//! reflection ever touches again.

use std::collections::HashSet;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use weave_common::ids::StateId;
use weave_common::TestError;

use crate::actor::ActionContext;
use crate::event::{Event, EventKind};

pub type EntryExitFn = Arc<dyn Fn(&ActionContext) + Send + Sync>;
pub type HandlerFn = Arc<dyn Fn(&ActionContext, &Event) -> HandlerOutcome + Send + Sync>;

/// What a dispatched event resolves to (spec §9 "an event handler returns
/// a `HandlerOutcome` variant"). The actor event loop in `crate::actor`
/// interprets this instead of the original dialects' exception-based
/// control flow.
pub enum HandlerOutcome {
    Continue,
    Raised(Event),
    GotoTransition(StateId),
    PushTransition(StateId),
    Pop,
    Halt,
}

/// One declared reaction to an event kind. Cheap to clone (`Do` holds an
/// `Arc`, `Goto`/`Push` hold a `Copy` id) so a base state's table can be
/// copied into every state that derives from it.
#[derive(Clone)]
pub enum Handler {
    Do(HandlerFn),
    Goto(StateId),
    Push(StateId),
}

impl Handler {
    pub fn action(f: impl Fn(&ActionContext, &Event) -> HandlerOutcome + Send + Sync + 'static) -> Self {
        Handler::Do(Arc::new(f))
    }

    pub(crate) fn invoke(&self, ctx: &ActionContext, evt: &Event) -> HandlerOutcome {
        match self {
            Handler::Do(f) => f(ctx, evt),
            Handler::Goto(target) => HandlerOutcome::GotoTransition(*target),
            Handler::Push(target) => HandlerOutcome::PushTransition(*target),
        }
    }
}

/// A declared state: entry/exit hooks, a compiled handler table, and the
/// defer/ignore event-kind sets (spec §3 "State").
pub struct State {
    pub id: StateId,
    pub name: String,
    pub entry: Option<EntryExitFn>,
    pub exit: Option<EntryExitFn>,
    handlers: FxHashMap<EventKind, Handler>,
    pub deferred: HashSet<EventKind>,
    pub ignored: HashSet<EventKind>,
}

impl State {
    pub fn handler_for(&self, kind: EventKind) -> Option<&Handler> {
        self.handlers.get(&kind)
    }

    pub(crate) fn dispatch(&self, ctx: &ActionContext, evt: &Event) -> Option<HandlerOutcome> {
        self.handler_for(evt.kind()).map(|h| h.invoke(ctx, evt))
    }
}

/// A pure naming container for a group of states (spec §4.I "StateGroup:
/// nested container purely for naming; transitions across groups are
/// permitted"). Carries no runtime behavior of its own.
pub struct StateGroup {
    pub name: String,
    pub members: Vec<StateId>,
}

#[derive(Default)]
struct StateDraft {
    name: String,
    entry: Option<EntryExitFn>,
    exit: Option<EntryExitFn>,
    handlers: FxHashMap<EventKind, Handler>,
    duplicate_events: HashSet<EventKind>,
    own_deferred: HashSet<EventKind>,
    own_ignored: HashSet<EventKind>,
    base: Option<StateId>,
}

/// Accumulates state declarations before a single validation pass
/// (`build()`) compiles them into a `StateMachine`. Grounded on the
/// `mesh-typeck`/`snow-typeck` pattern of a mutable builder that only
/// produces a value after a checked `build`/`finish` step.
#[derive(Default)]
pub struct StateMachineBuilder {
    drafts: FxHashMap<StateId, StateDraft>,
    order: Vec<StateId>,
    start: Option<StateId>,
}

impl StateMachineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&mut self, name: impl Into<String>) -> StateId {
        let id = StateId::next();
        self.drafts.insert(id, StateDraft { name: name.into(), ..Default::default() });
        self.order.push(id);
        id
    }

    pub fn start_state(&mut self, id: StateId) -> &mut Self {
        self.start = Some(id);
        self
    }

    pub fn on_entry(&mut self, id: StateId, action: impl Fn(&ActionContext) + Send + Sync + 'static) -> &mut Self {
        self.draft_mut(id).entry = Some(Arc::new(action));
        self
    }

    pub fn on_exit(&mut self, id: StateId, action: impl Fn(&ActionContext) + Send + Sync + 'static) -> &mut Self {
        self.draft_mut(id).exit = Some(Arc::new(action));
        self
    }

    /// Declare a handler for `kind` directly on state `id`. Declaring a
    /// second handler for the same kind on the *same* state is a build
    /// error (spec §4.I Open Question resolution); inheriting a handler
    /// from `derive_from` and then overriding it here is not a conflict.
    pub fn on_event(&mut self, id: StateId, kind: EventKind, handler: Handler) -> &mut Self {
        let draft = self.draft_mut(id);
        if draft.handlers.insert(kind, handler).is_some() {
            draft.duplicate_events.insert(kind);
        }
        self
    }

    pub fn defer(&mut self, id: StateId, kind: EventKind) -> &mut Self {
        self.draft_mut(id).own_deferred.insert(kind);
        self
    }

    pub fn ignore(&mut self, id: StateId, kind: EventKind) -> &mut Self {
        self.draft_mut(id).own_ignored.insert(kind);
        self
    }

    /// Inherit `base`'s handlers/defer/ignore sets into `id`; `id`'s own
    /// declarations override on conflict (spec §4.I "Inheritance...
    /// derived overrides base silently").
    pub fn derive_from(&mut self, id: StateId, base: StateId) -> &mut Self {
        self.draft_mut(id).base = Some(base);
        self
    }

    fn draft_mut(&mut self, id: StateId) -> &mut StateDraft {
        self.drafts.get_mut(&id).expect("unknown state id in builder")
    }

    /// Compile the drafts into an immutable `StateMachine`. Validates
    /// exactly one start state is set (spec §4.I "exactly one per
    /// machine") and that no state declares two handlers for the same
    /// event directly on itself.
    pub fn build(self) -> Result<StateMachine, TestError> {
        let start = self.start.ok_or_else(|| TestError::misuse("state machine has no start state"))?;
        if !self.drafts.contains_key(&start) {
            return Err(TestError::misuse("start state does not belong to this machine"));
        }
        if let Some((id, draft)) = self.drafts.iter().find(|(_, d)| !d.duplicate_events.is_empty()) {
            return Err(TestError::misuse(format!(
                "state {} ({}) declares more than one handler for the same event",
                id, draft.name
            )));
        }

        let mut states = FxHashMap::default();
        for id in &self.order {
            let draft = &self.drafts[id];
            let mut handlers = FxHashMap::default();
            let mut deferred = HashSet::new();
            let mut ignored = HashSet::new();

            if let Some(base) = draft.base {
                let base_draft = self
                    .drafts
                    .get(&base)
                    .ok_or_else(|| TestError::misuse("derive_from references an unknown base state"))?;
                deferred.extend(base_draft.own_deferred.iter().copied());
                ignored.extend(base_draft.own_ignored.iter().copied());
                handlers.extend(base_draft.handlers.iter().map(|(k, v)| (*k, v.clone())));
            }

            deferred.extend(draft.own_deferred.iter().copied());
            ignored.extend(draft.own_ignored.iter().copied());
            handlers.extend(draft.handlers.iter().map(|(k, v)| (*k, v.clone())));

            states.insert(
                *id,
                State {
                    id: *id,
                    name: draft.name.clone(),
                    entry: draft.entry.clone(),
                    exit: draft.exit.clone(),
                    handlers,
                    deferred,
                    ignored,
                },
            );
        }

        Ok(StateMachine { states, start })
    }
}

/// A compiled, immutable state machine: every state's handler table is a
/// plain `FxHashMap` built once, never consulted reflectively again
/// (spec §9 "Duck-typed handler lookup by method name... replace with
/// compile-time function pointers").
pub struct StateMachine {
    states: FxHashMap<StateId, State>,
    start: StateId,
}

impl StateMachine {
    pub fn start_state(&self) -> StateId {
        self.start
    }

    pub fn state(&self, id: StateId) -> &State {
        self.states.get(&id).expect("state id not part of this machine")
    }

    /// Resolve a handler for `kind` by searching the active state stack
    /// top-down (spec §4.I "first match wins, searched top-down on the
    /// state stack") -- a state pushed onto another does not hide the
    /// parent's handlers for events it does not itself declare.
    pub fn resolve_handler(&self, stack: &[StateId], kind: EventKind) -> Option<(StateId, &Handler)> {
        stack.iter().rev().find_map(|&id| self.state(id).handler_for(kind).map(|h| (id, h)))
    }
}
