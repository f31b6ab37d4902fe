//! [MODULE E support] Resource state backing the controlled primitives.
//!
//! A `Resource` is a tagged variant of the state a controlled sync
//! primitive owns -- a mutex's owner and waiter queue, a semaphore's
//! count, an event's signal bit, a timer's virtual deadline, an actor's
//! receive filter. Keeping them in one enum behind one table lets the
//! deadlock oracle and the run report walk "every primitive currently
//! blocking someone" without needing a trait object per kind.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use parking_lot::Mutex;

use weave_common::ids::{ActorId, OperationId, ResourceId};

#[derive(Debug, Clone, Default)]
pub struct MutexState {
    pub owner: Option<OperationId>,
    pub waiters: VecDeque<OperationId>,
    /// Re-entrant acquisition count by the current owner; `0` when free.
    pub reentries: u32,
}

#[derive(Debug, Clone)]
pub struct SemaphoreState {
    pub count: u32,
    pub max: u32,
    pub waiters: VecDeque<OperationId>,
}

#[derive(Debug, Clone, Default)]
pub struct EventState {
    pub signaled: bool,
    pub waiters: VecDeque<OperationId>,
}

#[derive(Debug, Clone, Default)]
pub struct CompletionState {
    pub completed: bool,
    pub waiters: VecDeque<OperationId>,
}

#[derive(Debug, Clone, Default)]
pub struct ReceiveState {
    pub actor: Option<ActorId>,
    pub waiters: VecDeque<OperationId>,
}

#[derive(Debug, Clone, Default)]
pub struct DelayState {
    pub deadline_tick: u64,
    pub waiters: VecDeque<OperationId>,
}

#[derive(Debug, Clone)]
pub enum Resource {
    Mutex(MutexState),
    /// A non-reentrant mutual-exclusion primitive is just a `MutexState`
    /// with `reentries` capped at `1`; kept as its own variant for a
    /// clearer name in deadlock reports and the coverage graph.
    Semaphore(SemaphoreState),
    ManualResetEvent(EventState),
    AutoResetEvent(EventState),
    TaskCompletion(CompletionState),
    Receive(ReceiveState),
    Delay(DelayState),
}

impl Resource {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Resource::Mutex(_) => "mutex",
            Resource::Semaphore(_) => "semaphore",
            Resource::ManualResetEvent(_) => "manual_reset_event",
            Resource::AutoResetEvent(_) => "auto_reset_event",
            Resource::TaskCompletion(_) => "task_completion",
            Resource::Receive(_) => "receive",
            Resource::Delay(_) => "delay",
        }
    }

    pub fn waiters(&self) -> &VecDeque<OperationId> {
        match self {
            Resource::Mutex(s) => &s.waiters,
            Resource::Semaphore(s) => &s.waiters,
            Resource::ManualResetEvent(s) | Resource::AutoResetEvent(s) => &s.waiters,
            Resource::TaskCompletion(s) => &s.waiters,
            Resource::Receive(s) => &s.waiters,
            Resource::Delay(s) => &s.waiters,
        }
    }

    pub fn waiters_mut(&mut self) -> &mut VecDeque<OperationId> {
        match self {
            Resource::Mutex(s) => &mut s.waiters,
            Resource::Semaphore(s) => &mut s.waiters,
            Resource::ManualResetEvent(s) | Resource::AutoResetEvent(s) => &mut s.waiters,
            Resource::TaskCompletion(s) => &mut s.waiters,
            Resource::Receive(s) => &mut s.waiters,
            Resource::Delay(s) => &mut s.waiters,
        }
    }
}

/// Table of every live resource in the current iteration, addressed by
/// `ResourceId`. Guarded by its own lock, separate from the scheduler's
/// turn-taking lock and the operation registry's lock -- the same
/// three-lock split the teacher draws between `ProcessTable`, per-`Process`
/// state, and the scheduler's run-queue bookkeeping.
pub struct ResourceTable {
    inner: Mutex<FxHashMap<ResourceId, Resource>>,
}

impl ResourceTable {
    pub fn new() -> Self {
        ResourceTable { inner: Mutex::new(FxHashMap::default()) }
    }

    pub fn insert(&self, resource: Resource) -> ResourceId {
        let id = ResourceId::next();
        self.inner.lock().insert(id, resource);
        id
    }

    pub fn with<R>(&self, id: ResourceId, f: impl FnOnce(&mut Resource) -> R) -> R {
        let mut guard = self.inner.lock();
        let resource = guard.get_mut(&id).expect("resource id not found in table");
        f(resource)
    }

    pub fn waiters_of(&self, id: ResourceId) -> Vec<OperationId> {
        let guard = self.inner.lock();
        guard.get(&id).map(|r| r.waiters().iter().copied().collect()).unwrap_or_default()
    }

    pub fn kind_name(&self, id: ResourceId) -> Option<&'static str> {
        self.inner.lock().get(&id).map(|r| r.kind_name())
    }

    pub fn remove(&self, id: ResourceId) {
        self.inner.lock().remove(&id);
    }
}

impl Default for ResourceTable {
    fn default() -> Self {
        Self::new()
    }
}
