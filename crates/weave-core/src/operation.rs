//! [MODULE B] Operation registry (spec §3 "Operation").

use rustc_hash::FxHashMap;
use parking_lot::Mutex;

use weave_common::ids::{GroupId, OperationId, ResourceId};
use weave_common::TestError;

/// Where a controlled operation currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// Created but not yet handed its first scheduling decision.
    None,
    /// Runnable: eligible to be picked as the scheduler's current operation.
    Enabled,
    /// Finished; excluded from future scheduling decisions.
    Completed,
    BlockedOnWaitAll,
    BlockedOnWaitAny,
    BlockedOnReceive,
    BlockedOnResource,
    BlockedOnDelay,
    /// Parked on a timer that has not yet reached its virtual deadline.
    PausedOnDelay,
}

impl OperationStatus {
    pub fn is_blocked(self) -> bool {
        matches!(
            self,
            OperationStatus::BlockedOnWaitAll
                | OperationStatus::BlockedOnWaitAny
                | OperationStatus::BlockedOnReceive
                | OperationStatus::BlockedOnResource
                | OperationStatus::BlockedOnDelay
                | OperationStatus::PausedOnDelay
        )
    }
}

/// A snapshot of one controlled operation's metadata.
#[derive(Debug, Clone)]
pub struct ControlledOperation {
    pub id: OperationId,
    pub name: String,
    pub parent: Option<OperationId>,
    pub status: OperationStatus,
    pub group: Option<GroupId>,
    /// A priority slot some strategies use for their own bookkeeping;
    /// the registry stores it but does not interpret it.
    pub priority: u32,
    pub dependencies: Vec<ResourceId>,
    pub failure: Option<TestError>,
}

impl ControlledOperation {
    fn new(id: OperationId, parent: Option<OperationId>, name: String) -> Self {
        ControlledOperation {
            id,
            name,
            parent,
            status: OperationStatus::None,
            group: None,
            priority: 0,
            dependencies: Vec::new(),
            failure: None,
        }
    }
}

struct RegistryInner {
    operations: FxHashMap<OperationId, ControlledOperation>,
    creation_order: Vec<OperationId>,
}

/// Registry of every controlled operation in the current iteration.
///
/// Mirrors the split the teacher's actor runtime makes between a
/// `ProcessTable` (id -> `Process` lookup) and the per-`Process` state it
/// guards, minus the work-stealing scheduling machinery -- here, "which
/// operation runs" is entirely the scheduler's call (see `scheduler.rs`).
pub struct OperationRegistry {
    inner: Mutex<RegistryInner>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        OperationRegistry {
            inner: Mutex::new(RegistryInner { operations: FxHashMap::default(), creation_order: Vec::new() }),
        }
    }

    pub fn create(&self, parent: Option<OperationId>, name: impl Into<String>) -> OperationId {
        let id = OperationId::next();
        let mut inner = self.inner.lock();
        inner.operations.insert(id, ControlledOperation::new(id, parent, name.into()));
        inner.creation_order.push(id);
        id
    }

    pub fn set_status(&self, id: OperationId, status: OperationStatus) {
        let mut inner = self.inner.lock();
        if let Some(op) = inner.operations.get_mut(&id) {
            op.status = status;
        }
    }

    pub fn set_dependencies(&self, id: OperationId, dependencies: Vec<ResourceId>) {
        let mut inner = self.inner.lock();
        if let Some(op) = inner.operations.get_mut(&id) {
            op.dependencies = dependencies;
        }
    }

    pub fn set_priority(&self, id: OperationId, priority: u32) {
        let mut inner = self.inner.lock();
        if let Some(op) = inner.operations.get_mut(&id) {
            op.priority = priority;
        }
    }

    pub fn set_group(&self, id: OperationId, group: Option<GroupId>) {
        let mut inner = self.inner.lock();
        if let Some(op) = inner.operations.get_mut(&id) {
            op.group = group;
        }
    }

    pub fn record_failure(&self, id: OperationId, err: TestError) {
        let mut inner = self.inner.lock();
        if let Some(op) = inner.operations.get_mut(&id) {
            op.failure = Some(err);
        }
    }

    pub fn status(&self, id: OperationId) -> Option<OperationStatus> {
        self.inner.lock().operations.get(&id).map(|op| op.status)
    }

    pub fn snapshot(&self, id: OperationId) -> Option<ControlledOperation> {
        self.inner.lock().operations.get(&id).cloned()
    }

    /// Enabled operations, in creation order (the tie-break every strategy
    /// relies on for deterministic replay given the same choice indices).
    pub fn enabled(&self) -> Vec<OperationId> {
        let inner = self.inner.lock();
        inner
            .creation_order
            .iter()
            .copied()
            .filter(|id| inner.operations.get(id).map(|op| op.status == OperationStatus::Enabled).unwrap_or(false))
            .collect()
    }

    /// Blocked operations paired with the resources each is waiting on,
    /// for the deadlock oracle and for `TestError::DeadlockDetected`.
    pub fn blocked(&self) -> Vec<(OperationId, Vec<ResourceId>)> {
        let inner = self.inner.lock();
        inner
            .creation_order
            .iter()
            .filter_map(|id| {
                let op = inner.operations.get(id)?;
                op.status.is_blocked().then(|| (op.id, op.dependencies.clone()))
            })
            .collect()
    }

    pub fn all_completed(&self) -> bool {
        let inner = self.inner.lock();
        inner.operations.values().all(|op| op.status == OperationStatus::Completed)
    }

    pub fn creation_order(&self) -> Vec<OperationId> {
        self.inner.lock().creation_order.clone()
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_respects_creation_order() {
        let registry = OperationRegistry::new();
        let a = registry.create(None, "a");
        let b = registry.create(None, "b");
        registry.set_status(a, OperationStatus::Enabled);
        registry.set_status(b, OperationStatus::Enabled);
        assert_eq!(registry.enabled(), vec![a, b]);
    }

    #[test]
    fn blocked_operations_carry_their_dependencies() {
        let registry = OperationRegistry::new();
        let a = registry.create(None, "a");
        let r = ResourceId::next();
        registry.set_status(a, OperationStatus::BlockedOnResource);
        registry.set_dependencies(a, vec![r]);
        let blocked = registry.blocked();
        assert_eq!(blocked, vec![(a, vec![r])]);
    }

    #[test]
    fn all_completed_is_false_while_any_operation_is_enabled() {
        let registry = OperationRegistry::new();
        let a = registry.create(None, "a");
        registry.set_status(a, OperationStatus::Enabled);
        assert!(!registry.all_completed());
        registry.set_status(a, OperationStatus::Completed);
        assert!(registry.all_completed());
    }
}
