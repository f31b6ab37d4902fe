//! [MODULE J] Specification monitors.
//!
//! A monitor is "just" a distinguished state machine (spec §4.J) dispatched
//! synchronously by whatever controlled operation calls `monitor(kind,
//! evt)` -- unlike an actor, it is never itself a `weave_core` controlled
//! operation, so there is no host thread or inbox here, only a state
//! stack and a temperature table consulted by the scheduler's
//! `LivenessProbe` seam at the fair step bound.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use weave_common::ids::{MachineId, StateId};
use weave_common::TestError;

use crate::actor::ActionContext;
use crate::event::Event;
use crate::state_machine::{HandlerOutcome, StateMachine};

/// Liveness classification of a monitor state (spec §3 "Specification
/// monitor... flagged with hot/cold on each state").
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Temperature {
    Hot,
    Cold,
}

pub struct SpecMonitor {
    id: MachineId,
    name: String,
    machine: Arc<StateMachine>,
    temperatures: FxHashMap<StateId, Temperature>,
    stack: Mutex<Vec<StateId>>,
}

impl SpecMonitor {
    pub fn new(name: impl Into<String>, machine: Arc<StateMachine>, temperatures: FxHashMap<StateId, Temperature>) -> Self {
        let start = machine.start_state();
        SpecMonitor { id: MachineId::next(), name: name.into(), machine, temperatures, stack: Mutex::new(vec![start]) }
    }

    pub fn id(&self) -> MachineId {
        self.id
    }

    pub fn current_state(&self) -> StateId {
        *self.stack.lock().last().expect("monitor state stack is never empty")
    }

    pub fn temperature(&self) -> Temperature {
        *self.temperatures.get(&self.current_state()).unwrap_or(&Temperature::Cold)
    }

    /// Dispatch `evt` against the current state, applying whatever
    /// transition its handler returns. Safety violations (a panicking
    /// `ctx.assert`) propagate as an unwind exactly like an actor
    /// handler's; the caller's `run_controlled` boundary turns that into
    /// `TestError::AssertionFailure` (spec §4.J "Safety violations...
    /// fail the iteration immediately").
    pub fn dispatch(&self, ctx: &ActionContext, evt: Event) -> Result<(), TestError> {
        let mut evt = evt;
        loop {
            let stack = self.stack.lock().clone();
            let Some((_, handler)) = self.machine.resolve_handler(&stack, evt.kind()) else {
                return Ok(());
            };
            let state_id = self.current_state();
            let outcome = handler.invoke(ctx, &evt);
            match outcome {
                HandlerOutcome::Continue => return Ok(()),
                HandlerOutcome::Raised(next) => {
                    evt = next;
                    continue;
                }
                HandlerOutcome::GotoTransition(target) => {
                    self.run_exit(ctx, state_id);
                    {
                        let mut stack = self.stack.lock();
                        stack.pop();
                        stack.push(target);
                    }
                    self.run_entry(ctx, target);
                    return Ok(());
                }
                HandlerOutcome::PushTransition(target) => {
                    self.stack.lock().push(target);
                    self.run_entry(ctx, target);
                    return Ok(());
                }
                HandlerOutcome::Pop => {
                    self.run_exit(ctx, state_id);
                    let mut stack = self.stack.lock();
                    if stack.len() <= 1 {
                        return Err(TestError::misuse("monitor popped with no matching push"));
                    }
                    stack.pop();
                    return Ok(());
                }
                HandlerOutcome::Halt => {
                    return Err(TestError::misuse("a specification monitor cannot halt"));
                }
            }
        }
    }

    fn run_entry(&self, ctx: &ActionContext, state_id: StateId) {
        if let Some(entry) = &self.machine.state(state_id).entry {
            entry(ctx);
        }
    }

    fn run_exit(&self, ctx: &ActionContext, state_id: StateId) {
        if let Some(exit) = &self.machine.state(state_id).exit {
            exit(ctx);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Aggregates every registered monitor and answers `weave_core`'s
/// `LivenessProbe` query (spec §4.J "at iteration end... if any monitor
/// is in a Hot state and the schedule was fair, report a liveness bug").
pub struct MonitorRegistry {
    monitors: Mutex<Vec<Arc<SpecMonitor>>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        MonitorRegistry { monitors: Mutex::new(Vec::new()) }
    }

    pub fn register(&self, monitor: Arc<SpecMonitor>) {
        self.monitors.lock().push(monitor);
    }

    pub fn get(&self, id: MachineId) -> Option<Arc<SpecMonitor>> {
        self.monitors.lock().iter().find(|m| m.id() == id).cloned()
    }
}

impl Default for MonitorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl weave_core::LivenessProbe for MonitorRegistry {
    fn hot_states(&self) -> Vec<(MachineId, StateId, String)> {
        self.monitors
            .lock()
            .iter()
            .filter(|m| m.temperature() == Temperature::Hot)
            .map(|m| (m.id(), m.current_state(), m.machine.state(m.current_state()).name.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ActorRuntime;
    use crate::state_machine::StateMachineBuilder;
    use weave_core::{Config, Scheduler};
    use weave_strategies::RandomStrategy;

    fn runtime() -> Arc<ActorRuntime> {
        let sched = Arc::new(Scheduler::new(Config::default(), Box::new(RandomStrategy::new(1))));
        ActorRuntime::new(sched)
    }

    #[test]
    fn a_monitor_starts_in_its_declared_temperature() {
        let mut builder = StateMachineBuilder::new();
        let hot = builder.state("busy");
        builder.start_state(hot);
        let machine = Arc::new(builder.build().unwrap());
        let mut temps = FxHashMap::default();
        temps.insert(hot, Temperature::Hot);
        let monitor = SpecMonitor::new("liveness", machine, temps);
        assert_eq!(monitor.temperature(), Temperature::Hot);
    }

    #[test]
    fn goto_on_event_moves_to_a_cold_state() {
        let rt = runtime();
        let mut builder = StateMachineBuilder::new();
        let hot = builder.state("busy");
        let cold = builder.state("idle");
        builder.on_event(hot, crate::event::EventKind::Custom("done"), crate::state_machine::Handler::Goto(cold));
        builder.start_state(hot);
        let machine = Arc::new(builder.build().unwrap());
        let mut temps = FxHashMap::default();
        temps.insert(hot, Temperature::Hot);
        temps.insert(cold, Temperature::Cold);
        let monitor = SpecMonitor::new("liveness", machine, temps);

        let ctx = ActionContext { runtime: &rt, actor: weave_common::ids::ActorId::next(), group: None };
        monitor.dispatch(&ctx, Event::custom("done", ())).unwrap();
        assert_eq!(monitor.temperature(), Temperature::Cold);
    }
}
