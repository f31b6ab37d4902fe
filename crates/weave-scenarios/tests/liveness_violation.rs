//! A monitor enters a Hot state and nothing in the system ever sends the
//! event that would let it leave -- the scheduler must eventually report
//! a liveness violation naming that state rather than run forever.
//!
//! Two background operations spin perpetually so `enabled` always has
//! more than one candidate; per the scheduler's own fair-step counting,
//! a fair step only ever accrues when a genuine choice between at least
//! two enabled operations exists. A lone blocked actor could never push
//! `fair_steps` past the bound on its own.

mod support;

use std::sync::Arc;
use std::thread;

use rustc_hash::FxHashMap;
use weave_common::TestError;
use weave_core::primitives::SpinWait;
use weave_core::Config;

use weave_actors::actor::ActorSpec;
use weave_actors::event::{Event, EventKind};
use weave_actors::monitor::{SpecMonitor, Temperature};
use weave_actors::runtime::ActorRuntime;
use weave_actors::state_machine::{Handler, HandlerOutcome, StateMachineBuilder};

fn watchdog_monitor() -> SpecMonitor {
    let mut builder = StateMachineBuilder::new();
    let idle = builder.state("idle");
    let busy = builder.state("busy");
    builder.on_event(idle, EventKind::Custom("begin"), Handler::Goto(busy));
    builder.on_event(busy, EventKind::Custom("finish"), Handler::Goto(idle));
    builder.start_state(idle);
    let machine = Arc::new(builder.build().unwrap());

    let mut temps = FxHashMap::default();
    temps.insert(idle, Temperature::Cold);
    temps.insert(busy, Temperature::Hot);
    SpecMonitor::new("watchdog", machine, temps)
}

fn pulse_spec(watchdog: Arc<SpecMonitor>) -> ActorSpec {
    let mut builder = StateMachineBuilder::new();
    let running = builder.state("running");
    builder.on_event(
        running,
        EventKind::Custom("start"),
        Handler::action(move |ctx, _evt| {
            watchdog.dispatch(ctx, Event::custom("begin", ())).expect("watchdog accepts begin from idle");
            HandlerOutcome::Continue
        }),
    );
    builder.start_state(running);
    ActorSpec { machine: Arc::new(builder.build().unwrap()), on_exception: None, on_halt: None }
}

#[test]
fn a_monitor_stuck_hot_is_reported_as_a_liveness_violation() {
    for seed in 0..20 {
        let config = Config::builder().seed(seed).fair_step_bound(50).build();
        let sched = support::scheduler_with(config, seed);
        let rt = ActorRuntime::new(Arc::clone(&sched));

        let watchdog = Arc::new(watchdog_monitor());
        rt.register_monitor(Arc::clone(&watchdog));

        let wd = Arc::clone(&watchdog);
        rt.register_kind("pulse", move || pulse_spec(Arc::clone(&wd)));
        rt.create_actor("pulse", Event::custom("start", ()), None);

        let spinner = |sched: Arc<weave_core::Scheduler>, name: &'static str| {
            thread::spawn(move || {
                let op = sched.register_operation(None, name);
                let mut spin = SpinWait::new(Arc::clone(&sched));
                loop {
                    if let Err(err) = spin.spin_once(op) {
                        return err;
                    }
                }
            })
        };

        let s1 = spinner(Arc::clone(&sched), "spinner-a");
        let s2 = spinner(Arc::clone(&sched), "spinner-b");

        let err1 = s1.join().unwrap();
        let err2 = s2.join().unwrap();

        assert!(
            matches!(err1, TestError::LivenessViolation { ref state_name, .. } if state_name == "busy"),
            "seed {seed}: expected a liveness violation naming the busy state, got {err1:?}"
        );
        assert!(matches!(err2, TestError::LivenessViolation { .. }));
    }
}
