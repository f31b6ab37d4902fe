//! Two threads acquire a pair of mutexes in opposite order, each holding
//! its first lock while waiting on the other's: a classic deadlock that
//! the scheduler must detect and name rather than hang on forever.

mod support;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use weave_common::TestError;
use weave_core::primitives::ControlledMutex;

#[test]
fn opposite_order_locking_is_reported_as_a_deadlock_across_many_schedules() {
    for seed in 0..support::SEEDS_TO_SAMPLE {
        let sched = support::scheduler(seed);
        let m1 = Arc::new(ControlledMutex::new(Arc::clone(&sched), false));
        let m2 = Arc::new(ControlledMutex::new(Arc::clone(&sched), false));

        let sa = Arc::clone(&sched);
        let m1a = Arc::clone(&m1);
        let m2a = Arc::clone(&m2);
        let ta = thread::spawn(move || {
            let op = sa.register_operation(None, "a");
            sa.schedule_point(op).unwrap();
            m1a.lock(op).unwrap();
            thread::sleep(Duration::from_millis(10));
            m2a.lock(op)
        });

        let sb = Arc::clone(&sched);
        let m1b = Arc::clone(&m1);
        let m2b = Arc::clone(&m2);
        let tb = thread::spawn(move || {
            let op = sb.register_operation(None, "b");
            sb.schedule_point(op).unwrap();
            thread::sleep(Duration::from_millis(5));
            m2b.lock(op).unwrap();
            m1b.lock(op)
        });

        let ra = ta.join().unwrap();
        let rb = tb.join().unwrap();

        assert!(ra.is_err(), "seed {seed}: thread a should be frozen by the detected deadlock");
        assert!(rb.is_err(), "seed {seed}: thread b should be frozen by the detected deadlock");
        assert!(
            matches!(ra.unwrap_err(), TestError::DeadlockDetected { .. }),
            "seed {seed}: the scheduler should name the deadlock rather than report some other error"
        );
        assert!(matches!(rb.unwrap_err(), TestError::DeadlockDetected { .. }));
    }
}
