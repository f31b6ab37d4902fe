//! Two threads ping-pong through a pair of auto-reset events, ten
//! handshakes each, under many explored schedules.

mod support;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use weave_core::primitives::ControlledEvent;

#[test]
fn ping_pong_completes_with_exactly_twenty_handshakes_across_many_schedules() {
    for seed in 0..support::SEEDS_TO_SAMPLE {
        let sched = support::scheduler(seed);
        let evt1 = Arc::new(ControlledEvent::auto(Arc::clone(&sched), true));
        let evt2 = Arc::new(ControlledEvent::auto(Arc::clone(&sched), false));
        let handshakes = Arc::new(AtomicU64::new(0));

        let s1 = Arc::clone(&sched);
        let e1 = Arc::clone(&evt1);
        let e2 = Arc::clone(&evt2);
        let h1 = Arc::clone(&handshakes);
        let t1 = thread::spawn(move || {
            let op = s1.register_operation(None, "thread-a");
            for _ in 0..10 {
                e1.wait(op).unwrap();
                h1.fetch_add(1, Ordering::SeqCst);
                e2.set(op).unwrap();
            }
            s1.complete(op);
        });

        let s2 = Arc::clone(&sched);
        let e1 = Arc::clone(&evt1);
        let e2 = Arc::clone(&evt2);
        let h2 = Arc::clone(&handshakes);
        let t2 = thread::spawn(move || {
            let op = s2.register_operation(None, "thread-b");
            for _ in 0..10 {
                e2.wait(op).unwrap();
                h2.fetch_add(1, Ordering::SeqCst);
                e1.set(op).unwrap();
            }
            s2.complete(op);
        });

        t1.join().unwrap();
        t2.join().unwrap();

        assert!(sched.registry().all_completed(), "seed {seed}: both threads should finish with no deadlock");
        assert_eq!(handshakes.load(Ordering::SeqCst), 20, "seed {seed}: ten handshakes per side");
    }
}
