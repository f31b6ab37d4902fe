//! No library surface of its own -- this crate exists to hold the
//! end-to-end scenario tests under `tests/`, each one driving the
//! scheduler, primitives, and actor/monitor layers together the way a
//! real program under test would.
