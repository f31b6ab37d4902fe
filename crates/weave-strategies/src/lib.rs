//! [MODULE D] Pluggable scheduling strategies.
//!
//! A `Strategy` is consulted by the scheduler at every scheduling point to
//! pick which enabled operation runs next, and is the single place
//! nondeterminism enters a run. All five strategies here wrap their own
//! `weave_random::RandomSource`, constructed from the run seed, so a
//! strategy is fully reproducible on its own -- replay only needs to feed
//! the same seed and schedule trace back in.

mod exhaustive;
mod fuzzing;
mod priority;
mod probabilistic;
mod random;

pub use exhaustive::ExhaustiveStrategy;
pub use fuzzing::FuzzingDelayStrategy;
pub use priority::PriorityStrategy;
pub use probabilistic::ProbabilisticRandomStrategy;
pub use random::RandomStrategy;

use weave_common::ids::OperationId;
use weave_common::IterationOutcome;

/// Policy interface every scheduling strategy implements (spec §4.D).
///
/// `next_choice` is the only method the scheduler calls to make a
/// scheduling decision; `next_bool`/`next_int` are exposed so controlled
/// primitives (a `SpinWait` fake-progress decision, a timer jitter) can
/// draw from the same seeded stream without the scheduler needing its own
/// separate random source.
pub trait Strategy: Send {
    /// Pick an index into `enabled` (which is never empty when called).
    fn next_choice(&mut self, enabled: &[OperationId]) -> usize;

    fn next_bool(&mut self) -> bool;

    fn next_int(&mut self, max: u64) -> u64;

    fn begin_iteration(&mut self, iteration: u64);

    fn end_iteration(&mut self, result: &IterationOutcome);

    /// Whether this strategy's schedules are fair -- every continuously
    /// enabled operation is eventually scheduled. Liveness checking only
    /// makes sense under a fair strategy (spec §4.C, §7).
    fn is_fair(&self) -> bool;

    /// Whether the scheduler should actually serialize operations behind
    /// this strategy's choices. `FuzzingDelayStrategy` is the one strategy
    /// that says no: under fuzzing, operations run concurrently on real OS
    /// threads and are only perturbed by injected delays (spec §5).
    fn serializes(&self) -> bool {
        true
    }

    /// A delay to sleep instead of serializing, for strategies where
    /// `serializes()` is `false`. `None` for every serializing strategy.
    fn fuzz_delay(&mut self) -> Option<std::time::Duration> {
        None
    }

    /// Human-readable name, used in run reports and `Config`.
    fn name(&self) -> &'static str;
}
