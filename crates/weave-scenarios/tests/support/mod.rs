use std::sync::Arc;

use weave_core::{Config, Scheduler};
use weave_strategies::RandomStrategy;

/// A scheduler under the default random strategy, seeded for one
/// iteration. Most scenarios below explore many seeds in a loop rather
/// than relying on one fixed schedule.
pub fn scheduler(seed: u64) -> Arc<Scheduler> {
    Arc::new(Scheduler::new(Config::default(), Box::new(RandomStrategy::new(seed))))
}

pub fn scheduler_with(config: Config, seed: u64) -> Arc<Scheduler> {
    Arc::new(Scheduler::new(config, Box::new(RandomStrategy::new(seed))))
}

/// How many distinct seeds a scenario below samples to stand in for
/// exploring "every" interleaving -- the strategies in `weave-strategies`
/// are seed-driven samplers rather than a literal brute-force enumerator,
/// so broad seed coverage is how this pack approximates exhaustiveness.
pub const SEEDS_TO_SAMPLE: u64 = 200;
