use std::time::Duration;

use weave_common::ids::OperationId;
use weave_common::IterationOutcome;
use weave_random::RandomSource;

use crate::Strategy;

const MAX_DELAY_MICROS: u64 = 2_000;

/// Real-concurrency fuzzing: operations run on genuine OS threads rather
/// than being serialized by the scheduler, and the only nondeterminism
/// injected is a short random delay at each scheduling point (spec §5
/// "Under the Fuzzing policy, ops run on real OS threads and are only
/// perturbed by injected delays"). `serializes()` returning `false` tells
/// the scheduler to skip the mutual-exclusion gate entirely for this
/// strategy.
pub struct FuzzingDelayStrategy {
    random: RandomSource,
}

impl FuzzingDelayStrategy {
    pub fn new(seed: u64) -> Self {
        FuzzingDelayStrategy { random: RandomSource::new(seed) }
    }

    /// A short random delay to sleep at a scheduling point instead of
    /// serializing. Not part of the `Strategy` trait since no other
    /// strategy needs it.
    pub fn random_delay(&mut self) -> Duration {
        Duration::from_micros(self.random.next_int(MAX_DELAY_MICROS))
    }
}

impl Strategy for FuzzingDelayStrategy {
    fn next_choice(&mut self, enabled: &[OperationId]) -> usize {
        self.random.next_int(enabled.len() as u64) as usize
    }

    fn next_bool(&mut self) -> bool {
        self.random.next_bool(0.5)
    }

    fn next_int(&mut self, max: u64) -> u64 {
        self.random.next_int(max)
    }

    fn begin_iteration(&mut self, _iteration: u64) {}

    fn end_iteration(&mut self, _result: &IterationOutcome) {}

    fn is_fair(&self) -> bool {
        false
    }

    fn serializes(&self) -> bool {
        false
    }

    fn fuzz_delay(&mut self) -> Option<Duration> {
        Some(self.random_delay())
    }

    fn name(&self) -> &'static str {
        "fuzzing_delay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_delay_stays_under_the_cap() {
        let mut s = FuzzingDelayStrategy::new(1);
        for _ in 0..100 {
            assert!(s.random_delay() < Duration::from_micros(MAX_DELAY_MICROS));
        }
    }

    #[test]
    fn fuzzing_never_serializes_and_is_never_fair() {
        let s = FuzzingDelayStrategy::new(1);
        assert!(!s.serializes());
        assert!(!s.is_fair());
    }
}
