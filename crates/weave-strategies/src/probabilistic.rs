use weave_common::ids::OperationId;
use weave_common::IterationOutcome;
use weave_random::RandomSource;

use crate::Strategy;

/// Random choice biased to repeat the previous pick with probability
/// `stay_bias`, and fall back to uniform random otherwise. Repeating the
/// last winner more often than uniform chance tends to surface bugs that
/// need a long run of one operation before a narrow window opens up in
/// another (spec §4.D "ProbabilisticRandom").
pub struct ProbabilisticRandomStrategy {
    random: RandomSource,
    stay_bias: f64,
    last_pick: Option<OperationId>,
}

impl ProbabilisticRandomStrategy {
    pub fn new(seed: u64, stay_bias: f64) -> Self {
        ProbabilisticRandomStrategy {
            random: RandomSource::new(seed),
            stay_bias: stay_bias.clamp(0.0, 1.0),
            last_pick: None,
        }
    }
}

impl Strategy for ProbabilisticRandomStrategy {
    fn next_choice(&mut self, enabled: &[OperationId]) -> usize {
        if let Some(last) = self.last_pick {
            if let Some(idx) = enabled.iter().position(|op| *op == last) {
                if self.random.next_bool(self.stay_bias) {
                    return idx;
                }
            }
        }
        let idx = self.random.next_int(enabled.len() as u64) as usize;
        self.last_pick = Some(enabled[idx]);
        idx
    }

    fn next_bool(&mut self) -> bool {
        self.random.next_bool(0.5)
    }

    fn next_int(&mut self, max: u64) -> u64 {
        self.random.next_int(max)
    }

    fn begin_iteration(&mut self, _iteration: u64) {
        self.last_pick = None;
    }

    fn end_iteration(&mut self, _result: &IterationOutcome) {}

    fn is_fair(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "probabilistic_random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_bias_behaves_like_uniform_random_and_records_a_pick() {
        let mut s = ProbabilisticRandomStrategy::new(1, 0.0);
        let enabled = vec![OperationId::from_u64(1), OperationId::from_u64(2)];
        let idx = s.next_choice(&enabled);
        assert!(idx < 2);
        assert_eq!(s.last_pick, Some(enabled[idx]));
    }

    #[test]
    fn full_bias_sticks_to_the_previous_pick_while_it_stays_enabled() {
        let mut s = ProbabilisticRandomStrategy::new(1, 1.0);
        let enabled = vec![OperationId::from_u64(1), OperationId::from_u64(2), OperationId::from_u64(3)];
        let first = s.next_choice(&enabled);
        for _ in 0..20 {
            assert_eq!(s.next_choice(&enabled), first);
        }
    }

    #[test]
    fn begin_iteration_clears_the_stickiness() {
        let mut s = ProbabilisticRandomStrategy::new(1, 1.0);
        let enabled = vec![OperationId::from_u64(1)];
        s.next_choice(&enabled);
        assert!(s.last_pick.is_some());
        s.begin_iteration(1);
        assert!(s.last_pick.is_none());
    }
}
