use rustc_hash::FxHashMap;

use weave_common::ids::OperationId;
use weave_common::IterationOutcome;
use weave_random::RandomSource;

use crate::Strategy;

const CHANGE_POINT_PROBABILITY: f64 = 0.1;

/// Coyote-style "PCT" priority-based strategy: each operation gets a
/// random priority rank the first time it's seen, lower rank wins, and
/// occasionally (sampled per scheduling point from the same seeded
/// stream) the lowest-ranked op is demoted to the bottom of the order.
/// Demoting rather than re-randomizing everything keeps most of the
/// schedule stable between priority-change points, which is what makes
/// this strategy good at finding bugs that need a specific low-probability
/// interleaving near a single priority inversion (spec §4.D "PriorityBased").
pub struct PriorityStrategy {
    random: RandomSource,
    ranks: FxHashMap<OperationId, u32>,
    order: Vec<OperationId>,
    next_rank: u32,
}

impl PriorityStrategy {
    pub fn new(seed: u64) -> Self {
        PriorityStrategy {
            random: RandomSource::new(seed),
            ranks: FxHashMap::default(),
            order: Vec::new(),
            next_rank: 0,
        }
    }

    fn rank_of(&mut self, op: OperationId) -> u32 {
        if let Some(rank) = self.ranks.get(&op) {
            return *rank;
        }
        let rank = self.next_rank;
        self.next_rank += 1;
        self.ranks.insert(op, rank);
        self.order.push(op);
        rank
    }

    fn demote_lowest(&mut self, enabled: &[OperationId]) {
        let Some(lowest) = enabled.iter().copied().min_by_key(|op| self.rank_of(*op)) else {
            return;
        };
        let bottom = self.next_rank;
        self.next_rank += 1;
        self.ranks.insert(lowest, bottom);
    }
}

impl Strategy for PriorityStrategy {
    fn next_choice(&mut self, enabled: &[OperationId]) -> usize {
        for op in enabled {
            self.rank_of(*op);
        }
        if enabled.len() > 1 && self.random.next_bool(CHANGE_POINT_PROBABILITY) {
            self.demote_lowest(enabled);
        }
        enabled
            .iter()
            .enumerate()
            .min_by_key(|(_, op)| self.ranks[op])
            .map(|(idx, _)| idx)
            .unwrap_or(0)
    }

    fn next_bool(&mut self) -> bool {
        self.random.next_bool(0.5)
    }

    fn next_int(&mut self, max: u64) -> u64 {
        self.random.next_int(max)
    }

    fn begin_iteration(&mut self, _iteration: u64) {
        self.ranks.clear();
        self.order.clear();
        self.next_rank = 0;
    }

    fn end_iteration(&mut self, _result: &IterationOutcome) {}

    fn is_fair(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "priority"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_operations_are_assigned_distinct_ranks() {
        let mut s = PriorityStrategy::new(1);
        let a = OperationId::from_u64(1);
        let b = OperationId::from_u64(2);
        s.rank_of(a);
        s.rank_of(b);
        assert_ne!(s.ranks[&a], s.ranks[&b]);
    }

    #[test]
    fn a_single_enabled_op_is_always_chosen() {
        let mut s = PriorityStrategy::new(1);
        let enabled = vec![OperationId::from_u64(9)];
        for _ in 0..10 {
            assert_eq!(s.next_choice(&enabled), 0);
        }
    }

    #[test]
    fn begin_iteration_resets_ranks() {
        let mut s = PriorityStrategy::new(1);
        let enabled = vec![OperationId::from_u64(1)];
        s.next_choice(&enabled);
        assert!(!s.ranks.is_empty());
        s.begin_iteration(1);
        assert!(s.ranks.is_empty());
    }
}
