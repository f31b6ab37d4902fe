use weave_common::ids::OperationId;
use weave_common::IterationOutcome;

use crate::Strategy;

/// Depth-first enumeration of interleavings.
///
/// Each iteration replays the previous iteration's decision prefix, then
/// diverges by trying the next untried branch at the first choice point
/// after the prefix, preferring the leftmost (index `0`) unexplored
/// branch. At the end of an iteration the last decision point is
/// incremented; once it has tried every branch it is popped and the
/// decision before it is incremented instead, classic DFS backtracking.
/// `done()` reports when the whole tree (as explored by decision points
/// actually visited) has been exhausted (spec §4.D "Exhaustive").
pub struct ExhaustiveStrategy {
    /// (chosen index, number of branches available at that point) for the
    /// iteration currently in progress.
    current_log: Vec<(usize, usize)>,
    /// Prefix to replay verbatim at the start of the next iteration.
    next_prefix: Vec<usize>,
    position: usize,
    done: bool,
}

impl ExhaustiveStrategy {
    pub fn new(_seed: u64) -> Self {
        ExhaustiveStrategy { current_log: Vec::new(), next_prefix: Vec::new(), position: 0, done: false }
    }

    pub fn done(&self) -> bool {
        self.done
    }

    fn advance_to_next_schedule(&mut self) {
        while let Some((chosen, branches)) = self.current_log.pop() {
            if chosen + 1 < branches {
                let mut prefix: Vec<usize> = self.current_log.iter().map(|(c, _)| *c).collect();
                prefix.push(chosen + 1);
                self.next_prefix = prefix;
                return;
            }
        }
        self.done = true;
        self.next_prefix.clear();
    }
}

impl Strategy for ExhaustiveStrategy {
    fn next_choice(&mut self, enabled: &[OperationId]) -> usize {
        let idx = if self.position < self.next_prefix.len() {
            self.next_prefix[self.position].min(enabled.len().saturating_sub(1))
        } else {
            0
        };
        self.current_log.push((idx, enabled.len()));
        self.position += 1;
        idx
    }

    fn next_bool(&mut self) -> bool {
        self.next_choice(&[OperationId::from_u64(0), OperationId::from_u64(1)]) == 1
    }

    fn next_int(&mut self, max: u64) -> u64 {
        if max == 0 {
            return 0;
        }
        let ops: Vec<OperationId> = (0..max).map(OperationId::from_u64).collect();
        self.next_choice(&ops) as u64
    }

    fn begin_iteration(&mut self, _iteration: u64) {
        self.current_log.clear();
        self.position = 0;
    }

    fn end_iteration(&mut self, _result: &IterationOutcome) {
        self.advance_to_next_schedule();
    }

    fn is_fair(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "exhaustive"
    }
}
