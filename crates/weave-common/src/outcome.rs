use crate::error::TestError;

/// The result of one completed (or frozen) iteration, handed to
/// `Strategy::end_iteration` and folded into the run report.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IterationOutcome {
    /// Set when the iteration ended on a bug rather than all operations
    /// completing cleanly.
    pub bug: Option<TestError>,
    pub fair_steps: u64,
    pub unfair_steps: u64,
    /// Whether the iteration ran to completion within the fair step bound
    /// without any enabled operation being starved (spec "Fair schedule").
    pub fair: bool,
}

impl IterationOutcome {
    pub fn clean(fair_steps: u64, unfair_steps: u64, fair: bool) -> Self {
        IterationOutcome { bug: None, fair_steps, unfair_steps, fair }
    }

    pub fn failed(bug: TestError, fair_steps: u64, unfair_steps: u64, fair: bool) -> Self {
        IterationOutcome { bug: Some(bug), fair_steps, unfair_steps, fair }
    }

    pub fn is_bug(&self) -> bool {
        self.bug.is_some()
    }
}
