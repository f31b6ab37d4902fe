//! [MODULE K] The run-wide report: what a whole exploration (all
//! iterations of one scenario) produced, aggregated from each iteration's
//! `IterationOutcome` plus the merged coverage graph (spec §4.K, §6
//! "Report outputs").

use tracing::debug;

use weave_common::error::TestError;
use weave_common::outcome::IterationOutcome;

use crate::coverage::CoverageGraph;

/// Per-iteration tallies folded into a `RunReport`. Kept separate from
/// `IterationOutcome` so this crate can compute the aggregate bookkeeping
/// (min/avg/max) without re-deriving it from the bug/fair fields on every
/// call to `to_text`/`to_json`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunReport {
    pub iterations: u64,
    pub fair_schedules: u64,
    pub unfair_schedules: u64,
    pub step_bound_hits: u64,
    pub min_operations: Option<u64>,
    pub max_operations: Option<u64>,
    pub avg_operations: f64,
    pub total_steps: u64,
    pub bugs: Vec<TestError>,
    pub uncontrolled_call_sites: Vec<String>,
    pub coverage: CoverageGraph,
}

impl Default for RunReport {
    fn default() -> Self {
        RunReport {
            iterations: 0,
            fair_schedules: 0,
            unfair_schedules: 0,
            step_bound_hits: 0,
            min_operations: None,
            max_operations: None,
            avg_operations: 0.0,
            total_steps: 0,
            bugs: Vec::new(),
            uncontrolled_call_sites: Vec::new(),
            coverage: CoverageGraph::new(),
        }
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one iteration's outcome, operation count, and coverage into
    /// the running aggregate. `hit_step_bound` is set when the iteration's
    /// strategy stopped the run because `Config::max_steps` was reached
    /// rather than because the program under test ran to completion.
    pub fn record_iteration(&mut self, outcome: &IterationOutcome, operation_count: u64, hit_step_bound: bool, coverage: &CoverageGraph) {
        self.iterations += 1;
        if outcome.fair {
            self.fair_schedules += 1;
        } else {
            self.unfair_schedules += 1;
        }
        if hit_step_bound {
            self.step_bound_hits += 1;
        }
        self.total_steps += outcome.fair_steps + outcome.unfair_steps;

        self.min_operations = Some(self.min_operations.map_or(operation_count, |m| m.min(operation_count)));
        self.max_operations = Some(self.max_operations.map_or(operation_count, |m| m.max(operation_count)));
        let n = self.iterations as f64;
        self.avg_operations += (operation_count as f64 - self.avg_operations) / n;

        if let Some(bug) = &outcome.bug {
            if !self.bugs.contains(bug) {
                debug!(bug = %bug, iteration = self.iterations, "new distinct bug recorded");
                self.bugs.push(bug.clone());
            }
        }
        self.coverage.merge(coverage);
    }

    pub fn record_uncontrolled_call_site(&mut self, call_site: impl Into<String>) {
        let call_site = call_site.into();
        if !self.uncontrolled_call_sites.contains(&call_site) {
            self.uncontrolled_call_sites.push(call_site);
        }
    }

    pub fn passed(&self) -> bool {
        self.bugs.is_empty()
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str("Exploration report\n");
        out.push_str(&"=".repeat(40));
        out.push('\n');
        out.push_str(&format!("Iterations:        {}\n", self.iterations));
        out.push_str(&format!("Fair schedules:     {}\n", self.fair_schedules));
        out.push_str(&format!("Unfair schedules:   {}\n", self.unfair_schedules));
        out.push_str(&format!("Step-bound hits:    {}\n", self.step_bound_hits));
        out.push_str(&format!(
            "Operations (min/avg/max): {}/{:.1}/{}\n",
            self.min_operations.unwrap_or(0),
            self.avg_operations,
            self.max_operations.unwrap_or(0)
        ));
        out.push_str(&format!("Total steps:        {}\n", self.total_steps));
        out.push_str(&format!("Coverage nodes:     {}\n", self.coverage.node_count()));
        out.push_str(&format!("Coverage links:     {}\n", self.coverage.link_count()));
        out.push_str(&format!("Status:             {}\n", if self.passed() { "PASS" } else { "FAIL" }));

        if !self.bugs.is_empty() {
            out.push_str("\nBugs found:\n");
            for bug in &self.bugs {
                out.push_str(&format!("  - {bug}\n"));
            }
        }
        if !self.uncontrolled_call_sites.is_empty() {
            out.push_str("\nUncontrolled call sites:\n");
            for site in &self.uncontrolled_call_sites {
                out.push_str(&format!("  - {site}\n"));
            }
        }
        out
    }

    pub fn to_json(&self) -> Result<String, TestError> {
        serde_json::to_string_pretty(self).map_err(|e| TestError::internal(format!("report serialization failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_two_iterations_averages_operation_counts() {
        let mut report = RunReport::new();
        report.record_iteration(&IterationOutcome::clean(10, 0, true), 2, false, &CoverageGraph::new());
        report.record_iteration(&IterationOutcome::clean(8, 0, true), 4, false, &CoverageGraph::new());
        assert_eq!(report.min_operations, Some(2));
        assert_eq!(report.max_operations, Some(4));
        assert_eq!(report.avg_operations, 3.0);
        assert!(report.passed());
    }

    #[test]
    fn a_bug_in_any_iteration_fails_the_report_and_dedupes() {
        let mut report = RunReport::new();
        let bug = TestError::assertion("boom");
        report.record_iteration(&IterationOutcome::failed(bug.clone(), 1, 0, true), 1, false, &CoverageGraph::new());
        report.record_iteration(&IterationOutcome::failed(bug, 1, 0, true), 1, false, &CoverageGraph::new());
        assert!(!report.passed());
        assert_eq!(report.bugs.len(), 1);
    }

    #[test]
    fn to_json_round_trips_through_serde_json() {
        let mut report = RunReport::new();
        report.record_iteration(&IterationOutcome::clean(1, 0, true), 1, false, &CoverageGraph::new());
        let json = report.to_json().unwrap();
        assert!(json.contains("\"iterations\": 1"));
    }
}
