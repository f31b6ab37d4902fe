//! Coverage graphs, DGML rendering, schedule traces, and the merged
//! run report produced by one exploration (spec §4.K / §6 "Report
//! outputs").
//!
//! This crate depends only on `weave-common` -- it never reaches back
//! into `weave-core` or `weave-actors`, so a report can be assembled,
//! rendered, and replayed without linking the scheduler itself.

pub mod coverage;
pub mod dgml;
pub mod report;
pub mod trace;

pub use coverage::{CoverageGraph, LinkInfo, NodeInfo};
pub use dgml::{from_dgml, to_dgml, DgmlDocument, DgmlLink, DgmlNode};
pub use report::RunReport;
pub use trace::ScheduleTrace;
