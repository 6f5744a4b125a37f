//! Logging module - Run artifacts written during a search.
//!
//! Three sinks, all line-oriented so they can be tailed mid-run: a summary
//! CSV of archive statistics, a CSV of every evaluated individual, and a
//! JSONL stream of full archive snapshots for offline analysis.

mod individual_log;
mod snapshot_log;
mod summary_log;

pub use individual_log::IndividualLog;
pub use snapshot_log::SnapshotLog;
pub use summary_log::SummaryLog;
