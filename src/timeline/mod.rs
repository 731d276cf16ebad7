//! Phase timeline: registry, ledger snapshots, diffs and team summaries.

pub mod diff;
pub mod ledger;
pub mod phase;
pub mod summary;

pub use diff::{PhaseDiff, PhaseReplacement};
pub use ledger::{PhaseLedger, PhaseSnapshot};
pub use phase::{Phase, PhaseRegistry};
pub use summary::{build_team_summary, TeamSummary, MAX_TEAM_SUMMARY_LINES};
