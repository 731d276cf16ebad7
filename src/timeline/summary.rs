//! Team memory summary rendered from a phase diff.

use serde::Serialize;

use crate::types::{preview, scrub_brackets, PREVIEW_CHARS};

use super::diff::PhaseDiff;

/// Most change lines rendered before the remainder is folded into a count.
pub const MAX_TEAM_SUMMARY_LINES: usize = 8;

/// Human-facing narrative of what changed in shared memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamSummary {
    pub title: String,
    pub lines: Vec<String>,
}

/// Render a diff as a deterministic, bracket-free narrative.
///
/// Order: additions, then replacements, then removals, each in phase order.
pub fn build_team_summary(diff: &PhaseDiff) -> TeamSummary {
    let title = scrub_brackets(&format!(
        "Team memory changes from {} to {}",
        diff.from_phase_id, diff.to_phase_id
    ));
    if diff.is_empty() {
        return TeamSummary {
            title,
            lines: vec!["No team memory changes.".to_string()],
        };
    }

    let mut changes: Vec<String> = Vec::new();
    changes.extend(
        diff.added
            .iter()
            .map(|i| format!("Added: {}", preview(&i.text, PREVIEW_CHARS))),
    );
    changes.extend(
        diff.replaced
            .iter()
            .map(|r| format!("Changed: {}", scrub_brackets(&r.merged_text))),
    );
    changes.extend(
        diff.deleted
            .iter()
            .map(|i| format!("Removed: {}", preview(&i.text, PREVIEW_CHARS))),
    );

    let total = changes.len();
    let mut lines: Vec<String> = changes.into_iter().take(MAX_TEAM_SUMMARY_LINES).collect();
    if total > MAX_TEAM_SUMMARY_LINES {
        let rest = total - MAX_TEAM_SUMMARY_LINES;
        lines.push(if rest == 1 {
            "And 1 more change.".to_string()
        } else {
            format!("And {} more changes.", rest)
        });
    }
    TeamSummary { title, lines }
}
