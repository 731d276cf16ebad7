//! Wake-up report shown when an engine is loaded.

use serde::Serialize;

use crate::types::{count_sentence, scrub_brackets, Lane};

use super::write::MemoryEngine;

/// Counts behind the wake-up report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WakeUpStats {
    /// Loaded from a snapshot rather than started empty.
    pub restored: bool,
    pub total_items: usize,
    pub team_items: usize,
    pub active_rules: usize,
    pub pending_proposals: usize,
    pub pending_handoffs: usize,
}

/// Plain lines describing what memory came back.
pub fn wake_up_lines(stats: &WakeUpStats) -> Vec<String> {
    vec![
        if stats.restored {
            "Memory was restored.".to_string()
        } else {
            "Memory started fresh.".to_string()
        },
        format!("Total items are {}.", stats.total_items),
        if stats.team_items > 0 {
            "Team memory loaded.".to_string()
        } else {
            "No team memory yet.".to_string()
        },
        count_sentence(
            stats.active_rules,
            "No rules are active.",
            "rule active.",
            "rules active.",
        ),
        count_sentence(
            stats.pending_proposals,
            "No proposals are waiting.",
            "proposal still waiting.",
            "proposals still waiting.",
        ),
        count_sentence(
            stats.pending_handoffs,
            "No handoffs are waiting.",
            "handoff is waiting.",
            "handoffs are waiting.",
        ),
    ]
}

/// Lines shown instead of the report when a snapshot cannot be loaded.
pub fn restore_failed_lines(reason: &str, detail: &str) -> Vec<String> {
    let mut lines = vec!["Memory restore failed.".to_string()];
    lines.extend(
        [reason, detail]
            .iter()
            .map(|text| scrub_brackets(text))
            .filter(|text| !text.is_empty()),
    );
    lines
}

impl MemoryEngine {
    pub fn wake_up_stats(&self, restored: bool) -> WakeUpStats {
        let team_items = self.all_items().filter(|i| i.lane() == Lane::Team).count();
        WakeUpStats {
            restored,
            total_items: self.all_items().count(),
            team_items,
            active_rules: self.agreements.rule_count(),
            pending_proposals: self.agreements.pending_count(),
            pending_handoffs: self.handoffs.pending_count(),
        }
    }
}
