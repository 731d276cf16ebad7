//! Phase diff: what changed between two phase snapshots.

use std::collections::HashSet;

use serde::Serialize;

use crate::types::{preview, MemoryItem, PREVIEW_CHARS};

use super::ledger::PhaseSnapshot;

/// An item of the older phase and the item that took its place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseReplacement {
    pub before: MemoryItem,
    pub after: MemoryItem,
    /// Bracket-free one-liner describing the change.
    pub merged_text: String,
}

/// Classification of every item that differs between two phases.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseDiff {
    pub from_phase_id: String,
    pub to_phase_id: String,
    pub added: Vec<MemoryItem>,
    pub deleted: Vec<MemoryItem>,
    pub replaced: Vec<PhaseReplacement>,
}

impl PhaseDiff {
    /// Compare two snapshots.
    ///
    /// Items with the same id or the same text fingerprint are unchanged. A
    /// newer item replaces an older one when it supersedes it or shares its
    /// dedup key with different text. Everything else is added or deleted.
    pub fn between(from: &PhaseSnapshot, to: &PhaseSnapshot) -> Self {
        let to_ids: HashSet<u64> = to.items.iter().map(|i| i.id).collect();
        let from_ids: HashSet<u64> = from.items.iter().map(|i| i.id).collect();
        let mut remaining: Vec<&MemoryItem> =
            from.items.iter().filter(|i| !to_ids.contains(&i.id)).collect();

        let mut added = Vec::new();
        let mut replaced = Vec::new();
        for after in to.items.iter().filter(|i| !from_ids.contains(&i.id)) {
            let fingerprint = after.fingerprint();
            let superseded: Vec<u64> = after.superseded_ids().collect();
            let by_link = remaining.iter().position(|b| superseded.contains(&b.id));
            let by_key = || {
                remaining
                    .iter()
                    .position(|b| b.meta.dedup_key == after.meta.dedup_key)
            };
            let by_text = || remaining.iter().position(|b| b.fingerprint() == fingerprint);

            if let Some(pos) = by_link.or_else(by_key) {
                let before = remaining.remove(pos);
                if before.fingerprint() != fingerprint || by_link.is_some() {
                    replaced.push(PhaseReplacement {
                        merged_text: merge_text(before, after),
                        before: before.clone(),
                        after: after.clone(),
                    });
                }
            } else if let Some(pos) = by_text() {
                remaining.remove(pos);
            } else {
                added.push(after.clone());
            }
        }
        let deleted = remaining.into_iter().cloned().collect();

        Self {
            from_phase_id: from.phase_id.clone(),
            to_phase_id: to.phase_id.clone(),
            added,
            deleted,
            replaced,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.replaced.is_empty()
    }

    /// Count line, e.g. `2 added, 1 deleted, 0 replaced`.
    pub fn summary_lines(&self) -> Vec<String> {
        vec![
            format!(
                "{} added, {} deleted, {} replaced",
                self.added.len(),
                self.deleted.len(),
                self.replaced.len()
            ),
            format!("From {} to {}", self.from_phase_id, self.to_phase_id),
        ]
    }
}

fn merge_text(before: &MemoryItem, after: &MemoryItem) -> String {
    format!(
        "{} replaced by {}",
        preview(&before.text, PREVIEW_CHARS),
        preview(&after.text, PREVIEW_CHARS)
    )
}
