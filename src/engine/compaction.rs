//! Compaction engine: reason-coded eviction and deterministic summaries.

use std::cmp::Reverse;

use serde::Serialize;

use crate::types::{
    preview, scrub_brackets, Authority, CompactionWeights, EventType, MemoryItem, MemoryKind,
    ReasonCode, PREVIEW_CHARS,
};

/// Items chosen for eviction and why.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompactionSelection {
    /// Selected items, in eviction order.
    pub items: Vec<MemoryItem>,
    /// Reason codes justifying the selection, in the fixed order
    /// context, low_importance, no_links.
    pub reasons: Vec<ReasonCode>,
    /// Reason codes of each selected item.
    pub item_reasons: Vec<(u64, Vec<ReasonCode>)>,
}

impl CompactionSelection {
    pub fn ids(&self) -> Vec<u64> {
        self.items.iter().map(|i| i.id).collect()
    }
}

/// One row of a summary ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub id: u64,
    pub kind: MemoryKind,
    pub event_type: EventType,
    pub tick: u64,
    pub source: String,
    pub preview: String,
    pub links: Vec<String>,
}

/// Deterministic summary of evicted items. Every string is bracket-free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompactionSummary {
    pub title: String,
    pub lines: Vec<String>,
    pub ledger: Vec<LedgerEntry>,
}

impl CompactionSummary {
    /// Title and lines joined into item text.
    pub fn text(&self) -> String {
        std::iter::once(self.title.as_str())
            .chain(self.lines.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Ranks compaction candidates with configurable weights.
#[derive(Debug, Clone, Default)]
pub struct CompactionEngine {
    weights: CompactionWeights,
}

impl CompactionEngine {
    pub fn new(weights: CompactionWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &CompactionWeights {
        &self.weights
    }

    /// Reason codes that apply to an item, in fixed order.
    pub fn reasons_for(&self, item: &MemoryItem) -> Vec<ReasonCode> {
        let mut reasons = Vec::new();
        if item.event_type() == EventType::Context {
            reasons.push(ReasonCode::Context);
        }
        if item.importance <= self.weights.low_importance_threshold {
            reasons.push(ReasonCode::LowImportance);
        }
        if !item.has_links() {
            reasons.push(ReasonCode::NoLinks);
        }
        reasons
    }

    /// Weighted eviction score. Higher goes first.
    pub fn score(&self, item: &MemoryItem) -> u32 {
        self.reasons_for(item)
            .iter()
            .map(|r| match r {
                ReasonCode::Context => self.weights.context,
                ReasonCode::LowImportance => self.weights.low_importance,
                ReasonCode::NoLinks => self.weights.no_links,
                _ => 0,
            })
            .sum()
    }

    /// Choose at most `max_remove` items of `target` kind in a phase.
    ///
    /// Summaries are never candidates. Approved items, those asserted by a
    /// user, are only candidates with `allow_delete_approved`. Ties break
    /// oldest first.
    pub fn select_compaction_items(
        &self,
        items: &[MemoryItem],
        phase_id: &str,
        target: MemoryKind,
        max_remove: usize,
        allow_delete_approved: bool,
    ) -> CompactionSelection {
        let mut candidates: Vec<(u32, &MemoryItem)> = items
            .iter()
            .filter(|i| i.kind == target && i.phase_id() == phase_id && !i.is_summary())
            .filter(|i| allow_delete_approved || i.meta.authority != Authority::UserAsserted)
            .map(|i| (self.score(i), i))
            .collect();
        candidates.sort_by_key(|(score, item)| (Reverse(*score), item.tick, item.id));

        let mut selection = CompactionSelection::default();
        for (_, item) in candidates.into_iter().take(max_remove) {
            let reasons = self.reasons_for(item);
            for reason in &reasons {
                if !selection.reasons.contains(reason) {
                    selection.reasons.push(*reason);
                }
            }
            selection.item_reasons.push((item.id, reasons));
            selection.items.push(item.clone());
        }
        selection.reasons.sort();
        selection
    }
}

/// Select with the default weights.
pub fn select_compaction_items(
    items: &[MemoryItem],
    phase_id: &str,
    target: MemoryKind,
    max_remove: usize,
    allow_delete_approved: bool,
) -> CompactionSelection {
    CompactionEngine::default().select_compaction_items(
        items,
        phase_id,
        target,
        max_remove,
        allow_delete_approved,
    )
}

/// Summarize items in the order given.
pub fn summarize_items(items: &[MemoryItem]) -> CompactionSummary {
    let title = if items.len() == 1 {
        "Compacted 1 item".to_string()
    } else {
        format!("Compacted {} items", items.len())
    };
    let lines = items
        .iter()
        .map(|i| {
            scrub_brackets(&format!(
                "{} from {}: {}",
                i.event_type(),
                i.source,
                preview(&i.text, PREVIEW_CHARS)
            ))
        })
        .collect();
    let ledger = items
        .iter()
        .map(|i| LedgerEntry {
            id: i.id,
            kind: i.kind,
            event_type: i.event_type(),
            tick: i.tick,
            source: scrub_brackets(&i.source),
            preview: preview(&i.text, PREVIEW_CHARS),
            links: i
                .meta
                .links
                .iter()
                .map(|l| format!("{} item {}", l.link_type.name(), l.target_id))
                .collect(),
        })
        .collect();
    CompactionSummary {
        title,
        lines,
        ledger,
    }
}
