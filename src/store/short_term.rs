//! Short-term memory: raw turns per phase plus one rolling summary.

use crate::engine::compaction::summarize_items;
use crate::scope::StoreKey;
use crate::types::{
    Authority, EventType, ItemMeta, LaneMeta, LinkType, MemoryItem, MemoryKind, MemoryLink,
    PhaseStamp, ReasonCode, Space,
};

use super::factory::{ItemFactory, NewItem};
use super::memory_store::{MemoryStore, StoreOutcome};

/// Source recorded on summary items.
pub const SUMMARY_SOURCE: &str = "summary";

/// Result of [`ShortTermMemory::summarize_if_needed`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryOutcome {
    /// The new summary, when one was written.
    pub summary: Option<MemoryItem>,
    /// Raw turns folded into the summary, oldest first.
    pub evicted: Vec<MemoryItem>,
    /// The previous summary of the phase, now removed.
    pub replaced: Option<MemoryItem>,
}

/// Short-term store with turn-limit summarization.
#[derive(Debug, Clone)]
pub struct ShortTermMemory {
    store: MemoryStore,
}

impl ShortTermMemory {
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new(MemoryKind::ShortTerm),
        }
    }

    pub fn from_store(store: MemoryStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MemoryStore {
        &mut self.store
    }

    /// Append a turn. Short-term memory never dedupes.
    pub fn store_item(&mut self, key: &StoreKey, item: MemoryItem) -> StoreOutcome {
        self.store.store_item(key, item, false)
    }

    /// Summary head followed by the remaining raw turns in original order.
    ///
    /// `limit` caps the number of raw turns, keeping the most recent ones.
    pub fn recall(
        &self,
        key: &StoreKey,
        phase_id: Option<&str>,
        limit: Option<usize>,
    ) -> Vec<MemoryItem> {
        let in_phase = |item: &&MemoryItem| phase_id.map_or(true, |p| item.phase_id() == p);
        let items = self.store.items(key);
        let (summaries, raw): (Vec<&MemoryItem>, Vec<&MemoryItem>) =
            items.iter().filter(in_phase).partition(|i| i.is_summary());
        let skip = limit.map_or(0, |l| raw.len().saturating_sub(l));
        summaries
            .into_iter()
            .chain(raw.into_iter().skip(skip))
            .cloned()
            .collect()
    }

    /// Fold the oldest turns of a phase into a summary once the phase holds
    /// more than `max_turns` raw turns.
    ///
    /// The new summary covers the evicted turns and everything the previous
    /// summary covered, and replaces that summary.
    #[allow(clippy::too_many_arguments)]
    pub fn summarize_if_needed(
        &mut self,
        factory: &mut ItemFactory,
        key: &StoreKey,
        max_turns: usize,
        phase: &PhaseStamp,
        space: Space,
        owner: &str,
        lane: LaneMeta,
    ) -> SummaryOutcome {
        let raw_ids: Vec<u64> = self
            .store
            .items_in_phase(key, &phase.phase_id)
            .into_iter()
            .filter(|i| !i.is_summary())
            .map(|i| i.id)
            .collect();
        if raw_ids.len() <= max_turns {
            return SummaryOutcome::default();
        }
        let excess = raw_ids.len() - max_turns;
        let evicted = self.store.remove_many(key, &raw_ids[..excess]);

        let prior_id = self
            .store
            .items_in_phase(key, &phase.phase_id)
            .into_iter()
            .rev()
            .find(|i| i.is_summary())
            .map(|i| i.id);
        let replaced = prior_id.and_then(|id| self.store.remove(key, id));

        let mut covered: Vec<u64> = replaced
            .as_ref()
            .map(|p| p.meta.summary_of.clone())
            .unwrap_or_default();
        covered.extend(evicted.iter().map(|i| i.id));

        let mut lines: Vec<String> = replaced
            .as_ref()
            .map(|p| p.text.lines().skip(1).map(str::to_string).collect())
            .unwrap_or_default();
        lines.extend(summarize_items(&evicted).lines);
        let title = if covered.len() == 1 {
            "Summary of 1 earlier turn".to_string()
        } else {
            format!("Summary of {} earlier turns", covered.len())
        };
        let text = std::iter::once(title)
            .chain(lines)
            .collect::<Vec<_>>()
            .join("\n");

        let mut meta = ItemMeta::new(EventType::Context, space, owner, lane, phase.clone())
            .authority(Authority::SystemImposed, "summarized from earlier turns")
            .summary_of(covered);
        for item in &evicted {
            meta = meta.link(MemoryLink::new(
                LinkType::Summarizes,
                item.id,
                ReasonCode::Summarized,
            ));
        }
        if let Some(prior) = &replaced {
            meta = meta.link(MemoryLink::new(
                LinkType::Supersedes,
                prior.id,
                ReasonCode::Replaced,
            ));
        }
        let summary = factory.create(
            NewItem::new(MemoryKind::ShortTerm, text, SUMMARY_SOURCE, meta)
                .importance(0, Vec::new()),
        );
        log::debug!(
            "Summarized {} turns in {} phase {} into item {}",
            evicted.len(),
            key,
            phase.phase_id,
            summary.id
        );
        self.store.store_item(key, summary.clone(), false);

        SummaryOutcome {
            summary: Some(summary),
            evicted,
            replaced,
        }
    }
}

impl Default for ShortTermMemory {
    fn default() -> Self {
        Self::new()
    }
}
