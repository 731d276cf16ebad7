//! Recall: reading items back out of the stores.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::scope::StoreKey;
use crate::types::{MemoryItem, MemoryKind, PolicyDecision};

use super::policy::evaluate_lane_read;

/// Parameters for a recall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecallRequest {
    pub store_key: StoreKey,
    pub kind: MemoryKind,
    /// Only items stamped with this phase.
    pub phase_id: Option<String>,
    /// Keep at most this many raw items, the most recent ones.
    pub limit: Option<usize>,
    /// Agent doing the reading. Needed for agent lanes.
    pub reader_agent: Option<String>,
}

impl RecallRequest {
    pub fn new(store_key: StoreKey, kind: MemoryKind) -> Self {
        Self {
            store_key,
            kind,
            phase_id: None,
            limit: None,
            reader_agent: None,
        }
    }

    pub fn phase(mut self, phase_id: impl Into<String>) -> Self {
        self.phase_id = Some(phase_id.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn reader_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.reader_agent = Some(agent_id.into());
        self
    }
}

/// Items returned by a recall and the border decision that governed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecallResult {
    pub store_key: StoreKey,
    pub kind: MemoryKind,
    pub decision: PolicyDecision,
    pub items: Vec<MemoryItem>,
}

impl RecallResult {
    pub fn denied(store_key: StoreKey, kind: MemoryKind, decision: PolicyDecision) -> Self {
        Self {
            store_key,
            kind,
            decision,
            items: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Hash of the recalled items. See [`deterministic_recall_hash`].
    pub fn recall_hash(&self) -> String {
        deterministic_recall_hash(&self.items)
    }
}

/// SHA-256 hex digest of an ordered item list.
///
/// Covers id, tick, kind, event type, phase, lane and text, each length
/// prefixed. Equal recalls hash equal across runs and processes.
pub fn deterministic_recall_hash(items: &[MemoryItem]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((items.len() as u64).to_le_bytes());
    for item in items {
        hasher.update(item.id.to_le_bytes());
        hasher.update(item.tick.to_le_bytes());
        for field in [
            item.kind.name(),
            item.event_type().name(),
            item.phase_id(),
            item.lane().name(),
            item.text.as_str(),
        ] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
    }
    hex::encode(hasher.finalize())
}

/// Filter long-term items by phase and keep the most recent `limit`.
pub fn recall_items(
    items: &[MemoryItem],
    phase_id: Option<&str>,
    limit: Option<usize>,
) -> Vec<MemoryItem> {
    let matching: Vec<&MemoryItem> = items
        .iter()
        .filter(|i| phase_id.map_or(true, |p| i.phase_id() == p))
        .collect();
    let skip = limit.map_or(0, |l| matching.len().saturating_sub(l));
    matching.into_iter().skip(skip).cloned().collect()
}

/// Drop items the reader may not see.
pub fn readable_items(items: Vec<MemoryItem>, reader_agent: Option<&str>) -> Vec<MemoryItem> {
    items
        .into_iter()
        .filter(|i| evaluate_lane_read(&i.meta.lane, reader_agent).allowed)
        .collect()
}
