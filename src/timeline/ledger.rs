//! Phase ledger: the live item set of every phase, kept for diffs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scope::StoreKey;
use crate::types::MemoryItem;

/// Live items of one phase, in the order they were recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSnapshot {
    pub phase_id: String,
    pub items: Vec<MemoryItem>,
}

/// Per store key, one snapshot per phase in phase order.
#[derive(Debug, Clone, Default)]
pub struct PhaseLedger {
    snapshots: BTreeMap<StoreKey, Vec<PhaseSnapshot>>,
}

impl PhaseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from pre-existing data (used by restore).
    pub fn from_parts(snapshots: BTreeMap<StoreKey, Vec<PhaseSnapshot>>) -> Self {
        Self { snapshots }
    }

    /// Open a snapshot for a new phase, seeded with the live items of the
    /// previous phase so a diff shows only what changed.
    pub fn start_phase(&mut self, key: &StoreKey, phase_id: &str) {
        let list = self.snapshots.entry(key.clone()).or_default();
        if list.iter().any(|s| s.phase_id == phase_id) {
            return;
        }
        let items = list.last().map(|s| s.items.clone()).unwrap_or_default();
        list.push(PhaseSnapshot {
            phase_id: phase_id.to_string(),
            items,
        });
    }

    pub fn record_add(&mut self, key: &StoreKey, phase_id: &str, item: &MemoryItem) {
        self.start_phase(key, phase_id);
        if let Some(snapshot) = self.snapshot_mut(key, phase_id) {
            snapshot.items.push(item.clone());
        }
    }

    pub fn record_delete(&mut self, key: &StoreKey, phase_id: &str, id: u64) {
        if let Some(snapshot) = self.snapshot_mut(key, phase_id) {
            snapshot.items.retain(|i| i.id != id);
        }
    }

    /// Drop the oldest snapshots of a key beyond `keep`.
    pub fn retain_recent(&mut self, key: &StoreKey, keep: usize) {
        if let Some(list) = self.snapshots.get_mut(key) {
            let excess = list.len().saturating_sub(keep);
            if excess > 0 {
                list.drain(..excess);
                log::debug!("Dropped {} old phase snapshots of {}", excess, key);
            }
        }
    }

    pub fn snapshot(&self, key: &StoreKey, phase_id: &str) -> Option<&PhaseSnapshot> {
        self.snapshots
            .get(key)?
            .iter()
            .find(|s| s.phase_id == phase_id)
    }

    /// Phase ids with a snapshot, oldest first.
    pub fn phase_ids(&self, key: &StoreKey) -> Vec<&str> {
        self.snapshots
            .get(key)
            .map(|list| list.iter().map(|s| s.phase_id.as_str()).collect())
            .unwrap_or_default()
    }

    /// Get a reference to the underlying map (for snapshots).
    pub fn inner(&self) -> &BTreeMap<StoreKey, Vec<PhaseSnapshot>> {
        &self.snapshots
    }

    fn snapshot_mut(&mut self, key: &StoreKey, phase_id: &str) -> Option<&mut PhaseSnapshot> {
        self.snapshots
            .get_mut(key)?
            .iter_mut()
            .find(|s| s.phase_id == phase_id)
    }
}
