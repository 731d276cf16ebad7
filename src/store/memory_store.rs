//! Per-kind store: ordered items grouped by store key.

use std::collections::BTreeMap;

use crate::scope::StoreKey;
use crate::types::{MemoryItem, MemoryKind};

/// What happened when an item was offered to a store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOutcome {
    /// The item was appended. Items it supersedes were removed.
    Stored { replaced: Vec<MemoryItem> },
    /// A live item with the same dedup key and text already exists.
    Duplicate { existing_id: u64 },
}

/// Ordered collection of one kind of memory, keyed by store key.
///
/// Items inside a key keep insertion order, which is also tick order.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    kind: MemoryKind,
    items: BTreeMap<StoreKey, Vec<MemoryItem>>,
}

impl MemoryStore {
    pub fn new(kind: MemoryKind) -> Self {
        Self {
            kind,
            items: BTreeMap::new(),
        }
    }

    /// Create from pre-existing data (used by restore).
    pub fn from_parts(kind: MemoryKind, items: BTreeMap<StoreKey, Vec<MemoryItem>>) -> Self {
        let mut store = Self::new(kind);
        for (key, list) in items {
            if !list.is_empty() {
                store.items.insert(key, list);
            }
        }
        store
    }

    pub fn kind(&self) -> MemoryKind {
        self.kind
    }

    /// Append an item, removing anything it supersedes.
    ///
    /// With `dedupe_enabled`, an item whose dedup key and fingerprint match a
    /// live item is not stored.
    pub fn store_item(
        &mut self,
        key: &StoreKey,
        item: MemoryItem,
        dedupe_enabled: bool,
    ) -> StoreOutcome {
        let list = self.items.entry(key.clone()).or_default();
        if dedupe_enabled {
            let fingerprint = item.fingerprint();
            if let Some(existing) = list
                .iter()
                .find(|i| i.meta.dedup_key == item.meta.dedup_key && i.fingerprint() == fingerprint)
            {
                return StoreOutcome::Duplicate {
                    existing_id: existing.id,
                };
            }
        }
        let superseded: Vec<u64> = item.superseded_ids().collect();
        let mut replaced = Vec::new();
        if !superseded.is_empty() {
            let mut kept = Vec::with_capacity(list.len());
            for existing in list.drain(..) {
                if superseded.contains(&existing.id) {
                    replaced.push(existing);
                } else {
                    kept.push(existing);
                }
            }
            *list = kept;
        }
        list.push(item);
        StoreOutcome::Stored { replaced }
    }

    /// All live items under a key, in insertion order.
    pub fn items(&self, key: &StoreKey) -> &[MemoryItem] {
        self.items.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Live items of one phase.
    pub fn items_in_phase(&self, key: &StoreKey, phase_id: &str) -> Vec<&MemoryItem> {
        self.items(key)
            .iter()
            .filter(|i| i.phase_id() == phase_id)
            .collect()
    }

    pub fn get(&self, key: &StoreKey, id: u64) -> Option<&MemoryItem> {
        self.items(key).iter().find(|i| i.id == id)
    }

    /// Find an item by id under any key.
    pub fn find(&self, id: u64) -> Option<(&StoreKey, &MemoryItem)> {
        self.items
            .iter()
            .find_map(|(key, list)| list.iter().find(|i| i.id == id).map(|i| (key, i)))
    }

    /// A live item sharing the dedup key.
    pub fn find_by_dedup_key(&self, key: &StoreKey, dedup_key: &str) -> Option<&MemoryItem> {
        self.items(key)
            .iter()
            .rev()
            .find(|i| i.meta.dedup_key == dedup_key)
    }

    /// Remove one item.
    pub fn remove(&mut self, key: &StoreKey, id: u64) -> Option<MemoryItem> {
        let list = self.items.get_mut(key)?;
        let pos = list.iter().position(|i| i.id == id)?;
        let removed = list.remove(pos);
        if list.is_empty() {
            self.items.remove(key);
        }
        Some(removed)
    }

    /// Remove several items, returned in store order.
    pub fn remove_many(&mut self, key: &StoreKey, ids: &[u64]) -> Vec<MemoryItem> {
        let Some(list) = self.items.get_mut(key) else {
            return Vec::new();
        };
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(list.len());
        for item in list.drain(..) {
            if ids.contains(&item.id) {
                removed.push(item);
            } else {
                kept.push(item);
            }
        }
        if kept.is_empty() {
            self.items.remove(key);
        } else {
            *list = kept;
        }
        removed
    }

    /// Replace everything under a key.
    pub fn replace_items(&mut self, key: &StoreKey, items: Vec<MemoryItem>) {
        if items.is_empty() {
            self.items.remove(key);
        } else {
            self.items.insert(key.clone(), items);
        }
    }

    /// Number of live items under a key.
    pub fn len(&self, key: &StoreKey) -> usize {
        self.items(key).len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Outgoing links of every live item under a key.
    pub fn link_count(&self, key: &StoreKey) -> usize {
        self.items(key).iter().map(|i| i.meta.links.len()).sum()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<&StoreKey> {
        self.items.keys().collect()
    }

    /// Every live item, by key then insertion order.
    pub fn all_items(&self) -> impl Iterator<Item = &MemoryItem> {
        self.items.values().flatten()
    }

    /// Get a reference to the underlying map (for snapshots).
    pub fn inner(&self) -> &BTreeMap<StoreKey, Vec<MemoryItem>> {
        &self.items
    }
}
