//! Serializable copy of the full engine state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scope::StoreKey;
use crate::store::{MemoryClock, MemoryIdGenerator};
use crate::timeline::{Phase, PhaseSnapshot};
use crate::types::{Contract, EngineConfig, MemoryItem, SNAPSHOT_VERSION};

use super::agreement::AgreementStore;
use super::handoff::HandoffStore;

/// Everything needed to resume an engine with identical ids and ticks.
///
/// Maps are ordered, so serializing the same state always gives the same bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub version: u32,
    pub contract: Contract,
    pub config: EngineConfig,
    pub clock: MemoryClock,
    pub ids: MemoryIdGenerator,
    pub short_term: BTreeMap<StoreKey, Vec<MemoryItem>>,
    pub semantic: BTreeMap<StoreKey, Vec<MemoryItem>>,
    pub profile: BTreeMap<StoreKey, Vec<MemoryItem>>,
    pub phases: BTreeMap<StoreKey, Vec<Phase>>,
    pub ledger: BTreeMap<StoreKey, Vec<PhaseSnapshot>>,
    #[serde(default)]
    pub agreements: AgreementStore,
    #[serde(default)]
    pub handoffs: HandoffStore,
}

impl EngineSnapshot {
    /// Total live items across all kinds.
    pub fn item_count(&self) -> usize {
        [&self.short_term, &self.semantic, &self.profile]
            .iter()
            .flat_map(|m| m.values())
            .map(Vec::len)
            .sum()
    }

    /// Every store key with items or phases, sorted.
    pub fn store_keys(&self) -> Vec<&StoreKey> {
        let mut keys: Vec<&StoreKey> = self
            .short_term
            .keys()
            .chain(self.semantic.keys())
            .chain(self.profile.keys())
            .chain(self.phases.keys())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    pub fn is_current_version(&self) -> bool {
        self.version == SNAPSHOT_VERSION
    }
}
