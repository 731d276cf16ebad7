//! Engine configuration: budgets and compaction scoring.

use serde::{Deserialize, Serialize};

use super::item::MemoryKind;

/// Per-kind item limits for one store key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub max_items_short_term: usize,
    pub max_items_semantic: usize,
    pub max_items_profile: usize,
    /// Reported in budget lines; links are never evicted on their own.
    pub max_links: usize,
    pub compaction_enabled: bool,
}

impl BudgetConfig {
    /// The item limit for a kind.
    pub fn max_items(&self, kind: MemoryKind) -> usize {
        match kind {
            MemoryKind::ShortTerm => self.max_items_short_term,
            MemoryKind::Semantic => self.max_items_semantic,
            MemoryKind::Profile => self.max_items_profile,
        }
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_items_short_term: 40,
            max_items_semantic: 200,
            max_items_profile: 50,
            max_links: 500,
            compaction_enabled: true,
        }
    }
}

/// Weights used to rank compaction candidates. Higher total evicts first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionWeights {
    pub context: u32,
    pub low_importance: u32,
    pub no_links: u32,
    /// Importance at or below this counts as low.
    pub low_importance_threshold: u32,
}

impl Default for CompactionWeights {
    fn default() -> Self {
        Self {
            context: 4,
            low_importance: 2,
            no_links: 1,
            low_importance_threshold: 1,
        }
    }
}

/// Everything the engine needs besides the contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub budget: BudgetConfig,
    pub compaction: CompactionWeights,
}
