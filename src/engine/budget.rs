//! Budget engine: usage per scope and the decision to compact.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::scope::StoreKey;
use crate::store::MemoryStore;
use crate::timeline::PhaseRegistry;
use crate::types::{
    scrub_brackets, BudgetConfig, Lane, LmemError, LmemResult, MemoryKind, ReasonCode, Space,
};

/// Item, link and phase counts of one store key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetUsage {
    pub store_key: StoreKey,
    pub short_term: usize,
    pub semantic: usize,
    pub profile: usize,
    pub total: usize,
    /// Outgoing links across all kinds.
    pub links: usize,
    pub phases: usize,
}

impl BudgetUsage {
    /// Zero usage for a key.
    pub fn empty(store_key: StoreKey) -> Self {
        Self {
            store_key,
            short_term: 0,
            semantic: 0,
            profile: 0,
            total: 0,
            links: 0,
            phases: 0,
        }
    }

    pub fn count(&self, kind: MemoryKind) -> usize {
        match kind {
            MemoryKind::ShortTerm => self.short_term,
            MemoryKind::Semantic => self.semantic,
            MemoryKind::Profile => self.profile,
        }
    }
}

/// Whether eviction is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetAction {
    None,
    Compact,
}

/// Outcome of [`enforce_budget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BudgetDecision {
    pub action: BudgetAction,
    pub reason: Option<ReasonCode>,
    /// How many items over the limit the write would go.
    pub over_by: usize,
    pub limit: usize,
}

impl BudgetDecision {
    pub fn needs_compaction(&self) -> bool {
        self.action == BudgetAction::Compact
    }
}

/// Measure usage of one store key. Pure: repeated calls without writes agree.
pub fn usage_for_key(
    stores: &[&MemoryStore],
    phases: &PhaseRegistry,
    key: &StoreKey,
) -> BudgetUsage {
    let mut usage = BudgetUsage::empty(key.clone());
    for store in stores {
        let count = store.len(key);
        match store.kind() {
            MemoryKind::ShortTerm => usage.short_term += count,
            MemoryKind::Semantic => usage.semantic += count,
            MemoryKind::Profile => usage.profile += count,
        }
        usage.total += count;
        usage.links += store.link_count(key);
    }
    usage.phases = phases.phase_count(key);
    usage
}

/// Measure usage of every store key known to the stores or the phase registry.
pub fn measure_budget_usage(stores: &[&MemoryStore], phases: &PhaseRegistry) -> Vec<BudgetUsage> {
    let mut keys: BTreeSet<&StoreKey> = BTreeSet::new();
    for store in stores {
        keys.extend(store.keys());
    }
    keys.extend(phases.inner().keys());
    keys.into_iter()
        .map(|key| usage_for_key(stores, phases, key))
        .collect()
}

/// Pick the usage of one scope out of a measurement.
///
/// The agent lane is keyed per agent, so it needs `agent_id`.
pub fn usage_for_scope(
    usages: &[BudgetUsage],
    space: Space,
    owner: &str,
    lane: Lane,
    agent_id: Option<&str>,
) -> LmemResult<BudgetUsage> {
    let key = match lane {
        Lane::Agent => {
            let agent_id = agent_id
                .filter(|a| !a.trim().is_empty())
                .ok_or(LmemError::MissingAgentId)?;
            StoreKey::for_agent(space, owner, agent_id)
        }
        lane => StoreKey::for_lane(space, owner, lane),
    };
    Ok(usages
        .iter()
        .find(|u| u.store_key == key)
        .cloned()
        .unwrap_or_else(|| BudgetUsage::empty(key)))
}

/// Compare `usage + incoming` to the kind's limit.
pub fn enforce_budget(
    config: &BudgetConfig,
    usage: &BudgetUsage,
    kind: MemoryKind,
    incoming: usize,
) -> BudgetDecision {
    let limit = config.max_items(kind);
    let projected = usage.count(kind) + incoming;
    if projected > limit && config.compaction_enabled {
        BudgetDecision {
            action: BudgetAction::Compact,
            reason: Some(kind.limit_reason()),
            over_by: projected - limit,
            limit,
        }
    } else {
        BudgetDecision {
            action: BudgetAction::None,
            reason: None,
            over_by: 0,
            limit,
        }
    }
}

/// Bracket-free lines describing usage against the budget.
pub fn budget_lines(usage: &BudgetUsage, config: &BudgetConfig, max_phases: usize) -> Vec<String> {
    let mut lines = vec![format!("Budget for {}", usage.store_key)];
    for kind in MemoryKind::ALL {
        lines.push(format!(
            "{} items {} of {}",
            kind.label(),
            usage.count(kind),
            config.max_items(kind)
        ));
    }
    lines.push(format!("Links {} of {}", usage.links, config.max_links));
    lines.push(format!("Phases {} of {}", usage.phases, max_phases));
    if !config.compaction_enabled {
        lines.push("Compaction is off".to_string());
    }
    lines.iter().map(|l| scrub_brackets(l)).collect()
}
