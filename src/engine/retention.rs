//! Retention engine: independent forgetting by decay or TTL.

use serde::Serialize;

use crate::types::{Contract, EventType, ForgetPolicy, MemoryItem, ReasonCode};

/// Items kept and items forgotten by one retention pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetentionOutcome {
    /// Survivors, in their original order.
    pub kept: Vec<MemoryItem>,
    /// Forgotten items with the reason, oldest first.
    pub forgotten: Vec<(MemoryItem, ReasonCode)>,
}

/// Run the contract's forget policy over a list of items.
///
/// - `decay`: once live context items exceed `decay_context_limit`, the
///   oldest excess is forgotten. Summaries never count as context here.
/// - `ttl`: every item older than `ttl_ticks` at `now_tick` expires.
pub fn apply_retention(items: &[MemoryItem], contract: &Contract, now_tick: u64) -> RetentionOutcome {
    let forget: Vec<u64> = match contract.forget_policy {
        ForgetPolicy::Decay => decay_candidates(items, contract.retention.decay_context_limit),
        ForgetPolicy::Ttl => items
            .iter()
            .filter(|i| now_tick.saturating_sub(i.tick) > contract.retention.ttl_ticks)
            .map(|i| i.id)
            .collect(),
    };
    let reason = match contract.forget_policy {
        ForgetPolicy::Decay => ReasonCode::Decay,
        ForgetPolicy::Ttl => ReasonCode::TtlExpired,
    };

    let mut outcome = RetentionOutcome::default();
    for item in items {
        if forget.contains(&item.id) {
            outcome.forgotten.push((item.clone(), reason));
        } else {
            outcome.kept.push(item.clone());
        }
    }
    outcome
        .forgotten
        .sort_by_key(|(item, _)| (item.tick, item.id));
    outcome
}

fn decay_candidates(items: &[MemoryItem], limit: usize) -> Vec<u64> {
    let mut context: Vec<&MemoryItem> = items
        .iter()
        .filter(|i| i.event_type() == EventType::Context && !i.is_summary())
        .collect();
    if context.len() <= limit {
        return Vec::new();
    }
    context.sort_by_key(|i| (i.tick, i.id));
    let excess = context.len() - limit;
    context.into_iter().take(excess).map(|i| i.id).collect()
}
