//! Policy engine: write, border, lane and promotion decisions.
//!
//! Every function is pure over the contract and returns a [`PolicyDecision`].
//! Denials are never errors.

use std::sync::OnceLock;

use regex::RegexSet;

use crate::scope::{is_lane_allowed, lane_for_space};
use crate::types::{
    normalize_agent_id, Authority, Contract, EventType, Lane, LaneMeta, MemoryItem, MemoryKind,
    PolicyDecision, ReasonCode, Space, WritePolicy,
};

/// Shapes of well-known credentials.
const SECRET_PATTERNS: [&str; 6] = [
    r"(?i)\b(sk|pk|rk)-[a-z0-9_-]{16,}",
    r"\bAKIA[0-9A-Z]{16}\b",
    r"\b(ghp|gho|ghu|ghs|github_pat)_[A-Za-z0-9_]{20,}",
    r"\bxox[abprs]-[A-Za-z0-9-]{10,}",
    r"-----BEGIN [A-Z ]*PRIVATE KEY-----",
    r"(?i)\b(password|passwd|pwd|secret|api[_-]?key|access[_-]?token)\s*[:=]\s*\S+",
];

/// Tokens at least this long that mix letters and digits look like keys.
const OPAQUE_TOKEN_LEN: usize = 32;

fn secret_patterns() -> &'static RegexSet {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    PATTERNS.get_or_init(|| RegexSet::new(SECRET_PATTERNS).expect("secret patterns compile"))
}

/// Decide whether an item may be written.
pub fn evaluate_write(
    contract: &Contract,
    item: &MemoryItem,
    event_type: EventType,
) -> PolicyDecision {
    if contract.write_policy == WritePolicy::None
        && matches!(item.kind, MemoryKind::Semantic | MemoryKind::Profile)
    {
        return PolicyDecision::deny(ReasonCode::WritePolicyNone);
    }
    if let Some(allowed) = &contract.allowed_events {
        if !allowed.contains(&event_type) {
            return PolicyDecision::deny(ReasonCode::PolicyDenyEventType);
        }
    }
    if is_sensitive(contract, &item.text) {
        return PolicyDecision::deny(ReasonCode::PrivacyDenySensitive);
    }
    PolicyDecision::allow()
}

/// Whether text trips the privacy heuristics of the contract.
pub fn is_sensitive(contract: &Contract, text: &str) -> bool {
    let lowered = text.to_lowercase();
    if contract
        .privacy
        .deny_markers
        .iter()
        .filter(|m| !m.trim().is_empty())
        .any(|m| lowered.contains(&m.to_lowercase()))
    {
        return true;
    }
    if !contract.privacy.enabled {
        return false;
    }
    secret_patterns().is_match(text) || text.split_whitespace().any(is_opaque_token)
}

fn is_opaque_token(token: &str) -> bool {
    let token = token.trim_matches(|c: char| !c.is_alphanumeric());
    token.len() >= OPAQUE_TOKEN_LEN
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+' | '/'))
        && token.chars().any(|c| c.is_ascii_digit())
        && token.chars().any(|c| c.is_ascii_alphabetic())
}

/// Decide whether memory may be read across the border of a space.
pub fn evaluate_border_read(contract: &Contract, space: Space) -> PolicyDecision {
    if contract.border.read_restricted.contains(&space) {
        PolicyDecision::deny(ReasonCode::BorderReadRestricted)
    } else {
        PolicyDecision::allow()
    }
}

/// Decide whether memory may be written directly into a space.
pub fn evaluate_border_write(contract: &Contract, space: Space) -> PolicyDecision {
    if contract.border.write_restricted.contains(&space) {
        PolicyDecision::deny(ReasonCode::BorderWriteRestricted)
    } else {
        PolicyDecision::allow()
    }
}

/// Decide whether a lane of a space accepts writes.
///
/// `lane_not_allowed` only reaches direct callers asking ahead of a write.
/// [`MemoryEngine::write`](crate::engine::MemoryEngine::write) validates lane
/// membership first and fails with [`LmemError::LaneNotAllowed`] instead.
///
/// [`LmemError::LaneNotAllowed`]: crate::types::LmemError::LaneNotAllowed
pub fn evaluate_lane_write(contract: &Contract, lane: Lane, space: Space) -> PolicyDecision {
    if !is_lane_allowed(space, lane) {
        return PolicyDecision::deny(ReasonCode::LaneNotAllowed);
    }
    match lane {
        Lane::System => PolicyDecision::deny(ReasonCode::LaneSystemReadOnly),
        Lane::Team if !contract.lanes.team_can_change => {
            PolicyDecision::deny(ReasonCode::LaneTeamLocked)
        }
        _ => PolicyDecision::allow(),
    }
}

/// Decide whether a reader sees an item of the given lane.
///
/// Agent lanes are private to their agent; every other lane is readable by
/// anyone who can resolve its store key.
pub fn evaluate_lane_read(lane: &LaneMeta, reader_agent: Option<&str>) -> PolicyDecision {
    match lane.agent_id() {
        Some(owner) => match reader_agent.map(normalize_agent_id) {
            Some(reader) if reader == owner => PolicyDecision::allow(),
            _ => PolicyDecision::deny(ReasonCode::LaneAgentPrivate),
        },
        None => PolicyDecision::allow(),
    }
}

/// Decide whether an item may be promoted from one space to another.
pub fn evaluate_promotion(
    contract: &Contract,
    item: &MemoryItem,
    from_space: Space,
    to_space: Space,
    event_type: EventType,
) -> PolicyDecision {
    if item.meta.authority != Authority::UserAsserted
        || !contract.promotion.eligible_events.contains(&event_type)
    {
        return PolicyDecision::deny(ReasonCode::PromotionDenyAuthority);
    }
    if to_space.rank() <= from_space.rank() {
        return PolicyDecision::deny(ReasonCode::PromotionDenyPolicy);
    }
    let lane = lane_for_space(to_space);
    let accepted = contract
        .promotion
        .targets
        .iter()
        .any(|t| t.space == to_space && t.lane == lane && t.events.contains(&event_type));
    if accepted {
        PolicyDecision::allow()
    } else {
        PolicyDecision::deny(ReasonCode::PromotionDenyPolicy)
    }
}
