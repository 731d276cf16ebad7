//! Machine-readable reason codes shared with trace renderers.

use serde::{Deserialize, Serialize};

/// Every reason the engine can attach to a decision, an eviction or a forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// The request passed every check.
    Allowed,
    /// Write policy is none and the target is semantic or profile memory.
    WritePolicyNone,
    /// Event type outside the contract's allow-list.
    PolicyDenyEventType,
    /// Text looks like a secret.
    PrivacyDenySensitive,
    /// The contract restricts reads from this space.
    BorderReadRestricted,
    /// The contract restricts direct writes into this space.
    BorderWriteRestricted,
    /// Lane is not part of the space's lane subset.
    LaneNotAllowed,
    /// The system lane never accepts writes.
    LaneSystemReadOnly,
    /// The team lane is locked by the contract.
    LaneTeamLocked,
    /// Agent lanes are readable only by their agent.
    LaneAgentPrivate,
    /// Authority or event type is not promotion-eligible.
    PromotionDenyAuthority,
    /// The target space does not accept this promotion.
    PromotionDenyPolicy,
    /// Short-term budget exceeded.
    ShortTermLimit,
    /// Semantic budget exceeded.
    SemanticLimit,
    /// Profile budget exceeded.
    ProfileLimit,
    /// Compaction candidate: context event.
    Context,
    /// Compaction candidate: low importance.
    LowImportance,
    /// Compaction candidate: no outgoing links.
    NoLinks,
    /// Forgotten by age decay.
    Decay,
    /// Forgotten by fixed TTL.
    TtlExpired,
    /// Replaced by a newer item or summary.
    Replaced,
    /// Folded into a short-term summary.
    Summarized,
    /// Link supplied by the caller.
    Linked,
    /// Written after the team agreed to a proposal.
    AgreementAccepted,
    /// Copied into an agent lane by a handoff packet.
    HandoffApplied,
}

impl ReasonCode {
    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::WritePolicyNone => "write_policy_none",
            Self::PolicyDenyEventType => "policy_deny_event_type",
            Self::PrivacyDenySensitive => "privacy_deny_sensitive",
            Self::BorderReadRestricted => "border_read_restricted",
            Self::BorderWriteRestricted => "border_write_restricted",
            Self::LaneNotAllowed => "lane_not_allowed",
            Self::LaneSystemReadOnly => "lane_system_read_only",
            Self::LaneTeamLocked => "lane_team_locked",
            Self::LaneAgentPrivate => "lane_agent_private",
            Self::PromotionDenyAuthority => "promotion_deny_authority",
            Self::PromotionDenyPolicy => "promotion_deny_policy",
            Self::ShortTermLimit => "short_term_limit",
            Self::SemanticLimit => "semantic_limit",
            Self::ProfileLimit => "profile_limit",
            Self::Context => "context",
            Self::LowImportance => "low_importance",
            Self::NoLinks => "no_links",
            Self::Decay => "decay",
            Self::TtlExpired => "ttl_expired",
            Self::Replaced => "replaced",
            Self::Summarized => "summarized",
            Self::Linked => "linked",
            Self::AgreementAccepted => "agreement_accepted",
            Self::HandoffApplied => "handoff_applied",
        }
    }

    /// Plain-language explanation for "why" surfaces.
    pub fn explain(&self) -> &'static str {
        match self {
            Self::Allowed => "Allowed by the memory contract.",
            Self::WritePolicyNone => "Write policy is none, so long-term memory is not written.",
            Self::PolicyDenyEventType => "This event type is not on the allow list.",
            Self::PrivacyDenySensitive => "The text looks like a secret and was not stored.",
            Self::BorderReadRestricted => "Reading from this space is restricted.",
            Self::BorderWriteRestricted => "Writing directly into this space is restricted.",
            Self::LaneNotAllowed => "This lane does not exist in this space.",
            Self::LaneSystemReadOnly => "The system lane is read only.",
            Self::LaneTeamLocked => "The team lane is locked.",
            Self::LaneAgentPrivate => "Agent memory is private to its agent.",
            Self::PromotionDenyAuthority => "Only user asserted decisions and facts can be promoted.",
            Self::PromotionDenyPolicy => "The target space does not accept this promotion.",
            Self::ShortTermLimit => "Short term memory is over its budget.",
            Self::SemanticLimit => "Semantic memory is over its budget.",
            Self::ProfileLimit => "Profile memory is over its budget.",
            Self::Context => "Context events are compacted first.",
            Self::LowImportance => "Low importance items are compacted next.",
            Self::NoLinks => "Items without links are compacted next.",
            Self::Decay => "Older context was forgotten to keep memory fresh.",
            Self::TtlExpired => "The item outlived its time to live.",
            Self::Replaced => "A newer item replaced this one.",
            Self::Summarized => "The item was folded into a summary.",
            Self::Linked => "The caller linked these memories.",
            Self::AgreementAccepted => "The team approved this proposal.",
            Self::HandoffApplied => "Another agent handed this memory over.",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a policy evaluation. Denials are values, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// Whether the operation may proceed.
    pub allowed: bool,
    /// Why.
    pub reason: ReasonCode,
}

impl PolicyDecision {
    /// An allowing decision.
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: ReasonCode::Allowed,
        }
    }

    /// A denying decision with the given reason.
    pub fn deny(reason: ReasonCode) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}
