//! Memory events emitted by the engine for trace renderers.

use serde::{Deserialize, Serialize};

use crate::scope::StoreKey;
use crate::types::{MemoryKind, PhaseReason, ReasonCode};

/// Something the engine did, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MemoryEvent {
    /// An item was stored.
    Written {
        store_key: StoreKey,
        item_id: u64,
        kind: MemoryKind,
        tick: u64,
    },
    /// A write was refused by policy.
    Denied {
        store_key: StoreKey,
        kind: MemoryKind,
        reason: ReasonCode,
    },
    /// An identical item already existed, nothing was stored.
    Deduplicated {
        store_key: StoreKey,
        existing_id: u64,
    },
    /// Items were evicted to stay within budget.
    Compacted {
        store_key: StoreKey,
        phase_id: String,
        removed: Vec<u64>,
        reasons: Vec<ReasonCode>,
        summary_id: u64,
    },
    /// Short-term turns were folded into a summary.
    Summarized {
        store_key: StoreKey,
        phase_id: String,
        summary_id: u64,
        evicted: Vec<u64>,
    },
    /// An item was dropped by a newer one or by retention.
    Forgotten {
        store_key: StoreKey,
        item_id: u64,
        reason: ReasonCode,
    },
    PhaseStarted {
        store_key: StoreKey,
        phase_id: String,
        reason: PhaseReason,
    },
    Promoted {
        from_key: StoreKey,
        from_id: u64,
        to_key: StoreKey,
        to_id: u64,
    },
    PromotionDenied {
        from_key: StoreKey,
        item_id: u64,
        reason: ReasonCode,
    },
    /// A replacement reached items that rely on what it replaced.
    ImpactWarning {
        store_key: StoreKey,
        item_id: u64,
        affected: Vec<u64>,
    },
    ProposalCreated {
        team_id: String,
        proposal_id: String,
        item_id: u64,
    },
    ProposalApproved {
        proposal_id: String,
        approvals: usize,
        required: usize,
    },
    /// The team agreed and the item was written to the team lane.
    ProposalAccepted {
        proposal_id: String,
        store_key: StoreKey,
        item_id: Option<u64>,
    },
    ProposalRejected {
        proposal_id: String,
    },
    /// Packet items were copied into the receiving agent's lane.
    HandoffApplied {
        packet_id: String,
        store_key: StoreKey,
        item_ids: Vec<u64>,
    },
}

impl MemoryEvent {
    /// Stable snake_case name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Written { .. } => "written",
            Self::Denied { .. } => "denied",
            Self::Deduplicated { .. } => "deduplicated",
            Self::Compacted { .. } => "compacted",
            Self::Summarized { .. } => "summarized",
            Self::Forgotten { .. } => "forgotten",
            Self::PhaseStarted { .. } => "phase_started",
            Self::Promoted { .. } => "promoted",
            Self::PromotionDenied { .. } => "promotion_denied",
            Self::ImpactWarning { .. } => "impact_warning",
            Self::ProposalCreated { .. } => "proposal_created",
            Self::ProposalApproved { .. } => "proposal_approved",
            Self::ProposalAccepted { .. } => "proposal_accepted",
            Self::ProposalRejected { .. } => "proposal_rejected",
            Self::HandoffApplied { .. } => "handoff_applied",
        }
    }
}
