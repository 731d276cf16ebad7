//! High-level operations: policy, budget, compaction, retention, impact,
//! agreements, handoffs and the memory engine.

pub mod agreement;
pub mod budget;
pub mod compaction;
pub mod events;
pub mod handoff;
pub mod impact;
pub mod policy;
pub mod query;
pub mod report;
pub mod retention;
pub mod snapshot;
pub mod write;

pub use agreement::{
    AgreementOutcome, AgreementStore, ApprovalState, Proposal, ProposalRequest, ProposalStatus,
    TeamRule,
};

pub use budget::{
    budget_lines, enforce_budget, measure_budget_usage, usage_for_key, usage_for_scope,
    BudgetAction, BudgetDecision, BudgetUsage,
};
pub use compaction::{
    select_compaction_items, summarize_items, CompactionEngine, CompactionSelection,
    CompactionSummary, LedgerEntry,
};
pub use events::MemoryEvent;
pub use handoff::{
    briefing_lines, select_handoff_items, HandoffEntry, HandoffOutcome, HandoffPacket,
    HandoffSelection, HandoffStatus, HandoffStore, NewPacket,
};
pub use impact::{
    compute_impact, impact_direction, render_change_preview, render_impact, ChangeKind,
    ImpactDirection, ImpactItem, ImpactRender, ImpactResult, DEFAULT_IMPACT_DEPTH,
    DEFAULT_IMPACT_ITEMS,
};
pub use policy::{
    evaluate_border_read, evaluate_border_write, evaluate_lane_read, evaluate_lane_write,
    evaluate_promotion, evaluate_write, is_sensitive,
};
pub use query::{
    deterministic_recall_hash, readable_items, recall_items, RecallRequest, RecallResult,
};
pub use report::{restore_failed_lines, wake_up_lines, WakeUpStats};
pub use retention::{apply_retention, RetentionOutcome};
pub use snapshot::EngineSnapshot;
pub use write::{MemoryEngine, RetentionReport, WriteOutcome, WriteRequest, COMPACTION_SOURCE};
