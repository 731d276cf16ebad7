//! lane-memory: scoped, budgeted and phase-aware memory for agent workflows.
//!
//! Memory items live in spaces (session, user, project, system) and lanes
//! (my, team, system, agent). A contract decides what may be written, read
//! and promoted; budgets trigger reason-coded compaction; retention forgets
//! by decay or TTL; phases segment history so changes can be diffed. Links
//! between items drive impact analysis. Approved team proposals become team
//! memory, and handoff packets carry one agent's knowledge to another. Every
//! id and tick comes from owned, deterministic counters.

pub mod cli;
pub mod engine;
pub mod format;
pub mod scope;
pub mod store;
pub mod timeline;
pub mod types;

// Re-export commonly used types at the crate root
pub use engine::{
    apply_retention, compute_impact, deterministic_recall_hash, select_compaction_items,
    summarize_items, BudgetUsage, CompactionSelection, CompactionSummary, EngineSnapshot,
    HandoffPacket, ImpactResult, MemoryEngine, MemoryEvent, Proposal, ProposalRequest,
    RecallRequest, RecallResult, RetentionOutcome, WakeUpStats, WriteOutcome, WriteRequest,
};
pub use format::{SnapshotReader, SnapshotWriter};
pub use scope::{resolve_space_context, CallerState, Identity, SpaceContext, StoreKey};
pub use store::{ItemFactory, MemoryClock, MemoryIdGenerator, MemoryStore, NewItem, ShortTermMemory};
pub use timeline::{build_team_summary, Phase, PhaseDiff, PhaseLedger, PhaseRegistry, TeamSummary};
pub use types::{
    Authority, Contract, EngineConfig, EventType, ItemMeta, Lane, LaneMeta, LmemError, LmemResult,
    MemoryItem, MemoryKind, PolicyDecision, ReasonCode, Space, Visibility, MAX_TEXT_SIZE,
};
