//! All data types for the lane-memory library.

pub mod config;
pub mod contract;
pub mod error;
pub mod item;
pub mod lane;
pub mod reason;
pub mod text;

pub use config::{BudgetConfig, CompactionWeights, EngineConfig};
pub use contract::{
    AgreementPolicy, BorderPolicy, Contract, ForgetPolicy, LanePolicy, PhasePolicy, PrivacyRules,
    PromotionPolicy, PromotionTarget, RetentionConfig, WritePolicy,
};
pub use error::{LmemError, LmemResult};
pub use item::{
    default_dedup_key, Authority, EventType, HandoffMeta, ImportanceReason, ItemMeta, LinkType,
    MemoryItem, MemoryKind, MemoryLink, PhaseReason, PhaseStamp,
};
pub use lane::{
    normalize_agent_id, validate_lane_rules, Lane, LaneFields, LaneMeta, Space, Visibility,
};
pub use reason::{PolicyDecision, ReasonCode};
pub use text::{
    capitalize, count_sentence, is_bracket_free, normalize_text, number_word, preview, scrub_brackets,
    PREVIEW_CHARS,
};

/// Maximum text size per item: 64KB.
pub const MAX_TEXT_SIZE: usize = 65_536;

/// Snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Magic bytes at the start of every snapshot file.
pub const SNAPSHOT_MAGIC: [u8; 4] = [0x4C, 0x4D, 0x45, 0x4D]; // "LMEM"
