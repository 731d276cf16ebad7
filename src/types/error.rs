//! Error types for the lane-memory library.
//!
//! Every message is plain text without bracket characters so it can be
//! surfaced verbatim by trace renderers. Caller input and wrapped errors are
//! scrubbed when the message is rendered.

use thiserror::Error;

use super::text::scrub_brackets;

/// All errors that can occur in the lane-memory library.
#[derive(Error, Debug)]
pub enum LmemError {
    /// Lane name outside my, team, system, agent.
    #[error("Unknown lane: {}", scrub_brackets(.0))]
    InvalidLane(String),

    /// Visibility outside me, team, all.
    #[error("Unknown visibility: {}", scrub_brackets(.0))]
    InvalidVisibility(String),

    /// Visibility does not match the one implied by the lane.
    #[error("Lane {lane} requires visibility {expected}, got {got}")]
    VisibilityMismatch {
        lane: String,
        expected: String,
        got: String,
    },

    /// The mutability flag is not a boolean.
    #[error("Mutability flag must be a boolean, got a {0}")]
    InvalidMutability(&'static str),

    /// A system lane item claimed to be mutable.
    #[error("System lane items can never change")]
    SystemLaneMutable,

    /// An agent lane item without an agent id.
    #[error("Agent lane items need an agent id")]
    MissingAgentId,

    /// The lane is not part of the space's lane subset.
    #[error("Lane {lane} is not allowed in space {space}")]
    LaneNotAllowed { lane: String, space: String },

    /// Unknown space name.
    #[error("Unknown space: {}", scrub_brackets(.0))]
    InvalidSpace(String),

    /// Unknown memory kind name.
    #[error("Unknown memory kind: {}", scrub_brackets(.0))]
    InvalidKind(String),

    /// Unknown event type name.
    #[error("Unknown event type: {}", scrub_brackets(.0))]
    InvalidEventType(String),

    /// Unknown authority name.
    #[error("Unknown authority: {}", scrub_brackets(.0))]
    InvalidAuthority(String),

    /// Store key string does not parse.
    #[error("Malformed store key: {}", scrub_brackets(.0))]
    InvalidStoreKey(String),

    /// Unknown link type name.
    #[error("Unknown link type: {}", scrub_brackets(.0))]
    InvalidLinkType(String),

    /// Unknown change kind for an impact preview.
    #[error("Unknown change kind: {}", scrub_brackets(.0))]
    InvalidChangeKind(String),

    /// Team proposal not found by id.
    #[error("Proposal {} not found", scrub_brackets(.0))]
    ProposalNotFound(String),

    /// Handoff packet not found by id.
    #[error("Handoff packet {} not found", scrub_brackets(.0))]
    HandoffNotFound(String),

    /// A proposal or packet that was already accepted, applied or rejected.
    #[error("{} is no longer pending", scrub_brackets(.0))]
    NotPending(String),

    /// Memory item not found by ID.
    #[error("Memory item {0} not found")]
    ItemNotFound(u64),

    /// Phase id unknown for a store key.
    #[error(
        "Phase {} not found for store {}",
        scrub_brackets(.phase_id),
        scrub_brackets(.store_key)
    )]
    PhaseNotFound { store_key: String, phase_id: String },

    /// Text exceeds maximum size.
    #[error("Text exceeds maximum size: {size} > {max}")]
    TextTooLarge { size: usize, max: usize },

    /// IO error.
    #[error("IO error: {}", scrub_brackets(&.0.to_string()))]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {}", scrub_brackets(&.0.to_string()))]
    Json(#[from] serde_json::Error),

    /// Compression error.
    #[error("Compression error: {}", scrub_brackets(.0))]
    Compression(String),

    /// Invalid magic bytes in snapshot header.
    #[error("Invalid magic bytes in snapshot header")]
    InvalidMagic,

    /// Unsupported snapshot version.
    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    /// Snapshot body does not match the stored checksum.
    #[error("Checksum did not match snapshot contents")]
    ChecksumMismatch,

    /// File is empty or truncated.
    #[error("File is empty or truncated")]
    Truncated,
}

/// Convenience result type for lane-memory operations.
pub type LmemResult<T> = Result<T, LmemError>;
