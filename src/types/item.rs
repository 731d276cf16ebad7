//! Memory item types and the immutable item record.

use serde::{Deserialize, Serialize};

use super::lane::{Lane, LaneMeta, Space, Visibility};
use super::reason::ReasonCode;
use super::text::normalize_text;

/// Which store an item lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Recent turns of a conversation.
    ShortTerm,
    /// Durable facts and decisions.
    Semantic,
    /// Stable traits of the user.
    Profile,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 3] = [
        MemoryKind::ShortTerm,
        MemoryKind::Semantic,
        MemoryKind::Profile,
    ];

    /// Return the wire name for this kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ShortTerm => "short_term",
            Self::Semantic => "semantic",
            Self::Profile => "profile",
        }
    }

    /// Parse a kind from its name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().replace('-', "_").as_str() {
            "short_term" | "shortterm" => Some(Self::ShortTerm),
            "semantic" => Some(Self::Semantic),
            "profile" => Some(Self::Profile),
            _ => None,
        }
    }

    /// The budget reason code for this kind.
    pub fn limit_reason(&self) -> ReasonCode {
        match self {
            Self::ShortTerm => ReasonCode::ShortTermLimit,
            Self::Semantic => ReasonCode::SemanticLimit,
            Self::Profile => ReasonCode::ProfileLimit,
        }
    }

    /// Human label used in rendered lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ShortTerm => "Short term",
            Self::Semantic => "Semantic",
            Self::Profile => "Profile",
        }
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What an item records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Conversational context with no lasting claim.
    Context,
    /// A choice that was made.
    Decision,
    /// Something the user likes or wants.
    Preference,
    /// Something that is true about the world or the user.
    Fact,
}

impl EventType {
    /// Return the wire name for this event type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Context => "context",
            Self::Decision => "decision",
            Self::Preference => "preference",
            Self::Fact => "fact",
        }
    }

    /// Parse an event type from its name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "context" => Some(Self::Context),
            "decision" => Some(Self::Decision),
            "preference" => Some(Self::Preference),
            "fact" => Some(Self::Fact),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Provenance of an item's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authority {
    /// A human said it.
    UserAsserted,
    /// A tool produced or confirmed it.
    ToolVerified,
    /// The model inferred it.
    AiInferred,
    /// Installed by the system.
    SystemImposed,
}

impl Authority {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserAsserted => "user_asserted",
            Self::ToolVerified => "tool_verified",
            Self::AiInferred => "ai_inferred",
            Self::SystemImposed => "system_imposed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "user_asserted" => Some(Self::UserAsserted),
            "tool_verified" => Some(Self::ToolVerified),
            "ai_inferred" => Some(Self::AiInferred),
            "system_imposed" => Some(Self::SystemImposed),
            _ => None,
        }
    }
}

impl std::fmt::Display for Authority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Why an item scored the importance it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceReason {
    DecisionEvent,
    PreferenceEvent,
    FactEvent,
    UserSource,
    ExplicitMarker,
}

impl ImportanceReason {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DecisionEvent => "decision_event",
            Self::PreferenceEvent => "preference_event",
            Self::FactEvent => "fact_event",
            Self::UserSource => "user_source",
            Self::ExplicitMarker => "explicit_marker",
        }
    }
}

/// How a phase began.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseReason {
    /// Created on first use.
    Auto,
    /// Requested by the caller.
    Manual,
}

impl PhaseReason {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// The phase an item was written in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseStamp {
    pub phase_id: String,
    pub started_at: u64,
    pub reason: PhaseReason,
}

/// Relationship from one item to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    /// This item replaces the target.
    Supersedes,
    /// This item is a promoted copy of the target.
    PromotedFrom,
    /// This item summarizes the target.
    Summarizes,
    /// This item depends on the target.
    DependsOn,
    /// This item conflicts with the target.
    ConflictsWith,
    /// This item was caused by the target.
    CausedBy,
    /// This item supports the target.
    Supports,
}

impl LinkType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Supersedes => "supersedes",
            Self::PromotedFrom => "promoted_from",
            Self::Summarizes => "summarizes",
            Self::DependsOn => "depends_on",
            Self::ConflictsWith => "conflicts_with",
            Self::CausedBy => "caused_by",
            Self::Supports => "supports",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().replace('-', "_").as_str() {
            "supersedes" | "replaced" => Some(Self::Supersedes),
            "promoted_from" => Some(Self::PromotedFrom),
            "summarizes" => Some(Self::Summarizes),
            "depends_on" => Some(Self::DependsOn),
            "conflicts_with" => Some(Self::ConflictsWith),
            "caused_by" => Some(Self::CausedBy),
            "supports" => Some(Self::Supports),
            _ => None,
        }
    }

    /// Lowercase phrase used in rendered lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Supersedes => "replaces",
            Self::PromotedFrom => "was promoted from",
            Self::Summarizes => "summarizes",
            Self::DependsOn => "depends on",
            Self::ConflictsWith => "conflicts with",
            Self::CausedBy => "was caused by",
            Self::Supports => "supports",
        }
    }
}

/// An outgoing link with the reason it was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLink {
    pub link_type: LinkType,
    pub target_id: u64,
    pub reason: ReasonCode,
}

impl MemoryLink {
    pub fn new(link_type: LinkType, target_id: u64, reason: ReasonCode) -> Self {
        Self {
            link_type,
            target_id,
            reason,
        }
    }
}

/// Where a handed-off copy came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffMeta {
    pub packet_id: String,
    pub from_agent: String,
    pub to_agent: String,
    /// Bracket-free previews of the links the source item carried.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link_previews: Vec<String>,
}

/// Metadata attached to every item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMeta {
    pub event_type: EventType,
    pub authority: Authority,
    pub authority_reason: String,
    pub space: Space,
    pub owner: String,
    pub lane: LaneMeta,
    pub phase: PhaseStamp,
    /// Empty means the factory derives one from kind, event type and text.
    #[serde(default)]
    pub dedup_key: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<MemoryLink>,
    /// Ids covered by a summary. Empty for everything else.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub summary_of: Vec<u64>,
    /// Set when writing this item changed memories that other items rely on.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub impact_warning: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff: Option<HandoffMeta>,
}

impl ItemMeta {
    /// Metadata with the required fields; authority defaults to inferred.
    pub fn new(
        event_type: EventType,
        space: Space,
        owner: impl Into<String>,
        lane: LaneMeta,
        phase: PhaseStamp,
    ) -> Self {
        Self {
            event_type,
            authority: Authority::AiInferred,
            authority_reason: "no authority given".to_string(),
            space,
            owner: owner.into(),
            lane,
            phase,
            dedup_key: String::new(),
            links: Vec::new(),
            summary_of: Vec::new(),
            impact_warning: false,
            handoff: None,
        }
    }

    /// Set the authority marker and its justification.
    pub fn authority(mut self, authority: Authority, reason: impl Into<String>) -> Self {
        self.authority = authority;
        self.authority_reason = reason.into();
        self
    }

    /// Set an explicit dedup key.
    pub fn dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = key.into();
        self
    }

    /// Add an outgoing link.
    pub fn link(mut self, link: MemoryLink) -> Self {
        self.links.push(link);
        self
    }

    /// Mark as a summary of the given ids.
    pub fn summary_of(mut self, ids: Vec<u64>) -> Self {
        self.summary_of = ids;
        self
    }

    pub fn impact_warning(mut self, warning: bool) -> Self {
        self.impact_warning = warning;
        self
    }

    /// Mark as a copy delivered by a handoff packet.
    pub fn handoff(mut self, handoff: HandoffMeta) -> Self {
        self.handoff = Some(handoff);
        self
    }
}

/// A single memory item. Created once by the factory and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Sequential identifier.
    pub id: u64,
    /// Logical creation tick.
    pub tick: u64,
    pub kind: MemoryKind,
    pub text: String,
    /// Who produced the text, e.g. user, ai, tool.
    pub source: String,
    pub importance: u32,
    #[serde(default)]
    pub importance_reasons: Vec<ImportanceReason>,
    pub meta: ItemMeta,
}

impl MemoryItem {
    pub fn event_type(&self) -> EventType {
        self.meta.event_type
    }

    pub fn phase_id(&self) -> &str {
        &self.meta.phase.phase_id
    }

    pub fn lane(&self) -> Lane {
        self.meta.lane.lane()
    }

    pub fn visibility(&self) -> Visibility {
        self.meta.lane.visibility()
    }

    pub fn can_change(&self) -> bool {
        self.meta.lane.can_change()
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.meta.lane.agent_id()
    }

    /// Whether this item is compaction or summary output.
    pub fn is_summary(&self) -> bool {
        !self.meta.summary_of.is_empty()
    }

    /// Whether this item has outgoing links.
    pub fn has_links(&self) -> bool {
        !self.meta.links.is_empty()
    }

    /// Normalized text used for fingerprint matching.
    pub fn fingerprint(&self) -> String {
        normalize_text(&self.text)
    }

    /// Whether this item records a conflict with another item.
    pub fn has_conflict(&self) -> bool {
        self.meta
            .links
            .iter()
            .any(|l| l.link_type == LinkType::ConflictsWith)
    }

    /// Ids this item supersedes.
    pub fn superseded_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.meta
            .links
            .iter()
            .filter(|l| l.link_type == LinkType::Supersedes)
            .map(|l| l.target_id)
    }
}

/// Default dedup key: kind, event type and normalized text.
pub fn default_dedup_key(kind: MemoryKind, event_type: EventType, text: &str) -> String {
    format!("{}:{}:{}", kind.name(), event_type.name(), normalize_text(text))
}
