//! The per-application memory contract. Resolved once, read-only to the engine.

use serde::{Deserialize, Serialize};

use super::item::EventType;
use super::lane::{Lane, Space};

/// Whether long-term memory is written at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Only short-term memory is written.
    None,
    /// Every kind is written.
    Normal,
}

impl WritePolicy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Normal => "normal",
        }
    }
}

/// Which retention policy prunes items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForgetPolicy {
    /// Fixed tick limit for every item.
    Ttl,
    /// Oldest context is forgotten past a live-count limit.
    Decay,
}

impl ForgetPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ttl => "ttl",
            Self::Decay => "decay",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "ttl" => Some(Self::Ttl),
            "decay" => Some(Self::Decay),
            _ => None,
        }
    }
}

/// Secret detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyRules {
    /// Turn the built-in secret heuristics on or off.
    pub enabled: bool,
    /// Extra case-insensitive substrings that mark text as sensitive.
    pub deny_markers: Vec<String>,
}

impl Default for PrivacyRules {
    fn default() -> Self {
        Self {
            enabled: true,
            deny_markers: Vec::new(),
        }
    }
}

/// Which spaces may be crossed into or out of directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BorderPolicy {
    pub write_restricted: Vec<Space>,
    pub read_restricted: Vec<Space>,
}

impl Default for BorderPolicy {
    fn default() -> Self {
        Self {
            write_restricted: vec![Space::Project, Space::System],
            read_restricted: Vec::new(),
        }
    }
}

/// Lane behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanePolicy {
    /// Priority order used when recalling across lanes.
    pub read_order: Vec<Lane>,
    /// When false the team lane is locked.
    pub team_can_change: bool,
}

impl Default for LanePolicy {
    fn default() -> Self {
        Self {
            read_order: vec![Lane::My, Lane::Agent, Lane::Team, Lane::System],
            team_can_change: true,
        }
    }
}

/// One space and lane that accepts promoted items of some event types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionTarget {
    pub space: Space,
    pub lane: Lane,
    pub events: Vec<EventType>,
}

/// Who may promote what, and where to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionPolicy {
    /// Event types that can ever be promoted.
    pub eligible_events: Vec<EventType>,
    /// Targets that accept promotions. Spaces not listed accept nothing.
    pub targets: Vec<PromotionTarget>,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self {
            eligible_events: vec![EventType::Decision, EventType::Fact],
            targets: vec![
                PromotionTarget {
                    space: Space::User,
                    lane: Lane::My,
                    events: vec![EventType::Decision, EventType::Fact],
                },
                PromotionTarget {
                    space: Space::Project,
                    lane: Lane::Team,
                    events: vec![EventType::Decision, EventType::Fact],
                },
            ],
        }
    }
}

/// Phase limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhasePolicy {
    pub max_phases: usize,
}

impl Default for PhasePolicy {
    fn default() -> Self {
        Self { max_phases: 10 }
    }
}

/// Retention thresholds. Both are logical-tick based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Live context items kept before decay starts forgetting the oldest.
    pub decay_context_limit: usize,
    /// Items older than this many ticks expire under the ttl policy.
    pub ttl_ticks: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            decay_context_limit: 10,
            ttl_ticks: 50,
        }
    }
}

/// How team proposals become agreed team memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgreementPolicy {
    /// Distinct approvers needed before a proposal is accepted.
    pub approvals_required: usize,
}

impl Default for AgreementPolicy {
    fn default() -> Self {
        Self {
            approvals_required: 1,
        }
    }
}

/// The memory contract of one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contract {
    pub write_policy: WritePolicy,
    pub forget_policy: ForgetPolicy,
    /// When set, only these event types are written.
    pub allowed_events: Option<Vec<EventType>>,
    pub privacy: PrivacyRules,
    pub border: BorderPolicy,
    pub lanes: LanePolicy,
    pub promotion: PromotionPolicy,
    pub phase: PhasePolicy,
    pub retention: RetentionConfig,
    pub agreement: AgreementPolicy,
    /// Raw short-term turns kept per phase before summarizing.
    pub short_term_max_turns: usize,
}

impl Default for Contract {
    fn default() -> Self {
        Self {
            write_policy: WritePolicy::Normal,
            forget_policy: ForgetPolicy::Decay,
            allowed_events: None,
            privacy: PrivacyRules::default(),
            border: BorderPolicy::default(),
            lanes: LanePolicy::default(),
            promotion: PromotionPolicy::default(),
            phase: PhasePolicy::default(),
            retention: RetentionConfig::default(),
            agreement: AgreementPolicy::default(),
            short_term_max_turns: 6,
        }
    }
}
