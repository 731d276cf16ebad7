//! Spaces, lanes, visibility and the typed lane metadata carried by items.

use serde::{Deserialize, Serialize};

use crate::types::error::{LmemError, LmemResult};

/// Top-level isolation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Space {
    /// One conversation or workflow run.
    Session,
    /// One person across sessions.
    User,
    /// Everything under one project root.
    Project,
    /// Installation-wide rules.
    System,
}

impl Space {
    /// All spaces, innermost first.
    pub const ALL: [Space; 4] = [Space::Session, Space::User, Space::Project, Space::System];

    /// Return the wire name for this space.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::User => "user",
            Self::Project => "project",
            Self::System => "system",
        }
    }

    /// Parse a space from its name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "session" => Some(Self::Session),
            "user" => Some(Self::User),
            "project" => Some(Self::Project),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    /// Distance from the innermost space. Promotions only move outward.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Session => 0,
            Self::User => 1,
            Self::Project => 2,
            Self::System => 3,
        }
    }
}

impl std::fmt::Display for Space {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Ownership partition within a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// Private to the acting principal.
    My,
    /// Shared with the team, optionally locked.
    Team,
    /// Shared with everyone, never mutable.
    System,
    /// Private to one named agent.
    Agent,
}

impl Lane {
    /// Return the wire name for this lane.
    pub fn name(&self) -> &'static str {
        match self {
            Self::My => "my",
            Self::Team => "team",
            Self::System => "system",
            Self::Agent => "agent",
        }
    }

    /// Parse a lane from its name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "my" => Some(Self::My),
            "team" => Some(Self::Team),
            "system" => Some(Self::System),
            "agent" => Some(Self::Agent),
            _ => None,
        }
    }

    /// Visibility is a pure function of the lane.
    pub fn visibility(&self) -> Visibility {
        match self {
            Self::My | Self::Agent => Visibility::Me,
            Self::Team => Visibility::Team,
            Self::System => Visibility::All,
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Who can see an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Me,
    Team,
    All,
}

impl Visibility {
    /// Return the wire name for this visibility.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Me => "me",
            Self::Team => "team",
            Self::All => "all",
        }
    }

    /// Parse a visibility from its name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "me" => Some(Self::Me),
            "team" => Some(Self::Team),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

/// Lane metadata of a memory item.
///
/// Illegal combinations cannot be built: the system lane carries no
/// mutability flag at all and the agent lane always holds an agent id.
/// Raw fields from outside the engine go through [`validate_lane_rules`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LaneFields", into = "LaneFields")]
pub enum LaneMeta {
    My,
    Team { can_change: bool },
    System,
    Agent { agent_id: String },
}

impl LaneMeta {
    /// Build lane metadata for a lane. Agent lanes need a non-empty agent id.
    pub fn for_lane(lane: Lane, agent_id: Option<&str>, team_can_change: bool) -> LmemResult<Self> {
        match lane {
            Lane::My => Ok(Self::My),
            Lane::Team => Ok(Self::Team {
                can_change: team_can_change,
            }),
            Lane::System => Ok(Self::System),
            Lane::Agent => {
                let agent_id = agent_id
                    .map(normalize_agent_id)
                    .filter(|id| !id.is_empty())
                    .ok_or(LmemError::MissingAgentId)?;
                Ok(Self::Agent { agent_id })
            }
        }
    }

    pub fn lane(&self) -> Lane {
        match self {
            Self::My => Lane::My,
            Self::Team { .. } => Lane::Team,
            Self::System => Lane::System,
            Self::Agent { .. } => Lane::Agent,
        }
    }

    pub fn visibility(&self) -> Visibility {
        self.lane().visibility()
    }

    /// Whether items in this lane may be changed after creation.
    pub fn can_change(&self) -> bool {
        match self {
            Self::My | Self::Agent { .. } => true,
            Self::Team { can_change } => *can_change,
            Self::System => false,
        }
    }

    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Self::Agent { agent_id } => Some(agent_id),
            _ => None,
        }
    }

    /// Flatten into raw fields.
    pub fn fields(&self) -> LaneFields {
        LaneFields {
            lane: self.lane().name().to_string(),
            visibility: self.visibility().name().to_string(),
            can_change: serde_json::Value::Bool(self.can_change()),
            agent_id: self.agent_id().map(str::to_string),
        }
    }
}

/// Untyped lane fields as they appear in snapshots and external requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneFields {
    pub lane: String,
    pub visibility: String,
    pub can_change: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

impl TryFrom<LaneFields> for LaneMeta {
    type Error = LmemError;

    fn try_from(fields: LaneFields) -> Result<Self, Self::Error> {
        validate_lane_rules(&fields)
    }
}

impl From<LaneMeta> for LaneFields {
    fn from(meta: LaneMeta) -> Self {
        meta.fields()
    }
}

/// Validate raw lane fields and turn them into typed metadata.
pub fn validate_lane_rules(fields: &LaneFields) -> LmemResult<LaneMeta> {
    let lane =
        Lane::from_name(&fields.lane).ok_or_else(|| LmemError::InvalidLane(fields.lane.clone()))?;
    let visibility = Visibility::from_name(&fields.visibility)
        .ok_or_else(|| LmemError::InvalidVisibility(fields.visibility.clone()))?;
    let can_change = match &fields.can_change {
        serde_json::Value::Bool(flag) => *flag,
        other => return Err(LmemError::InvalidMutability(json_kind(other))),
    };
    if visibility != lane.visibility() {
        return Err(LmemError::VisibilityMismatch {
            lane: lane.name().to_string(),
            expected: lane.visibility().name().to_string(),
            got: visibility.name().to_string(),
        });
    }
    match lane {
        Lane::System if can_change => Err(LmemError::SystemLaneMutable),
        Lane::System => Ok(LaneMeta::System),
        Lane::My => Ok(LaneMeta::My),
        Lane::Team => Ok(LaneMeta::Team { can_change }),
        Lane::Agent => LaneMeta::for_lane(Lane::Agent, fields.agent_id.as_deref(), can_change),
    }
}

/// Lowercase, trim and replace spaces with underscores.
pub fn normalize_agent_id(agent_id: &str) -> String {
    agent_id
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "map",
    }
}
