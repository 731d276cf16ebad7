//! Store keys: the partition key of every store.

use serde::{Deserialize, Serialize};

use crate::types::{normalize_agent_id, Lane, LmemError, LmemResult, Space};

const AGENT_PREFIX: &str = "agent-";

/// Deterministic composite key `<space>:<owner>[:<lane-or-agent-id>]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreKey {
    space: Space,
    owner: String,
    segment: Option<String>,
}

impl StoreKey {
    /// Key without a lane segment.
    pub fn new(space: Space, owner: impl Into<String>) -> Self {
        Self {
            space,
            owner: owner.into(),
            segment: None,
        }
    }

    /// Key for a shared or private lane. Agent lanes use [`StoreKey::for_agent`].
    pub fn for_lane(space: Space, owner: impl Into<String>, lane: Lane) -> Self {
        Self {
            space,
            owner: owner.into(),
            segment: Some(lane.name().to_string()),
        }
    }

    /// Key for one agent's private lane.
    pub fn for_agent(space: Space, owner: impl Into<String>, agent_id: &str) -> Self {
        Self {
            space,
            owner: owner.into(),
            segment: Some(format!("{}{}", AGENT_PREFIX, normalize_agent_id(agent_id))),
        }
    }

    pub fn space(&self) -> Space {
        self.space
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The lane encoded in the key, if any.
    pub fn lane(&self) -> Option<Lane> {
        let segment = self.segment.as_deref()?;
        if segment.starts_with(AGENT_PREFIX) {
            return Some(Lane::Agent);
        }
        Lane::from_name(segment)
    }

    /// The agent id encoded in the key, if this is an agent lane key.
    pub fn agent_id(&self) -> Option<&str> {
        self.segment.as_deref()?.strip_prefix(AGENT_PREFIX)
    }

    /// Parse a key from its string form.
    pub fn parse(raw: &str) -> LmemResult<Self> {
        let invalid = || LmemError::InvalidStoreKey(raw.to_string());
        let (space_name, rest) = raw.split_once(':').ok_or_else(invalid)?;
        let space = Space::from_name(space_name).ok_or_else(invalid)?;
        if rest.is_empty() {
            return Err(invalid());
        }
        if let Some((owner, segment)) = rest.rsplit_once(':') {
            let is_segment = Lane::from_name(segment).is_some()
                || (segment.starts_with(AGENT_PREFIX) && segment.len() > AGENT_PREFIX.len());
            if is_segment && !owner.is_empty() {
                return Ok(Self {
                    space,
                    owner: owner.to_string(),
                    segment: Some(segment.to_string()),
                });
            }
        }
        Ok(Self::new(space, rest))
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.segment {
            Some(segment) => write!(f, "{}:{}:{}", self.space, self.owner, segment),
            None => write!(f, "{}:{}", self.space, self.owner),
        }
    }
}

impl std::str::FromStr for StoreKey {
    type Err = LmemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StoreKey {
    type Error = LmemError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StoreKey> for String {
    fn from(key: StoreKey) -> Self {
        key.to_string()
    }
}
