//! Space resolution: session, user, project and system ids for a caller.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{Lane, Space};

use super::key::StoreKey;

/// Fallback id when the caller supplies none.
pub const ANONYMOUS: &str = "anonymous";

/// Owner id of the system space.
pub const SYSTEM_OWNER: &str = "system";

/// Length of a project id, in hex characters.
pub const PROJECT_ID_LEN: usize = 12;

/// Ids the executor already tracks for the running workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerState {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

/// The authenticated principal, when there is one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Resolved owners of each space for one caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceContext {
    pub session_id: String,
    pub user_id: String,
    pub project_id: String,
}

impl SpaceContext {
    /// The owner id of a space.
    pub fn owner_for(&self, space: Space) -> &str {
        match space {
            Space::Session => &self.session_id,
            Space::User => &self.user_id,
            Space::Project => &self.project_id,
            Space::System => SYSTEM_OWNER,
        }
    }

    /// Store key of a non-agent lane in a space.
    pub fn store_key_for(&self, space: Space, lane: Lane) -> StoreKey {
        StoreKey::for_lane(space, self.owner_for(space), lane)
    }
}

/// Resolve the owners of every space.
///
/// An explicit identity wins over the caller state. The project id hashes the
/// project root, or the app path when no root is given. No filesystem access
/// happens here, so the same inputs always give the same ids.
pub fn resolve_space_context(
    state: &CallerState,
    identity: Option<&Identity>,
    project_root: Option<&str>,
    app_path: Option<&str>,
) -> SpaceContext {
    let identity_id = identity
        .map(|i| i.id.trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string);
    let session_id = identity_id
        .clone()
        .or_else(|| non_empty(state.session_id.as_deref()))
        .unwrap_or_else(|| ANONYMOUS.to_string());
    let user_id = identity_id
        .or_else(|| non_empty(state.user_id.as_deref()))
        .unwrap_or_else(|| ANONYMOUS.to_string());
    let project_id = project_id_for(project_root, app_path);
    SpaceContext {
        session_id,
        user_id,
        project_id,
    }
}

/// First twelve hex characters of SHA-256 over the normalized project path.
pub fn project_id_for(project_root: Option<&str>, app_path: Option<&str>) -> String {
    let resolved = non_empty(project_root)
        .or_else(|| non_empty(app_path))
        .map(|p| normalize_path(&p))
        .unwrap_or_else(|| "unknown".to_string());
    let mut hasher = Sha256::new();
    hasher.update(resolved.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..PROJECT_ID_LEN].to_string()
}

fn normalize_path(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let trimmed = unified.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
