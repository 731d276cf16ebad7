//! Which lanes exist in which space.

use crate::types::{Lane, LmemError, LmemResult, Space};

use super::key::StoreKey;
use super::spaces::SpaceContext;

/// Lanes allowed in a space, in canonical order.
pub fn allowed_lanes(space: Space) -> &'static [Lane] {
    match space {
        Space::Session => &[Lane::My],
        Space::User => &[Lane::My, Lane::Agent],
        Space::Project => &[Lane::My, Lane::Team, Lane::Agent],
        Space::System => &[Lane::System],
    }
}

/// Default lane of a space.
pub fn lane_for_space(space: Space) -> Lane {
    match space {
        Space::Session | Space::User => Lane::My,
        Space::Project => Lane::Team,
        Space::System => Lane::System,
    }
}

/// Filter a priority-ordered lane list down to the lanes a space allows.
pub fn lanes_for_space(space: Space, read_order: &[Lane]) -> Vec<Lane> {
    let allowed = allowed_lanes(space);
    let mut lanes: Vec<Lane> = Vec::with_capacity(allowed.len());
    for lane in read_order {
        if allowed.contains(lane) && !lanes.contains(lane) {
            lanes.push(*lane);
        }
    }
    lanes
}

pub fn is_lane_allowed(space: Space, lane: Lane) -> bool {
    allowed_lanes(space).contains(&lane)
}

/// Fail when the lane is not part of the space's subset.
pub fn ensure_lane_allowed(space: Space, lane: Lane) -> LmemResult<()> {
    if is_lane_allowed(space, lane) {
        Ok(())
    } else {
        Err(LmemError::LaneNotAllowed {
            lane: lane.name().to_string(),
            space: space.name().to_string(),
        })
    }
}

/// Store key of one agent's private memory in a space.
pub fn agent_lane_key(context: &SpaceContext, space: Space, agent_id: &str) -> StoreKey {
    StoreKey::for_agent(space, context.owner_for(space), agent_id)
}
