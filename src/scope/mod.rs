//! Scope resolution: spaces, lanes and store keys.

pub mod key;
pub mod lanes;
pub mod spaces;

pub use key::StoreKey;
pub use lanes::{
    agent_lane_key, allowed_lanes, ensure_lane_allowed, is_lane_allowed, lane_for_space,
    lanes_for_space,
};
pub use spaces::{
    project_id_for, resolve_space_context, CallerState, Identity, SpaceContext, ANONYMOUS,
    SYSTEM_OWNER,
};
