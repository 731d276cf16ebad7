//! Phase registry: one active phase per store key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scope::StoreKey;
use crate::store::MemoryClock;
use crate::types::{PhaseReason, PhaseStamp};

/// A bounded segment of a store key's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    /// `phase-<n>`, counting from 1 per store key.
    pub phase_id: String,
    pub store_key: StoreKey,
    pub started_at: u64,
    pub reason: PhaseReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tick at which the next phase took over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<u64>,
}

impl Phase {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// The stamp written onto items created in this phase.
    pub fn stamp(&self) -> PhaseStamp {
        PhaseStamp {
            phase_id: self.phase_id.clone(),
            started_at: self.started_at,
            reason: self.reason,
        }
    }
}

/// Tracks the phases of every store key. The last phase of a key is the active one.
#[derive(Debug, Clone, Default)]
pub struct PhaseRegistry {
    phases: BTreeMap<StoreKey, Vec<Phase>>,
}

impl PhaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from pre-existing data (used by restore).
    pub fn from_parts(phases: BTreeMap<StoreKey, Vec<Phase>>) -> Self {
        Self { phases }
    }

    /// The active phase, creating an `auto` phase if the key has none.
    /// The flag is true when a phase was started.
    pub fn ensure_phase(&mut self, clock: &MemoryClock, key: &StoreKey) -> (Phase, bool) {
        if let Some(active) = self.active(key) {
            return (active.clone(), false);
        }
        (self.start_phase(clock, key, PhaseReason::Auto, None), true)
    }

    /// Close the active phase, if any, and start a new one.
    ///
    /// A phase starts at the tick its first item will get, so starting a
    /// phase never advances the clock.
    pub fn start_phase(
        &mut self,
        clock: &MemoryClock,
        key: &StoreKey,
        reason: PhaseReason,
        name: Option<&str>,
    ) -> Phase {
        let tick = clock.peek();
        let list = self.phases.entry(key.clone()).or_default();
        if let Some(previous) = list.last_mut() {
            if previous.ended_at.is_none() {
                previous.ended_at = Some(tick);
            }
        }
        let phase = Phase {
            phase_id: format!("phase-{}", list.len() + 1),
            store_key: key.clone(),
            started_at: tick,
            reason,
            name: name.map(str::to_string),
            ended_at: None,
        };
        list.push(phase.clone());
        log::info!(
            "Started {} for {} at tick {} reason {}",
            phase.phase_id,
            key,
            tick,
            reason.name()
        );
        phase
    }

    /// The active phase of a key.
    pub fn active(&self, key: &StoreKey) -> Option<&Phase> {
        self.phases
            .get(key)
            .and_then(|list| list.last())
            .filter(|p| p.is_active())
    }

    /// All phases of a key, oldest first.
    pub fn phases(&self, key: &StoreKey) -> &[Phase] {
        self.phases.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn get(&self, key: &StoreKey, phase_id: &str) -> Option<&Phase> {
        self.phases(key).iter().find(|p| p.phase_id == phase_id)
    }

    /// The phase before the given one.
    pub fn previous(&self, key: &StoreKey, phase_id: &str) -> Option<&Phase> {
        let list = self.phases(key);
        let pos = list.iter().position(|p| p.phase_id == phase_id)?;
        pos.checked_sub(1).map(|i| &list[i])
    }

    pub fn phase_count(&self, key: &StoreKey) -> usize {
        self.phases(key).len()
    }

    /// Get a reference to the underlying map (for snapshots).
    pub fn inner(&self) -> &BTreeMap<StoreKey, Vec<Phase>> {
        &self.phases
    }
}
