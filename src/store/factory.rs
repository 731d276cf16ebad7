//! Item factory: the only place memory items are constructed.

use crate::types::{
    default_dedup_key, Authority, EventType, ImportanceReason, ItemMeta, MemoryItem, MemoryKind,
};

use super::clock::{MemoryClock, MemoryIdGenerator};

/// Words that mark text as something the user wants kept.
const EXPLICIT_MARKERS: [&str; 5] = ["remember", "important", "always", "never", "must"];

/// Caller-supplied fields of a new item.
#[derive(Debug, Clone)]
pub struct NewItem {
    kind: MemoryKind,
    text: String,
    source: String,
    importance: Option<(u32, Vec<ImportanceReason>)>,
    meta: ItemMeta,
}

impl NewItem {
    /// Create with the required fields. Importance defaults to [`importance_for_event`].
    pub fn new(
        kind: MemoryKind,
        text: impl Into<String>,
        source: impl Into<String>,
        meta: ItemMeta,
    ) -> Self {
        Self {
            kind,
            text: text.into(),
            source: source.into(),
            importance: None,
            meta,
        }
    }

    /// Override the computed importance.
    pub fn importance(mut self, score: u32, reasons: Vec<ImportanceReason>) -> Self {
        self.importance = Some((score, reasons));
        self
    }
}

/// Builds items from a fresh tick and id plus caller fields.
#[derive(Debug, Clone, Default)]
pub struct ItemFactory {
    clock: MemoryClock,
    ids: MemoryIdGenerator,
}

impl ItemFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a factory around existing counters (used when restoring).
    pub fn from_parts(clock: MemoryClock, ids: MemoryIdGenerator) -> Self {
        Self { clock, ids }
    }

    pub fn clock(&self) -> &MemoryClock {
        &self.clock
    }

    /// The clock is shared with the phase registry.
    pub fn clock_mut(&mut self) -> &mut MemoryClock {
        &mut self.clock
    }

    pub fn ids(&self) -> &MemoryIdGenerator {
        &self.ids
    }

    /// Create an item. Infallible.
    pub fn create(&mut self, new: NewItem) -> MemoryItem {
        let tick = self.clock.next_tick();
        let id = self.ids.next_id();
        let (importance, importance_reasons) = new
            .importance
            .unwrap_or_else(|| importance_for_event(new.meta.event_type, &new.text, &new.source));
        let mut meta = new.meta;
        if meta.dedup_key.is_empty() {
            meta.dedup_key = default_dedup_key(new.kind, meta.event_type, &new.text);
        }
        MemoryItem {
            id,
            tick,
            kind: new.kind,
            text: new.text,
            source: new.source,
            importance,
            importance_reasons,
            meta,
        }
    }
}

/// Deterministic importance score with the reasons that produced it.
pub fn importance_for_event(
    event_type: EventType,
    text: &str,
    source: &str,
) -> (u32, Vec<ImportanceReason>) {
    let mut score = 0;
    let mut reasons = Vec::new();
    match event_type {
        EventType::Decision => {
            score += 3;
            reasons.push(ImportanceReason::DecisionEvent);
        }
        EventType::Preference => {
            score += 2;
            reasons.push(ImportanceReason::PreferenceEvent);
        }
        EventType::Fact => {
            score += 2;
            reasons.push(ImportanceReason::FactEvent);
        }
        EventType::Context => {}
    }
    if source.eq_ignore_ascii_case("user") {
        score += 1;
        reasons.push(ImportanceReason::UserSource);
    }
    let lowered = text.to_lowercase();
    if EXPLICIT_MARKERS
        .iter()
        .any(|marker| lowered.split(|c: char| !c.is_alphanumeric()).any(|w| w == *marker))
    {
        score += 1;
        reasons.push(ImportanceReason::ExplicitMarker);
    }
    (score, reasons)
}

/// Authority marker and justification implied by a source.
pub fn authority_for_source(source: &str) -> (Authority, &'static str) {
    match source.trim().to_lowercase().as_str() {
        "user" => (Authority::UserAsserted, "stated by the user"),
        "tool" => (Authority::ToolVerified, "produced by a tool"),
        "system" => (Authority::SystemImposed, "installed by the system"),
        _ => (Authority::AiInferred, "inferred by the model"),
    }
}
