//! Memory engine: the write pipeline and everything that owns state.

use crate::scope::{
    agent_lane_key, ensure_lane_allowed, lane_for_space, lanes_for_space, SpaceContext, StoreKey,
};
use crate::store::{
    authority_for_source, ItemFactory, MemoryClock, MemoryIdGenerator, MemoryStore, NewItem,
    ShortTermMemory, StoreOutcome,
};
use crate::timeline::{build_team_summary, Phase, PhaseDiff, PhaseLedger, PhaseRegistry, TeamSummary};
use crate::types::{
    default_dedup_key, Authority, Contract, EngineConfig, EventType, ItemMeta, Lane, LaneMeta,
    LinkType, LmemError, LmemResult, MemoryItem, MemoryKind, MemoryLink, PhaseReason, PhaseStamp,
    PolicyDecision, ReasonCode, Space, MAX_TEXT_SIZE, SNAPSHOT_VERSION,
};

use super::agreement::AgreementStore;
use super::budget::{budget_lines, enforce_budget, measure_budget_usage, usage_for_key, BudgetUsage};
use super::compaction::{summarize_items, CompactionEngine};
use super::events::MemoryEvent;
use super::handoff::HandoffStore;
use super::impact::{compute_impact, ImpactResult, DEFAULT_IMPACT_DEPTH, DEFAULT_IMPACT_ITEMS};
use super::policy::{
    evaluate_border_read, evaluate_border_write, evaluate_lane_write, evaluate_promotion,
    evaluate_write,
};
use super::query::{readable_items, recall_items, RecallRequest, RecallResult};
use super::retention::apply_retention;
use super::snapshot::EngineSnapshot;

/// Source recorded on compaction summaries.
pub const COMPACTION_SOURCE: &str = "compaction";

/// A request to remember something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub kind: MemoryKind,
    pub space: Space,
    pub event_type: EventType,
    pub text: String,
    pub source: String,
    /// Defaults to the authority implied by the source.
    pub authority: Option<Authority>,
    /// Defaults to the default lane of the space.
    pub lane: Option<Lane>,
    /// Required for the agent lane.
    pub agent_id: Option<String>,
    /// Defaults to kind, event type and normalized text.
    pub dedup_key: Option<String>,
    /// Links to existing items, added on top of the ones the engine makes.
    pub links: Vec<(LinkType, u64)>,
}

impl WriteRequest {
    pub fn new(
        kind: MemoryKind,
        space: Space,
        event_type: EventType,
        text: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            space,
            event_type,
            text: text.into(),
            source: source.into(),
            authority: None,
            lane: None,
            agent_id: None,
            dedup_key: None,
            links: Vec::new(),
        }
    }

    pub fn lane(mut self, lane: Lane) -> Self {
        self.lane = Some(lane);
        self
    }

    /// Write into an agent's private lane.
    pub fn agent(mut self, agent_id: impl Into<String>) -> Self {
        self.lane = Some(Lane::Agent);
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn authority(mut self, authority: Authority) -> Self {
        self.authority = Some(authority);
        self
    }

    pub fn dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }

    /// Link the new item to an existing one.
    pub fn link(mut self, link_type: LinkType, target_id: u64) -> Self {
        self.links.push((link_type, target_id));
        self
    }
}

/// Result of a write or a promotion.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    pub store_key: StoreKey,
    pub decision: PolicyDecision,
    /// The stored item. `None` when denied or deduplicated.
    pub item: Option<MemoryItem>,
    pub events: Vec<MemoryEvent>,
}

impl WriteOutcome {
    pub(super) fn denied(store_key: StoreKey, decision: PolicyDecision, events: Vec<MemoryEvent>) -> Self {
        Self {
            store_key,
            decision,
            item: None,
            events,
        }
    }

    pub fn is_stored(&self) -> bool {
        self.item.is_some()
    }
}

/// Items forgotten by one retention pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetentionReport {
    pub forgotten: Vec<(MemoryItem, ReasonCode)>,
    pub events: Vec<MemoryEvent>,
}

/// Owns the clock, ids, stores, phases and ledger of one application.
///
/// Every operation is synchronous and deterministic: two engines fed the same
/// calls produce the same ids, ticks and text.
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    pub(super) contract: Contract,
    pub(super) config: EngineConfig,
    pub(super) factory: ItemFactory,
    pub(super) phases: PhaseRegistry,
    pub(super) ledger: PhaseLedger,
    pub(super) short_term: ShortTermMemory,
    pub(super) semantic: MemoryStore,
    pub(super) profile: MemoryStore,
    pub(super) agreements: AgreementStore,
    pub(super) handoffs: HandoffStore,
}

impl MemoryEngine {
    pub fn new(contract: Contract, config: EngineConfig) -> Self {
        Self {
            contract,
            config,
            factory: ItemFactory::new(),
            phases: PhaseRegistry::new(),
            ledger: PhaseLedger::new(),
            short_term: ShortTermMemory::new(),
            semantic: MemoryStore::new(MemoryKind::Semantic),
            profile: MemoryStore::new(MemoryKind::Profile),
            agreements: AgreementStore::new(),
            handoffs: HandoffStore::new(),
        }
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &MemoryClock {
        self.factory.clock()
    }

    pub fn ids(&self) -> &MemoryIdGenerator {
        self.factory.ids()
    }

    pub fn phases(&self) -> &PhaseRegistry {
        &self.phases
    }

    pub fn ledger(&self) -> &PhaseLedger {
        &self.ledger
    }

    /// The store holding one kind of memory.
    pub fn store(&self, kind: MemoryKind) -> &MemoryStore {
        match kind {
            MemoryKind::ShortTerm => self.short_term.store(),
            MemoryKind::Semantic => &self.semantic,
            MemoryKind::Profile => &self.profile,
        }
    }

    pub(super) fn store_mut(&mut self, kind: MemoryKind) -> &mut MemoryStore {
        match kind {
            MemoryKind::ShortTerm => self.short_term.store_mut(),
            MemoryKind::Semantic => &mut self.semantic,
            MemoryKind::Profile => &mut self.profile,
        }
    }

    /// Find a live item of any kind under a key.
    pub fn find_item(&self, key: &StoreKey, id: u64) -> Option<&MemoryItem> {
        MemoryKind::ALL
            .iter()
            .find_map(|kind| self.store(*kind).get(key, id))
    }

    /// Find a live item of any kind under any key.
    pub fn find_any(&self, id: u64) -> Option<(&StoreKey, &MemoryItem)> {
        MemoryKind::ALL
            .iter()
            .find_map(|kind| self.store(*kind).find(id))
    }

    /// Every live item, short-term first.
    pub fn all_items(&self) -> impl Iterator<Item = &MemoryItem> {
        self.short_term
            .store()
            .all_items()
            .chain(self.semantic.all_items())
            .chain(self.profile.all_items())
    }

    /// Store key a request would write to.
    pub fn store_key_for(&self, ctx: &SpaceContext, space: Space, lane: &LaneMeta) -> StoreKey {
        match lane.agent_id() {
            Some(agent_id) => agent_lane_key(ctx, space, agent_id),
            None => ctx.store_key_for(space, lane.lane()),
        }
    }

    /// Run one write through validation, policy, budget and summarization.
    ///
    /// Invalid lanes and oversized text fail before anything changes. Policy
    /// denials come back as a decision on the outcome.
    pub fn write(&mut self, ctx: &SpaceContext, request: WriteRequest) -> LmemResult<WriteOutcome> {
        if request.text.len() > MAX_TEXT_SIZE {
            return Err(LmemError::TextTooLarge {
                size: request.text.len(),
                max: MAX_TEXT_SIZE,
            });
        }
        let space = request.space;
        let lane = request.lane.unwrap_or_else(|| lane_for_space(space));
        ensure_lane_allowed(space, lane)?;
        let lane_meta = LaneMeta::for_lane(
            lane,
            request.agent_id.as_deref(),
            self.contract.lanes.team_can_change,
        )?;
        let key = self.store_key_for(ctx, space, &lane_meta);

        for decision in [
            evaluate_border_write(&self.contract, space),
            evaluate_lane_write(&self.contract, lane, space),
        ] {
            if !decision.allowed {
                log::debug!("Write to {} denied: {}", key, decision.reason);
                let event = MemoryEvent::Denied {
                    store_key: key.clone(),
                    kind: request.kind,
                    reason: decision.reason,
                };
                return Ok(WriteOutcome::denied(key, decision, vec![event]));
            }
        }

        let mut events = Vec::new();
        let stamp = self.ensure_phase_logged(&key, &mut events);

        let (authority, authority_reason) = match request.authority {
            Some(authority) => (authority, "set by the caller"),
            None => authority_for_source(&request.source),
        };
        let dedup_key = request
            .dedup_key
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| default_dedup_key(request.kind, request.event_type, &request.text));
        let mut meta = ItemMeta::new(request.event_type, space, key.owner(), lane_meta, stamp)
            .authority(authority, authority_reason)
            .dedup_key(dedup_key.as_str());
        let mut replaced_ids: Vec<u64> = Vec::new();
        if let Some(previous) = self.superseded_by(&key, request.kind, &dedup_key, &request.text) {
            meta = meta.link(MemoryLink::new(
                LinkType::Supersedes,
                previous,
                ReasonCode::Replaced,
            ));
            replaced_ids.push(previous);
        }
        for (link_type, target_id) in &request.links {
            meta = meta.link(MemoryLink::new(*link_type, *target_id, ReasonCode::Linked));
            if *link_type == LinkType::Supersedes {
                replaced_ids.push(*target_id);
            }
        }
        let affected = self.affected_by_replacing(&replaced_ids);
        meta = meta.impact_warning(!affected.is_empty());
        let item = self.factory.create(NewItem::new(
            request.kind,
            request.text,
            request.source,
            meta,
        ));

        let decision = evaluate_write(&self.contract, &item, request.event_type);
        if !decision.allowed {
            log::debug!("Write of item {} to {} denied: {}", item.id, key, decision.reason);
            events.push(MemoryEvent::Denied {
                store_key: key.clone(),
                kind: item.kind,
                reason: decision.reason,
            });
            return Ok(WriteOutcome::denied(key, decision, events));
        }

        let stored = self.commit(&key, item, &mut events);
        if let Some(written) = stored.as_ref().filter(|_| !affected.is_empty()) {
            log::info!(
                "Item {} in {} replaced memories that {} other items rely on",
                written.id,
                key,
                affected.len()
            );
            events.push(MemoryEvent::ImpactWarning {
                store_key: key.clone(),
                item_id: written.id,
                affected,
            });
        }
        Ok(WriteOutcome {
            store_key: key,
            decision,
            item: stored,
            events,
        })
    }

    /// What a change to one item could reach by following links.
    pub fn impact(&self, item_id: u64, depth_limit: usize, max_items: usize) -> LmemResult<ImpactResult> {
        compute_impact(self.all_items(), item_id, depth_limit, max_items)
    }

    /// Copy a user-asserted item outward into the default lane of a wider space.
    ///
    /// The copy passes the write policy like any other write, so a contract
    /// without long-term writes never gains long-term items by promotion.
    pub fn promote(
        &mut self,
        ctx: &SpaceContext,
        from_key: &StoreKey,
        item_id: u64,
        to_space: Space,
    ) -> LmemResult<WriteOutcome> {
        let source = self
            .find_item(from_key, item_id)
            .cloned()
            .ok_or(LmemError::ItemNotFound(item_id))?;
        let decision = evaluate_promotion(
            &self.contract,
            &source,
            from_key.space(),
            to_space,
            source.event_type(),
        );
        if !decision.allowed {
            log::info!(
                "Promotion of item {} from {} denied: {}",
                item_id,
                from_key,
                decision.reason
            );
            let event = MemoryEvent::PromotionDenied {
                from_key: from_key.clone(),
                item_id,
                reason: decision.reason,
            };
            return Ok(WriteOutcome::denied(from_key.clone(), decision, vec![event]));
        }

        let lane = lane_for_space(to_space);
        let lane_meta = LaneMeta::for_lane(lane, None, self.contract.lanes.team_can_change)?;
        let key = self.store_key_for(ctx, to_space, &lane_meta);
        let mut events = Vec::new();
        let stamp = self.ensure_phase_logged(&key, &mut events);

        let kind = match source.kind {
            MemoryKind::ShortTerm => MemoryKind::Semantic,
            other => other,
        };
        let meta = ItemMeta::new(source.event_type(), to_space, key.owner(), lane_meta, stamp)
            .authority(source.meta.authority, format!("promoted from {}", from_key))
            .dedup_key(default_dedup_key(kind, source.event_type(), &source.text))
            .link(MemoryLink::new(
                LinkType::PromotedFrom,
                source.id,
                ReasonCode::Allowed,
            ));
        let item = self.factory.create(
            NewItem::new(kind, source.text.clone(), source.source.clone(), meta)
                .importance(source.importance, source.importance_reasons.clone()),
        );

        // The copy is a new write into the target space.
        let write_decision = evaluate_write(&self.contract, &item, item.event_type());
        if !write_decision.allowed {
            log::info!(
                "Promotion of item {} from {} denied on write: {}",
                item_id,
                from_key,
                write_decision.reason
            );
            events.push(MemoryEvent::PromotionDenied {
                from_key: from_key.clone(),
                item_id,
                reason: write_decision.reason,
            });
            return Ok(WriteOutcome::denied(from_key.clone(), write_decision, events));
        }

        let stored = self.commit(&key, item, &mut events);
        if let Some(promoted) = &stored {
            log::info!(
                "Promoted item {} from {} to item {} in {}",
                source.id,
                from_key,
                promoted.id,
                key
            );
            events.push(MemoryEvent::Promoted {
                from_key: from_key.clone(),
                from_id: source.id,
                to_key: key.clone(),
                to_id: promoted.id,
            });
        }
        Ok(WriteOutcome {
            store_key: key,
            decision,
            item: stored,
            events,
        })
    }

    /// Read one store key. Agent lane items only reach their own agent.
    pub fn recall(&self, request: &RecallRequest) -> RecallResult {
        let key = &request.store_key;
        let decision = evaluate_border_read(&self.contract, key.space());
        if !decision.allowed {
            log::debug!("Recall from {} denied: {}", key, decision.reason);
            return RecallResult::denied(key.clone(), request.kind, decision);
        }
        let phase_id = request.phase_id.as_deref();
        let items = match request.kind {
            MemoryKind::ShortTerm => self.short_term.recall(key, phase_id, request.limit),
            kind => recall_items(self.store(kind).items(key), phase_id, request.limit),
        };
        let items = readable_items(items, request.reader_agent.as_deref());
        log::debug!("Recalled {} {} items from {}", items.len(), request.kind, key);
        RecallResult {
            store_key: key.clone(),
            kind: request.kind,
            decision,
            items,
        }
    }

    /// Read every lane of a space in the contract's read order.
    ///
    /// The agent lane is only read when a reader agent is given.
    pub fn recall_space(
        &self,
        ctx: &SpaceContext,
        space: Space,
        kind: MemoryKind,
        reader_agent: Option<&str>,
    ) -> Vec<RecallResult> {
        let mut results = Vec::new();
        for lane in lanes_for_space(space, &self.contract.lanes.read_order) {
            let key = match (lane, reader_agent) {
                (Lane::Agent, Some(agent)) => agent_lane_key(ctx, space, agent),
                (Lane::Agent, None) => continue,
                (lane, _) => ctx.store_key_for(space, lane),
            };
            let mut request = RecallRequest::new(key, kind);
            request.reader_agent = reader_agent.map(str::to_string);
            results.push(self.recall(&request));
        }
        results
    }

    /// Apply the contract's forget policy to one store, at the current tick.
    pub fn apply_retention(&mut self, key: &StoreKey, kind: MemoryKind) -> RetentionReport {
        let now = self.factory.clock().current();
        let outcome = apply_retention(self.store(kind).items(key), &self.contract, now);
        if outcome.forgotten.is_empty() {
            return RetentionReport::default();
        }
        let ids: Vec<u64> = outcome.forgotten.iter().map(|(item, _)| item.id).collect();
        self.store_mut(kind).remove_many(key, &ids);

        let mut events = Vec::with_capacity(ids.len());
        for (item, reason) in &outcome.forgotten {
            self.record_delete(key, item.id);
            events.push(MemoryEvent::Forgotten {
                store_key: key.clone(),
                item_id: item.id,
                reason: *reason,
            });
        }
        log::info!(
            "Retention forgot {} {} items from {} at tick {}",
            ids.len(),
            kind,
            key,
            now
        );
        RetentionReport {
            forgotten: outcome.forgotten,
            events,
        }
    }

    /// Close the active phase of a key and start a manual one.
    pub fn start_phase(&mut self, key: &StoreKey, name: Option<&str>) -> Phase {
        let phase = self
            .phases
            .start_phase(self.factory.clock(), key, PhaseReason::Manual, name);
        self.open_ledger(key, &phase.phase_id);
        phase
    }

    /// The active phase of a key, starting an automatic one when needed.
    pub fn ensure_phase(&mut self, key: &StoreKey) -> Phase {
        let (phase, started) = self.phases.ensure_phase(self.factory.clock(), key);
        if started {
            self.open_ledger(key, &phase.phase_id);
        }
        phase
    }

    /// Compare the live items of two phases of a key.
    pub fn diff_phases(&self, key: &StoreKey, from: &str, to: &str) -> LmemResult<PhaseDiff> {
        let snapshot = |phase_id: &str| {
            self.ledger
                .snapshot(key, phase_id)
                .ok_or_else(|| LmemError::PhaseNotFound {
                    store_key: key.to_string(),
                    phase_id: phase_id.to_string(),
                })
        };
        Ok(PhaseDiff::between(snapshot(from)?, snapshot(to)?))
    }

    /// Diff of the last two phases of a key, if it has two.
    pub fn latest_diff(&self, key: &StoreKey) -> LmemResult<Option<PhaseDiff>> {
        let phases = self.phases.phases(key);
        match phases {
            [.., from, to] => self.diff_phases(key, &from.phase_id, &to.phase_id).map(Some),
            _ => Ok(None),
        }
    }

    /// Team-facing summary of what changed between two phases.
    pub fn team_summary(&self, key: &StoreKey, from: &str, to: &str) -> LmemResult<TeamSummary> {
        Ok(build_team_summary(&self.diff_phases(key, from, to)?))
    }

    pub fn budget_usage(&self, key: &StoreKey) -> BudgetUsage {
        usage_for_key(&self.all_stores(), &self.phases, key)
    }

    /// Usage of every known store key, sorted by key.
    pub fn all_budget_usage(&self) -> Vec<BudgetUsage> {
        measure_budget_usage(&self.all_stores(), &self.phases)
    }

    pub fn budget_lines(&self, key: &StoreKey) -> Vec<String> {
        budget_lines(
            &self.budget_usage(key),
            &self.config.budget,
            self.contract.phase.max_phases,
        )
    }

    /// Copy the full state into a serializable snapshot.
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            version: SNAPSHOT_VERSION,
            contract: self.contract.clone(),
            config: self.config.clone(),
            clock: self.factory.clock().clone(),
            ids: self.factory.ids().clone(),
            short_term: self.short_term.store().inner().clone(),
            semantic: self.semantic.inner().clone(),
            profile: self.profile.inner().clone(),
            phases: self.phases.inner().clone(),
            ledger: self.ledger.inner().clone(),
            agreements: self.agreements.clone(),
            handoffs: self.handoffs.clone(),
        }
    }

    /// Rebuild an engine that continues exactly where the snapshot left off.
    pub fn restore(snapshot: EngineSnapshot) -> LmemResult<Self> {
        if !snapshot.is_current_version() {
            return Err(LmemError::UnsupportedVersion(snapshot.version));
        }
        Ok(Self {
            contract: snapshot.contract,
            config: snapshot.config,
            factory: ItemFactory::from_parts(snapshot.clock, snapshot.ids),
            phases: PhaseRegistry::from_parts(snapshot.phases),
            ledger: PhaseLedger::from_parts(snapshot.ledger),
            short_term: ShortTermMemory::from_store(MemoryStore::from_parts(
                MemoryKind::ShortTerm,
                snapshot.short_term,
            )),
            semantic: MemoryStore::from_parts(MemoryKind::Semantic, snapshot.semantic),
            profile: MemoryStore::from_parts(MemoryKind::Profile, snapshot.profile),
            agreements: snapshot.agreements,
            handoffs: snapshot.handoffs,
        })
    }

    fn all_stores(&self) -> [&MemoryStore; 3] {
        [self.short_term.store(), &self.semantic, &self.profile]
    }

    pub(super) fn ensure_phase_logged(&mut self, key: &StoreKey, events: &mut Vec<MemoryEvent>) -> PhaseStamp {
        let (phase, started) = self.phases.ensure_phase(self.factory.clock(), key);
        if started {
            self.open_ledger(key, &phase.phase_id);
            events.push(MemoryEvent::PhaseStarted {
                store_key: key.clone(),
                phase_id: phase.phase_id.clone(),
                reason: phase.reason,
            });
        }
        phase.stamp()
    }

    fn open_ledger(&mut self, key: &StoreKey, phase_id: &str) {
        self.ledger.start_phase(key, phase_id);
        self.ledger
            .retain_recent(key, self.contract.phase.max_phases.max(1));
    }

    fn record_delete(&mut self, key: &StoreKey, id: u64) {
        if let Some(phase) = self.phases.active(key) {
            self.ledger.record_delete(key, &phase.phase_id, id);
        }
    }

    /// Items outside the replaced ones that a replacement reaches.
    fn affected_by_replacing(&self, replaced_ids: &[u64]) -> Vec<u64> {
        let mut affected: Vec<u64> = Vec::new();
        for id in replaced_ids {
            let Ok(impact) = self.impact(*id, DEFAULT_IMPACT_DEPTH, DEFAULT_IMPACT_ITEMS) else {
                continue;
            };
            affected.extend(
                impact
                    .ids()
                    .into_iter()
                    .filter(|i| !replaced_ids.contains(i)),
            );
        }
        affected.sort_unstable();
        affected.dedup();
        affected
    }

    /// Id of a live long-term item the new text replaces: same dedup key,
    /// different text.
    fn superseded_by(
        &self,
        key: &StoreKey,
        kind: MemoryKind,
        dedup_key: &str,
        text: &str,
    ) -> Option<u64> {
        if kind == MemoryKind::ShortTerm {
            return None;
        }
        let existing = self.store(kind).find_by_dedup_key(key, dedup_key)?;
        let fingerprint = crate::types::normalize_text(text);
        (existing.fingerprint() != fingerprint && existing.can_change()).then_some(existing.id)
    }

    /// Store an allowed item, then keep the key within budget and summarize
    /// short-term turns. Returns the item when it was stored.
    pub(super) fn commit(
        &mut self,
        key: &StoreKey,
        item: MemoryItem,
        events: &mut Vec<MemoryEvent>,
    ) -> Option<MemoryItem> {
        let kind = item.kind;
        let dedupe = kind != MemoryKind::ShortTerm;
        let stamp = item.meta.phase.clone();
        match self.store_mut(kind).store_item(key, item.clone(), dedupe) {
            StoreOutcome::Duplicate { existing_id } => {
                log::debug!("Item {} duplicates item {} in {}", item.id, existing_id, key);
                events.push(MemoryEvent::Deduplicated {
                    store_key: key.clone(),
                    existing_id,
                });
                return None;
            }
            StoreOutcome::Stored { replaced } => {
                for old in replaced {
                    self.record_delete(key, old.id);
                    events.push(MemoryEvent::Forgotten {
                        store_key: key.clone(),
                        item_id: old.id,
                        reason: ReasonCode::Replaced,
                    });
                }
            }
        }
        self.ledger.record_add(key, &stamp.phase_id, &item);
        log::debug!(
            "Wrote {} item {} to {} at tick {}",
            kind,
            item.id,
            key,
            item.tick
        );
        events.push(MemoryEvent::Written {
            store_key: key.clone(),
            item_id: item.id,
            kind,
            tick: item.tick,
        });

        let usage = self.budget_usage(key);
        let decision = enforce_budget(&self.config.budget, &usage, kind, 0);
        if decision.needs_compaction() {
            if let Some(event) = self.compact(key, &item, decision.over_by) {
                events.push(event);
            }
        }

        if kind == MemoryKind::ShortTerm {
            let outcome = self.short_term.summarize_if_needed(
                &mut self.factory,
                key,
                self.contract.short_term_max_turns,
                &stamp,
                item.meta.space,
                &item.meta.owner,
                item.meta.lane.clone(),
            );
            if let Some(summary) = outcome.summary {
                for old in outcome.evicted.iter().chain(outcome.replaced.iter()) {
                    self.ledger.record_delete(key, &stamp.phase_id, old.id);
                }
                self.ledger.record_add(key, &stamp.phase_id, &summary);
                events.push(MemoryEvent::Summarized {
                    store_key: key.clone(),
                    phase_id: stamp.phase_id.clone(),
                    summary_id: summary.id,
                    evicted: outcome.evicted.iter().map(|i| i.id).collect(),
                });
            }
        }
        Some(item)
    }

    /// Evict enough items of the incoming item's kind and phase to get back
    /// within budget, and fold them into the phase's summary.
    ///
    /// A phase holds at most one summary per kind. Compaction replaces it
    /// whether turn summarization or an earlier compaction wrote it. The
    /// incoming item and approved items are never evicted.
    fn compact(&mut self, key: &StoreKey, incoming: &MemoryItem, over_by: usize) -> Option<MemoryEvent> {
        let kind = incoming.kind;
        let phase = incoming.meta.phase.clone();
        let prior_id = self
            .store(kind)
            .items_in_phase(key, &phase.phase_id)
            .into_iter()
            .rev()
            .find(|i| i.is_summary())
            .map(|i| i.id);
        let max_remove = over_by + usize::from(prior_id.is_none());

        let candidates: Vec<MemoryItem> = self
            .store(kind)
            .items(key)
            .iter()
            .filter(|i| i.id != incoming.id)
            .cloned()
            .collect();
        let engine = CompactionEngine::new(self.config.compaction.clone());
        let selection =
            engine.select_compaction_items(&candidates, &phase.phase_id, kind, max_remove, false);
        if selection.items.is_empty() {
            log::warn!("{} is over its {} budget but nothing can be compacted", key, kind);
            return None;
        }

        let removed = self.store_mut(kind).remove_many(key, &selection.ids());
        let prior = prior_id.and_then(|id| self.store_mut(kind).remove(key, id));
        for old in removed.iter().chain(prior.iter()) {
            self.ledger.record_delete(key, &phase.phase_id, old.id);
        }

        let mut covered: Vec<u64> = prior
            .as_ref()
            .map(|p| p.meta.summary_of.clone())
            .unwrap_or_default();
        covered.extend(removed.iter().map(|i| i.id));
        let mut lines: Vec<String> = prior
            .as_ref()
            .map(|p| p.text.lines().skip(1).map(str::to_string).collect())
            .unwrap_or_default();
        lines.extend(summarize_items(&removed).lines);
        let title = if covered.len() == 1 {
            "Compacted 1 item".to_string()
        } else {
            format!("Compacted {} items", covered.len())
        };
        let text = std::iter::once(title)
            .chain(lines)
            .collect::<Vec<_>>()
            .join("\n");

        let limit_reason = kind.limit_reason();
        let mut meta = ItemMeta::new(
            EventType::Context,
            incoming.meta.space,
            incoming.meta.owner.as_str(),
            incoming.meta.lane.clone(),
            phase.clone(),
        )
        .authority(Authority::SystemImposed, "compacted to stay within budget")
        .summary_of(covered);
        for old in &removed {
            meta = meta.link(MemoryLink::new(LinkType::Summarizes, old.id, limit_reason));
        }
        if let Some(prior) = &prior {
            meta = meta.link(MemoryLink::new(
                LinkType::Supersedes,
                prior.id,
                ReasonCode::Replaced,
            ));
        }
        let summary = self.factory.create(
            NewItem::new(kind, text, COMPACTION_SOURCE, meta).importance(0, Vec::new()),
        );
        self.store_mut(kind).store_item(key, summary.clone(), false);
        self.ledger.record_add(key, &phase.phase_id, &summary);

        log::info!(
            "Compacted {} {} items in {} phase {} into item {}",
            removed.len(),
            kind,
            key,
            phase.phase_id,
            summary.id
        );
        Some(MemoryEvent::Compacted {
            store_key: key.clone(),
            phase_id: phase.phase_id,
            removed: removed.iter().map(|i| i.id).collect(),
            reasons: selection.reasons,
            summary_id: summary.id,
        })
    }
}
