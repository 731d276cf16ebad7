//! Agent handoff: packets that carry what one agent knows to another.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::scope::{agent_lane_key, SpaceContext, StoreKey};
use crate::store::NewItem;
use crate::types::{
    capitalize, count_sentence, preview, scrub_brackets, EventType, HandoffMeta, ItemMeta, Lane,
    LaneMeta, LmemError, LmemResult, MemoryItem, MemoryKind, Space, PREVIEW_CHARS,
};

use super::agreement::{Proposal, TeamRule};
use super::events::MemoryEvent;
use super::policy::evaluate_write;
use super::write::MemoryEngine;

const PACKET_PREFIX: &str = "handoff-";

/// One entry of a packet: a memory item or a team rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffEntry {
    Item(u64),
    Rule(String),
}

/// What a handoff would carry, in briefing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HandoffSelection {
    pub entries: Vec<HandoffEntry>,
    pub summary_lines: Vec<String>,
    pub decision_count: usize,
    pub proposal_count: usize,
    pub conflict_count: usize,
    pub rules_count: usize,
    pub impact_count: usize,
}

impl HandoffSelection {
    pub fn item_ids(&self) -> Vec<u64> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                HandoffEntry::Item(id) => Some(*id),
                HandoffEntry::Rule(_) => None,
            })
            .collect()
    }
}

/// Pick what the next agent needs: decisions newest first, then pending
/// proposals, conflicts, active rules by priority and impact warnings.
///
/// Each item appears once, under the first group that claims it.
pub fn select_handoff_items(
    agent_items: &[MemoryItem],
    team_items: &[MemoryItem],
    proposals: &[&Proposal],
    rules: &[&TeamRule],
) -> HandoffSelection {
    let all: Vec<&MemoryItem> = agent_items.iter().chain(team_items.iter()).collect();
    let mut seen: HashSet<u64> = HashSet::new();
    let mut entries: Vec<HandoffEntry> = Vec::new();
    let mut take = |ids: Vec<u64>, entries: &mut Vec<HandoffEntry>| -> usize {
        let mut taken = 0;
        for id in ids {
            if seen.insert(id) {
                entries.push(HandoffEntry::Item(id));
                taken += 1;
            }
        }
        taken
    };

    let mut decisions: Vec<u64> = all
        .iter()
        .filter(|i| i.event_type() == EventType::Decision)
        .map(|i| i.id)
        .collect();
    decisions.sort_unstable_by(|a, b| b.cmp(a));
    let decision_count = take(decisions, &mut entries);

    let mut pending: Vec<&&Proposal> = proposals.iter().filter(|p| p.is_pending()).collect();
    pending.sort_by_key(|p| (p.proposed_at, p.item.id));
    let proposal_count = take(pending.iter().map(|p| p.item.id).collect(), &mut entries);

    let mut conflicts: Vec<u64> = all.iter().filter(|i| i.has_conflict()).map(|i| i.id).collect();
    conflicts.sort_unstable();
    let conflict_count = take(conflicts, &mut entries);

    let mut ordered_rules: Vec<&&TeamRule> = rules.iter().collect();
    ordered_rules.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.accepted_at.cmp(&b.accepted_at))
    });
    entries.extend(
        ordered_rules
            .iter()
            .map(|r| HandoffEntry::Rule(r.rule_id.clone())),
    );
    let rules_count = ordered_rules.len();

    let mut warnings: Vec<u64> = all
        .iter()
        .filter(|i| i.meta.impact_warning)
        .map(|i| i.id)
        .collect();
    warnings.sort_unstable();
    let impact_count = take(warnings, &mut entries);

    let summary_lines = vec![
        "Handoff packet summary.".to_string(),
        format!("Decision items count is {}.", decision_count),
        format!("Pending proposals count is {}.", proposal_count),
        format!("Conflicts count is {}.", conflict_count),
        format!("Active rules count is {}.", rules_count),
        format!("Impact warnings count is {}.", impact_count),
    ];
    HandoffSelection {
        entries,
        summary_lines,
        decision_count,
        proposal_count,
        conflict_count,
        rules_count,
        impact_count,
    }
}

/// Plain briefing for the receiving agent.
pub fn briefing_lines(selection: &HandoffSelection) -> Vec<String> {
    vec![
        "Briefing for the next agent.".to_string(),
        count_sentence(
            selection.decision_count,
            "No decisions to carry over.",
            "decision to carry over.",
            "decisions to carry over.",
        ),
        count_sentence(
            selection.proposal_count,
            "No proposals are waiting.",
            "proposal is waiting for approval.",
            "proposals are waiting for approval.",
        ),
        count_sentence(
            selection.conflict_count,
            "No conflicts to resolve.",
            "conflict to resolve.",
            "conflicts to resolve.",
        ),
        count_sentence(
            selection.rules_count,
            "No team rules are active.",
            "team rule is active.",
            "team rules are active.",
        ),
        count_sentence(
            selection.impact_count,
            "No impact warnings.",
            "impact warning to review.",
            "impact warnings to review.",
        ),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffStatus {
    Pending,
    Applied,
    Rejected,
}

/// A packet from one agent to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffPacket {
    pub packet_id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub team_id: String,
    pub space: Space,
    pub phase_id: String,
    pub created_by: String,
    pub created_at: u64,
    pub entries: Vec<HandoffEntry>,
    pub summary_lines: Vec<String>,
    pub status: HandoffStatus,
    /// Ids of the copies written when the packet was applied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_item_ids: Vec<u64>,
}

/// Caller fields of a new packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPacket {
    pub from_agent: String,
    pub to_agent: String,
    pub team_id: String,
    pub space: Space,
    pub phase_id: String,
    pub created_by: String,
    pub created_at: u64,
    pub entries: Vec<HandoffEntry>,
    pub summary_lines: Vec<String>,
}

/// Every packet, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffStore {
    next_packet: u64,
    packets: Vec<HandoffPacket>,
}

impl HandoffStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_packet(&mut self, new: NewPacket) -> HandoffPacket {
        self.next_packet += 1;
        let packet = HandoffPacket {
            packet_id: format!("{}{}", PACKET_PREFIX, self.next_packet),
            from_agent: new.from_agent,
            to_agent: new.to_agent,
            team_id: new.team_id,
            space: new.space,
            phase_id: new.phase_id,
            created_by: new.created_by,
            created_at: new.created_at,
            entries: new.entries,
            summary_lines: new.summary_lines,
            status: HandoffStatus::Pending,
            applied_item_ids: Vec::new(),
        };
        self.packets.push(packet.clone());
        packet
    }

    pub fn get(&self, packet_id: &str) -> Option<&HandoffPacket> {
        self.packets.iter().find(|p| p.packet_id == packet_id)
    }

    /// Packets of a team ordered by creation tick.
    pub fn list_packets(&self, team_id: &str) -> Vec<&HandoffPacket> {
        let mut packets: Vec<&HandoffPacket> =
            self.packets.iter().filter(|p| p.team_id == team_id).collect();
        packets.sort_by_key(|p| p.created_at);
        packets
    }

    pub fn pending_count(&self) -> usize {
        self.packets
            .iter()
            .filter(|p| p.status == HandoffStatus::Pending)
            .count()
    }

    /// Mark a pending packet applied or rejected.
    pub fn close(
        &mut self,
        packet_id: &str,
        status: HandoffStatus,
        applied_item_ids: Vec<u64>,
    ) -> LmemResult<HandoffPacket> {
        let packet = self
            .packets
            .iter_mut()
            .find(|p| p.packet_id == packet_id)
            .ok_or_else(|| LmemError::HandoffNotFound(packet_id.to_string()))?;
        if packet.status != HandoffStatus::Pending {
            return Err(LmemError::NotPending(packet_id.to_string()));
        }
        packet.status = status;
        packet.applied_item_ids = applied_item_ids;
        Ok(packet.clone())
    }
}

/// Copies written by applying a packet.
#[derive(Debug, Clone, PartialEq)]
pub struct HandoffOutcome {
    pub packet: HandoffPacket,
    pub store_key: StoreKey,
    pub items: Vec<MemoryItem>,
    pub events: Vec<MemoryEvent>,
}

impl MemoryEngine {
    pub fn handoffs(&self) -> &HandoffStore {
        &self.handoffs
    }

    /// Select what `from_agent` knows in the project and package it for `to_agent`.
    pub fn create_handoff(
        &mut self,
        ctx: &SpaceContext,
        from_agent: &str,
        to_agent: &str,
        created_by: &str,
    ) -> LmemResult<HandoffPacket> {
        let from_lane = LaneMeta::for_lane(Lane::Agent, Some(from_agent), false)?;
        let to_lane = LaneMeta::for_lane(Lane::Agent, Some(to_agent), false)?;
        let (Some(from_id), Some(to_id)) = (from_lane.agent_id(), to_lane.agent_id()) else {
            return Err(LmemError::MissingAgentId);
        };

        let from_key = agent_lane_key(ctx, Space::Project, from_id);
        let team_key = ctx.store_key_for(Space::Project, Lane::Team);
        let phase = self.ensure_phase(&from_key);
        let selection = select_handoff_items(
            self.semantic.items(&from_key),
            self.semantic.items(&team_key),
            &self.agreements.list_pending(&ctx.project_id),
            &self.agreements.active_rules(&ctx.project_id),
        );
        let packet = self.handoffs.create_packet(NewPacket {
            from_agent: from_id.to_string(),
            to_agent: to_id.to_string(),
            team_id: ctx.project_id.clone(),
            space: Space::Project,
            phase_id: phase.phase_id,
            created_by: created_by.trim().to_string(),
            created_at: self.factory.clock().current(),
            summary_lines: briefing_lines(&selection),
            entries: selection.entries,
        });
        log::info!(
            "Created {} from {} to {} with {} entries",
            packet.packet_id,
            packet.from_agent,
            packet.to_agent,
            packet.entries.len()
        );
        Ok(packet)
    }

    /// Copy a packet's items into the receiving agent's lane.
    ///
    /// Copies drop their links and keep bracket-free previews of them. Items
    /// no longer live are skipped; each copy passes the write policy.
    pub fn apply_handoff(&mut self, packet_id: &str) -> LmemResult<HandoffOutcome> {
        let packet = self
            .handoffs
            .get(packet_id)
            .cloned()
            .ok_or_else(|| LmemError::HandoffNotFound(packet_id.to_string()))?;
        if packet.status != HandoffStatus::Pending {
            return Err(LmemError::NotPending(packet_id.to_string()));
        }
        let lane_meta = LaneMeta::for_lane(Lane::Agent, Some(&packet.to_agent), false)?;
        let key = StoreKey::for_agent(packet.space, packet.team_id.as_str(), &packet.to_agent);
        let mut events = Vec::new();
        let stamp = self.ensure_phase_logged(&key, &mut events);

        let mut applied: Vec<MemoryItem> = Vec::new();
        for entry in &packet.entries {
            let HandoffEntry::Item(id) = entry else {
                continue;
            };
            let Some(source) = self.find_any(*id).map(|(_, item)| item.clone()) else {
                log::debug!("{} skips item {}: no longer live", packet.packet_id, id);
                continue;
            };
            let handoff = HandoffMeta {
                packet_id: packet.packet_id.clone(),
                from_agent: packet.from_agent.clone(),
                to_agent: packet.to_agent.clone(),
                link_previews: self.link_previews(&source),
            };
            let kind = match source.kind {
                MemoryKind::ShortTerm => MemoryKind::Semantic,
                other => other,
            };
            let meta = ItemMeta::new(
                source.event_type(),
                packet.space,
                key.owner(),
                lane_meta.clone(),
                stamp.clone(),
            )
            .authority(
                source.meta.authority,
                format!("handed off by {}", packet.from_agent),
            )
            .handoff(handoff);
            let item = self.factory.create(
                NewItem::new(kind, source.text.clone(), source.source.clone(), meta)
                    .importance(source.importance, source.importance_reasons.clone()),
            );
            let decision = evaluate_write(&self.contract, &item, item.event_type());
            if !decision.allowed {
                events.push(MemoryEvent::Denied {
                    store_key: key.clone(),
                    kind,
                    reason: decision.reason,
                });
                continue;
            }
            if let Some(stored) = self.commit(&key, item, &mut events) {
                applied.push(stored);
            }
        }

        let ids: Vec<u64> = applied.iter().map(|i| i.id).collect();
        let packet = self
            .handoffs
            .close(packet_id, HandoffStatus::Applied, ids.clone())?;
        log::info!(
            "Applied {} to {}: {} items copied",
            packet.packet_id,
            key,
            ids.len()
        );
        events.push(MemoryEvent::HandoffApplied {
            packet_id: packet.packet_id.clone(),
            store_key: key.clone(),
            item_ids: ids,
        });
        Ok(HandoffOutcome {
            packet,
            store_key: key,
            items: applied,
            events,
        })
    }

    pub fn reject_handoff(&mut self, packet_id: &str) -> LmemResult<HandoffPacket> {
        let packet = self
            .handoffs
            .close(packet_id, HandoffStatus::Rejected, Vec::new())?;
        log::info!("Rejected {}", packet.packet_id);
        Ok(packet)
    }

    /// Packets of a team ordered by creation tick.
    pub fn list_handoffs(&self, team_id: &str) -> Vec<&HandoffPacket> {
        self.handoffs.list_packets(team_id)
    }

    fn link_previews(&self, item: &MemoryItem) -> Vec<String> {
        item.meta
            .links
            .iter()
            .map(|link| {
                let target = self
                    .find_any(link.target_id)
                    .map(|(_, t)| preview(&t.text, PREVIEW_CHARS))
                    .unwrap_or_else(|| format!("memory {}", link.target_id));
                scrub_brackets(&format!("{} {}", capitalize(link.link_type.label()), target))
            })
            .collect()
    }
}
