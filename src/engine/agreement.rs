//! Team agreements: proposals that become team memory once approved.
//!
//! A proposal holds a draft item. Approvals are counted per distinct approver;
//! when enough arrive the draft is written into the project's team lane,
//! locked or not. Accepted proposals flagged as rules also become active team
//! rules, listed by priority.

use serde::{Deserialize, Serialize};

use crate::scope::{SpaceContext, StoreKey, ANONYMOUS};
use crate::store::NewItem;
use crate::types::{
    Authority, EventType, ItemMeta, Lane, LaneMeta, LmemError, LmemResult, MemoryItem, MemoryKind,
    PolicyDecision, Space, MAX_TEXT_SIZE,
};

use super::events::MemoryEvent;
use super::policy::evaluate_write;
use super::write::MemoryEngine;

const PROPOSAL_PREFIX: &str = "proposal-";
const RULE_PREFIX: &str = "rule-";

/// Where a proposal stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ProposalStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

/// A draft team memory waiting for approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub proposal_id: String,
    /// Project id of the team.
    pub team_id: String,
    pub phase_id: String,
    /// The draft. It is not stored until the proposal is accepted.
    pub item: MemoryItem,
    pub proposed_by: String,
    pub proposed_at: u64,
    /// Distinct approvers, in approval order.
    pub approvals: Vec<String>,
    pub approvals_required: usize,
    pub status: ProposalStatus,
    /// Set when the proposal is a team rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_priority: Option<i32>,
    /// Id of the team item written on acceptance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_item_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_by: Option<String>,
}

impl Proposal {
    pub fn is_pending(&self) -> bool {
        self.status == ProposalStatus::Pending
    }

    pub fn is_rule(&self) -> bool {
        self.rule_priority.is_some()
    }
}

/// An accepted rule proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRule {
    pub rule_id: String,
    pub team_id: String,
    pub text: String,
    /// Higher comes first.
    pub priority: i32,
    pub proposal_id: String,
    pub accepted_at: u64,
}

/// Result of counting one approval.
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalState {
    /// More approvals are needed.
    Waiting(Proposal),
    /// This approval reached the threshold.
    Accepted(Proposal),
}

/// Every proposal and rule, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgreementStore {
    next_proposal: u64,
    proposals: Vec<Proposal>,
    rules: Vec<TeamRule>,
}

impl AgreementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new pending proposal.
    pub fn propose(
        &mut self,
        item: MemoryItem,
        team_id: &str,
        proposed_by: &str,
        approvals_required: usize,
        rule_priority: Option<i32>,
    ) -> Proposal {
        self.next_proposal += 1;
        let proposal = Proposal {
            proposal_id: format!("{}{}", PROPOSAL_PREFIX, self.next_proposal),
            team_id: team_id.to_string(),
            phase_id: item.phase_id().to_string(),
            proposed_by: proposed_by.to_string(),
            proposed_at: item.tick,
            item,
            approvals: Vec::new(),
            approvals_required: approvals_required.max(1),
            status: ProposalStatus::Pending,
            rule_priority,
            accepted_item_id: None,
            closed_by: None,
        };
        self.proposals.push(proposal.clone());
        proposal
    }

    pub fn get(&self, proposal_id: &str) -> Option<&Proposal> {
        self.proposals.iter().find(|p| p.proposal_id == proposal_id)
    }

    /// Every proposal of a team, oldest first.
    pub fn proposals(&self, team_id: &str) -> Vec<&Proposal> {
        self.proposals
            .iter()
            .filter(|p| p.team_id == team_id)
            .collect()
    }

    /// Pending proposals of a team, oldest first.
    pub fn list_pending(&self, team_id: &str) -> Vec<&Proposal> {
        self.proposals
            .iter()
            .filter(|p| p.team_id == team_id && p.is_pending())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.proposals.iter().filter(|p| p.is_pending()).count()
    }

    /// Count one approval. The same approver twice counts once.
    pub fn approve(&mut self, proposal_id: &str, approver: &str) -> LmemResult<ApprovalState> {
        let proposal = self.pending_mut(proposal_id)?;
        if !proposal.approvals.iter().any(|a| a == approver) {
            proposal.approvals.push(approver.to_string());
        }
        if proposal.approvals.len() < proposal.approvals_required {
            return Ok(ApprovalState::Waiting(proposal.clone()));
        }
        proposal.status = ProposalStatus::Accepted;
        proposal.closed_by = Some(approver.to_string());
        Ok(ApprovalState::Accepted(proposal.clone()))
    }

    pub fn reject(&mut self, proposal_id: &str, rejected_by: &str) -> LmemResult<Proposal> {
        let proposal = self.pending_mut(proposal_id)?;
        proposal.status = ProposalStatus::Rejected;
        proposal.closed_by = Some(rejected_by.to_string());
        Ok(proposal.clone())
    }

    /// Remember the team item an accepted proposal produced, and register
    /// the rule when it is one.
    pub fn record_acceptance(&mut self, proposal_id: &str, item_id: Option<u64>, tick: u64) {
        let Some(proposal) = self
            .proposals
            .iter_mut()
            .find(|p| p.proposal_id == proposal_id)
        else {
            return;
        };
        proposal.accepted_item_id = item_id;
        if let Some(priority) = proposal.rule_priority {
            let number = proposal
                .proposal_id
                .strip_prefix(PROPOSAL_PREFIX)
                .unwrap_or(&proposal.proposal_id);
            self.rules.push(TeamRule {
                rule_id: format!("{}{}", RULE_PREFIX, number),
                team_id: proposal.team_id.clone(),
                text: proposal.item.text.clone(),
                priority,
                proposal_id: proposal.proposal_id.clone(),
                accepted_at: tick,
            });
        }
    }

    /// Active rules of a team, highest priority first, then oldest first.
    pub fn active_rules(&self, team_id: &str) -> Vec<&TeamRule> {
        let mut rules: Vec<&TeamRule> = self.rules.iter().filter(|r| r.team_id == team_id).collect();
        rules.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.accepted_at.cmp(&b.accepted_at))
        });
        rules
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    fn pending_mut(&mut self, proposal_id: &str) -> LmemResult<&mut Proposal> {
        let proposal = self
            .proposals
            .iter_mut()
            .find(|p| p.proposal_id == proposal_id)
            .ok_or_else(|| LmemError::ProposalNotFound(proposal_id.to_string()))?;
        if !proposal.is_pending() {
            return Err(LmemError::NotPending(proposal_id.to_string()));
        }
        Ok(proposal)
    }
}

/// A request to propose something to the team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalRequest {
    pub event_type: EventType,
    pub text: String,
    pub proposed_by: String,
    /// Makes the proposal a team rule with this priority.
    pub rule_priority: Option<i32>,
    /// Defaults to the contract's agreement policy.
    pub approvals_required: Option<usize>,
}

impl ProposalRequest {
    pub fn new(event_type: EventType, text: impl Into<String>, proposed_by: impl Into<String>) -> Self {
        Self {
            event_type,
            text: text.into(),
            proposed_by: proposed_by.into(),
            rule_priority: None,
            approvals_required: None,
        }
    }

    pub fn rule(mut self, priority: i32) -> Self {
        self.rule_priority = Some(priority);
        self
    }

    pub fn approvals(mut self, count: usize) -> Self {
        self.approvals_required = Some(count);
        self
    }
}

/// Result of a proposal, an approval or a rejection.
#[derive(Debug, Clone, PartialEq)]
pub struct AgreementOutcome {
    pub decision: PolicyDecision,
    /// `None` when the draft was denied by policy.
    pub proposal: Option<Proposal>,
    /// The team item written on acceptance.
    pub item: Option<MemoryItem>,
    pub events: Vec<MemoryEvent>,
}

impl MemoryEngine {
    pub fn agreements(&self) -> &AgreementStore {
        &self.agreements
    }

    /// Draft a team memory in the project's team lane and wait for approval.
    ///
    /// The draft passes the write policy now, so an approved proposal never
    /// stores what a direct write could not.
    pub fn propose_team_memory(
        &mut self,
        ctx: &SpaceContext,
        request: ProposalRequest,
    ) -> LmemResult<AgreementOutcome> {
        if request.text.len() > MAX_TEXT_SIZE {
            return Err(LmemError::TextTooLarge {
                size: request.text.len(),
                max: MAX_TEXT_SIZE,
            });
        }
        let proposed_by = actor_name(&request.proposed_by);
        let key = ctx.store_key_for(Space::Project, Lane::Team);
        let lane_meta = LaneMeta::for_lane(Lane::Team, None, self.contract.lanes.team_can_change)?;
        let mut events = Vec::new();
        let stamp = self.ensure_phase_logged(&key, &mut events);

        let meta = ItemMeta::new(request.event_type, Space::Project, key.owner(), lane_meta, stamp)
            .authority(Authority::UserAsserted, format!("proposed by {}", proposed_by));
        let item = self.factory.create(NewItem::new(
            MemoryKind::Semantic,
            request.text,
            "user",
            meta,
        ));

        let decision = evaluate_write(&self.contract, &item, request.event_type);
        if !decision.allowed {
            log::debug!("Proposal by {} for {} denied: {}", proposed_by, key, decision.reason);
            events.push(MemoryEvent::Denied {
                store_key: key,
                kind: MemoryKind::Semantic,
                reason: decision.reason,
            });
            return Ok(AgreementOutcome {
                decision,
                proposal: None,
                item: None,
                events,
            });
        }

        let required = request
            .approvals_required
            .unwrap_or(self.contract.agreement.approvals_required);
        let proposal = self.agreements.propose(
            item,
            &ctx.project_id,
            &proposed_by,
            required,
            request.rule_priority,
        );
        log::info!(
            "{} proposed {} to team {}",
            proposed_by,
            proposal.proposal_id,
            proposal.team_id
        );
        events.push(MemoryEvent::ProposalCreated {
            team_id: proposal.team_id.clone(),
            proposal_id: proposal.proposal_id.clone(),
            item_id: proposal.item.id,
        });
        Ok(AgreementOutcome {
            decision,
            proposal: Some(proposal),
            item: None,
            events,
        })
    }

    /// Count one approval; the last needed one writes the item to the team lane.
    pub fn approve_proposal(&mut self, proposal_id: &str, approver: &str) -> LmemResult<AgreementOutcome> {
        let approver = actor_name(approver);
        let state = self.agreements.approve(proposal_id, &approver)?;
        let mut events = Vec::new();
        let proposal = match state {
            ApprovalState::Waiting(proposal) => {
                log::debug!(
                    "{} approved {}: {} of {}",
                    approver,
                    proposal_id,
                    proposal.approvals.len(),
                    proposal.approvals_required
                );
                events.push(MemoryEvent::ProposalApproved {
                    proposal_id: proposal.proposal_id.clone(),
                    approvals: proposal.approvals.len(),
                    required: proposal.approvals_required,
                });
                return Ok(AgreementOutcome {
                    decision: PolicyDecision::allow(),
                    proposal: Some(proposal),
                    item: None,
                    events,
                });
            }
            ApprovalState::Accepted(proposal) => proposal,
        };
        events.push(MemoryEvent::ProposalApproved {
            proposal_id: proposal.proposal_id.clone(),
            approvals: proposal.approvals.len(),
            required: proposal.approvals_required,
        });

        let key = StoreKey::for_lane(Space::Project, proposal.team_id.as_str(), Lane::Team);
        let stamp = self.ensure_phase_logged(&key, &mut events);
        let draft = &proposal.item;
        let meta = ItemMeta::new(
            draft.event_type(),
            Space::Project,
            key.owner(),
            draft.meta.lane.clone(),
            stamp,
        )
        .authority(
            Authority::UserAsserted,
            format!("agreed by {}", proposal.approvals.join(", ")),
        );
        let item = self.factory.create(NewItem::new(
            MemoryKind::Semantic,
            draft.text.clone(),
            draft.source.clone(),
            meta,
        ));
        let stored = self.commit(&key, item, &mut events);
        let item_id = stored.as_ref().map(|i| i.id);
        self.agreements
            .record_acceptance(proposal_id, item_id, self.factory.clock().current());

        log::info!(
            "Team {} accepted {} into {}",
            proposal.team_id,
            proposal_id,
            key
        );
        events.push(MemoryEvent::ProposalAccepted {
            proposal_id: proposal.proposal_id.clone(),
            store_key: key,
            item_id,
        });
        Ok(AgreementOutcome {
            decision: PolicyDecision::allow(),
            proposal: self.agreements.get(proposal_id).cloned(),
            item: stored,
            events,
        })
    }

    pub fn reject_proposal(&mut self, proposal_id: &str, rejected_by: &str) -> LmemResult<AgreementOutcome> {
        let rejected_by = actor_name(rejected_by);
        let proposal = self.agreements.reject(proposal_id, &rejected_by)?;
        log::info!("{} rejected {}", rejected_by, proposal_id);
        Ok(AgreementOutcome {
            decision: PolicyDecision::allow(),
            events: vec![MemoryEvent::ProposalRejected {
                proposal_id: proposal.proposal_id.clone(),
            }],
            proposal: Some(proposal),
            item: None,
        })
    }

    /// Pending proposals of a team, oldest first.
    pub fn list_team_proposals(&self, team_id: &str) -> Vec<&Proposal> {
        self.agreements.list_pending(team_id)
    }

    pub fn active_rules(&self, team_id: &str) -> Vec<&TeamRule> {
        self.agreements.active_rules(team_id)
    }
}

fn actor_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        ANONYMOUS.to_string()
    } else {
        trimmed.to_string()
    }
}
