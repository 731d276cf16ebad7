//! Phase 6 tests: Links, impact analysis, team agreements, handoffs and the wake-up report.

use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::NamedTempFile;

use lane_memory::engine::{
    briefing_lines, compute_impact, deterministic_recall_hash, render_change_preview,
    render_impact, restore_failed_lines, select_handoff_items, wake_up_lines, ApprovalState,
    ChangeKind, EngineSnapshot, HandoffEntry, HandoffStatus, HandoffStore, MemoryEngine,
    MemoryEvent, NewPacket, Proposal, ProposalRequest, ProposalStatus, RecallRequest, TeamRule,
    WakeUpStats, WriteRequest,
};
use lane_memory::scope::{resolve_space_context, CallerState, SpaceContext, StoreKey};
use lane_memory::store::{ItemFactory, NewItem};
use lane_memory::types::{
    is_bracket_free, Authority, Contract, EngineConfig, EventType, ItemMeta, Lane, LaneMeta,
    LinkType, LmemError, MemoryItem, MemoryKind, MemoryLink, PhaseReason, PhaseStamp,
    ReasonCode, Space,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn ctx() -> SpaceContext {
    resolve_space_context(
        &CallerState {
            session_id: Some("s1".to_string()),
            user_id: Some("u1".to_string()),
        },
        None,
        Some("/work/app"),
        None,
    )
}

fn stamp(phase_id: &str, started_at: u64) -> PhaseStamp {
    PhaseStamp {
        phase_id: phase_id.to_string(),
        started_at,
        reason: PhaseReason::Auto,
    }
}

/// Build a semantic item with the given links.
fn linked(
    factory: &mut ItemFactory,
    text: &str,
    space: Space,
    phase: PhaseStamp,
    links: &[(LinkType, u64)],
) -> MemoryItem {
    let mut meta = ItemMeta::new(EventType::Fact, space, "s1", LaneMeta::My, phase)
        .authority(Authority::UserAsserted, "test");
    for (link_type, target) in links {
        meta = meta.link(MemoryLink::new(*link_type, *target, ReasonCode::Linked));
    }
    factory.create(NewItem::new(MemoryKind::Semantic, text, "user", meta))
}

fn event_item(factory: &mut ItemFactory, text: &str, event_type: EventType) -> MemoryItem {
    let meta = ItemMeta::new(event_type, Space::Project, "p1", LaneMeta::My, stamp("phase-1", 0));
    factory.create(NewItem::new(MemoryKind::Semantic, text, "user", meta))
}

/// A contract that lets agent and team lanes of the project space be written directly.
fn open_project_contract() -> Contract {
    let mut contract = Contract::default();
    contract.border.write_restricted = vec![Space::System];
    contract
}

fn all_bracket_free(lines: &[String]) -> bool {
    lines.iter().all(|l| is_bracket_free(l))
}

// ==================== Impact Tests ====================

#[test]
fn test_impact_reaches_dependents_not_dependencies() {
    let mut factory = ItemFactory::new();
    let target = linked(&mut factory, "Target", Space::Session, stamp("phase-1", 0), &[]);
    let source = linked(
        &mut factory,
        "Source",
        Space::Session,
        stamp("phase-1", 0),
        &[(LinkType::DependsOn, target.id)],
    );
    let items = [target.clone(), source.clone()];

    let on_target = compute_impact(&items, target.id, 2, 10).unwrap();
    assert_eq!(on_target.ids(), vec![source.id]);
    assert_eq!(on_target.items[0].link_type, LinkType::DependsOn);

    let on_source = compute_impact(&items, source.id, 2, 10).unwrap();
    assert!(on_source.is_empty());
}

#[test]
fn test_impact_follows_replacements_forward() {
    let mut factory = ItemFactory::new();
    let old = linked(&mut factory, "Old", Space::Session, stamp("phase-1", 0), &[]);
    let new = linked(
        &mut factory,
        "New",
        Space::Session,
        stamp("phase-2", 3),
        &[(LinkType::Supersedes, old.id)],
    );
    let items = [old.clone(), new.clone()];

    assert_eq!(compute_impact(&items, new.id, 2, 10).unwrap().ids(), vec![old.id]);
    assert!(compute_impact(&items, old.id, 2, 10).unwrap().is_empty());
}

#[test]
fn test_impact_follows_conflicts_both_ways() {
    let mut factory = ItemFactory::new();
    let first = linked(
        &mut factory,
        "First",
        Space::Session,
        stamp("phase-1", 0),
        &[(LinkType::ConflictsWith, 1)],
    );
    let second = linked(&mut factory, "Second", Space::Session, stamp("phase-1", 0), &[]);
    assert_eq!(second.id, 1);
    let items = [first.clone(), second.clone()];

    assert_eq!(compute_impact(&items, first.id, 2, 10).unwrap().ids(), vec![second.id]);
    assert_eq!(compute_impact(&items, second.id, 2, 10).unwrap().ids(), vec![first.id]);
}

#[test]
fn test_impact_orders_by_phase_then_space_then_id() {
    let mut factory = ItemFactory::new();
    let older = linked(&mut factory, "Older", Space::Project, stamp("phase-1", 0), &[]);
    let newer = linked(&mut factory, "Newer", Space::Session, stamp("phase-2", 4), &[]);
    let same_phase_session =
        linked(&mut factory, "Sibling", Space::Session, stamp("phase-1", 0), &[]);
    let root = linked(
        &mut factory,
        "Root",
        Space::Session,
        stamp("phase-2", 4),
        &[
            (LinkType::PromotedFrom, newer.id),
            (LinkType::Supersedes, older.id),
            (LinkType::Supersedes, same_phase_session.id),
        ],
    );
    let items = [older.clone(), newer.clone(), same_phase_session.clone(), root.clone()];

    let impact = compute_impact(&items, root.id, 2, 10).unwrap();
    assert_eq!(
        impact.ids(),
        vec![same_phase_session.id, older.id, newer.id]
    );
}

#[test]
fn test_impact_avoids_loops_and_renders_bracket_free() {
    let mut factory = ItemFactory::new();
    let first = linked(
        &mut factory,
        "First [demo]",
        Space::Session,
        stamp("phase-1", 0),
        &[(LinkType::PromotedFrom, 1)],
    );
    let second = linked(
        &mut factory,
        "Second {demo}",
        Space::Session,
        stamp("phase-1", 0),
        &[(LinkType::PromotedFrom, first.id)],
    );
    let items = [first.clone(), second.clone()];

    let impact = compute_impact(&items, first.id, 2, 10).unwrap();
    assert_eq!(impact.items.len(), 1);
    assert_eq!(impact.items[0].path, vec![first.id, second.id]);

    let rendered = render_impact(&impact);
    assert_eq!(rendered.title, "Impact of memory 0");
    assert_eq!(rendered.lines[0], "This change could affect 1 memory.");
    assert_eq!(rendered.path_lines, vec!["Path 0 to 1 reached through was promoted from."]);
    let preview = render_change_preview(&impact, ChangeKind::Replace);
    assert_eq!(preview[0], "If you replace this memory, 1 memory may need review.");

    assert!(is_bracket_free(&rendered.title));
    assert!(all_bracket_free(&rendered.lines));
    assert!(all_bracket_free(&rendered.path_lines));
    assert!(all_bracket_free(&preview));
}

#[test]
fn test_impact_depth_and_item_limits() {
    let mut factory = ItemFactory::new();
    let a = linked(&mut factory, "A", Space::Session, stamp("phase-1", 0), &[]);
    let b = linked(
        &mut factory,
        "B",
        Space::Session,
        stamp("phase-1", 0),
        &[(LinkType::DependsOn, a.id)],
    );
    let c = linked(
        &mut factory,
        "C",
        Space::Session,
        stamp("phase-1", 0),
        &[(LinkType::DependsOn, b.id)],
    );
    let items = [a.clone(), b.clone(), c.clone()];

    let shallow = compute_impact(&items, a.id, 1, 10).unwrap();
    assert_eq!(shallow.ids(), vec![b.id]);
    assert_eq!(shallow.depth_used, 1);

    let deep = compute_impact(&items, a.id, 2, 10).unwrap();
    assert_eq!(deep.ids(), vec![b.id, c.id]);
    assert_eq!(deep.items[1].path, vec![a.id, b.id, c.id]);
    assert_eq!(deep.depth_used, 2);
    assert!(!deep.truncated);

    let limited = compute_impact(&items, a.id, 2, 1).unwrap();
    assert_eq!(limited.ids(), vec![b.id]);
    assert!(limited.truncated);
    assert!(render_impact(&limited)
        .lines
        .contains(&"More memories may be affected.".to_string()));
}

#[test]
fn test_impact_of_unknown_item_fails() {
    let items: Vec<MemoryItem> = Vec::new();
    assert!(matches!(
        compute_impact(&items, 9, 2, 10),
        Err(LmemError::ItemNotFound(9))
    ));
}

#[test]
fn test_change_preview_with_nothing_affected() {
    let mut factory = ItemFactory::new();
    let lone = linked(&mut factory, "Alone", Space::Session, stamp("phase-1", 0), &[]);
    let impact = compute_impact(&[lone.clone()], lone.id, 2, 10).unwrap();
    assert_eq!(
        render_change_preview(&impact, ChangeKind::Delete),
        vec!["If you delete this memory, nothing else is affected."]
    );
    assert_eq!(
        render_impact(&impact).lines,
        vec!["Nothing else depends on this memory."]
    );
    assert_eq!(ChangeKind::from_name("forget"), Some(ChangeKind::Delete));
    assert_eq!(ChangeKind::from_name("rename"), None);
}

// ==================== Engine Link Tests ====================

#[test]
fn test_write_links_and_impact_warning() {
    init_logging();
    let mut engine = MemoryEngine::new(Contract::default(), EngineConfig::default());
    let ctx = ctx();

    let db = engine
        .write(
            &ctx,
            WriteRequest::new(MemoryKind::Semantic, Space::Session, EventType::Fact, "Use Postgres", "user")
                .dedup_key("database"),
        )
        .unwrap()
        .item
        .unwrap();
    let api = engine
        .write(
            &ctx,
            WriteRequest::new(
                MemoryKind::Semantic,
                Space::Session,
                EventType::Fact,
                "API layer assumes Postgres",
                "user",
            )
            .link(LinkType::DependsOn, db.id),
        )
        .unwrap()
        .item
        .unwrap();
    assert_eq!(api.meta.links.len(), 1);
    assert_eq!(api.meta.links[0].reason, ReasonCode::Linked);
    assert!(!api.meta.impact_warning);
    assert_eq!(engine.impact(db.id, 2, 10).unwrap().ids(), vec![api.id]);

    let outcome = engine
        .write(
            &ctx,
            WriteRequest::new(MemoryKind::Semantic, Space::Session, EventType::Fact, "Use SQLite", "user")
                .dedup_key("database"),
        )
        .unwrap();
    let sqlite = outcome.item.clone().unwrap();
    assert!(sqlite.meta.impact_warning);
    assert!(sqlite.superseded_ids().any(|id| id == db.id));
    assert!(outcome.events.contains(&MemoryEvent::ImpactWarning {
        store_key: outcome.store_key.clone(),
        item_id: sqlite.id,
        affected: vec![api.id],
    }));
    assert!(engine.find_any(db.id).is_none());
}

#[test]
fn test_recall_hash_is_deterministic() {
    let run = |text: &str| {
        let mut engine = MemoryEngine::new(Contract::default(), EngineConfig::default());
        let ctx = ctx();
        for t in ["first turn", text] {
            engine
                .write(
                    &ctx,
                    WriteRequest::new(MemoryKind::ShortTerm, Space::Session, EventType::Context, t, "user"),
                )
                .unwrap();
        }
        let key = ctx.store_key_for(Space::Session, Lane::My);
        engine.recall(&RecallRequest::new(key, MemoryKind::ShortTerm))
    };

    let a = run("second turn");
    let b = run("second turn");
    let c = run("another turn");
    assert_eq!(a.recall_hash(), b.recall_hash());
    assert_ne!(a.recall_hash(), c.recall_hash());
    assert_eq!(a.recall_hash().len(), 64);
    assert!(a.recall_hash().chars().all(|ch| ch.is_ascii_hexdigit()));
    assert_eq!(a.recall_hash(), deterministic_recall_hash(&a.items));
    assert_ne!(deterministic_recall_hash(&[]), a.recall_hash());
}

// ==================== Agreement Tests ====================

#[test]
fn test_proposal_waits_for_distinct_approvals() {
    init_logging();
    let mut contract = Contract::default();
    contract.agreement.approvals_required = 2;
    contract.lanes.team_can_change = false;
    let mut engine = MemoryEngine::new(contract, EngineConfig::default());
    let ctx = ctx();
    let team_key = ctx.store_key_for(Space::Project, Lane::Team);

    let outcome = engine
        .propose_team_memory(
            &ctx,
            ProposalRequest::new(EventType::Decision, "Deploy from main only", "ana"),
        )
        .unwrap();
    let proposal = outcome.proposal.unwrap();
    assert_eq!(proposal.proposal_id, "proposal-1");
    assert_eq!(proposal.team_id, ctx.project_id);
    assert_eq!(proposal.approvals_required, 2);
    assert!(engine.store(MemoryKind::Semantic).items(&team_key).is_empty());
    assert_eq!(engine.list_team_proposals(&ctx.project_id).len(), 1);

    let first = engine.approve_proposal("proposal-1", "ana").unwrap();
    assert!(first.item.is_none());
    assert_eq!(
        first.events,
        vec![MemoryEvent::ProposalApproved {
            proposal_id: "proposal-1".to_string(),
            approvals: 1,
            required: 2,
        }]
    );
    let repeat = engine.approve_proposal("proposal-1", " ana ").unwrap();
    assert_eq!(repeat.proposal.unwrap().approvals, vec!["ana"]);
    assert!(engine.store(MemoryKind::Semantic).items(&team_key).is_empty());

    let accepted = engine.approve_proposal("proposal-1", "ben").unwrap();
    let item = accepted.item.unwrap();
    assert_eq!(item.text, "Deploy from main only");
    assert_eq!(item.meta.authority, Authority::UserAsserted);
    assert_eq!(item.meta.authority_reason, "agreed by ana, ben");
    assert!(!item.can_change());
    assert_eq!(engine.store(MemoryKind::Semantic).items(&team_key), &[item.clone()]);
    assert_eq!(
        accepted.proposal.unwrap().status,
        ProposalStatus::Accepted
    );
    assert!(engine.list_team_proposals(&ctx.project_id).is_empty());
    assert!(matches!(
        engine.approve_proposal("proposal-1", "cy"),
        Err(LmemError::NotPending(_))
    ));
}

#[test]
fn test_rejected_proposal_never_reaches_team_lane() {
    let mut engine = MemoryEngine::new(Contract::default(), EngineConfig::default());
    let ctx = ctx();
    engine
        .propose_team_memory(&ctx, ProposalRequest::new(EventType::Fact, "We use tabs", "ana"))
        .unwrap();

    let outcome = engine.reject_proposal("proposal-1", "ben").unwrap();
    let proposal = outcome.proposal.unwrap();
    assert_eq!(proposal.status, ProposalStatus::Rejected);
    assert_eq!(proposal.closed_by.as_deref(), Some("ben"));
    let team_key = ctx.store_key_for(Space::Project, Lane::Team);
    assert!(engine.store(MemoryKind::Semantic).items(&team_key).is_empty());

    assert!(matches!(
        engine.approve_proposal("proposal-1", "ana"),
        Err(LmemError::NotPending(_))
    ));
    assert!(matches!(
        engine.reject_proposal("proposal-9", "ana"),
        Err(LmemError::ProposalNotFound(_))
    ));
}

#[test]
fn test_proposal_passes_write_policy() {
    let mut engine = MemoryEngine::new(Contract::default(), EngineConfig::default());
    let ctx = ctx();
    let outcome = engine
        .propose_team_memory(
            &ctx,
            ProposalRequest::new(EventType::Fact, "password = hunter2", "ana"),
        )
        .unwrap();
    assert!(!outcome.decision.allowed);
    assert_eq!(outcome.decision.reason, ReasonCode::PrivacyDenySensitive);
    assert!(outcome.proposal.is_none());
    assert_eq!(engine.agreements().pending_count(), 0);
}

#[test]
fn test_rule_proposals_become_rules_by_priority() {
    let mut engine = MemoryEngine::new(Contract::default(), EngineConfig::default());
    let ctx = ctx();
    for (text, priority) in [
        ("Only approvers can approve team proposals", 0),
        ("Only contributors can create handoff packets", 1),
    ] {
        engine
            .propose_team_memory(
                &ctx,
                ProposalRequest::new(EventType::Decision, text, "ana").rule(priority),
            )
            .unwrap();
    }
    engine.approve_proposal("proposal-1", "ben").unwrap();
    engine.approve_proposal("proposal-2", "ben").unwrap();

    let rules: Vec<&str> = engine
        .active_rules(&ctx.project_id)
        .iter()
        .map(|r| r.rule_id.as_str())
        .collect();
    assert_eq!(rules, vec!["rule-2", "rule-1"]);
    assert!(engine.active_rules("other-team").is_empty());
}

// ==================== Handoff Tests ====================

#[test]
fn test_handoff_selection_order_and_summary() {
    let mut factory = ItemFactory::new();
    let decision_old = event_item(&mut factory, "Decision old", EventType::Decision);
    let conflict_meta = ItemMeta::new(
        EventType::Context,
        Space::Project,
        "p1",
        LaneMeta::My,
        stamp("phase-1", 0),
    )
    .link(MemoryLink::new(LinkType::ConflictsWith, 99, ReasonCode::Linked));
    let conflict = factory.create(NewItem::new(MemoryKind::Semantic, "Conflict", "user", conflict_meta));
    let impact_meta = ItemMeta::new(
        EventType::Context,
        Space::Project,
        "p1",
        LaneMeta::My,
        stamp("phase-1", 0),
    )
    .impact_warning(true);
    let impact = factory.create(NewItem::new(MemoryKind::Semantic, "Impact", "user", impact_meta));
    let decision_new = event_item(&mut factory, "Decision new", EventType::Decision);
    let proposal_item = event_item(&mut factory, "Proposal", EventType::Context);

    let proposal = Proposal {
        proposal_id: "proposal-1".to_string(),
        team_id: "team-1".to_string(),
        phase_id: "phase-1".to_string(),
        item: proposal_item.clone(),
        proposed_by: "user".to_string(),
        proposed_at: 1,
        approvals: Vec::new(),
        approvals_required: 1,
        status: ProposalStatus::Pending,
        rule_priority: None,
        accepted_item_id: None,
        closed_by: None,
    };
    let rule = |rule_id: &str, priority: i32| TeamRule {
        rule_id: rule_id.to_string(),
        team_id: "team-1".to_string(),
        text: "Rule".to_string(),
        priority,
        proposal_id: "proposal-0".to_string(),
        accepted_at: 0,
    };
    let rules = [rule("rule-1", 0), rule("rule-2", 1)];

    let selection = select_handoff_items(
        &[decision_new.clone(), conflict.clone()],
        &[decision_old.clone(), impact.clone()],
        &[&proposal],
        &[&rules[0], &rules[1]],
    );
    assert_eq!(
        selection.entries,
        vec![
            HandoffEntry::Item(decision_new.id),
            HandoffEntry::Item(decision_old.id),
            HandoffEntry::Item(proposal_item.id),
            HandoffEntry::Item(conflict.id),
            HandoffEntry::Rule("rule-2".to_string()),
            HandoffEntry::Rule("rule-1".to_string()),
            HandoffEntry::Item(impact.id),
        ]
    );
    assert_eq!(
        selection.summary_lines,
        vec![
            "Handoff packet summary.",
            "Decision items count is 2.",
            "Pending proposals count is 1.",
            "Conflicts count is 1.",
            "Active rules count is 2.",
            "Impact warnings count is 1.",
        ]
    );

    let briefing = briefing_lines(&selection);
    assert_eq!(
        briefing,
        vec![
            "Briefing for the next agent.",
            "Two decisions to carry over.",
            "One proposal is waiting for approval.",
            "One conflict to resolve.",
            "Two team rules are active.",
            "One impact warning to review.",
        ]
    );
    assert!(all_bracket_free(&selection.summary_lines));
    assert!(all_bracket_free(&briefing));
}

#[test]
fn test_handoff_apply_copies_items_with_link_previews() {
    init_logging();
    let mut engine = MemoryEngine::new(open_project_contract(), EngineConfig::default());
    let ctx = ctx();

    let old = engine
        .write(
            &ctx,
            WriteRequest::new(MemoryKind::Semantic, Space::Project, EventType::Fact, "Old [detail]", "user")
                .agent("agent-a"),
        )
        .unwrap()
        .item
        .unwrap();
    let agent_decision = engine
        .write(
            &ctx,
            WriteRequest::new(
                MemoryKind::Semantic,
                Space::Project,
                EventType::Decision,
                "Agent decision",
                "user",
            )
            .agent("agent-a")
            .link(LinkType::ConflictsWith, old.id),
        )
        .unwrap()
        .item
        .unwrap();
    let team_decision = engine
        .write(
            &ctx,
            WriteRequest::new(MemoryKind::Semantic, Space::Project, EventType::Decision, "Team decision", "user"),
        )
        .unwrap()
        .item
        .unwrap();
    assert_eq!(team_decision.lane(), Lane::Team);

    let packet = engine
        .create_handoff(&ctx, "agent-a", "agent-b", "u1")
        .unwrap();
    assert_eq!(packet.packet_id, "handoff-1");
    assert_eq!(
        packet.entries,
        vec![
            HandoffEntry::Item(team_decision.id),
            HandoffEntry::Item(agent_decision.id),
        ]
    );
    assert_eq!(packet.summary_lines[1], "Two decisions to carry over.");
    assert_eq!(engine.list_handoffs(&ctx.project_id).len(), 1);

    let outcome = engine.apply_handoff("handoff-1").unwrap();
    let target_key = StoreKey::for_agent(Space::Project, ctx.project_id.as_str(), "agent-b");
    assert_eq!(outcome.store_key, target_key);
    assert_eq!(outcome.items.len(), 2);
    assert_eq!(engine.store(MemoryKind::Semantic).len(&target_key), 2);
    for copy in &outcome.items {
        assert_eq!(copy.agent_id(), Some("agent-b"));
        assert!(copy.meta.links.is_empty());
        let handoff = copy.meta.handoff.as_ref().unwrap();
        assert_eq!(handoff.packet_id, "handoff-1");
        assert_eq!(handoff.from_agent, "agent-a");
        assert_eq!(handoff.to_agent, "agent-b");
    }
    let copied = outcome
        .items
        .iter()
        .find(|i| i.text == "Agent decision")
        .unwrap();
    let previews = &copy_previews(copied);
    assert_eq!(previews, &vec!["Conflicts with Old detail".to_string()]);

    let from_key = StoreKey::for_agent(Space::Project, ctx.project_id.as_str(), "agent-a");
    let original = engine.find_item(&from_key, agent_decision.id).unwrap();
    assert_eq!(original.meta.links.len(), 1);

    assert_eq!(outcome.packet.status, HandoffStatus::Applied);
    assert!(matches!(
        engine.apply_handoff("handoff-1"),
        Err(LmemError::NotPending(_))
    ));
    assert!(matches!(
        engine.apply_handoff("handoff-7"),
        Err(LmemError::HandoffNotFound(_))
    ));
}

fn copy_previews(item: &MemoryItem) -> Vec<String> {
    item.meta
        .handoff
        .as_ref()
        .map(|h| h.link_previews.clone())
        .unwrap_or_default()
}

#[test]
fn test_handoff_needs_agent_ids() {
    let mut engine = MemoryEngine::new(open_project_contract(), EngineConfig::default());
    assert!(matches!(
        engine.create_handoff(&ctx(), "  ", "agent-b", "u1"),
        Err(LmemError::MissingAgentId)
    ));
}

#[test]
fn test_handoff_store_orders_by_created_at() {
    let mut store = HandoffStore::new();
    let packet = |created_at: u64, line: &str| NewPacket {
        from_agent: "agent-a".to_string(),
        to_agent: "agent-b".to_string(),
        team_id: "team-1".to_string(),
        space: Space::Project,
        phase_id: "phase-1".to_string(),
        created_by: "owner".to_string(),
        created_at,
        entries: Vec::new(),
        summary_lines: vec![line.to_string()],
    };
    let late = store.create_packet(packet(9, "Summary one."));
    let early = store.create_packet(packet(2, "Summary two."));

    let ids: Vec<&str> = store
        .list_packets("team-1")
        .iter()
        .map(|p| p.packet_id.as_str())
        .collect();
    assert_eq!(ids, vec![early.packet_id.as_str(), late.packet_id.as_str()]);
    assert!(store.list_packets("team-2").is_empty());
    assert_eq!(store.pending_count(), 2);
}

// ==================== Wake-up and Snapshot Tests ====================

#[test]
fn test_wake_up_lines() {
    let stats = WakeUpStats {
        restored: true,
        total_items: 4,
        team_items: 1,
        active_rules: 2,
        pending_proposals: 2,
        pending_handoffs: 0,
    };
    assert_eq!(
        wake_up_lines(&stats),
        vec![
            "Memory was restored.",
            "Total items are 4.",
            "Team memory loaded.",
            "Two rules active.",
            "Two proposals still waiting.",
            "No handoffs are waiting.",
        ]
    );

    let fresh = MemoryEngine::new(Contract::default(), EngineConfig::default()).wake_up_stats(false);
    let lines = wake_up_lines(&fresh);
    assert_eq!(lines[0], "Memory started fresh.");
    assert_eq!(lines[2], "No team memory yet.");
    assert_eq!(lines[3], "No rules are active.");

    assert_eq!(
        restore_failed_lines("Bad file.", "Checksum (sha) failed"),
        vec!["Memory restore failed.", "Bad file.", "Checksum sha failed"]
    );
}

#[test]
fn test_snapshot_keeps_agreements_and_handoffs() {
    let mut engine = MemoryEngine::new(open_project_contract(), EngineConfig::default());
    let ctx = ctx();
    engine
        .propose_team_memory(&ctx, ProposalRequest::new(EventType::Decision, "Pin the toolchain", "ana"))
        .unwrap();
    engine
        .write(
            &ctx,
            WriteRequest::new(MemoryKind::Semantic, Space::Project, EventType::Decision, "Plan", "user")
                .agent("agent-a"),
        )
        .unwrap();
    engine.create_handoff(&ctx, "agent-a", "agent-b", "u1").unwrap();

    let restored = MemoryEngine::restore(engine.snapshot()).unwrap();
    assert_eq!(restored.agreements(), engine.agreements());
    assert_eq!(restored.handoffs(), engine.handoffs());
    let stats = restored.wake_up_stats(true);
    assert_eq!(stats.pending_proposals, 1);
    assert_eq!(stats.pending_handoffs, 1);

    let mut approved = restored.clone();
    let state = approved.approve_proposal("proposal-1", "ben").unwrap();
    assert!(state.item.is_some());
    assert_eq!(approved.wake_up_stats(true).team_items, 1);

    // Snapshots written before agreements existed still load.
    let mut value = serde_json::to_value(engine.snapshot()).unwrap();
    let map = value.as_object_mut().unwrap();
    map.remove("agreements");
    map.remove("handoffs");
    let legacy: EngineSnapshot = serde_json::from_value(value).unwrap();
    let loaded = MemoryEngine::restore(legacy).unwrap();
    assert_eq!(loaded.agreements().pending_count(), 0);
    assert_eq!(loaded.handoffs().pending_count(), 0);
}

#[test]
fn test_agreement_store_approval_states() {
    let mut factory = ItemFactory::new();
    let draft = event_item(&mut factory, "Draft", EventType::Decision);
    let mut store = lane_memory::engine::AgreementStore::new();
    let proposal = store.propose(draft, "team-1", "ana", 0, None);
    assert_eq!(proposal.approvals_required, 1);
    assert!(matches!(
        store.approve(&proposal.proposal_id, "ben").unwrap(),
        ApprovalState::Accepted(_)
    ));
}

// ==================== CLI Tests ====================

fn lmem_bin() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.push("lmem");
    path
}

fn run_lmem(args: &[&str]) -> Output {
    Command::new(lmem_bin())
        .args(args)
        .args(["--session", "s1", "--user", "u1"])
        .output()
        .expect("Failed to run lmem")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "lmem failed with status {:?}\nstdout: {}\nstderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    );
}

fn stdout_str(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// A snapshot whose contract allows direct project writes.
fn created_open_file() -> (NamedTempFile, NamedTempFile) {
    let contract = NamedTempFile::new().unwrap();
    std::fs::write(contract.path(), r#"{"border": {"write_restricted": ["system"]}}"#).unwrap();
    let tmp = NamedTempFile::new().unwrap();
    let output = run_lmem(&[
        "create",
        tmp.path().to_str().unwrap(),
        "--contract",
        contract.path().to_str().unwrap(),
    ]);
    assert_success(&output);
    (tmp, contract)
}

#[test]
fn test_cli_links_and_impact() {
    let (tmp, _contract) = created_open_file();
    let path = tmp.path().to_str().unwrap();

    let output = run_lmem(&["write", path, "Use Postgres", "--kind", "semantic", "--event", "fact"]);
    assert_success(&output);
    let output = run_lmem(&[
        "write",
        path,
        "API assumes Postgres",
        "--kind",
        "semantic",
        "--event",
        "fact",
        "--link",
        "depends_on:0",
    ]);
    assert_success(&output);

    let output = run_lmem(&["impact", path, "0"]);
    assert_success(&output);
    let out = stdout_str(&output);
    assert!(out.contains("Impact of memory 0"), "{}", out);
    assert!(out.contains("This change could affect 1 memory."), "{}", out);
    assert!(out.contains("Path 0 to 1 reached through depends on."), "{}", out);
    assert!(is_bracket_free(&out), "{}", out);

    let output = run_lmem(&["impact", path, "0", "--change", "delete"]);
    assert_success(&output);
    assert!(stdout_str(&output).contains("If you delete this memory, 1 memory may need review."));

    let output = run_lmem(&["recall", path, "--kind", "semantic"]);
    assert_success(&output);
    assert!(stdout_str(&output).contains("Recall hash: "));

    let output = run_lmem(&["write", path, "x", "--link", "nope:1"]);
    assert_eq!(output.status.code(), Some(3));
    let output = run_lmem(&["impact", path, "42"]);
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_cli_propose_and_approve() {
    let (tmp, _contract) = created_open_file();
    let path = tmp.path().to_str().unwrap();

    let output = run_lmem(&["propose", path, "Deploy from main only"]);
    assert_success(&output);
    assert!(stdout_str(&output).contains("Proposed proposal-1 to team"));

    let output = run_lmem(&["proposals", path]);
    assert_success(&output);
    let out = stdout_str(&output);
    assert!(out.contains("1 pending proposals"), "{}", out);
    assert!(out.contains("proposal-1 by u1, 0 of 1 approvals: Deploy from main only"), "{}", out);

    let output = run_lmem(&["approve", path, "proposal-1"]);
    assert_success(&output);
    let out = stdout_str(&output);
    assert!(out.contains("proposal-1 is accepted with 1 of 1 approvals"), "{}", out);
    assert!(out.contains("Wrote team item 1: Deploy from main only"), "{}", out);

    let output = run_lmem(&["recall", path, "--space", "project", "--kind", "semantic"]);
    assert_success(&output);
    assert!(stdout_str(&output).contains("Deploy from main only"));

    let output = run_lmem(&["approve", path, "proposal-1"]);
    assert_eq!(output.status.code(), Some(3));
    let output = run_lmem(&["reject", path, "proposal-5"]);
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_cli_handoff_and_wake_up() {
    let (tmp, _contract) = created_open_file();
    let path = tmp.path().to_str().unwrap();

    let output = run_lmem(&[
        "write", path, "Agent plan", "--space", "project", "--lane", "agent", "--agent", "a",
        "--kind", "semantic", "--event", "decision",
    ]);
    assert_success(&output);

    let output = run_lmem(&["handoff", path, "--from", "a", "--to", "b"]);
    assert_success(&output);
    let out = stdout_str(&output);
    assert!(out.contains("Created handoff-1 from a to b"), "{}", out);
    assert!(out.contains("One decision to carry over."), "{}", out);

    let output = run_lmem(&["info", path]);
    assert!(stdout_str(&output).contains("One handoff is waiting."));

    let output = run_lmem(&["apply-handoff", path, "handoff-1"]);
    assert_success(&output);
    let out = stdout_str(&output);
    assert!(out.contains("Applied handoff-1: 1 items copied to project:"), "{}", out);
    assert!(out.contains("Agent plan"), "{}", out);

    let output = run_lmem(&["info", path]);
    let out = stdout_str(&output);
    assert!(out.contains("Wake up:"), "{}", out);
    assert!(out.contains("Memory was restored."), "{}", out);
    assert!(out.contains("No handoffs are waiting."), "{}", out);

    let output = run_lmem(&["apply-handoff", path, "handoff-1"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn test_cli_restore_failure_lines() {
    let tmp = NamedTempFile::new().unwrap();
    std::fs::write(tmp.path(), vec![b'x'; 64]).unwrap();
    let output = run_lmem(&["info", tmp.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    let err = String::from_utf8_lossy(&output.stderr).to_string();
    assert!(err.starts_with("Memory restore failed."), "{}", err);
    assert!(err.contains("Invalid magic bytes"), "{}", err);
}
