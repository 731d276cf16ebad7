//! Phase 4 tests: Retention, phases, diffs and team summaries.

use lane_memory::engine::{apply_retention, MemoryEngine, MemoryEvent, WriteRequest};
use lane_memory::scope::{resolve_space_context, CallerState, SpaceContext, StoreKey};
use lane_memory::store::{ItemFactory, NewItem};
use lane_memory::timeline::{
    build_team_summary, PhaseDiff, PhaseLedger, PhaseRegistry, PhaseSnapshot,
    MAX_TEAM_SUMMARY_LINES,
};
use lane_memory::types::{
    is_bracket_free, Contract, EngineConfig, EventType, ForgetPolicy, ItemMeta, Lane, LaneMeta,
    LmemError, MemoryItem, MemoryKind, PhaseReason, PhaseStamp, ReasonCode, RetentionConfig,
    Space,
};
use lane_memory::MemoryClock;

fn stamp() -> PhaseStamp {
    PhaseStamp {
        phase_id: "phase-1".to_string(),
        started_at: 0,
        reason: PhaseReason::Auto,
    }
}

fn ctx() -> SpaceContext {
    resolve_space_context(
        &CallerState {
            session_id: Some("s1".to_string()),
            user_id: Some("u1".to_string()),
        },
        None,
        None,
        None,
    )
}

fn make_items(event_types: &[EventType]) -> Vec<MemoryItem> {
    let mut factory = ItemFactory::new();
    event_types
        .iter()
        .enumerate()
        .map(|(i, event_type)| {
            let meta = ItemMeta::new(*event_type, Space::Session, "s1", LaneMeta::My, stamp());
            factory.create(NewItem::new(
                MemoryKind::Semantic,
                format!("item {}", i),
                "ai",
                meta,
            ))
        })
        .collect()
}

fn semantic(event_type: EventType, text: &str) -> WriteRequest {
    WriteRequest::new(MemoryKind::Semantic, Space::Session, event_type, text, "ai")
}

// ==================== Retention Tests ====================

#[test]
fn test_decay_forgets_oldest_context() {
    let items = make_items(&[EventType::Context; 13]);
    let contract = Contract::default();
    let outcome = apply_retention(&items, &contract, 12);
    let forgotten: Vec<u64> = outcome.forgotten.iter().map(|(i, _)| i.id).collect();
    assert_eq!(forgotten, vec![0, 1, 2]);
    assert!(outcome
        .forgotten
        .iter()
        .all(|(_, reason)| *reason == ReasonCode::Decay));
    assert_eq!(outcome.kept.len(), 10);
    assert_eq!(outcome.kept[0].id, 3);
}

#[test]
fn test_decay_ignores_other_events() {
    let mut types = vec![EventType::Decision, EventType::Fact];
    types.extend([EventType::Context; 3]);
    let items = make_items(&types);
    let contract = Contract {
        retention: RetentionConfig {
            decay_context_limit: 2,
            ..RetentionConfig::default()
        },
        ..Contract::default()
    };
    let outcome = apply_retention(&items, &contract, 100);
    let forgotten: Vec<u64> = outcome.forgotten.iter().map(|(i, _)| i.id).collect();
    assert_eq!(forgotten, vec![2]);
}

#[test]
fn test_ttl_expires_old_items() {
    let items = make_items(&[EventType::Decision; 11]);
    let contract = Contract {
        forget_policy: ForgetPolicy::Ttl,
        retention: RetentionConfig {
            ttl_ticks: 5,
            ..RetentionConfig::default()
        },
        ..Contract::default()
    };
    let outcome = apply_retention(&items, &contract, 10);
    let forgotten: Vec<u64> = outcome.forgotten.iter().map(|(i, _)| i.id).collect();
    assert_eq!(forgotten, vec![0, 1, 2, 3, 4]);
    assert!(outcome
        .forgotten
        .iter()
        .all(|(_, reason)| *reason == ReasonCode::TtlExpired));

    // Nothing expires before the threshold is crossed.
    let early = apply_retention(&items, &contract, 5);
    assert!(early.forgotten.is_empty());
}

#[test]
fn test_retention_is_pure() {
    let items = make_items(&[EventType::Context; 12]);
    let contract = Contract::default();
    let a = apply_retention(&items, &contract, 20);
    let b = apply_retention(&items, &contract, 20);
    assert_eq!(a, b);
    assert_eq!(items.len(), 12);
}

#[test]
fn test_engine_retention_end_to_end() {
    let mut engine = MemoryEngine::new(Contract::default(), EngineConfig::default());
    let mut key = None;
    for i in 0..15 {
        let outcome = engine
            .write(&ctx(), semantic(EventType::Context, &format!("note {}", i)))
            .unwrap();
        assert_eq!(outcome.item.as_ref().map(|i| i.tick), Some(i));
        key = Some(outcome.store_key);
    }
    let key = key.unwrap();

    let report = engine.apply_retention(&key, MemoryKind::Semantic);
    let forgotten: Vec<u64> = report.forgotten.iter().map(|(i, _)| i.id).collect();
    assert_eq!(forgotten, vec![0, 1, 2, 3, 4]);
    assert_eq!(report.events.len(), 5);
    assert!(matches!(
        report.events[0],
        MemoryEvent::Forgotten {
            item_id: 0,
            reason: ReasonCode::Decay,
            ..
        }
    ));
    assert_eq!(engine.store(MemoryKind::Semantic).len(&key), 10);

    // A second pass has nothing left to forget.
    let again = engine.apply_retention(&key, MemoryKind::Semantic);
    assert!(again.forgotten.is_empty());
}

// ==================== Phase Tests ====================

#[test]
fn test_phase_registry_lifecycle() {
    let key = StoreKey::for_lane(Space::Session, "s1", Lane::My);
    let mut clock = MemoryClock::new();
    let mut registry = PhaseRegistry::new();

    let (first, started) = registry.ensure_phase(&clock, &key);
    assert!(started);
    assert_eq!(first.phase_id, "phase-1");
    assert_eq!(first.reason, PhaseReason::Auto);
    assert_eq!(first.started_at, 0);

    let (same, started) = registry.ensure_phase(&clock, &key);
    assert!(!started);
    assert_eq!(same.phase_id, "phase-1");

    clock.next_tick();
    clock.next_tick();
    let second = registry.start_phase(&clock, &key, PhaseReason::Manual, Some("review"));
    assert_eq!(second.phase_id, "phase-2");
    assert_eq!(second.started_at, 2);
    assert_eq!(second.name.as_deref(), Some("review"));
    assert_eq!(clock.peek(), 2);

    let phases = registry.phases(&key);
    assert_eq!(phases.len(), 2);
    assert_eq!(phases[0].ended_at, Some(2));
    assert!(phases[1].is_active());
    assert_eq!(registry.active(&key).map(|p| p.phase_id.as_str()), Some("phase-2"));
    assert_eq!(
        registry.previous(&key, "phase-2").map(|p| p.phase_id.as_str()),
        Some("phase-1")
    );
    assert!(registry.previous(&key, "phase-1").is_none());
}

#[test]
fn test_ledger_seeds_from_previous_phase() {
    let key = StoreKey::for_lane(Space::Session, "s1", Lane::My);
    let items = make_items(&[EventType::Fact, EventType::Fact]);
    let mut ledger = PhaseLedger::new();
    ledger.record_add(&key, "phase-1", &items[0]);
    ledger.record_add(&key, "phase-1", &items[1]);
    ledger.start_phase(&key, "phase-2");
    ledger.record_delete(&key, "phase-2", items[0].id);

    let first = ledger.snapshot(&key, "phase-1").unwrap();
    assert_eq!(first.items.len(), 2);
    let second = ledger.snapshot(&key, "phase-2").unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].id, items[1].id);

    ledger.start_phase(&key, "phase-3");
    ledger.retain_recent(&key, 2);
    assert_eq!(ledger.phase_ids(&key), vec!["phase-2", "phase-3"]);
}

#[test]
fn test_engine_phase_ledger_is_bounded() {
    let contract = Contract {
        phase: lane_memory::types::PhasePolicy { max_phases: 3 },
        ..Contract::default()
    };
    let mut engine = MemoryEngine::new(contract, EngineConfig::default());
    let key = engine
        .write(&ctx(), semantic(EventType::Fact, "first"))
        .unwrap()
        .store_key;
    for i in 0..4 {
        engine.start_phase(&key, None);
        engine
            .write(&ctx(), semantic(EventType::Fact, &format!("fact {}", i)))
            .unwrap();
    }
    assert_eq!(engine.phases().phase_count(&key), 5);
    assert_eq!(
        engine.ledger().phase_ids(&key),
        vec!["phase-3", "phase-4", "phase-5"]
    );
    assert!(matches!(
        engine.diff_phases(&key, "phase-1", "phase-5"),
        Err(LmemError::PhaseNotFound { .. })
    ));
    assert!(engine.diff_phases(&key, "phase-4", "phase-5").is_ok());
}

// ==================== Diff Tests ====================

fn diffed_engine() -> (MemoryEngine, StoreKey) {
    let contract = Contract {
        retention: RetentionConfig {
            decay_context_limit: 0,
            ..RetentionConfig::default()
        },
        ..Contract::default()
    };
    let mut engine = MemoryEngine::new(contract, EngineConfig::default());
    let key = engine
        .write(&ctx(), semantic(EventType::Fact, "Ship on Friday"))
        .unwrap()
        .store_key;
    engine
        .write(&ctx(), semantic(EventType::Decision, "Use Postgres").dedup_key("db"))
        .unwrap();
    engine
        .write(&ctx(), semantic(EventType::Context, "old note"))
        .unwrap();

    let phase = engine.start_phase(&key, Some("review"));
    assert_eq!(phase.phase_id, "phase-2");
    assert_eq!(phase.reason, PhaseReason::Manual);

    engine
        .write(&ctx(), semantic(EventType::Decision, "Use SQLite").dedup_key("db"))
        .unwrap();
    engine
        .write(&ctx(), semantic(EventType::Fact, "New fact"))
        .unwrap();
    let report = engine.apply_retention(&key, MemoryKind::Semantic);
    assert_eq!(report.forgotten.len(), 1);
    (engine, key)
}

#[test]
fn test_diff_classifies_changes() {
    let (engine, key) = diffed_engine();
    let diff = engine.diff_phases(&key, "phase-1", "phase-2").unwrap();

    let added: Vec<&str> = diff.added.iter().map(|i| i.text.as_str()).collect();
    let deleted: Vec<&str> = diff.deleted.iter().map(|i| i.text.as_str()).collect();
    assert_eq!(added, vec!["New fact"]);
    assert_eq!(deleted, vec!["old note"]);
    assert_eq!(diff.replaced.len(), 1);
    assert_eq!(diff.replaced[0].before.text, "Use Postgres");
    assert_eq!(diff.replaced[0].after.text, "Use SQLite");
    assert_eq!(diff.replaced[0].merged_text, "Use Postgres replaced by Use SQLite");
    assert_eq!(
        diff.summary_lines(),
        vec![
            "1 added, 1 deleted, 1 replaced".to_string(),
            "From phase-1 to phase-2".to_string()
        ]
    );

    let latest = engine.latest_diff(&key).unwrap();
    assert_eq!(latest, Some(diff));
}

#[test]
fn test_diff_unknown_phase_errors() {
    let (engine, key) = diffed_engine();
    let err = engine.diff_phases(&key, "phase-1", "phase-9").unwrap_err();
    assert!(matches!(err, LmemError::PhaseNotFound { ref phase_id, .. } if phase_id == "phase-9"));
    assert!(is_bracket_free(&err.to_string()));
}

#[test]
fn test_latest_diff_needs_two_phases() {
    let mut engine = MemoryEngine::new(Contract::default(), EngineConfig::default());
    let key = engine
        .write(&ctx(), semantic(EventType::Fact, "only phase"))
        .unwrap()
        .store_key;
    assert_eq!(engine.latest_diff(&key).unwrap(), None);
}

#[test]
fn test_identical_text_is_unchanged() {
    let items = make_items(&[EventType::Fact]);
    let mut factory = ItemFactory::new();
    let meta = ItemMeta::new(EventType::Fact, Space::Session, "s1", LaneMeta::My, stamp());
    let mut copy = factory.create(NewItem::new(MemoryKind::Semantic, "ITEM 0", "ai", meta));
    copy.id = 50;
    copy.meta.dedup_key = "other".to_string();

    let from = PhaseSnapshot {
        phase_id: "phase-1".to_string(),
        items: items.clone(),
    };
    let to = PhaseSnapshot {
        phase_id: "phase-2".to_string(),
        items: vec![copy],
    };
    let diff = PhaseDiff::between(&from, &to);
    assert!(diff.is_empty());
}

// ==================== Team Summary Tests ====================

#[test]
fn test_team_summary_renders_changes() {
    let (engine, key) = diffed_engine();
    let summary = engine.team_summary(&key, "phase-1", "phase-2").unwrap();
    assert_eq!(summary.title, "Team memory changes from phase-1 to phase-2");
    assert_eq!(
        summary.lines,
        vec![
            "Added: New fact".to_string(),
            "Changed: Use Postgres replaced by Use SQLite".to_string(),
            "Removed: old note".to_string(),
        ]
    );
}

#[test]
fn test_team_summary_empty_and_overflow() {
    let empty = PhaseDiff {
        from_phase_id: "phase-1".to_string(),
        to_phase_id: "phase-2".to_string(),
        added: Vec::new(),
        deleted: Vec::new(),
        replaced: Vec::new(),
    };
    let summary = build_team_summary(&empty);
    assert_eq!(summary.lines, vec!["No team memory changes.".to_string()]);

    let busy = PhaseDiff {
        added: make_items(&[EventType::Fact; 10]),
        ..empty
    };
    let summary = build_team_summary(&busy);
    assert_eq!(summary.lines.len(), MAX_TEAM_SUMMARY_LINES + 1);
    assert_eq!(summary.lines.last().unwrap(), "And 2 more changes.");
}

#[test]
fn test_team_summary_is_bracket_free() {
    let mut factory = ItemFactory::new();
    let meta = ItemMeta::new(EventType::Fact, Space::Session, "s1", LaneMeta::My, stamp());
    let item = factory.create(NewItem::new(
        MemoryKind::Semantic,
        "fix {urgent} [now] (today)",
        "ai",
        meta,
    ));
    let diff = PhaseDiff {
        from_phase_id: "phase-(1)".to_string(),
        to_phase_id: "phase-2".to_string(),
        added: vec![item.clone()],
        deleted: vec![item],
        replaced: Vec::new(),
    };
    let summary = build_team_summary(&diff);
    assert!(is_bracket_free(&summary.title));
    assert!(summary.lines.iter().all(|l| is_bracket_free(l)));
    assert_eq!(summary.lines[0], "Added: fix urgent now today");
}
