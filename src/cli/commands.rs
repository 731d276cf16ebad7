//! CLI command implementations.

use std::path::Path;

use crate::engine::{
    render_change_preview, render_impact, wake_up_lines, ChangeKind, MemoryEngine,
    ProposalRequest, RecallRequest, WriteRequest,
};
use crate::format::{SnapshotReader, SnapshotWriter};
use crate::scope::{
    agent_lane_key, ensure_lane_allowed, lane_for_space, SpaceContext, StoreKey,
};
use crate::types::{
    preview, Authority, Contract, EngineConfig, EventType, Lane, LinkType, LmemError, LmemResult,
    MemoryItem, MemoryKind, Space, PREVIEW_CHARS,
};

/// Where a command reads or writes: a space, a lane and, for the agent
/// lane, an agent id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub space: Space,
    pub lane: Option<Lane>,
    pub agent: Option<String>,
}

impl Scope {
    /// Resolve the store key for a caller.
    pub fn store_key(&self, ctx: &SpaceContext) -> LmemResult<StoreKey> {
        let lane = self.lane.unwrap_or_else(|| lane_for_space(self.space));
        ensure_lane_allowed(self.space, lane)?;
        match lane {
            Lane::Agent => {
                let agent = self
                    .agent
                    .as_deref()
                    .filter(|a| !a.trim().is_empty())
                    .ok_or(LmemError::MissingAgentId)?;
                Ok(agent_lane_key(ctx, self.space, agent))
            }
            lane => Ok(ctx.store_key_for(self.space, lane)),
        }
    }
}

pub fn parse_space(name: &str) -> LmemResult<Space> {
    Space::from_name(name).ok_or_else(|| LmemError::InvalidSpace(name.to_string()))
}

pub fn parse_lane(name: &str) -> LmemResult<Lane> {
    Lane::from_name(name).ok_or_else(|| LmemError::InvalidLane(name.to_string()))
}

pub fn parse_kind(name: &str) -> LmemResult<MemoryKind> {
    MemoryKind::from_name(name).ok_or_else(|| LmemError::InvalidKind(name.to_string()))
}

pub fn parse_event_type(name: &str) -> LmemResult<EventType> {
    EventType::from_name(name).ok_or_else(|| LmemError::InvalidEventType(name.to_string()))
}

pub fn parse_authority(name: &str) -> LmemResult<Authority> {
    Authority::from_name(name).ok_or_else(|| LmemError::InvalidAuthority(name.to_string()))
}

pub fn parse_change_kind(name: &str) -> LmemResult<ChangeKind> {
    ChangeKind::from_name(name).ok_or_else(|| LmemError::InvalidChangeKind(name.to_string()))
}

/// Parse a `type:id` link argument, e.g. `depends_on:3`.
pub fn parse_link(raw: &str) -> LmemResult<(LinkType, u64)> {
    let invalid = || LmemError::InvalidLinkType(raw.to_string());
    let (name, id) = raw.rsplit_once(':').ok_or_else(invalid)?;
    let link_type = LinkType::from_name(name).ok_or_else(invalid)?;
    let id = id.trim().parse::<u64>().map_err(|_| invalid())?;
    Ok((link_type, id))
}

/// Load the engine stored in a snapshot file.
pub fn load_engine(path: &Path) -> LmemResult<MemoryEngine> {
    MemoryEngine::restore(SnapshotReader::read_from_file(path)?)
}

/// Persist an engine to a snapshot file.
pub fn save_engine(engine: &MemoryEngine, path: &Path) -> LmemResult<()> {
    SnapshotWriter::new().write_to_file(&engine.snapshot(), path)
}

/// Create a new empty snapshot file.
pub fn cmd_create(
    path: &Path,
    contract_path: Option<&Path>,
    config_path: Option<&Path>,
) -> LmemResult<()> {
    let contract: Contract = match contract_path {
        Some(p) => serde_json::from_slice(&std::fs::read(p)?)?,
        None => Contract::default(),
    };
    let config: EngineConfig = match config_path {
        Some(p) => serde_json::from_slice(&std::fs::read(p)?)?,
        None => EngineConfig::default(),
    };
    save_engine(&MemoryEngine::new(contract, config), path)?;
    println!("Created {}", path.display());
    Ok(())
}

/// Display information about a snapshot file.
pub fn cmd_info(path: &Path, json: bool) -> LmemResult<()> {
    let snapshot = SnapshotReader::read_from_file(path)?;
    let file_size = std::fs::metadata(path)?.len();
    let count = |map: &std::collections::BTreeMap<StoreKey, Vec<MemoryItem>>| -> usize {
        map.values().map(Vec::len).sum()
    };
    let keys: Vec<String> = snapshot.store_keys().iter().map(|k| k.to_string()).collect();
    let wake_up = MemoryEngine::restore(snapshot.clone())?.wake_up_stats(true);

    if json {
        let info = serde_json::json!({
            "file": path.display().to_string(),
            "version": snapshot.version,
            "next_tick": snapshot.clock.peek(),
            "next_id": snapshot.ids.peek(),
            "items": snapshot.item_count(),
            "short_term": count(&snapshot.short_term),
            "semantic": count(&snapshot.semantic),
            "profile": count(&snapshot.profile),
            "store_keys": keys,
            "write_policy": snapshot.contract.write_policy.name(),
            "forget_policy": snapshot.contract.forget_policy.name(),
            "file_size": file_size,
            "wake_up": wake_up,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&info).unwrap_or_default()
        );
    } else {
        println!("File: {}", path.display());
        println!("Version: {}", snapshot.version);
        println!("Next tick: {}", snapshot.clock.peek());
        println!("Next id: {}", snapshot.ids.peek());
        println!("Items: {}", snapshot.item_count());
        println!("  Short term: {}", count(&snapshot.short_term));
        println!("  Semantic: {}", count(&snapshot.semantic));
        println!("  Profile: {}", count(&snapshot.profile));
        println!("Write policy: {}", snapshot.contract.write_policy.name());
        println!("Forget policy: {}", snapshot.contract.forget_policy.name());
        println!("File size: {}", format_size(file_size));
        println!("Store keys:");
        for key in keys {
            println!("  {}", key);
        }
        println!("Wake up:");
        for line in wake_up_lines(&wake_up) {
            println!("  {}", line);
        }
    }
    Ok(())
}

/// Write one item.
pub fn cmd_write(
    path: &Path,
    ctx: &SpaceContext,
    request: WriteRequest,
    json: bool,
) -> LmemResult<()> {
    let mut engine = load_engine(path)?;
    let outcome = engine.write(ctx, request)?;
    save_engine(&engine, path)?;

    if json {
        let info = serde_json::json!({
            "store_key": outcome.store_key.to_string(),
            "allowed": outcome.decision.allowed,
            "reason": outcome.decision.reason.as_str(),
            "item": outcome.item,
            "events": outcome.events,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&info).unwrap_or_default()
        );
    } else if let Some(item) = &outcome.item {
        println!(
            "Wrote item {} at tick {} to {}",
            item.id, item.tick, outcome.store_key
        );
        for event in &outcome.events {
            println!("  {}", event.name());
        }
    } else if outcome.decision.allowed {
        println!("Nothing written to {}: duplicate", outcome.store_key);
    } else {
        println!(
            "Denied: {}. {}",
            outcome.decision.reason,
            outcome.decision.reason.explain()
        );
    }
    Ok(())
}

/// Recall items of one store key.
pub fn cmd_recall(path: &Path, request: &RecallRequest, json: bool) -> LmemResult<()> {
    let engine = load_engine(path)?;
    let result = engine.recall(request);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).unwrap_or_default()
        );
    } else if !result.decision.allowed {
        println!(
            "Denied: {}. {}",
            result.decision.reason,
            result.decision.reason.explain()
        );
    } else {
        println!("{} {} items in {}", result.items.len(), result.kind, result.store_key);
        for item in &result.items {
            print_item(item);
        }
        println!("Recall hash: {}", result.recall_hash());
    }
    Ok(())
}

/// Start a new manual phase.
pub fn cmd_phase(path: &Path, key: &StoreKey, name: Option<&str>, json: bool) -> LmemResult<()> {
    let mut engine = load_engine(path)?;
    let phase = engine.start_phase(key, name);
    save_engine(&engine, path)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&phase).unwrap_or_default()
        );
    } else {
        println!(
            "Started {} for {} at tick {}",
            phase.phase_id, key, phase.started_at
        );
    }
    Ok(())
}

/// Show what changed between two phases, by default the last two.
pub fn cmd_diff(
    path: &Path,
    key: &StoreKey,
    from: Option<&str>,
    to: Option<&str>,
    team_summary: bool,
    json: bool,
) -> LmemResult<()> {
    let engine = load_engine(path)?;
    let diff = match (from, to) {
        (Some(from), Some(to)) => engine.diff_phases(key, from, to)?,
        _ => match engine.latest_diff(key)? {
            Some(diff) => diff,
            None => {
                println!("{} has fewer than two phases", key);
                return Ok(());
            }
        },
    };

    if team_summary {
        let summary = engine.team_summary(key, &diff.from_phase_id, &diff.to_phase_id)?;
        if json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).unwrap_or_default()
            );
        } else {
            println!("{}", summary.title);
            for line in &summary.lines {
                println!("  {}", line);
            }
        }
        return Ok(());
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&diff).unwrap_or_default()
        );
    } else {
        for line in diff.summary_lines() {
            println!("{}", line);
        }
        for item in &diff.added {
            println!("  added {}: {}", item.id, preview(&item.text, PREVIEW_CHARS));
        }
        for replacement in &diff.replaced {
            println!("  replaced: {}", replacement.merged_text);
        }
        for item in &diff.deleted {
            println!("  deleted {}: {}", item.id, preview(&item.text, PREVIEW_CHARS));
        }
    }
    Ok(())
}

/// Show budget usage of one key, or of every key.
pub fn cmd_budget(path: &Path, key: Option<&StoreKey>, json: bool) -> LmemResult<()> {
    let engine = load_engine(path)?;
    let usages = match key {
        Some(key) => vec![engine.budget_usage(key)],
        None => engine.all_budget_usage(),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&usages).unwrap_or_default()
        );
    } else if usages.is_empty() {
        println!("No memory stored");
    } else {
        for usage in &usages {
            for line in engine.budget_lines(&usage.store_key) {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

/// Apply the contract's forget policy to one store key.
pub fn cmd_forget(path: &Path, key: &StoreKey, kind: MemoryKind, json: bool) -> LmemResult<()> {
    let mut engine = load_engine(path)?;
    let report = engine.apply_retention(key, kind);
    save_engine(&engine, path)?;

    if json {
        let forgotten: Vec<serde_json::Value> = report
            .forgotten
            .iter()
            .map(|(item, reason)| serde_json::json!({"id": item.id, "reason": reason.as_str()}))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&forgotten).unwrap_or_default()
        );
    } else {
        println!("Forgot {} items from {}", report.forgotten.len(), key);
        for (item, reason) in &report.forgotten {
            println!("  {} {}: {}", item.id, reason, preview(&item.text, PREVIEW_CHARS));
        }
    }
    Ok(())
}

/// Promote an item into a wider space.
pub fn cmd_promote(
    path: &Path,
    ctx: &SpaceContext,
    from_key: &StoreKey,
    item_id: u64,
    to_space: Space,
    json: bool,
) -> LmemResult<()> {
    let mut engine = load_engine(path)?;
    let outcome = engine.promote(ctx, from_key, item_id, to_space)?;
    save_engine(&engine, path)?;

    if json {
        let info = serde_json::json!({
            "store_key": outcome.store_key.to_string(),
            "allowed": outcome.decision.allowed,
            "reason": outcome.decision.reason.as_str(),
            "item": outcome.item,
            "events": outcome.events,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&info).unwrap_or_default()
        );
    } else if let Some(item) = &outcome.item {
        println!(
            "Promoted item {} to item {} in {}",
            item_id, item.id, outcome.store_key
        );
    } else if outcome.decision.allowed {
        println!("Nothing promoted: {} already holds this item", outcome.store_key);
    } else {
        println!(
            "Denied: {}. {}",
            outcome.decision.reason,
            outcome.decision.reason.explain()
        );
    }
    Ok(())
}

/// Show what a change to one item could affect.
pub fn cmd_impact(
    path: &Path,
    item_id: u64,
    depth: usize,
    max_items: usize,
    change: Option<ChangeKind>,
    json: bool,
) -> LmemResult<()> {
    let engine = load_engine(path)?;
    let impact = engine.impact(item_id, depth, max_items)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&impact).unwrap_or_default()
        );
        return Ok(());
    }
    match change {
        Some(change) => {
            for line in render_change_preview(&impact, change) {
                println!("{}", line);
            }
        }
        None => {
            let rendered = render_impact(&impact);
            println!("{}", rendered.title);
            for line in rendered.lines.iter().chain(rendered.path_lines.iter()) {
                println!("  {}", line);
            }
        }
    }
    Ok(())
}

/// Propose a team memory.
pub fn cmd_propose(
    path: &Path,
    ctx: &SpaceContext,
    request: ProposalRequest,
    json: bool,
) -> LmemResult<()> {
    let mut engine = load_engine(path)?;
    let outcome = engine.propose_team_memory(ctx, request)?;
    save_engine(&engine, path)?;

    if json {
        let info = serde_json::json!({
            "allowed": outcome.decision.allowed,
            "reason": outcome.decision.reason.as_str(),
            "proposal": outcome.proposal,
            "events": outcome.events,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&info).unwrap_or_default()
        );
    } else if let Some(proposal) = &outcome.proposal {
        println!(
            "Proposed {} to team {}, {} approvals needed",
            proposal.proposal_id, proposal.team_id, proposal.approvals_required
        );
    } else {
        println!(
            "Denied: {}. {}",
            outcome.decision.reason,
            outcome.decision.reason.explain()
        );
    }
    Ok(())
}

/// Approve or reject a pending proposal.
pub fn cmd_decide(
    path: &Path,
    proposal_id: &str,
    actor: &str,
    approve: bool,
    json: bool,
) -> LmemResult<()> {
    let mut engine = load_engine(path)?;
    let outcome = if approve {
        engine.approve_proposal(proposal_id, actor)?
    } else {
        engine.reject_proposal(proposal_id, actor)?
    };
    save_engine(&engine, path)?;

    if json {
        let info = serde_json::json!({
            "proposal": outcome.proposal,
            "item": outcome.item,
            "events": outcome.events,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&info).unwrap_or_default()
        );
        return Ok(());
    }
    if let Some(proposal) = &outcome.proposal {
        println!(
            "{} is {} with {} of {} approvals",
            proposal.proposal_id,
            proposal.status.name(),
            proposal.approvals.len(),
            proposal.approvals_required
        );
    }
    if let Some(item) = &outcome.item {
        println!("Wrote team item {}: {}", item.id, preview(&item.text, PREVIEW_CHARS));
    }
    Ok(())
}

/// List pending proposals and active rules of the caller's project.
pub fn cmd_proposals(path: &Path, ctx: &SpaceContext, json: bool) -> LmemResult<()> {
    let engine = load_engine(path)?;
    let pending = engine.list_team_proposals(&ctx.project_id);
    let rules = engine.active_rules(&ctx.project_id);

    if json {
        let info = serde_json::json!({
            "team_id": ctx.project_id,
            "pending": pending,
            "rules": rules,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&info).unwrap_or_default()
        );
        return Ok(());
    }
    println!("{} pending proposals for team {}", pending.len(), ctx.project_id);
    for proposal in &pending {
        println!(
            "  {} by {}, {} of {} approvals: {}",
            proposal.proposal_id,
            proposal.proposed_by,
            proposal.approvals.len(),
            proposal.approvals_required,
            preview(&proposal.item.text, PREVIEW_CHARS)
        );
    }
    println!("{} active rules", rules.len());
    for rule in &rules {
        println!(
            "  {} priority {}: {}",
            rule.rule_id,
            rule.priority,
            preview(&rule.text, PREVIEW_CHARS)
        );
    }
    Ok(())
}

/// Package what one agent knows for another.
pub fn cmd_handoff(
    path: &Path,
    ctx: &SpaceContext,
    from_agent: &str,
    to_agent: &str,
    json: bool,
) -> LmemResult<()> {
    let mut engine = load_engine(path)?;
    let packet = engine.create_handoff(ctx, from_agent, to_agent, &ctx.user_id)?;
    save_engine(&engine, path)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&packet).unwrap_or_default()
        );
    } else {
        println!(
            "Created {} from {} to {}",
            packet.packet_id, packet.from_agent, packet.to_agent
        );
        for line in &packet.summary_lines {
            println!("  {}", line);
        }
    }
    Ok(())
}

/// Apply or reject a pending handoff packet.
pub fn cmd_apply_handoff(path: &Path, packet_id: &str, reject: bool, json: bool) -> LmemResult<()> {
    let mut engine = load_engine(path)?;
    if reject {
        let packet = engine.reject_handoff(packet_id)?;
        save_engine(&engine, path)?;
        if json {
            println!(
                "{}",
                serde_json::to_string_pretty(&packet).unwrap_or_default()
            );
        } else {
            println!("Rejected {}", packet.packet_id);
        }
        return Ok(());
    }

    let outcome = engine.apply_handoff(packet_id)?;
    save_engine(&engine, path)?;
    if json {
        let info = serde_json::json!({
            "packet": outcome.packet,
            "store_key": outcome.store_key.to_string(),
            "items": outcome.items,
            "events": outcome.events,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&info).unwrap_or_default()
        );
    } else {
        println!(
            "Applied {}: {} items copied to {}",
            outcome.packet.packet_id,
            outcome.items.len(),
            outcome.store_key
        );
        for item in &outcome.items {
            print_item(item);
        }
    }
    Ok(())
}

fn print_item(item: &MemoryItem) {
    println!(
        "  {} tick {} {} from {}: {}",
        item.id,
        item.tick,
        item.event_type(),
        item.source,
        preview(&item.text, PREVIEW_CHARS)
    );
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
