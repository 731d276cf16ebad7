//! Impact analysis: which memories a change to one item could reach.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::types::{
    number_word, preview, scrub_brackets, LinkType, LmemError, LmemResult, MemoryItem,
    MemoryKind, Space, PREVIEW_CHARS,
};

/// Link hops followed when the caller gives no depth.
pub const DEFAULT_IMPACT_DEPTH: usize = 2;

/// Items reported when the caller gives no limit.
pub const DEFAULT_IMPACT_ITEMS: usize = 10;

/// Which way a link carries impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactDirection {
    /// From the linking item to its target.
    Forward,
    /// From the target back to the items linking to it.
    Backward,
    /// Both ways.
    Both,
}

impl ImpactDirection {
    fn forward(self) -> bool {
        matches!(self, Self::Forward | Self::Both)
    }

    fn backward(self) -> bool {
        matches!(self, Self::Backward | Self::Both)
    }
}

/// Direction impact travels along a link type.
///
/// Changing a memory reaches what depends on it, what it replaced or was
/// promoted from, and anything it conflicts with.
pub fn impact_direction(link_type: LinkType) -> ImpactDirection {
    match link_type {
        LinkType::Supersedes | LinkType::PromotedFrom => ImpactDirection::Forward,
        LinkType::DependsOn | LinkType::CausedBy | LinkType::Supports | LinkType::Summarizes => {
            ImpactDirection::Backward
        }
        LinkType::ConflictsWith => ImpactDirection::Both,
    }
}

/// One memory reached from the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactItem {
    pub id: u64,
    pub kind: MemoryKind,
    pub space: Space,
    pub phase_id: String,
    pub phase_started_at: u64,
    /// Link hops from the root.
    pub depth: usize,
    /// The link that reached this item.
    pub link_type: LinkType,
    /// Ids from the root to this item, both included.
    pub path: Vec<u64>,
    pub preview: String,
}

/// Everything a change to the root could affect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactResult {
    pub root_id: u64,
    pub root_preview: String,
    /// Ordered by phase, then space, then id.
    pub items: Vec<ImpactItem>,
    /// Deepest hop that reached an item.
    pub depth_used: usize,
    /// More items were reachable than the limit allowed.
    pub truncated: bool,
}

impl ImpactResult {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> Vec<u64> {
        self.items.iter().map(|i| i.id).collect()
    }
}

/// Breadth-first walk over item links, starting at `root_id`.
///
/// Each item is reported once, loops included. Links to items that are no
/// longer live are skipped.
pub fn compute_impact<'a>(
    items: impl IntoIterator<Item = &'a MemoryItem>,
    root_id: u64,
    depth_limit: usize,
    max_items: usize,
) -> LmemResult<ImpactResult> {
    let by_id: HashMap<u64, &MemoryItem> = items.into_iter().map(|i| (i.id, i)).collect();
    let root = by_id
        .get(&root_id)
        .copied()
        .ok_or(LmemError::ItemNotFound(root_id))?;

    let mut incoming: HashMap<u64, Vec<(u64, LinkType)>> = HashMap::new();
    for item in by_id.values() {
        for link in &item.meta.links {
            incoming
                .entry(link.target_id)
                .or_default()
                .push((item.id, link.link_type));
        }
    }

    let mut visited: HashSet<u64> = HashSet::new();
    let mut queue: VecDeque<(u64, usize, Vec<u64>)> = VecDeque::new();
    let mut found: Vec<ImpactItem> = Vec::new();
    let mut truncated = false;

    visited.insert(root_id);
    queue.push_back((root_id, 0, vec![root_id]));

    while let Some((current_id, depth, path)) = queue.pop_front() {
        if depth >= depth_limit {
            continue;
        }
        let Some(current) = by_id.get(&current_id) else {
            continue;
        };

        let mut neighbors: Vec<(u64, LinkType)> = current
            .meta
            .links
            .iter()
            .filter(|l| impact_direction(l.link_type).forward())
            .map(|l| (l.target_id, l.link_type))
            .collect();
        if let Some(sources) = incoming.get(&current_id) {
            neighbors.extend(
                sources
                    .iter()
                    .filter(|(_, link_type)| impact_direction(*link_type).backward())
                    .copied(),
            );
        }
        neighbors.sort_by_key(|(id, _)| *id);

        for (neighbor_id, link_type) in neighbors {
            if visited.contains(&neighbor_id) {
                continue;
            }
            let Some(neighbor) = by_id.get(&neighbor_id) else {
                continue;
            };
            if found.len() >= max_items {
                truncated = true;
                break;
            }
            visited.insert(neighbor_id);
            let mut next_path = path.clone();
            next_path.push(neighbor_id);
            found.push(ImpactItem {
                id: neighbor.id,
                kind: neighbor.kind,
                space: neighbor.meta.space,
                phase_id: neighbor.phase_id().to_string(),
                phase_started_at: neighbor.meta.phase.started_at,
                depth: depth + 1,
                link_type,
                path: next_path.clone(),
                preview: preview(&neighbor.text, PREVIEW_CHARS),
            });
            queue.push_back((neighbor_id, depth + 1, next_path));
        }
    }

    found.sort_by(|a, b| {
        (a.phase_started_at, &a.phase_id, a.space.rank(), a.id).cmp(&(
            b.phase_started_at,
            &b.phase_id,
            b.space.rank(),
            b.id,
        ))
    });
    let depth_used = found.iter().map(|i| i.depth).max().unwrap_or(0);
    log::debug!(
        "Impact of item {} reached {} items at depth {}",
        root_id,
        found.len(),
        depth_used
    );
    Ok(ImpactResult {
        root_id,
        root_preview: preview(&root.text, PREVIEW_CHARS),
        items: found,
        depth_used,
        truncated,
    })
}

/// Rendered impact: a narrative and the link path behind each item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactRender {
    pub title: String,
    pub lines: Vec<String>,
    pub path_lines: Vec<String>,
}

/// Render an impact result as bracket-free lines.
pub fn render_impact(impact: &ImpactResult) -> ImpactRender {
    let title = format!("Impact of memory {}", impact.root_id);
    if impact.is_empty() {
        return ImpactRender {
            title,
            lines: vec!["Nothing else depends on this memory.".to_string()],
            path_lines: Vec::new(),
        };
    }

    let count = impact.items.len();
    let mut lines = vec![if count == 1 {
        "This change could affect 1 memory.".to_string()
    } else {
        format!("This change could affect {} memories.", count)
    }];
    for item in &impact.items {
        lines.push(scrub_brackets(&format!(
            "Memory {} in {} {}: {}",
            item.id, item.space, item.phase_id, item.preview
        )));
    }
    if impact.truncated {
        lines.push("More memories may be affected.".to_string());
    }
    lines.push(format!(
        "Checked up to {} link steps away.",
        number_word(impact.depth_used)
    ));

    let path_lines = impact
        .items
        .iter()
        .map(|item| {
            let path: Vec<String> = item.path.iter().map(u64::to_string).collect();
            scrub_brackets(&format!(
                "Path {} reached through {}.",
                path.join(" to "),
                item.link_type.label()
            ))
        })
        .collect();
    ImpactRender {
        title,
        lines,
        path_lines,
    }
}

/// The kind of change being previewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Replace,
    Delete,
    Promote,
}

impl ChangeKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::Promote => "promote",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "replace" => Some(Self::Replace),
            "delete" | "forget" => Some(Self::Delete),
            "promote" => Some(Self::Promote),
            _ => None,
        }
    }
}

/// Short warning shown before a change is made.
pub fn render_change_preview(impact: &ImpactResult, change: ChangeKind) -> Vec<String> {
    let action = format!("If you {} this memory", change.name());
    if impact.is_empty() {
        return vec![format!("{}, nothing else is affected.", action)];
    }
    let count = impact.items.len();
    let mut lines = vec![if count == 1 {
        format!("{}, 1 memory may need review.", action)
    } else {
        format!("{}, {} memories may need review.", action, count)
    }];
    lines.extend(impact.items.iter().map(|item| {
        scrub_brackets(&format!(
            "Review memory {}, it {} this one: {}",
            item.id,
            relation_to_root(item),
            item.preview
        ))
    }));
    lines
}

fn relation_to_root(item: &ImpactItem) -> &'static str {
    if item.depth > 1 {
        return "is linked through other memories to";
    }
    match impact_direction(item.link_type) {
        ImpactDirection::Backward => match item.link_type {
            LinkType::Summarizes => "summarizes",
            LinkType::Supports => "supports",
            LinkType::CausedBy => "was caused by",
            _ => "depends on",
        },
        ImpactDirection::Forward => "was replaced or copied by",
        ImpactDirection::Both => "conflicts with",
    }
}
