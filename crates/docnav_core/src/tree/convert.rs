//! Flat list to nested tree conversion.
//!
//! # Responsibility
//! - Turn the backend's unordered node list into a nested, ordered snapshot.
//! - Recover from malformed input instead of failing.
//!
//! # Invariants
//! - Output ids are unique (last duplicate wins).
//! - Nodes whose parent is missing, a document, themselves, or part of a
//!   parent cycle are emitted as roots with `parent_id = None`.
//! - Siblings are stable-sorted by `position`.
//! - Conversion never panics and never drops a node with a usable id.
//! - Depth is bounded by memory, not by the call stack.

use crate::model::node::{FlatNode, Tree, TreeNode};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;

/// Why a node with a parent reference ended up at root level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Promotion {
    DanglingParent,
    DocumentParent,
    SelfParent,
    Cycle,
}

impl Promotion {
    fn as_str(self) -> &'static str {
        match self {
            Self::DanglingParent => "dangling_parent",
            Self::DocumentParent => "document_parent",
            Self::SelfParent => "self_parent",
            Self::Cycle => "cycle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    OnTrail,
    Done,
}

/// Builds a tree snapshot from flat backend records.
///
/// Runs in `O(n log n)`: one indexing pass, one cycle pass, one sort per
/// sibling group.
pub fn build_tree(records: impl IntoIterator<Item = FlatNode>) -> Tree {
    let mut records = dedupe_records(records);
    let index = records
        .iter()
        .enumerate()
        .map(|(position, record)| (record.id.clone(), position))
        .collect::<HashMap<_, _>>();

    let mut parents = Vec::with_capacity(records.len());
    let mut promotions = vec![None; records.len()];
    for (slot, record) in records.iter().enumerate() {
        let Some(parent_id) = record.parent_ref() else {
            parents.push(None);
            continue;
        };
        let parent = match index.get(parent_id) {
            None => Err(Promotion::DanglingParent),
            Some(&parent) if parent == slot => Err(Promotion::SelfParent),
            Some(&parent) if !records[parent].is_folder() => Err(Promotion::DocumentParent),
            Some(&parent) => Ok(parent),
        };
        match parent {
            Ok(parent) => parents.push(Some(parent)),
            Err(reason) => {
                promotions[slot] = Some(reason);
                parents.push(None);
            }
        }
    }

    break_cycles(&mut parents, &mut promotions);

    for (slot, promotion) in promotions.iter().enumerate() {
        let Some(reason) = promotion else {
            continue;
        };
        let record = &mut records[slot];
        warn!(
            "event=tree_build module=tree status=recovered anomaly={} node_id={} parent_id={}",
            reason.as_str(),
            record.id,
            record.parent_id.as_deref().unwrap_or_default()
        );
        record.parent_id = None;
    }

    let mut root_slots = Vec::new();
    let mut child_slots = vec![Vec::new(); records.len()];
    for (slot, parent) in parents.iter().enumerate() {
        match parent {
            Some(parent) => child_slots[*parent].push(slot),
            None => {
                root_slots.push(slot);
                records[slot].parent_id = None;
            }
        }
    }

    root_slots.sort_by(|&a, &b| records[a].position.total_cmp(&records[b].position));
    for group in &mut child_slots {
        group.sort_by(|&a, &b| records[a].position.total_cmp(&records[b].position));
    }

    let node_count = records.len();
    let roots = assemble(&root_slots, records, &child_slots);

    debug!(
        "event=tree_build module=tree status=ok nodes={} roots={} promoted={}",
        node_count,
        roots.len(),
        promotions.iter().flatten().count()
    );
    Tree::new(roots)
}

/// Flattens a snapshot back into wire records, depth-first pre-order.
///
/// `parent_id` is rebuilt from structure; `position` is kept as stored.
pub fn flatten_tree(tree: &Tree) -> Vec<FlatNode> {
    let mut records = Vec::with_capacity(tree.node_count());
    let mut stack = tree
        .roots()
        .iter()
        .rev()
        .map(|node| (node, None))
        .collect::<Vec<(&Arc<TreeNode>, Option<&str>)>>();
    while let Some((node, parent_id)) = stack.pop() {
        let mut record = node.node.clone();
        record.parent_id = parent_id.map(str::to_string);
        records.push(record);
        stack.extend(
            node.children()
                .iter()
                .rev()
                .map(|child| (child, Some(node.id()))),
        );
    }
    records
}

/// Drops blank ids and keeps only the last record for every repeated id.
fn dedupe_records(records: impl IntoIterator<Item = FlatNode>) -> Vec<FlatNode> {
    let records = records
        .into_iter()
        .filter(|record| {
            let keep = !record.id.trim().is_empty();
            if !keep {
                warn!("event=tree_build module=tree status=recovered anomaly=blank_id");
            }
            keep
        })
        .collect::<Vec<_>>();

    let mut last_seen = HashMap::with_capacity(records.len());
    for (slot, record) in records.iter().enumerate() {
        if let Some(previous) = last_seen.insert(record.id.clone(), slot) {
            warn!(
                "event=tree_build module=tree status=recovered anomaly=duplicate_id node_id={} dropped_slot={}",
                record.id, previous
            );
        }
    }

    records
        .into_iter()
        .enumerate()
        .filter(|(slot, record)| last_seen.get(&record.id) == Some(slot))
        .map(|(_, record)| record)
        .collect()
}

/// Cuts every parent cycle by promoting its members to root.
///
/// Nodes hanging below a cycle keep their parent; only the loop itself is cut.
fn break_cycles(parents: &mut [Option<usize>], promotions: &mut [Option<Promotion>]) {
    let mut visit = vec![Visit::New; parents.len()];
    for start in 0..parents.len() {
        let mut trail = Vec::new();
        let mut cursor = Some(start);
        while let Some(current) = cursor {
            match visit[current] {
                Visit::Done => break,
                Visit::OnTrail => {
                    if let Some(loop_start) = trail.iter().position(|&slot| slot == current) {
                        for &member in &trail[loop_start..] {
                            parents[member] = None;
                            promotions[member] = Some(Promotion::Cycle);
                        }
                    }
                    break;
                }
                Visit::New => {
                    visit[current] = Visit::OnTrail;
                    trail.push(current);
                    cursor = parents[current];
                }
            }
        }
        for slot in trail {
            visit[slot] = Visit::Done;
        }
    }
}

/// Node under construction; children are attached as they complete.
struct Frame {
    node: TreeNode,
    slot: usize,
    next_child: usize,
}

/// Builds nested nodes post-order from an explicit stack.
fn assemble(
    root_slots: &[usize],
    records: Vec<FlatNode>,
    child_slots: &[Vec<usize>],
) -> Vec<Arc<TreeNode>> {
    let mut pending = records.into_iter().map(Some).collect::<Vec<_>>();
    let mut roots = Vec::with_capacity(root_slots.len());
    let mut stack: Vec<Frame> = Vec::new();

    for &root in root_slots {
        if let Some(record) = pending[root].take() {
            stack.push(Frame {
                node: TreeNode::leaf(record),
                slot: root,
                next_child: 0,
            });
        }
        while let Some(frame) = stack.last_mut() {
            let children: &[usize] = if frame.node.is_folder() {
                child_slots[frame.slot].as_slice()
            } else {
                &[]
            };
            if let Some(&child) = children.get(frame.next_child) {
                frame.next_child += 1;
                if let Some(record) = pending[child].take() {
                    stack.push(Frame {
                        node: TreeNode::leaf(record),
                        slot: child,
                        next_child: 0,
                    });
                }
                continue;
            }

            let Some(done) = stack.pop() else {
                break;
            };
            let done = Arc::new(done.node);
            match stack.last_mut() {
                Some(parent) => {
                    if let Some(siblings) = parent.node.children.as_mut() {
                        siblings.push(done);
                    }
                }
                None => roots.push(done),
            }
        }
    }
    roots
}
