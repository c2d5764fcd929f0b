//! Picker views that drop folders with nothing eligible below them.
//!
//! # Responsibility
//! - Filter a snapshot down to matching documents and the folders leading to
//!   them.
//! - Provide the folder-only view used as a move-target picker.
//!
//! # Invariants
//! - A folder survives only if a matching document survives below it.
//! - Pruning is idempotent for the same predicate.
//! - Subtrees that lose nothing are shared with the input snapshot.

use crate::model::node::{Tree, TreeNode};
use std::sync::Arc;

/// Default document predicate: every document is eligible.
pub fn keep_all_documents(_node: &TreeNode) -> bool {
    true
}

/// Drops non-matching documents and every folder left without a match.
///
/// `predicate` is only consulted for documents.
pub fn prune_empty_folders<P>(tree: &Tree, predicate: P) -> Tree
where
    P: Fn(&TreeNode) -> bool,
{
    Tree::new(filter_forest(tree.roots(), |node| {
        if node.is_folder() {
            Rule::Descend {
                keep_if_empty: false,
            }
        } else if predicate(node) {
            Rule::Keep
        } else {
            Rule::Drop
        }
    }))
}

/// Folder-only view for choosing where to move `moving_id`.
///
/// Keeps every folder (empty ones included), drops every document, and hides
/// the moving node's own subtree since a node cannot be dropped into itself.
pub fn move_targets(tree: &Tree, moving_id: Option<&str>) -> Tree {
    Tree::new(filter_forest(tree.roots(), |node| {
        if !node.is_folder() || Some(node.id()) == moving_id {
            Rule::Drop
        } else {
            Rule::Descend {
                keep_if_empty: true,
            }
        }
    }))
}

/// Per-node decision for `filter_forest`.
enum Rule {
    /// Leave the node and its subtree out.
    Drop,
    /// Share the node unchanged.
    Keep,
    /// Filter the children; an empty result keeps the folder only if asked.
    Descend { keep_if_empty: bool },
}

struct Frame<'a> {
    node: &'a Arc<TreeNode>,
    next_child: usize,
    kept: Vec<Arc<TreeNode>>,
    keep_if_empty: bool,
}

/// Filters a forest post-order from an explicit stack.
fn filter_forest<'a, R>(roots: &'a [Arc<TreeNode>], rule: R) -> Vec<Arc<TreeNode>>
where
    R: Fn(&TreeNode) -> Rule,
{
    let mut forest = Vec::new();
    let mut stack: Vec<Frame<'a>> = Vec::new();
    for root in roots {
        let mut next = Some(root);
        loop {
            if let Some(node) = next.take() {
                match rule(node.as_ref()) {
                    Rule::Drop => {}
                    Rule::Keep => attach(&mut stack, &mut forest, Arc::clone(node)),
                    Rule::Descend { keep_if_empty } => stack.push(Frame {
                        node,
                        next_child: 0,
                        kept: Vec::new(),
                        keep_if_empty,
                    }),
                }
            }

            let Some(frame) = stack.last_mut() else {
                break;
            };
            let node = frame.node;
            if let Some(child) = node.children().get(frame.next_child) {
                frame.next_child += 1;
                next = Some(child);
                continue;
            }

            let Some(done) = stack.pop() else {
                break;
            };
            if done.kept.is_empty() && !done.keep_if_empty {
                continue;
            }
            let rebuilt = reuse_or_rebuild(done.node, done.kept);
            attach(&mut stack, &mut forest, rebuilt);
        }
    }
    forest
}

fn attach(stack: &mut [Frame<'_>], forest: &mut Vec<Arc<TreeNode>>, node: Arc<TreeNode>) {
    match stack.last_mut() {
        Some(parent) => parent.kept.push(node),
        None => forest.push(node),
    }
}

fn reuse_or_rebuild(node: &Arc<TreeNode>, kept: Vec<Arc<TreeNode>>) -> Arc<TreeNode> {
    let unchanged = kept.len() == node.children().len()
        && kept
            .iter()
            .zip(node.children())
            .all(|(new, old)| Arc::ptr_eq(new, old));
    if unchanged {
        Arc::clone(node)
    } else {
        Arc::new(node.with_children(kept))
    }
}
