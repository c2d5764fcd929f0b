//! Multi-select propagation across folder boundaries.
//!
//! # Responsibility
//! - Toggle one node in a selection set under independent or cascading rules.
//! - Restore a consistent selection set after the tree or the set changes.
//!
//! # Invariants
//! - Cascading: a folder is selected iff it has at least one document below it
//!   and every document below it is selected.
//! - `normalize_selection` is a closure: applying it twice equals applying it
//!   once, in both modes.
//! - Functions never mutate their input set.

use crate::model::node::{NodeId, Tree, TreeNode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Selected node ids, ordered for deterministic output.
pub type Selection = BTreeSet<NodeId>;

/// Selection propagation rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Toggling a node only flips that node.
    Independent,
    /// Folder state derives from, and drives, descendant documents.
    #[default]
    #[serde(alias = "relative")]
    Cascading,
}

/// Document coverage of one subtree.
#[derive(Debug, Clone, Copy)]
struct Coverage {
    has_documents: bool,
    all_selected: bool,
}

/// Toggles `id` and returns the resulting selection.
///
/// Unknown ids return the input set unchanged.
pub fn toggle_selection(
    tree: &Tree,
    selection: &Selection,
    id: &str,
    mode: SelectionMode,
) -> Selection {
    let Some(path) = tree.path_to(id) else {
        return selection.clone();
    };
    let mut next = selection.clone();

    if mode == SelectionMode::Independent {
        if !next.remove(id) {
            next.insert(id.to_string());
        }
        return next;
    }

    let Some((target, ancestors)) = path.split_last() else {
        return next;
    };
    if target.is_folder() {
        let select = !next.contains(id);
        mark_documents(target, select, &mut next);
        recompute_subtree(target, &mut next);
    } else if !next.remove(id) {
        next.insert(id.to_string());
    }

    for ancestor in ancestors.iter().rev() {
        recompute_from_children(ancestor, &mut next);
    }
    next
}

/// Recomputes every folder's membership from the documents.
///
/// Independent mode returns the set unchanged.
pub fn normalize_selection(tree: &Tree, selection: &Selection, mode: SelectionMode) -> Selection {
    let mut next = selection.clone();
    if mode == SelectionMode::Cascading {
        for root in tree.roots() {
            recompute_subtree(root, &mut next);
        }
    }
    next
}

/// Drops ids that are no longer present in `tree`.
pub fn retain_known(tree: &Tree, selection: &Selection) -> Selection {
    let known = tree.iter().map(|node| node.id()).collect::<HashSet<_>>();
    selection
        .iter()
        .filter(|id| known.contains(id.as_str()))
        .cloned()
        .collect()
}

/// Returns selected document ids in tree order, for batch actions.
pub fn selected_documents(tree: &Tree, selection: &Selection) -> Vec<NodeId> {
    tree.iter()
        .filter(|node| !node.is_folder() && selection.contains(node.id()))
        .map(|node| node.id().to_string())
        .collect()
}

fn mark_documents(node: &TreeNode, select: bool, selection: &mut Selection) {
    for child in node.children() {
        if child.is_folder() {
            mark_documents(child, select, selection);
        } else if select {
            selection.insert(child.id().to_string());
        } else {
            selection.remove(child.id());
        }
    }
}

/// Post-order recompute of `node` and every folder below it.
fn recompute_subtree(node: &TreeNode, selection: &mut Selection) -> Coverage {
    if !node.is_folder() {
        return Coverage {
            has_documents: true,
            all_selected: selection.contains(node.id()),
        };
    }

    let mut coverage = Coverage {
        has_documents: false,
        all_selected: true,
    };
    for child in node.children() {
        let child_coverage = recompute_subtree(child, selection);
        if child_coverage.has_documents {
            coverage.has_documents = true;
            coverage.all_selected &= child_coverage.all_selected;
        }
    }
    set_folder(node, &coverage, selection);
    coverage
}

/// Recomputes one folder from its direct children's current membership.
fn recompute_from_children(folder: &Arc<TreeNode>, selection: &mut Selection) {
    let mut coverage = Coverage {
        has_documents: false,
        all_selected: true,
    };
    for child in folder.children() {
        let selected = selection.contains(child.id());
        if child.is_folder() && !selected && !contains_document(child) {
            continue;
        }
        coverage.has_documents = true;
        if !selected {
            coverage.all_selected = false;
            break;
        }
    }
    set_folder(folder, &coverage, selection);
}

fn set_folder(folder: &TreeNode, coverage: &Coverage, selection: &mut Selection) {
    if coverage.has_documents && coverage.all_selected {
        selection.insert(folder.id().to_string());
    } else {
        selection.remove(folder.id());
    }
}

fn contains_document(node: &TreeNode) -> bool {
    node.children()
        .iter()
        .any(|child| !child.is_folder() || contains_document(child))
}
