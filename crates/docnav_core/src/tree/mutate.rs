//! Localized, copy-on-write edits over tree snapshots.
//!
//! # Responsibility
//! - Replace, insert and remove single nodes without touching the input.
//! - Copy only the ancestor chain of the edited node.
//!
//! # Invariants
//! - Unknown ids and non-folder parents leave the tree unchanged.
//! - `id`, `parent_id` and `type` never change through a patch.
//! - Edits never re-sort siblings.

use crate::model::node::{FlatNode, NodeId, Tree, TreeNode, Visibility};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Structural keys a patch can never overwrite.
const RESERVED_KEYS: &[&str] = &["id", "parent_id", "type", "position", "children"];

/// Field-level update merged into one node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePatch {
    /// New sibling ordering key. Callers that change order own re-sorting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
    /// Display attributes to set verbatim (`null` clears a value).
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

impl NodePatch {
    /// Sets one display attribute. Reserved structural keys are ignored.
    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        if !RESERVED_KEYS.contains(&key.as_str()) {
            self.attrs.insert(key, value);
        }
        self
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::default().with_attr("name", Value::String(name.into()))
    }

    pub fn emoji(emoji: Option<&str>) -> Self {
        let value = emoji.map_or(Value::Null, |value| Value::String(value.to_string()));
        Self::default().with_attr("emoji", value)
    }

    pub fn visibility(visibility: Visibility) -> Self {
        Self::default().with_attr("visibility", Value::String(visibility.as_str().to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.attrs.is_empty()
    }

    /// Merges this patch into a copy of `node`.
    pub fn apply_to(&self, node: &FlatNode) -> FlatNode {
        let mut next = node.clone();
        if let Some(position) = self.position {
            next.position = position;
        }
        for (key, value) in &self.attrs {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            next.attrs.insert(key.clone(), value.clone());
        }
        next
    }
}

/// Merges `patch` into the node with `id`.
pub fn replace(tree: &Tree, id: &str, patch: &NodePatch) -> Tree {
    edit(tree, "replace", id, |node| {
        let updated = node.with_node(patch.apply_to(&node.node));
        Some(vec![Arc::new(updated)])
    })
}

/// Renames one node.
pub fn rename(tree: &Tree, id: &str, name: &str) -> Tree {
    replace(tree, id, &NodePatch::name(name))
}

/// Sets or clears the emoji of one node.
pub fn set_emoji(tree: &Tree, id: &str, emoji: Option<&str>) -> Tree {
    replace(tree, id, &NodePatch::emoji(emoji))
}

pub fn set_visibility(tree: &Tree, id: &str, visibility: Visibility) -> Tree {
    replace(tree, id, &NodePatch::visibility(visibility))
}

/// Appends `node` under `parent_id`, or at root level when `None`.
///
/// The new node's `parent_id` is rewritten from the insertion point. Inserting
/// an id that already exists, or under a document, is a no-op.
pub fn insert_child(tree: &Tree, parent_id: Option<&str>, node: FlatNode) -> Tree {
    if tree.contains(&node.id) {
        debug!(
            "event=tree_mutate module=tree status=rejected op=insert reason=duplicate_id node_id={}",
            node.id
        );
        return tree.clone();
    }
    insert_at(tree, parent_id, usize::MAX, Arc::new(TreeNode::leaf(node)))
}

/// Deletes one node together with its subtree.
pub fn remove(tree: &Tree, id: &str) -> Tree {
    edit(tree, "remove", id, |_| Some(Vec::new()))
}

/// Inserts an existing subtree at `index` (clamped) under `parent_id`.
pub(crate) fn insert_at(
    tree: &Tree,
    parent_id: Option<&str>,
    index: usize,
    node: Arc<TreeNode>,
) -> Tree {
    let node = reparent(node, parent_id);
    match parent_id {
        None => {
            let mut roots = tree.roots().to_vec();
            roots.insert(index.min(roots.len()), node);
            Tree::new(roots)
        }
        Some(parent_id) => edit(tree, "insert", parent_id, move |parent| {
            if !parent.is_folder() {
                return None;
            }
            let mut children = parent.children().to_vec();
            children.insert(index.min(children.len()), node);
            Some(vec![Arc::new(parent.with_children(children))])
        }),
    }
}

fn reparent(node: Arc<TreeNode>, parent_id: Option<&str>) -> Arc<TreeNode> {
    if node.node.parent_id.as_deref() == parent_id {
        return node;
    }
    let mut record = node.node.clone();
    record.parent_id = parent_id.map(NodeId::from);
    Arc::new(node.with_node(record))
}

fn edit<F>(tree: &Tree, op: &str, id: &str, change: F) -> Tree
where
    F: FnOnce(&Arc<TreeNode>) -> Option<Vec<Arc<TreeNode>>>,
{
    let mut change = Some(change);
    match splice(tree.roots(), id, &mut change) {
        Some(roots) => Tree::new(roots),
        None => {
            let reason = if change.is_some() {
                "node_not_found"
            } else {
                "invalid_target"
            };
            debug!(
                "event=tree_mutate module=tree status=rejected op={} reason={} node_id={}",
                op, reason, id
            );
            tree.clone()
        }
    }
}

/// Replaces the node `id` with the nodes `edit` returns, copying its ancestors.
///
/// Returns `None` when `id` is absent or `edit` refuses the change.
fn splice<F>(nodes: &[Arc<TreeNode>], id: &str, edit: &mut Option<F>) -> Option<Vec<Arc<TreeNode>>>
where
    F: FnOnce(&Arc<TreeNode>) -> Option<Vec<Arc<TreeNode>>>,
{
    for (slot, node) in nodes.iter().enumerate() {
        let replacement = if node.id() == id {
            let edit = edit.take()?;
            edit(node)?
        } else if let Some(children) = splice(node.children(), id, edit) {
            vec![Arc::new(node.with_children(children))]
        } else if edit.is_none() {
            return None;
        } else {
            continue;
        };

        let mut out = Vec::with_capacity(nodes.len() + replacement.len());
        out.extend_from_slice(&nodes[..slot]);
        out.extend(replacement);
        out.extend_from_slice(&nodes[slot + 1..]);
        return Some(out);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{insert_child, remove, rename, replace, set_emoji, NodePatch};
    use crate::model::node::{FlatNode, NodeKind, Tree};
    use crate::tree::convert::build_tree;
    use serde_json::json;
    use std::sync::Arc;

    fn sample() -> Tree {
        build_tree(vec![
            FlatNode::new("f1", NodeKind::Folder).named("Guides"),
            FlatNode::new("d1", NodeKind::Document).under("f1").named("Intro"),
            FlatNode::new("f2", NodeKind::Folder).at(1),
            FlatNode::new("d2", NodeKind::Document).under("f2"),
        ])
    }

    #[test]
    fn replace_copies_only_the_ancestor_chain() {
        let tree = sample();
        let next = rename(&tree, "d1", "Getting started");

        assert_eq!(
            next.find("d1").and_then(|n| n.node.name()),
            Some("Getting started")
        );
        assert_eq!(tree.find("d1").and_then(|n| n.node.name()), Some("Intro"));
        assert!(!Arc::ptr_eq(&tree.roots()[0], &next.roots()[0]));
        assert!(Arc::ptr_eq(&tree.roots()[1], &next.roots()[1]));
    }

    #[test]
    fn replace_unknown_id_is_noop() {
        let tree = sample();
        let next = rename(&tree, "missing", "x");
        assert!(tree.is_same_snapshot(&next));
    }

    #[test]
    fn patch_cannot_touch_structural_fields() {
        let patch: NodePatch = serde_json::from_value(json!({
            "id": "hijack",
            "parent_id": "f2",
            "summary": "short",
        }))
        .expect("patch should parse");
        let next = replace(&sample(), "d1", &patch);
        let d1 = next.find("d1").expect("d1 should keep its id");
        assert_eq!(d1.node.parent_id.as_deref(), Some("f1"));
        assert_eq!(d1.node.attrs.get("summary"), Some(&json!("short")));
        assert!(!d1.node.attrs.contains_key("id"));
    }

    #[test]
    fn set_emoji_none_clears_value() {
        let tree = set_emoji(&sample(), "f1", Some("📁"));
        assert_eq!(tree.find("f1").and_then(|n| n.node.emoji()), Some("📁"));
        let tree = set_emoji(&tree, "f1", None);
        assert_eq!(tree.find("f1").and_then(|n| n.node.emoji()), None);
    }

    #[test]
    fn insert_child_appends_and_sets_parent() {
        let next = insert_child(
            &sample(),
            Some("f1"),
            FlatNode::new("d3", NodeKind::Document).under("elsewhere"),
        );
        let f1 = next.find("f1").expect("f1 exists");
        let ids = f1.children().iter().map(|n| n.id()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["d1", "d3"]);
        assert_eq!(f1.children()[1].node.parent_id.as_deref(), Some("f1"));
    }

    #[test]
    fn insert_child_at_root_and_new_folder_gets_children() {
        let next = insert_child(&sample(), None, FlatNode::new("f3", NodeKind::Folder));
        let last = next.roots().last().expect("root appended");
        assert_eq!(last.id(), "f3");
        assert_eq!(last.children, Some(Vec::new()));
    }

    #[test]
    fn insert_child_rejects_document_parent_and_duplicate_id() {
        let tree = sample();
        let under_doc = insert_child(&tree, Some("d1"), FlatNode::new("x", NodeKind::Document));
        assert!(tree.is_same_snapshot(&under_doc));

        let duplicate = insert_child(&tree, None, FlatNode::new("d2", NodeKind::Document));
        assert!(tree.is_same_snapshot(&duplicate));

        let missing = insert_child(&tree, Some("ghost"), FlatNode::new("x", NodeKind::Document));
        assert!(tree.is_same_snapshot(&missing));
    }

    #[test]
    fn remove_drops_whole_subtree() {
        let next = remove(&sample(), "f1");
        assert!(!next.contains("f1"));
        assert!(!next.contains("d1"));
        assert_eq!(next.node_count(), 2);
    }
}
