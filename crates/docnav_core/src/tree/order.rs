//! Drag-and-drop moves and sibling neighbor resolution.
//!
//! # Responsibility
//! - Apply the structural part of a drop (`move_node`).
//! - Translate the resulting position into the `(parent, prev, next)` triple
//!   the persistence endpoint expects (`resolve_neighbors`).
//!
//! # Invariants
//! - A move never makes a node its own ancestor.
//! - Moves only target folders or the root level.
//! - The resolver only reads the tree; it never numbers positions.

use crate::model::node::{NodeId, Tree};
use crate::tree::mutate::{insert_at, remove};
use log::debug;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Payload for the backend move endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePayload {
    /// Moved node.
    pub id: NodeId,
    /// New parent. `None` means root level.
    pub parent_id: Option<NodeId>,
    /// Immediate left sibling, `None` when first.
    pub prev_id: Option<NodeId>,
    /// Immediate right sibling, `None` when last.
    pub next_id: Option<NodeId>,
}

/// Reasons a move request is refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveRejection {
    /// Moved node is not in the tree.
    NodeNotFound(NodeId),
    /// Target parent is not in the tree.
    ParentNotFound(NodeId),
    /// Target parent exists but is a document.
    ParentNotFolder(NodeId),
    /// Target parent is the node itself or one of its descendants.
    Cycle { node_id: NodeId, parent_id: NodeId },
}

impl Display for MoveRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "move target not found: {id}"),
            Self::ParentNotFolder(id) => write!(f, "move target is not a folder: {id}"),
            Self::Cycle { node_id, parent_id } => write!(
                f,
                "move would create cycle: node {node_id} under parent {parent_id}"
            ),
        }
    }
}

impl Error for MoveRejection {}

/// Validates moving `id` under `new_parent`.
pub fn check_move(tree: &Tree, id: &str, new_parent: Option<&str>) -> Result<(), MoveRejection> {
    if !tree.contains(id) {
        return Err(MoveRejection::NodeNotFound(id.to_string()));
    }
    let Some(parent_id) = new_parent else {
        return Ok(());
    };

    let parent_path = tree
        .path_to(parent_id)
        .ok_or_else(|| MoveRejection::ParentNotFound(parent_id.to_string()))?;
    if parent_path.iter().any(|node| node.id() == id) {
        return Err(MoveRejection::Cycle {
            node_id: id.to_string(),
            parent_id: parent_id.to_string(),
        });
    }
    match parent_path.last() {
        Some(parent) if parent.is_folder() => Ok(()),
        _ => Err(MoveRejection::ParentNotFolder(parent_id.to_string())),
    }
}

/// Moves `id` under `new_parent` at sibling `index`.
///
/// `index` counts siblings after the moved node is taken out and is clamped to
/// the list length. Invalid moves return the tree unchanged.
pub fn move_node(tree: &Tree, id: &str, new_parent: Option<&str>, index: usize) -> Tree {
    if let Err(rejection) = check_move(tree, id, new_parent) {
        debug!(
            "event=tree_move module=tree status=rejected node_id={} reason={}",
            id, rejection
        );
        return tree.clone();
    }
    let Some(moving) = tree.find(id).map(Arc::clone) else {
        return tree.clone();
    };
    let detached = remove(tree, id);
    insert_at(&detached, new_parent, index, moving)
}

/// Resolves the neighbors of `id` at its current position.
///
/// Returns `None` when `id` is not in the tree.
pub fn resolve_neighbors(tree: &Tree, id: &str) -> Option<MovePayload> {
    let path = tree.path_to(id)?;
    let parent = path.len().checked_sub(2).map(|slot| path[slot]);
    let siblings = match parent {
        Some(parent) => parent.children(),
        None => tree.roots(),
    };
    let index = siblings.iter().position(|node| node.id() == id)?;

    Some(MovePayload {
        id: id.to_string(),
        parent_id: parent.map(|node| node.id().to_string()),
        prev_id: index
            .checked_sub(1)
            .map(|slot| siblings[slot].id().to_string()),
        next_id: siblings.get(index + 1).map(|node| node.id().to_string()),
    })
}
