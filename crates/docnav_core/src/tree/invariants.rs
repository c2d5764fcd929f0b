//! Structural invariant checks for tree snapshots.
//!
//! Used by tests and by hosts that want to assert a snapshot before rendering.
//! Ancestry cycles cannot be expressed by `Arc` children; a node reachable
//! twice is reported as a duplicate id instead.

use crate::model::node::{NodeId, Tree, TreeNode};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// First invariant violation found in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Same id appears more than once.
    DuplicateId(NodeId),
    /// `parent_id` disagrees with the containing node.
    ParentMismatch {
        id: NodeId,
        expected: Option<NodeId>,
        actual: Option<NodeId>,
    },
    /// Folder without a children list, or document with one.
    ChildrenShape(NodeId),
    /// Siblings are not in ascending `position` order.
    PositionOrder { parent_id: Option<NodeId> },
}

impl Display for InvariantViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "duplicate node id: {id}"),
            Self::ParentMismatch {
                id,
                expected,
                actual,
            } => write!(
                f,
                "node {id} has parent_id {actual:?}, expected {expected:?}"
            ),
            Self::ChildrenShape(id) => write!(f, "children shape does not match kind: {id}"),
            Self::PositionOrder { parent_id } => {
                write!(f, "siblings out of position order under {parent_id:?}")
            }
        }
    }
}

impl Error for InvariantViolation {}

/// Checks id uniqueness, parent consistency and children shape.
///
/// Walks pre-order from an explicit stack and reports the first violation.
pub fn check_invariants(tree: &Tree) -> Result<(), InvariantViolation> {
    let mut seen = HashSet::new();
    let mut stack = tree
        .roots()
        .iter()
        .rev()
        .map(|node| (node, None))
        .collect::<Vec<(&Arc<TreeNode>, Option<&str>)>>();
    while let Some((node, parent_id)) = stack.pop() {
        if !seen.insert(node.id()) {
            return Err(InvariantViolation::DuplicateId(node.id().to_string()));
        }
        let actual = node.node.parent_ref();
        if actual != parent_id {
            return Err(InvariantViolation::ParentMismatch {
                id: node.id().to_string(),
                expected: parent_id.map(str::to_string),
                actual: actual.map(str::to_string),
            });
        }
        if node.is_folder() != node.children.is_some() {
            return Err(InvariantViolation::ChildrenShape(node.id().to_string()));
        }
        stack.extend(
            node.children()
                .iter()
                .rev()
                .map(|child| (child, Some(node.id()))),
        );
    }
    Ok(())
}

/// Checks that every sibling list is sorted by `position`.
///
/// Only holds for freshly converted snapshots; reorders may leave stale keys.
pub fn check_sibling_order(tree: &Tree) -> Result<(), InvariantViolation> {
    check_order(tree.roots(), None)?;
    for node in tree.iter() {
        check_order(node.children(), Some(node.id()))?;
    }
    Ok(())
}

fn check_order(nodes: &[Arc<TreeNode>], parent_id: Option<&str>) -> Result<(), InvariantViolation> {
    let descending = nodes.windows(2).any(|pair| {
        pair[0].node.position.total_cmp(&pair[1].node.position) == Ordering::Greater
    });
    if descending {
        return Err(InvariantViolation::PositionOrder {
            parent_id: parent_id.map(str::to_string),
        });
    }
    Ok(())
}
