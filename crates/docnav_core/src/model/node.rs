//! Document/folder node model.
//!
//! # Responsibility
//! - Define the flat wire record (`FlatNode`) served by the backend.
//! - Define the nested snapshot shape (`TreeNode`, `Tree`) read by the UI.
//!
//! # Invariants
//! - `TreeNode::children` is `Some` for folders and `None` for documents.
//! - Display attributes live in one opaque map and survive every transform.
//! - Shared nodes are never mutated; edits build new nodes along one path.
//!
//! # See also
//! - `crate::tree` for the transforms over these types.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Stable node identifier as served by the backend.
pub type NodeId = String;

/// Node category.
///
/// The backend's `doc` label is accepted on input and written back as
/// `document`; outgoing records always carry the canonical label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Container node; always carries a children list.
    Folder,
    /// Leaf node; never carries children.
    #[serde(alias = "doc")]
    Document,
}

impl NodeKind {
    /// Stable wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::Document => "document",
        }
    }
}

/// Visibility values the console can set on a node.
///
/// Stored on the node as a plain string so unknown server values round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    Public,
}

impl Visibility {
    /// Stable wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
        }
    }
}

/// Flat node record, one per row of the backend list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatNode {
    /// Unique node id.
    pub id: NodeId,
    /// Parent id. `None` or blank means root-level node.
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    /// Ordering key among siblings; not necessarily contiguous or integral.
    ///
    /// Missing, `null` or unparsable values read as `0`.
    #[serde(
        default,
        deserialize_with = "deserialize_position",
        serialize_with = "serialize_position"
    )]
    pub position: f64,
    /// Serialized as `type` to match the backend schema.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Opaque display payload (`name`, `emoji`, `summary`, timestamps, ...).
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

impl FlatNode {
    /// Creates a record with no display attributes.
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            position: 0.0,
            kind,
            attrs: Map::new(),
        }
    }

    /// Sets the parent reference.
    pub fn under(mut self, parent_id: impl Into<NodeId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Sets the sibling ordering key.
    pub fn at(mut self, position: impl Into<f64>) -> Self {
        self.position = position.into();
        self
    }

    /// Sets the `name` display attribute.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.attrs
            .insert("name".to_string(), Value::String(name.into()));
        self
    }

    /// Returns the parent id, treating blank strings as root.
    pub fn parent_ref(&self) -> Option<&str> {
        self.parent_id
            .as_deref()
            .filter(|value| !value.trim().is_empty())
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    pub fn name(&self) -> Option<&str> {
        self.attr_str("name")
    }

    pub fn emoji(&self) -> Option<&str> {
        self.attr_str("emoji")
    }

    pub fn visibility(&self) -> Option<&str> {
        self.attr_str("visibility")
    }

    fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(Value::as_str)
    }
}

/// Nested node held by a tree snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub node: FlatNode,
    /// Child nodes in sibling order. Absent for documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Arc<TreeNode>>>,
}

impl TreeNode {
    /// Wraps a record with the children shape its kind requires.
    pub fn leaf(node: FlatNode) -> Self {
        let children = match node.kind {
            NodeKind::Folder => Some(Vec::new()),
            NodeKind::Document => None,
        };
        Self { node, children }
    }

    pub fn id(&self) -> &str {
        self.node.id.as_str()
    }

    pub fn kind(&self) -> NodeKind {
        self.node.kind
    }

    pub fn is_folder(&self) -> bool {
        self.node.is_folder()
    }

    /// Returns children in sibling order; empty for documents.
    pub fn children(&self) -> &[Arc<TreeNode>] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Copies this node with a replaced children list.
    ///
    /// Documents keep `children = None` regardless of input.
    pub(crate) fn with_children(&self, children: Vec<Arc<TreeNode>>) -> Self {
        Self {
            node: self.node.clone(),
            children: self.is_folder().then_some(children),
        }
    }

    /// Copies this node with a replaced record and the same children.
    pub(crate) fn with_node(&self, node: FlatNode) -> Self {
        Self {
            node,
            children: self.children.clone(),
        }
    }
}

impl Drop for TreeNode {
    /// Releases uniquely owned descendants from a heap stack so that deep
    /// chains do not recurse once per level.
    fn drop(&mut self) {
        let Some(mut stack) = self.children.take() else {
            return;
        };
        while let Some(child) = stack.pop() {
            if let Ok(mut owned) = Arc::try_unwrap(child) {
                if let Some(children) = owned.children.take() {
                    stack.extend(children);
                }
            }
        }
    }
}

/// Immutable forest snapshot. Cloning is cheap: roots are shared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tree {
    roots: Vec<Arc<TreeNode>>,
}

impl Tree {
    pub fn new(roots: Vec<Arc<TreeNode>>) -> Self {
        Self { roots }
    }

    /// Root nodes in sibling order.
    pub fn roots(&self) -> &[Arc<TreeNode>] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total node count across all levels.
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Depth-first pre-order iterator over every node.
    pub fn iter(&self) -> TreeIter<'_> {
        TreeIter {
            stack: self.roots.iter().rev().collect(),
        }
    }

    /// Finds one node by id.
    pub fn find(&self, id: &str) -> Option<&Arc<TreeNode>> {
        self.iter().find(|node| node.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Returns the chain from a root down to `id`, inclusive.
    ///
    /// Returns `None` when `id` is not in the tree.
    pub fn path_to(&self, id: &str) -> Option<Vec<&Arc<TreeNode>>> {
        let mut stack = self
            .roots
            .iter()
            .rev()
            .map(|node| (node, 0))
            .collect::<Vec<_>>();
        let mut path = Vec::new();
        while let Some((node, depth)) = stack.pop() {
            path.truncate(depth);
            path.push(node);
            if node.id() == id {
                return Some(path);
            }
            stack.extend(node.children().iter().rev().map(|child| (child, depth + 1)));
        }
        None
    }

    /// Returns the sibling list that holds `id` and its index within it.
    pub fn siblings_of(&self, id: &str) -> Option<(&[Arc<TreeNode>], usize)> {
        let path = self.path_to(id)?;
        let siblings = match path.len() {
            0 => return None,
            1 => self.roots.as_slice(),
            len => path[len - 2].children(),
        };
        let index = siblings.iter().position(|node| node.id() == id)?;
        Some((siblings, index))
    }

    /// Returns `true` when both snapshots share every root by reference.
    ///
    /// Path-copy edits always replace at least one root, so this detects
    /// no-op edits in `O(roots)` without a deep comparison.
    pub fn is_same_snapshot(&self, other: &Tree) -> bool {
        self.roots.len() == other.roots.len()
            && self
                .roots
                .iter()
                .zip(&other.roots)
                .all(|(left, right)| Arc::ptr_eq(left, right))
    }
}

/// Reads integers, floats, numeric strings and `null` as an ordering key.
fn deserialize_position<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let position = match &raw {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(position.filter(|value| value.is_finite()).unwrap_or(0.0))
}

/// Writes integral keys as JSON integers so untouched records round-trip.
fn serialize_position<S>(position: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if position.fract() == 0.0 && position.abs() <= MAX_EXACT {
        serializer.serialize_i64(*position as i64)
    } else {
        serializer.serialize_f64(*position)
    }
}

/// Depth-first pre-order traversal over a tree snapshot.
pub struct TreeIter<'a> {
    stack: Vec<&'a Arc<TreeNode>>,
}

impl<'a> Iterator for TreeIter<'a> {
    type Item = &'a Arc<TreeNode>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::{FlatNode, NodeKind, Tree, TreeNode};
    use std::sync::Arc;

    fn sample() -> Tree {
        let doc = Arc::new(TreeNode::leaf(
            FlatNode::new("d1", NodeKind::Document).under("f1"),
        ));
        let folder = TreeNode::leaf(FlatNode::new("f1", NodeKind::Folder)).with_children(vec![doc]);
        let root_doc = Arc::new(TreeNode::leaf(FlatNode::new("d2", NodeKind::Document)));
        Tree::new(vec![Arc::new(folder), root_doc])
    }

    #[test]
    fn leaf_shapes_children_by_kind() {
        assert_eq!(
            TreeNode::leaf(FlatNode::new("f", NodeKind::Folder)).children,
            Some(Vec::new())
        );
        assert_eq!(
            TreeNode::leaf(FlatNode::new("d", NodeKind::Document)).children,
            None
        );
    }

    #[test]
    fn iter_walks_pre_order() {
        let ids = sample()
            .iter()
            .map(|node| node.id().to_string())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["f1", "d1", "d2"]);
    }

    #[test]
    fn path_and_siblings_resolve_nested_node() {
        let tree = sample();
        let path = tree.path_to("d1").expect("d1 should be found");
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].id(), "f1");

        let (siblings, index) = tree.siblings_of("d2").expect("d2 should be found");
        assert_eq!(siblings.len(), 2);
        assert_eq!(index, 1);
        assert!(tree.path_to("missing").is_none());
    }

    #[test]
    fn blank_parent_is_root() {
        let node = FlatNode::new("a", NodeKind::Document).under("  ");
        assert_eq!(node.parent_ref(), None);
    }

    #[test]
    fn position_accepts_fractions_null_and_strings() {
        let records: Vec<FlatNode> = serde_json::from_value(serde_json::json!([
            {"id": "a", "type": "document", "position": 1.5},
            {"id": "b", "type": "document", "position": null},
            {"id": "c", "type": "document", "position": "2.25"},
            {"id": "d", "type": "document", "position": {"bad": true}},
            {"id": "e", "type": "document"}
        ]))
        .expect("lenient positions should parse");
        let positions = records.iter().map(|r| r.position).collect::<Vec<_>>();
        assert_eq!(positions, vec![1.5, 0.0, 2.25, 0.0, 0.0]);

        let back = serde_json::to_value(&records[..2]).expect("records should serialize");
        assert_eq!(back[0]["position"], serde_json::json!(1.5));
        assert_eq!(back[1]["position"], serde_json::json!(0));
    }

    #[test]
    fn deep_chain_drops_without_recursion() {
        let mut node = TreeNode::leaf(FlatNode::new("leaf", NodeKind::Folder));
        for depth in 0..100_000 {
            let parent = FlatNode::new(format!("n{depth}"), NodeKind::Folder);
            node = TreeNode::leaf(parent).with_children(vec![Arc::new(node)]);
        }
        let tree = Tree::new(vec![Arc::new(node)]);
        assert_eq!(tree.path_to("leaf").map(|path| path.len()), Some(100_001));
        drop(tree);
    }

    #[test]
    fn wire_format_accepts_doc_alias_and_keeps_extra_fields() {
        let json = serde_json::json!({
            "id": "d1",
            "parent_id": null,
            "position": 3,
            "type": "doc",
            "name": "Intro",
            "status": 2,
            "custom": {"nested": true}
        });
        let node: FlatNode = serde_json::from_value(json).expect("record should parse");
        assert_eq!(node.kind, NodeKind::Document);
        assert_eq!(node.name(), Some("Intro"));

        let back = serde_json::to_value(&node).expect("record should serialize");
        assert_eq!(back["type"], "document");
        assert_eq!(back["status"], 2);
        assert_eq!(back["custom"]["nested"], true);
    }
}
