//! Sidebar menu actions dispatched onto the mutator.
//!
//! # Responsibility
//! - Model every context-menu action as one `TreeAction` variant.
//! - Apply an action to a snapshot and produce the persistence request to
//!   forward to the backend.
//!
//! # Invariants
//! - A refused action returns the input snapshot and no request.
//! - Names are trimmed, whitespace-collapsed and bounded before use.
//! - Created nodes get a fresh UUID v4 id and are appended after their
//!   siblings (`max(position) + 1`).

use crate::config::EngineConfig;
use crate::model::node::{FlatNode, NodeId, NodeKind, Tree, Visibility};
use crate::tree::mutate::{insert_child, remove, replace, NodePatch};
use crate::tree::order::MovePayload;
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// One user action from the sidebar context menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum TreeAction {
    Rename(String),
    SetEmoji(Option<String>),
    SetVisibility(Visibility),
    /// Creates a child under the target folder, or at root without a target.
    CreateChild {
        kind: NodeKind,
        #[serde(default)]
        name: Option<String>,
    },
    Delete,
    Update(NodePatch),
}

impl TreeAction {
    /// Stable label used in log events.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rename(_) => "rename",
            Self::SetEmoji(_) => "set_emoji",
            Self::SetVisibility(_) => "set_visibility",
            Self::CreateChild { .. } => "create_child",
            Self::Delete => "delete",
            Self::Update(_) => "update",
        }
    }
}

/// Backend request produced by a committed local edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PersistRequest {
    Create { node: FlatNode },
    Update { id: NodeId, patch: NodePatch },
    Delete { id: NodeId },
    Move(MovePayload),
}

/// Result of dispatching one action.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    /// Snapshot after the action; the input snapshot when refused.
    pub tree: Tree,
    /// Request to forward, `None` when the action was refused.
    pub request: Option<PersistRequest>,
}

impl ActionOutcome {
    fn refused(tree: &Tree) -> Self {
        Self {
            tree: tree.clone(),
            request: None,
        }
    }

    pub fn is_applied(&self) -> bool {
        self.request.is_some()
    }
}

/// Applies `action` to `target` (`None` addresses the root level).
pub fn apply_action(
    tree: &Tree,
    target: Option<&str>,
    action: &TreeAction,
    config: &EngineConfig,
) -> ActionOutcome {
    let outcome = match (action, target) {
        (TreeAction::CreateChild { kind, name }, parent_id) => {
            create_child(tree, parent_id, *kind, name.as_deref(), config)
        }
        (_, None) => ActionOutcome::refused(tree),
        (TreeAction::Rename(name), Some(id)) => match normalize_name(name, config.max_name_chars) {
            Some(name) => update(tree, id, NodePatch::name(name)),
            None => ActionOutcome::refused(tree),
        },
        (TreeAction::SetEmoji(emoji), Some(id)) => {
            update(tree, id, NodePatch::emoji(emoji.as_deref()))
        }
        (TreeAction::SetVisibility(visibility), Some(id)) => {
            update(tree, id, NodePatch::visibility(*visibility))
        }
        (TreeAction::Update(patch), Some(id)) => update(tree, id, patch.clone()),
        (TreeAction::Delete, Some(id)) => {
            let next = remove(tree, id);
            committed(
                tree,
                next,
                PersistRequest::Delete {
                    id: id.to_string(),
                },
            )
        }
    };

    if outcome.is_applied() {
        info!(
            "event=tree_action module=tree status=ok action={} target={}",
            action.label(),
            target.unwrap_or("<root>")
        );
    } else {
        info!(
            "event=tree_action module=tree status=rejected action={} target={}",
            action.label(),
            target.unwrap_or("<root>")
        );
    }
    outcome
}

/// Trims, collapses inner whitespace and bounds a display name.
///
/// Returns `None` for blank or over-long names.
pub fn normalize_name(raw: &str, max_chars: usize) -> Option<String> {
    let collapsed = WHITESPACE_RE.replace_all(raw.trim(), " ").into_owned();
    if collapsed.is_empty() || collapsed.chars().count() > max_chars {
        return None;
    }
    Some(collapsed)
}

/// Next free ordering key among `parent_id`'s children.
///
/// One past the largest key, floored so fractional keys still yield a whole
/// number.
pub fn next_position(tree: &Tree, parent_id: Option<&str>) -> f64 {
    let siblings = match parent_id {
        None => tree.roots(),
        Some(parent_id) => match tree.find(parent_id) {
            Some(parent) => parent.children(),
            None => return 0.0,
        },
    };
    siblings
        .iter()
        .map(|node| node.node.position)
        .reduce(f64::max)
        .map_or(0.0, |max| max.floor() + 1.0)
}

fn update(tree: &Tree, id: &str, patch: NodePatch) -> ActionOutcome {
    let next = replace(tree, id, &patch);
    committed(
        tree,
        next,
        PersistRequest::Update {
            id: id.to_string(),
            patch,
        },
    )
}

fn create_child(
    tree: &Tree,
    parent_id: Option<&str>,
    kind: NodeKind,
    name: Option<&str>,
    config: &EngineConfig,
) -> ActionOutcome {
    let name = match name {
        Some(raw) => match normalize_name(raw, config.max_name_chars) {
            Some(name) => name,
            None => return ActionOutcome::refused(tree),
        },
        None => config.default_name(kind).to_string(),
    };

    let mut node = FlatNode::new(Uuid::new_v4().to_string(), kind)
        .at(next_position(tree, parent_id))
        .named(name);
    node.parent_id = parent_id.map(NodeId::from);

    let next = insert_child(tree, parent_id, node.clone());
    committed(tree, next, PersistRequest::Create { node })
}

fn committed(before: &Tree, after: Tree, request: PersistRequest) -> ActionOutcome {
    if before.is_same_snapshot(&after) {
        return ActionOutcome::refused(before);
    }
    ActionOutcome {
        tree: after,
        request: Some(request),
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_action, next_position, normalize_name, PersistRequest, TreeAction};
    use crate::config::EngineConfig;
    use crate::model::node::{FlatNode, NodeKind, Tree, Visibility};
    use crate::tree::convert::build_tree;

    fn sample() -> Tree {
        build_tree(vec![
            FlatNode::new("f1", NodeKind::Folder),
            FlatNode::new("d1", NodeKind::Document).under("f1").at(4),
            FlatNode::new("d2", NodeKind::Document).at(1),
        ])
    }

    #[test]
    fn normalize_name_collapses_and_rejects_blank() {
        assert_eq!(
            normalize_name("  Release \n notes ", 255),
            Some("Release notes".to_string())
        );
        assert_eq!(normalize_name("   ", 255), None);
        assert_eq!(normalize_name("abcdef", 5), None);
    }

    #[test]
    fn rename_produces_update_request() {
        let config = EngineConfig::default();
        let outcome = apply_action(
            &sample(),
            Some("d1"),
            &TreeAction::Rename(" Intro ".to_string()),
            &config,
        );
        assert_eq!(
            outcome.tree.find("d1").and_then(|n| n.node.name()),
            Some("Intro")
        );
        match outcome.request {
            Some(PersistRequest::Update { id, patch }) => {
                assert_eq!(id, "d1");
                assert_eq!(patch.attrs.get("name"), Some(&serde_json::json!("Intro")));
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn blank_rename_and_unknown_target_are_refused() {
        let tree = sample();
        let config = EngineConfig::default();
        let blank = apply_action(&tree, Some("d1"), &TreeAction::Rename("  ".into()), &config);
        assert!(!blank.is_applied());
        assert!(tree.is_same_snapshot(&blank.tree));

        let missing = apply_action(&tree, Some("ghost"), &TreeAction::Delete, &config);
        assert!(!missing.is_applied());

        let rootless = apply_action(&tree, None, &TreeAction::Delete, &config);
        assert!(!rootless.is_applied());
    }

    #[test]
    fn create_child_appends_after_max_position() {
        let config = EngineConfig::default();
        let outcome = apply_action(
            &sample(),
            Some("f1"),
            &TreeAction::CreateChild {
                kind: NodeKind::Document,
                name: None,
            },
            &config,
        );
        let Some(PersistRequest::Create { node }) = outcome.request else {
            panic!("create should produce a create request");
        };
        assert_eq!(node.position, 5.0);
        assert_eq!(node.parent_id.as_deref(), Some("f1"));
        assert_eq!(node.name(), Some("Untitled document"));
        let f1 = outcome.tree.find("f1").expect("f1 exists");
        assert_eq!(f1.children().last().map(|n| n.id()), Some(node.id.as_str()));
    }

    #[test]
    fn create_child_under_document_is_refused() {
        let outcome = apply_action(
            &sample(),
            Some("d2"),
            &TreeAction::CreateChild {
                kind: NodeKind::Folder,
                name: Some("x".into()),
            },
            &EngineConfig::default(),
        );
        assert!(!outcome.is_applied());
    }

    #[test]
    fn visibility_and_delete_dispatch() {
        let config = EngineConfig::default();
        let tree = sample();
        let visible = apply_action(
            &tree,
            Some("f1"),
            &TreeAction::SetVisibility(Visibility::Public),
            &config,
        );
        assert_eq!(
            visible.tree.find("f1").and_then(|n| n.node.visibility()),
            Some("public")
        );

        let deleted = apply_action(&visible.tree, Some("f1"), &TreeAction::Delete, &config);
        assert!(!deleted.tree.contains("d1"));
        assert_eq!(
            deleted.request,
            Some(PersistRequest::Delete {
                id: "f1".to_string()
            })
        );
    }

    #[test]
    fn next_position_handles_empty_and_root_levels() {
        let tree = build_tree(vec![FlatNode::new("f", NodeKind::Folder).at(7)]);
        assert_eq!(next_position(&tree, Some("f")), 0.0);
        assert_eq!(next_position(&tree, None), 8.0);
        assert_eq!(next_position(&tree, Some("ghost")), 0.0);

        let fractional = build_tree(vec![
            FlatNode::new("a", NodeKind::Document).at(0.5),
            FlatNode::new("b", NodeKind::Document).at(2.75),
        ]);
        assert_eq!(next_position(&fractional, None), 3.0);
    }

    #[test]
    fn actions_round_trip_through_json() {
        let action: TreeAction = serde_json::from_value(serde_json::json!({
            "action": "create_child",
            "value": {"kind": "folder"}
        }))
        .expect("action should parse");
        assert_eq!(
            action,
            TreeAction::CreateChild {
                kind: NodeKind::Folder,
                name: None
            }
        );
    }
}
