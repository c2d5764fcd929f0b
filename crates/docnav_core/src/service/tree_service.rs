//! Tree session use-case service.
//!
//! # Responsibility
//! - Own the current snapshot and selection for one sidebar instance.
//! - Validate UI requests and report why a request was refused.
//! - Commit edits optimistically and keep the previous snapshot for rollback.
//!
//! # Invariants
//! - The snapshot is unchanged whenever an error is returned.
//! - Selection only holds ids present in the current snapshot and, in
//!   cascading mode, is always normalized.
//! - Parent must exist and be a folder when provided.
//! - Move operations must not create parent-child cycles.

use crate::config::EngineConfig;
use crate::model::node::{FlatNode, NodeId, Tree, TreeNode};
use crate::tree::action::{apply_action, normalize_name, PersistRequest, TreeAction};
use crate::tree::convert::build_tree;
use crate::tree::mutate::insert_child;
use crate::tree::order::{check_move, move_node, resolve_neighbors, MovePayload, MoveRejection};
use crate::tree::prune::{move_targets, prune_empty_folders};
use crate::tree::selection::{
    normalize_selection, retain_known, selected_documents, toggle_selection, Selection,
    SelectionMode,
};
use log::{debug, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from tree session operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeServiceError {
    /// Display name is blank or too long after normalization.
    InvalidDisplayName,
    /// Action requires a target node but none was given.
    MissingTarget,
    /// Target node does not exist.
    NodeNotFound(NodeId),
    /// Inserted record reuses an id already in the snapshot.
    DuplicateId(NodeId),
    /// Parent node does not exist.
    ParentNotFound(NodeId),
    /// Parent exists but is not folder kind.
    ParentMustBeFolder(NodeId),
    /// Move operation would create a cycle.
    CycleDetected { node_id: NodeId, parent_id: NodeId },
}

impl Display for TreeServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDisplayName => write!(f, "display name must not be blank or too long"),
            Self::MissingTarget => write!(f, "action requires a target node"),
            Self::NodeNotFound(id) => write!(f, "tree node not found: {id}"),
            Self::DuplicateId(id) => write!(f, "tree node id already exists: {id}"),
            Self::ParentNotFound(id) => write!(f, "tree parent not found: {id}"),
            Self::ParentMustBeFolder(id) => write!(f, "tree parent must be folder: {id}"),
            Self::CycleDetected { node_id, parent_id } => write!(
                f,
                "move would create cycle: node {node_id} under parent {parent_id}"
            ),
        }
    }
}

impl Error for TreeServiceError {}

impl From<MoveRejection> for TreeServiceError {
    fn from(value: MoveRejection) -> Self {
        match value {
            MoveRejection::NodeNotFound(id) => Self::NodeNotFound(id),
            MoveRejection::ParentNotFound(id) => Self::ParentNotFound(id),
            MoveRejection::ParentNotFolder(id) => Self::ParentMustBeFolder(id),
            MoveRejection::Cycle { node_id, parent_id } => {
                Self::CycleDetected { node_id, parent_id }
            }
        }
    }
}

/// Single-writer holder of one sidebar's tree snapshot and selection.
#[derive(Debug, Clone, Default)]
pub struct TreeSession {
    config: EngineConfig,
    current: Tree,
    previous: Option<Tree>,
    selection: Selection,
}

impl TreeSession {
    /// Creates an empty session.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Replaces the snapshot with a fresh conversion of `records`.
    ///
    /// Rollback history is discarded; selection keeps ids that still exist.
    pub fn load(&mut self, records: Vec<FlatNode>) {
        self.current = build_tree(records);
        self.previous = None;
        self.refresh_selection();
        info!(
            "event=session_load module=service status=ok nodes={} roots={}",
            self.current.node_count(),
            self.current.roots().len()
        );
    }

    pub fn tree(&self) -> &Tree {
        &self.current
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mode(&self) -> SelectionMode {
        self.config.selection_mode
    }

    /// Applies one context-menu action and returns the request to persist.
    pub fn apply(
        &mut self,
        target: Option<&str>,
        action: TreeAction,
    ) -> Result<PersistRequest, TreeServiceError> {
        self.validate_action(target, &action)?;

        let outcome = apply_action(&self.current, target, &action, &self.config);
        let request = outcome.request.ok_or_else(|| {
            TreeServiceError::NodeNotFound(target.unwrap_or_default().to_string())
        })?;
        self.commit(outcome.tree);
        Ok(request)
    }

    /// Inserts a record created elsewhere, e.g. pushed by another client.
    ///
    /// The record is appended under its own `parent_id`; no request is
    /// produced since the backend already holds it.
    pub fn insert_record(&mut self, record: FlatNode) -> Result<(), TreeServiceError> {
        if self.current.contains(&record.id) {
            return Err(TreeServiceError::DuplicateId(record.id));
        }
        let parent_id = record.parent_ref().map(str::to_string);
        if let Some(parent_id) = parent_id.as_deref() {
            self.ensure_folder(parent_id)?;
        }
        let next = insert_child(&self.current, parent_id.as_deref(), record);
        self.commit(next);
        Ok(())
    }

    /// Moves `id` under `new_parent` at sibling `index` and returns the
    /// neighbor triple for the move endpoint.
    ///
    /// A blank `new_parent` means root level, same as a blank `parent_id`
    /// on a record.
    pub fn move_node(
        &mut self,
        id: &str,
        new_parent: Option<&str>,
        index: usize,
    ) -> Result<PersistRequest, TreeServiceError> {
        let new_parent = new_parent.map(str::trim).filter(|parent| !parent.is_empty());
        check_move(&self.current, id, new_parent)?;
        let next = move_node(&self.current, id, new_parent, index);
        let payload = resolve_neighbors(&next, id)
            .ok_or_else(|| TreeServiceError::NodeNotFound(id.to_string()))?;
        self.commit(next);
        info!(
            "event=session_move module=service status=ok node_id={} parent_id={}",
            id,
            new_parent.unwrap_or("<root>")
        );
        Ok(PersistRequest::Move(payload))
    }

    /// Neighbor triple for `id` at its current position.
    pub fn neighbors(&self, id: &str) -> Result<MovePayload, TreeServiceError> {
        resolve_neighbors(&self.current, id)
            .ok_or_else(|| TreeServiceError::NodeNotFound(id.to_string()))
    }

    /// Restores the snapshot that preceded the last committed edit.
    ///
    /// Returns `false` when there is nothing to roll back.
    pub fn rollback(&mut self) -> bool {
        let Some(previous) = self.previous.take() else {
            return false;
        };
        self.current = previous;
        self.refresh_selection();
        info!("event=session_rollback module=service status=ok");
        true
    }

    /// Toggles `id` in the selection under the configured mode.
    pub fn toggle_selection(&mut self, id: &str) -> Result<&Selection, TreeServiceError> {
        if !self.current.contains(id) {
            return Err(TreeServiceError::NodeNotFound(id.to_string()));
        }
        self.selection = toggle_selection(
            &self.current,
            &self.selection,
            id,
            self.config.selection_mode,
        );
        debug!(
            "event=session_select module=service status=ok node_id={} selected={}",
            id,
            self.selection.len()
        );
        Ok(&self.selection)
    }

    /// Switches selection mode and re-normalizes the current selection.
    pub fn set_selection_mode(&mut self, mode: SelectionMode) {
        self.config.selection_mode = mode;
        self.refresh_selection();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Selected document ids in tree order.
    pub fn selected_documents(&self) -> Vec<NodeId> {
        selected_documents(&self.current, &self.selection)
    }

    /// Folder-only picker for choosing where to move `moving_id`.
    pub fn move_target_picker(&self, moving_id: Option<&str>) -> Tree {
        move_targets(&self.current, moving_id)
    }

    /// Picker restricted to folders that lead to a matching document.
    pub fn document_picker<P>(&self, predicate: P) -> Tree
    where
        P: Fn(&TreeNode) -> bool,
    {
        prune_empty_folders(&self.current, predicate)
    }

    fn validate_action(
        &self,
        target: Option<&str>,
        action: &TreeAction,
    ) -> Result<(), TreeServiceError> {
        match action {
            TreeAction::CreateChild { name, .. } => {
                if let Some(parent_id) = target {
                    self.ensure_folder(parent_id)?;
                }
                if let Some(name) = name {
                    ensure_valid_name(name, self.config.max_name_chars)?;
                }
            }
            other => {
                let id = target.ok_or(TreeServiceError::MissingTarget)?;
                if !self.current.contains(id) {
                    return Err(TreeServiceError::NodeNotFound(id.to_string()));
                }
                if let TreeAction::Rename(name) = other {
                    ensure_valid_name(name, self.config.max_name_chars)?;
                }
            }
        }
        Ok(())
    }

    fn ensure_folder(&self, parent_id: &str) -> Result<(), TreeServiceError> {
        let parent = self
            .current
            .find(parent_id)
            .ok_or_else(|| TreeServiceError::ParentNotFound(parent_id.to_string()))?;
        if !parent.is_folder() {
            return Err(TreeServiceError::ParentMustBeFolder(parent_id.to_string()));
        }
        Ok(())
    }

    fn commit(&mut self, next: Tree) {
        let previous = std::mem::replace(&mut self.current, next);
        self.previous = Some(previous);
        self.refresh_selection();
    }

    fn refresh_selection(&mut self) {
        let known = retain_known(&self.current, &self.selection);
        self.selection = normalize_selection(&self.current, &known, self.config.selection_mode);
    }
}

fn ensure_valid_name(name: &str, max_chars: usize) -> Result<(), TreeServiceError> {
    normalize_name(name, max_chars)
        .map(|_| ())
        .ok_or(TreeServiceError::InvalidDisplayName)
}
