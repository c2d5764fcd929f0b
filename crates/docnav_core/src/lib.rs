//! Document tree engine for the knowledge-base sidebar.
//!
//! Converts the backend's flat node list into an ordered snapshot, and offers
//! the edit, prune, selection and move helpers the sidebar is built on.

pub mod config;
pub mod logging;
pub mod model;
pub mod service;
pub mod tree;

pub use config::{ConfigError, EngineConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::node::{FlatNode, NodeId, NodeKind, Tree, TreeNode, Visibility};
pub use service::tree_service::{TreeServiceError, TreeSession};
pub use tree::action::{apply_action, ActionOutcome, PersistRequest, TreeAction};
pub use tree::convert::{build_tree, flatten_tree};
pub use tree::invariants::{check_invariants, check_sibling_order, InvariantViolation};
pub use tree::mutate::{insert_child, remove, rename, replace, set_emoji, set_visibility, NodePatch};
pub use tree::order::{check_move, move_node, resolve_neighbors, MovePayload, MoveRejection};
pub use tree::prune::{keep_all_documents, move_targets, prune_empty_folders};
pub use tree::selection::{
    normalize_selection, retain_known, selected_documents, toggle_selection, Selection,
    SelectionMode,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
