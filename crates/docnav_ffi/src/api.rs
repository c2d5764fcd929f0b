//! FFI use-case API for the Flutter sidebar.
//!
//! # Responsibility
//! - Expose the tree engine to Dart via FRB as sync JSON-in/JSON-out calls.
//! - Hold one process-wide `TreeSession` for the stateful sidebar flow.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Failures come back as `ok = false` envelopes with a readable message.
//! - JSON payloads use the same wire shapes as the core serde types.

use docnav_core::{
    build_tree, core_version as core_version_inner, init_logging as init_logging_inner,
    keep_all_documents, move_targets, prune_empty_folders, resolve_neighbors, EngineConfig,
    FlatNode, SelectionMode, Tree, TreeAction, TreeSession,
};
use log::warn;
use serde::Serialize;
use std::sync::{Mutex, OnceLock};

static SESSION: OnceLock<Mutex<TreeSession>> = OnceLock::new();

/// Response envelope for every tree call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeResponse {
    /// Whether the call succeeded.
    pub ok: bool,
    /// JSON result on success (tree, request, payload or id list).
    pub json: Option<String>,
    /// Human-readable message for diagnostics/UI.
    pub message: String,
}

impl TreeResponse {
    fn success(message: impl Into<String>, value: &impl Serialize) -> Self {
        match serde_json::to_string(value) {
            Ok(json) => Self {
                ok: true,
                json: Some(json),
                message: message.into(),
            },
            Err(err) => Self::failure(format!("response encoding failed: {err}")),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            json: None,
            message: message.into(),
        }
    }
}

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes engine logging once per process.
///
/// # FFI contract
/// - Sync call; may create `log_dir`.
/// - Idempotent for the same `level + log_dir`.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Converts a flat JSON node list into nested tree JSON.
///
/// # FFI contract
/// - Stateless; does not touch the session.
/// - Malformed records are recovered by the converter, malformed JSON fails.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_build(records_json: String) -> TreeResponse {
    match parse_tree(&records_json) {
        Ok(tree) => TreeResponse::success("Tree built.", &tree),
        Err(message) => TreeResponse::failure(message),
    }
}

/// Builds a directory picker from a flat list.
///
/// Without `moving_id` the view keeps folders that lead to a document.
/// With it, the view is folder-only and hides that node's subtree.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_picker(records_json: String, moving_id: Option<String>) -> TreeResponse {
    let tree = match parse_tree(&records_json) {
        Ok(tree) => tree,
        Err(message) => return TreeResponse::failure(message),
    };
    let view = match moving_id.as_deref() {
        Some(moving_id) => move_targets(&tree, Some(moving_id)),
        None => prune_empty_folders(&tree, keep_all_documents),
    };
    TreeResponse::success("Picker built.", &view)
}

/// Resolves `(parent, prev, next)` for `id` in a flat list.
#[flutter_rust_bridge::frb(sync)]
pub fn tree_neighbors(records_json: String, id: String) -> TreeResponse {
    let tree = match parse_tree(&records_json) {
        Ok(tree) => tree,
        Err(message) => return TreeResponse::failure(message),
    };
    match resolve_neighbors(&tree, id.trim()) {
        Some(payload) => TreeResponse::success("Neighbors resolved.", &payload),
        None => TreeResponse::failure(format!("tree node not found: {}", id.trim())),
    }
}

/// Loads a flat list into the shared session.
///
/// `config_json` may be empty to use defaults.
#[flutter_rust_bridge::frb(sync)]
pub fn session_load(records_json: String, config_json: String) -> TreeResponse {
    let config = if config_json.trim().is_empty() {
        EngineConfig::default()
    } else {
        match EngineConfig::from_json_str(&config_json) {
            Ok(config) => config,
            Err(err) => return TreeResponse::failure(err.to_string()),
        }
    };
    let records = match parse_records(&records_json) {
        Ok(records) => records,
        Err(message) => return TreeResponse::failure(message),
    };
    with_session(|session| {
        *session = TreeSession::new(config);
        session.load(records);
        TreeResponse::success("Session loaded.", session.tree())
    })
}

/// Applies one context-menu action and returns the persistence request JSON.
#[flutter_rust_bridge::frb(sync)]
pub fn session_apply(target_id: Option<String>, action_json: String) -> TreeResponse {
    let action = match serde_json::from_str::<TreeAction>(&action_json) {
        Ok(action) => action,
        Err(err) => return TreeResponse::failure(format!("invalid action json: {err}")),
    };
    with_session(|session| match session.apply(target_id.as_deref(), action) {
        Ok(request) => TreeResponse::success("Action applied.", &request),
        Err(err) => TreeResponse::failure(err.to_string()),
    })
}

/// Moves a node and returns the move request JSON for the backend.
///
/// A blank `parent_id` moves the node to root level.
#[flutter_rust_bridge::frb(sync)]
pub fn session_move(id: String, parent_id: Option<String>, index: u32) -> TreeResponse {
    let index = usize::try_from(index).unwrap_or(usize::MAX);
    let parent_id = parent_id
        .as_deref()
        .map(str::trim)
        .filter(|parent_id| !parent_id.is_empty());
    with_session(
        |session| match session.move_node(id.trim(), parent_id, index) {
            Ok(request) => TreeResponse::success("Node moved.", &request),
            Err(err) => TreeResponse::failure(err.to_string()),
        },
    )
}

/// Restores the snapshot from before the last committed edit.
#[flutter_rust_bridge::frb(sync)]
pub fn session_rollback() -> TreeResponse {
    with_session(|session| {
        if session.rollback() {
            TreeResponse::success("Rolled back.", session.tree())
        } else {
            TreeResponse::failure("nothing to roll back")
        }
    })
}

/// Current session snapshot as nested tree JSON.
#[flutter_rust_bridge::frb(sync)]
pub fn session_tree() -> TreeResponse {
    with_session(|session| TreeResponse::success("Tree snapshot.", session.tree()))
}

/// Toggles one node and returns the selected id list.
#[flutter_rust_bridge::frb(sync)]
pub fn selection_toggle(id: String) -> TreeResponse {
    with_session(|session| match session.toggle_selection(id.trim()) {
        Ok(selection) => TreeResponse::success("Selection updated.", selection),
        Err(err) => TreeResponse::failure(err.to_string()),
    })
}

/// Switches selection mode (`independent|cascading|relative`).
#[flutter_rust_bridge::frb(sync)]
pub fn selection_set_mode(mode: String) -> TreeResponse {
    let mode = match serde_json::from_value::<SelectionMode>(serde_json::Value::String(
        mode.trim().to_ascii_lowercase(),
    )) {
        Ok(mode) => mode,
        Err(err) => return TreeResponse::failure(format!("invalid selection mode: {err}")),
    };
    with_session(|session| {
        session.set_selection_mode(mode);
        TreeResponse::success("Selection mode updated.", session.selection())
    })
}

/// Selected document ids in tree order.
#[flutter_rust_bridge::frb(sync)]
pub fn selection_documents() -> TreeResponse {
    with_session(|session| {
        TreeResponse::success("Selected documents.", &session.selected_documents())
    })
}

fn parse_records(records_json: &str) -> Result<Vec<FlatNode>, String> {
    serde_json::from_str(records_json).map_err(|err| format!("invalid node list json: {err}"))
}

fn parse_tree(records_json: &str) -> Result<Tree, String> {
    parse_records(records_json).map(build_tree)
}

fn with_session(f: impl FnOnce(&mut TreeSession) -> TreeResponse) -> TreeResponse {
    let lock = SESSION.get_or_init(|| Mutex::new(TreeSession::default()));
    match lock.lock() {
        Ok(mut session) => f(&mut session),
        Err(_) => {
            warn!("event=session_lock module=ffi status=error reason=poisoned");
            TreeResponse::failure("tree session is unavailable")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, init_logging, selection_documents, selection_toggle, session_apply,
        session_load, session_move, session_rollback, tree_build, tree_neighbors, tree_picker,
    };
    use serde_json::{json, Value};

    fn records() -> String {
        json!([
            {"id": "f1", "type": "folder", "position": 0, "name": "Guides"},
            {"id": "d1", "type": "document", "parent_id": "f1", "position": 0},
            {"id": "d2", "type": "doc", "parent_id": "f1", "position": 1},
            {"id": "empty", "type": "folder", "position": 1}
        ])
        .to_string()
    }

    fn payload(json: Option<String>) -> Value {
        serde_json::from_str(&json.expect("success carries json")).expect("valid json")
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_bad_input() {
        assert!(!init_logging("info".to_string(), String::new()).is_empty());
        assert!(!init_logging("verbose".to_string(), "/tmp/docnav".to_string()).is_empty());
    }

    #[test]
    fn tree_build_accepts_fractional_and_null_positions() {
        let records = json!([
            {"id": "b", "type": "document", "position": 1.5},
            {"id": "a", "type": "document", "position": null},
            {"id": "c", "type": "document", "position": 2}
        ])
        .to_string();
        let response = tree_build(records);
        assert!(response.ok, "{}", response.message);
        let tree = payload(response.json);
        assert_eq!(tree[0]["id"], "a");
        assert_eq!(tree[1]["position"], json!(1.5));
        assert_eq!(tree[2]["id"], "c");
    }

    #[test]
    fn tree_build_nests_children_and_rejects_bad_json() {
        let response = tree_build(records());
        assert!(response.ok, "{}", response.message);
        let tree = payload(response.json);
        assert_eq!(tree[0]["children"][1]["id"], "d2");
        assert!(tree[0]["children"][0].get("children").is_none());

        let response = tree_build("not json".to_string());
        assert!(!response.ok);
        assert!(response.message.contains("invalid node list json"));
    }

    #[test]
    fn picker_drops_empty_folders_and_moving_subtree() {
        let documents = payload(tree_picker(records(), None).json);
        assert_eq!(documents.as_array().map(Vec::len), Some(1));

        let targets = payload(tree_picker(records(), Some("f1".to_string())).json);
        assert_eq!(targets[0]["id"], "empty");
    }

    #[test]
    fn neighbors_report_missing_node() {
        let response = tree_neighbors(records(), "d2".to_string());
        assert_eq!(payload(response.json)["prev_id"], "d1");
        assert!(!tree_neighbors(records(), "ghost".to_string()).ok);
    }

    #[test]
    fn session_flow_applies_moves_selects_and_rolls_back() {
        let loaded = session_load(records(), String::new());
        assert!(loaded.ok, "{}", loaded.message);

        let renamed = session_apply(
            Some("d1".to_string()),
            json!({"action": "rename", "value": " Intro "}).to_string(),
        );
        assert_eq!(payload(renamed.json)["op"], "update");

        let moved = session_move("d2".to_string(), Some("empty".to_string()), 0);
        let request = payload(moved.json);
        assert_eq!(request["op"], "move");
        assert_eq!(request["parent_id"], "empty");
        assert!(request["prev_id"].is_null());

        assert!(session_rollback().ok);

        let to_root = session_move("d1".to_string(), Some("  ".to_string()), 0);
        assert!(to_root.ok, "{}", to_root.message);
        let request = payload(to_root.json);
        assert!(request["parent_id"].is_null());
        assert_eq!(request["next_id"], "f1");
        assert!(session_rollback().ok);

        let selected = payload(selection_toggle("f1".to_string()).json);
        assert_eq!(selected, json!(["d1", "d2", "f1"]));
        assert_eq!(payload(selection_documents().json), json!(["d1", "d2"]));

        let refused = session_apply(None, json!({"action": "delete"}).to_string());
        assert!(!refused.ok);
    }
}
