use docnav_core::{
    check_invariants, init_logging, logging_status, resolve_neighbors, EngineConfig, FlatNode,
    MovePayload, NodeKind, NodePatch, PersistRequest, SelectionMode, TreeAction, TreeServiceError,
    TreeSession, Visibility,
};
use serde_json::json;

fn loaded_session() -> TreeSession {
    let mut session = TreeSession::new(EngineConfig::default());
    session.load(vec![
        FlatNode::new("f1", NodeKind::Folder).named("Guides"),
        FlatNode::new("a", NodeKind::Document).under("f1").at(0),
        FlatNode::new("b", NodeKind::Document).under("f1").at(1),
        FlatNode::new("c", NodeKind::Document).under("f1").at(2),
        FlatNode::new("empty", NodeKind::Folder).at(1),
    ]);
    session
}

fn payload(id: &str, parent: Option<&str>, prev: Option<&str>, next: Option<&str>) -> MovePayload {
    MovePayload {
        id: id.to_string(),
        parent_id: parent.map(str::to_string),
        prev_id: prev.map(str::to_string),
        next_id: next.map(str::to_string),
    }
}

#[test]
fn drop_into_empty_folder_has_no_neighbors() {
    let mut session = loaded_session();
    let request = session.move_node("b", Some("empty"), 0).unwrap();
    assert_eq!(
        request,
        PersistRequest::Move(payload("b", Some("empty"), None, None))
    );
    check_invariants(session.tree()).unwrap();
}

#[test]
fn drop_at_head_points_at_previous_head() {
    let mut session = loaded_session();
    let request = session.move_node("c", Some("f1"), 0).unwrap();
    assert_eq!(
        request,
        PersistRequest::Move(payload("c", Some("f1"), None, Some("a")))
    );
}

#[test]
fn same_rank_drop_reports_current_neighbors() {
    let mut session = loaded_session();
    let before = session.neighbors("b").unwrap();
    let request = session.move_node("b", Some("f1"), 1).unwrap();
    assert_eq!(request, PersistRequest::Move(before));
}

#[test]
fn move_request_serializes_with_op_tag() {
    let mut session = loaded_session();
    let request = session.move_node("a", None, 0).unwrap();
    assert_eq!(
        serde_json::to_value(&request).unwrap(),
        json!({"op": "move", "id": "a", "parent_id": null, "prev_id": null, "next_id": "f1"})
    );
}

#[test]
fn refused_operations_leave_snapshot_untouched() {
    let mut session = loaded_session();
    let before = session.tree().clone();

    assert_eq!(
        session.move_node("f1", Some("f1"), 0),
        Err(TreeServiceError::CycleDetected {
            node_id: "f1".to_string(),
            parent_id: "f1".to_string()
        })
    );
    assert_eq!(
        session.move_node("a", Some("b"), 0),
        Err(TreeServiceError::ParentMustBeFolder("b".to_string()))
    );
    assert_eq!(
        session.move_node("ghost", None, 0),
        Err(TreeServiceError::NodeNotFound("ghost".to_string()))
    );
    assert_eq!(
        session.apply(Some("a"), TreeAction::Rename("\n\t ".to_string())),
        Err(TreeServiceError::InvalidDisplayName)
    );
    assert!(session.tree().is_same_snapshot(&before));
}

#[test]
fn menu_actions_emit_backend_requests() {
    let mut session = loaded_session();

    let created = session
        .apply(
            Some("f1"),
            TreeAction::CreateChild {
                kind: NodeKind::Folder,
                name: None,
            },
        )
        .unwrap();
    let PersistRequest::Create { node } = created else {
        panic!("expected create request");
    };
    assert_eq!(node.name(), Some("Untitled folder"));
    assert_eq!(node.position, 3.0);
    assert!(uuid::Uuid::parse_str(&node.id).is_ok());
    assert_eq!(
        resolve_neighbors(session.tree(), &node.id),
        Some(payload(&node.id, Some("f1"), Some("c"), None))
    );

    let emoji = session
        .apply(Some("f1"), TreeAction::SetEmoji(Some("📚".to_string())))
        .unwrap();
    assert_eq!(
        emoji,
        PersistRequest::Update {
            id: "f1".to_string(),
            patch: NodePatch::emoji(Some("📚")),
        }
    );

    session
        .apply(Some("a"), TreeAction::SetVisibility(Visibility::Public))
        .unwrap();
    assert_eq!(
        session.tree().find("a").and_then(|n| n.node.visibility()),
        Some("public")
    );

    let deleted = session.apply(Some("f1"), TreeAction::Delete).unwrap();
    assert_eq!(
        deleted,
        PersistRequest::Delete {
            id: "f1".to_string()
        }
    );
    assert_eq!(session.tree().node_count(), 1);
}

#[test]
fn rollback_restores_tree_and_prunes_stale_selection() {
    let mut session = loaded_session();
    session.toggle_selection("f1").unwrap();
    let before = session.tree().clone();

    session.apply(Some("c"), TreeAction::Delete).unwrap();
    assert!(session.selection().contains("f1"));
    assert!(!session.selection().contains("c"));

    assert!(session.rollback());
    assert!(session.tree().is_same_snapshot(&before));
    assert!(!session.selection().contains("f1"));
    assert_eq!(session.selected_documents(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn config_from_json_drives_defaults_and_mode() {
    let config = EngineConfig::from_json_str(
        r#"{"selection_mode": "independent", "default_document_name": "New page"}"#,
    )
    .unwrap();
    let mut session = TreeSession::new(config);
    session.load(vec![FlatNode::new("f1", NodeKind::Folder)]);

    let created = session
        .apply(
            None,
            TreeAction::CreateChild {
                kind: NodeKind::Document,
                name: None,
            },
        )
        .unwrap();
    let PersistRequest::Create { node } = created else {
        panic!("expected create request");
    };
    assert_eq!(node.name(), Some("New page"));
    assert_eq!(node.parent_id, None);

    session.toggle_selection("f1").unwrap();
    assert_eq!(session.selection().len(), 1);
    session.set_selection_mode(SelectionMode::Cascading);
    assert!(session.selection().is_empty());
}

#[test]
fn logging_writes_into_temp_dir() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_str().unwrap();
    init_logging("debug", path).unwrap();
    init_logging("debug", path).unwrap();

    let mut session = loaded_session();
    session.move_node("a", Some("empty"), 0).unwrap();

    let (level, active_dir) = logging_status().unwrap();
    assert_eq!(level, "debug");
    assert_eq!(active_dir, dir.path());

    session.load(vec![FlatNode::new("orphan", NodeKind::Document).under("gone")]);
    log::logger().flush();
    let recovered = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|entry| std::fs::read_to_string(entry.unwrap().path()).ok())
        .flat_map(|text| {
            text.lines()
                .filter(|line| line.contains("anomaly=dangling_parent node_id=orphan"))
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    assert_eq!(recovered.len(), 1);
    assert!(recovered[0].contains("WARN"), "{}", recovered[0]);
}
