//! End-to-end flows through `CanvasStore`.

use pretty_assertions::assert_eq;
use rcgraph::id::SequentialIds;
use rcgraph::persist::{Credential, MemorySnippetStore, RemoteTarget, SnippetStore};
use rcgraph::tree::{self, NodeKind};
use rcgraph::{
    CanvasStore, EngineError, LayoutConfig, LinkDirection, Metadata, NodeId, NodePatch,
    Orientation, Position, PolicyViolation, ShellType, Template, envelope,
};
use std::sync::Arc;

fn store() -> CanvasStore {
    CanvasStore::with_ids(LayoutConfig::default(), Box::new(SequentialIds::new()))
}

fn levels(store: &CanvasStore) -> Vec<u32> {
    tree::ids(store.tree())
        .iter()
        .filter_map(|id| store.state().node(id).map(|n| n.level))
        .collect()
}

/// main -> injector -> (partial, partial), plus a second injector.
fn five_nodes(store: &mut CanvasStore) -> (NodeId, NodeId, NodeId, NodeId) {
    let inj = store.add_node(NodeKind::Injector, "env", None, None).unwrap();
    let a = store.add_node(NodeKind::Partial, "path", Some(&inj), None).unwrap();
    let b = store.add_node(NodeKind::Partial, "editor", Some(&inj), None).unwrap();
    let other = store.add_node(NodeKind::Injector, "aliases", None, None).unwrap();
    (inj, a, b, other)
}

#[test]
fn scenario_a_add_injector_then_partial() {
    let mut s = store();
    let inj = s.add_node(NodeKind::Injector, "env", None, None).unwrap();
    let p = s.add_node(NodeKind::Partial, "path", Some(&inj), None).unwrap();

    assert_eq!(tree::node_count(s.tree()), 3);
    assert_eq!(levels(&s), vec![0, 1, 2]);
    assert_eq!(s.state().positions.len(), 3);
    assert!(s.state().position(&p).is_some());
    assert!(s.state().has_unsaved_changes);
}

#[test]
fn scenario_b_partial_cannot_move_under_main() {
    let mut s = store();
    let inj = s.add_node(NodeKind::Injector, "env", None, None).unwrap();
    let p = s.add_node(NodeKind::Partial, "path", Some(&inj), None).unwrap();
    let before = Arc::clone(s.tree());

    s.start_link(&p, LinkDirection::AsChild).unwrap();
    let root = s.tree().id.clone();
    let err = s.click_target(&root).unwrap_err();

    assert_eq!(
        err.as_policy(),
        Some(&PolicyViolation::IncompatibleKinds {
            child: NodeKind::Partial,
            parent: NodeKind::Main,
        })
    );
    assert!(Arc::ptr_eq(s.tree(), &before));
    assert_eq!(tree::find_parent(s.tree(), &p).map(|n| n.id.clone()), Some(inj));
    assert!(s.state().link.is_pending());
}

#[test]
fn scenario_c_duplicate_id_envelope_is_refused() {
    let mut s = store();
    five_nodes(&mut s);
    assert_eq!(tree::node_count(s.tree()), 5);

    let mut value = envelope::export_to_envelope(s.tree(), &s.state().positions)
        .to_value()
        .unwrap();
    let first_id = value["nodes"][0]["children"][0]["id"].clone();
    value["nodes"][0]["children"][1]["id"] = first_id;

    let report = envelope::validate(&value);
    assert!(!report.valid);
    assert!(report.error.unwrap().contains("duplicate node id"));

    let before = s.state().clone();
    let err = s.import_envelope(&value).unwrap_err();
    assert!(matches!(err, EngineError::MalformedEnvelope(_)));
    assert_eq!(s.state(), &before);
}

#[test]
fn scenario_d_removing_injector_removes_its_partials() {
    let mut s = store();
    let (inj, a, b, other) = five_nodes(&mut s);
    s.update_node(&other, NodePatch::connections(vec![a.clone()]))
        .unwrap();

    s.remove_node(&inj).unwrap();

    assert_eq!(tree::node_count(s.tree()), 2);
    for gone in [&inj, &a, &b] {
        assert!(s.state().node(gone).is_none());
        assert!(s.state().position(gone).is_none());
    }
    assert_eq!(s.state().positions.len(), 2);
    assert_eq!(s.state().node(&other).unwrap().connections, Some(vec![]));
}

#[test]
fn reset_twice_equals_reset_once() {
    let mut s = store();
    s.apply_template(Template::Modular, ShellType::Zsh).unwrap();
    let token = Credential::new("t");
    let mut remote = MemorySnippetStore::new(token.clone());
    s.save_config(&mut RemoteTarget::new(&mut remote, token), None)
        .unwrap();

    let first = s.tree().children[0].id.clone();
    s.remove_node(&first).unwrap();
    let root = s.tree().id.clone();
    s.move_node(&root, Position::new(5.0, 5.0)).unwrap();
    assert!(s.state().has_unsaved_changes);

    s.reset().unwrap();
    let once = s.state().clone();
    s.reset().unwrap();

    assert_eq!(s.state(), &once);
    assert!(!s.state().has_unsaved_changes);
    assert!(s.state().node(&first).is_some());
}

#[test]
fn rejected_edits_leave_state_alone() {
    let mut s = store();
    let (inj, a, _, _) = five_nodes(&mut s);
    let before = s.state().clone();

    // Partial cannot parent anything.
    assert!(s.add_node(NodeKind::Injector, "x", Some(&a), None).is_err());
    // Injector under its own partial would be a cycle and a kind violation.
    s.start_link(&inj, LinkDirection::AsChild).unwrap();
    assert!(s.click_target(&a).is_err());
    s.cancel_link().unwrap();
    // Renaming onto an existing id.
    assert!(s.rename_id(&inj, a.clone()).is_err());

    assert_eq!(s.state(), &before);
}

#[test]
fn linking_rewires_and_relevels() {
    let mut s = store();
    let (inj, _, _, other) = five_nodes(&mut s);

    // Make `inj` a child of `other` by starting from `other` as the parent.
    s.start_link(&other, LinkDirection::AsParent).unwrap();
    s.click_target(&inj).unwrap();

    assert!(!s.state().link.is_pending());
    let moved = s.state().node(&inj).unwrap();
    assert_eq!(moved.level, 2);
    assert_eq!(moved.children[0].level, 3);
    assert_eq!(
        tree::find_parent(s.tree(), &inj).map(|n| n.id.clone()),
        Some(other)
    );
}

#[test]
fn remote_save_load_list_delete() {
    let token = Credential::new("secret");
    let mut remote = MemorySnippetStore::new(token.clone());

    let mut s = store();
    s.apply_template(Template::Minimal, ShellType::Fish).unwrap();
    s.set_orientation(Orientation::Horizontal).unwrap();
    let meta = Metadata {
        name: Some("laptop".into()),
        description: Some("fish setup".into()),
        author: None,
    };
    s.save_config(&mut RemoteTarget::new(&mut remote, token.clone()), Some(meta))
        .unwrap();

    let listed = s.list_remote(&remote, &token).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].description, "fish setup");

    let mut fresh = store();
    fresh
        .load_remote(&remote, &listed[0].store_id, &token)
        .unwrap();
    assert_eq!(fresh.tree(), s.tree());
    assert_eq!(fresh.state().orientation, Orientation::Horizontal);
    assert!(!fresh.state().has_unsaved_changes);

    fresh
        .delete_remote(&mut remote, &listed[0].store_id, &token)
        .unwrap();
    assert!(remote.list(&token).unwrap().is_empty());
}

#[test]
fn failed_save_keeps_dirty_flag() {
    let mut s = store();
    s.add_node(NodeKind::Injector, "env", None, None).unwrap();
    let mut remote = MemorySnippetStore::new(Credential::new("right"));

    let err = s
        .save_config(
            &mut RemoteTarget::new(&mut remote, Credential::new("wrong")),
            None,
        )
        .unwrap_err();

    assert!(matches!(err, EngineError::Persistence(_)));
    assert!(s.state().has_unsaved_changes);
    assert_eq!(tree::node_count(&s.state().last_saved_tree), 1);
}

#[test]
fn update_unknown_id_is_silent() {
    let mut s = store();
    let before = s.state().clone();
    s.update_node(&NodeId::from("ghost"), NodePatch::title("x"))
        .unwrap();
    assert_eq!(s.state(), &before);
    assert!(!s.state().has_unsaved_changes);
}

#[test]
fn deep_chain_reloads_from_exported_text() {
    let mut s = store();
    let mut parent: Option<NodeId> = None;
    for i in 0..100 {
        let id = s
            .add_node(NodeKind::Injector, &format!("layer{}", i), parent.as_ref(), None)
            .unwrap();
        parent = Some(id);
    }
    let text = envelope::export_to_envelope(s.tree(), &s.state().positions)
        .to_json_pretty()
        .unwrap();

    let mut fresh = store();
    fresh
        .import_envelope(&envelope::parse_value(&text).unwrap())
        .unwrap();

    assert_eq!(fresh.tree(), s.tree());
    assert_eq!(fresh.state().positions, s.state().positions);
    assert_eq!(fresh.state().node(&parent.unwrap()).unwrap().level, 100);
}
