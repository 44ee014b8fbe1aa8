//! Integration tests: history recording and replay through a full session.
//!
//! Every mutation goes through `App`, the history plugin records it from the
//! bus, and undo/redo replay it back through the session.

use easel_core::{NodeId, NodeKind, SceneNode};
use easel_editor::{CommandKind, Editor, EditorConfig, HistoryDestroy, HistoryPlugin, Plugin, PointerEvent};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

fn editor(stack_size: usize) -> Editor {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut config = EditorConfig::default();
    config.history.stack_size = stack_size;
    Editor::new(config).unwrap()
}

fn id(s: &str) -> NodeId {
    NodeId::intern(s)
}

fn rect(name: &str, x: f64, y: f64) -> SceneNode {
    SceneNode::new(id(name), NodeKind::rect(10.0, 10.0)).at(x, y)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

// ─── Stack semantics ────────────────────────────────────────────────────

#[test]
fn modify_round_trip_restores_initial_state() {
    let ed = editor(50);
    let n = id("rt_node");
    ed.app.add(vec![rect("rt_node", 0.0, 0.0)]).unwrap();
    let initial = ed.app.snapshots(&[n]);

    for i in 1..=5 {
        ed.app.update(&[n], |node| {
            node.attrs.x += 10.0;
            node.attrs.rotation = 15.0 * f64::from(i);
        });
    }
    assert_eq!(ed.history.history().undo_len(), 6);

    for _ in 0..5 {
        assert!(ed.history.undo());
    }
    assert_eq!(ed.app.snapshots(&[n]), initial);
}

#[test]
fn can_undo_and_can_redo_track_the_pointer() {
    let ed = editor(50);
    assert!(!ed.history.can_undo());
    assert!(!ed.history.can_redo());
    assert!(!ed.history.undo());
    assert!(!ed.history.redo());

    ed.app.add(vec![rect("cu_a", 0.0, 0.0)]).unwrap();
    assert!(ed.history.can_undo());
    assert!(!ed.history.can_redo());

    assert!(ed.history.undo());
    assert!(!ed.history.can_undo());
    assert!(ed.history.can_redo());

    assert!(ed.history.redo());
    assert!(ed.history.can_undo());
    assert!(!ed.history.can_redo());
}

#[test]
fn new_command_after_undo_prunes_redo() {
    let ed = editor(50);
    ed.app.add(vec![rect("pr_a", 0.0, 0.0)]).unwrap();
    ed.app.add(vec![rect("pr_b", 20.0, 0.0)]).unwrap();
    assert!(ed.history.undo());
    assert!(ed.history.can_redo());

    ed.app.add(vec![rect("pr_c", 40.0, 0.0)]).unwrap();
    assert!(!ed.history.can_redo());
    assert!(!ed.history.redo());
    let history = ed.history.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history.commands()[1].node_ids(), vec![id("pr_c")]);
}

#[test]
fn capacity_two_evicts_the_oldest_add() {
    let ed = editor(2);
    for name in ["cap_x", "cap_y", "cap_z"] {
        ed.app.add(vec![rect(name, 0.0, 0.0)]).unwrap();
    }
    {
        let history = ed.history.history();
        let recorded: Vec<Vec<NodeId>> = history.commands().iter().map(|c| c.node_ids()).collect();
        assert_eq!(recorded, vec![vec![id("cap_y")], vec![id("cap_z")]]);
    }

    assert!(ed.history.undo());
    assert!(ed.app.contains(id("cap_x")));
    assert!(ed.app.contains(id("cap_y")));
    assert!(!ed.app.contains(id("cap_z")));

    assert!(ed.history.undo());
    assert!(ed.app.contains(id("cap_x")));
    assert!(!ed.app.contains(id("cap_y")));

    // Add(X) was evicted and cannot be reached.
    assert!(!ed.history.can_undo());
    assert!(!ed.history.undo());
    assert!(ed.app.contains(id("cap_x")));
    // Replays are not recorded again.
    assert_eq!(ed.history.history().len(), 2);
}

#[test]
fn disabled_history_still_mutates_and_keeps_the_stack() {
    let ed = editor(50);
    ed.app.add(vec![rect("dis_a", 0.0, 0.0)]).unwrap();

    assert!(ed.app.disable_plugin(HistoryPlugin::NAME));
    assert!(!ed.history.is_enabled());
    ed.app.add(vec![rect("dis_b", 20.0, 0.0)]).unwrap();
    assert!(ed.app.contains(id("dis_b")));
    assert_eq!(ed.history.history().len(), 1);

    assert!(ed.app.enable_plugin(HistoryPlugin::NAME));
    assert!(ed.history.undo());
    assert!(!ed.app.contains(id("dis_a")));
    assert!(ed.app.contains(id("dis_b")));
}

// ─── Removal and z-order ────────────────────────────────────────────────

#[test]
fn undo_remove_restores_z_order() {
    let ed = editor(50);
    let names = ["zr_1", "zr_2", "zr_3", "zr_4"];
    ed.app
        .add(names.iter().enumerate().map(|(i, n)| rect(n, i as f64 * 20.0, 0.0)).collect())
        .unwrap();
    let order = ed.app.scene().top_level_ids();

    let removed = ed.app.remove(&[id("zr_3"), id("zr_2")]);
    assert_eq!(removed.len(), 2);
    assert_eq!(ed.app.scene().top_level_ids(), vec![id("zr_1"), id("zr_4")]);

    assert!(ed.history.undo());
    assert_eq!(ed.app.scene().top_level_ids(), order);
    assert!(ed.history.redo());
    assert_eq!(ed.app.scene().top_level_ids(), vec![id("zr_1"), id("zr_4")]);
}

#[test]
fn z_order_moves_are_undoable() {
    let ed = editor(50);
    ed.app
        .add(vec![rect("zm_1", 0.0, 0.0), rect("zm_2", 0.0, 0.0), rect("zm_3", 0.0, 0.0)])
        .unwrap();
    let order = ed.app.scene().top_level_ids();

    assert!(ed.app.move_top(&[id("zm_1"), id("zm_2")]));
    assert_eq!(ed.app.scene().top_level_ids(), vec![id("zm_3"), id("zm_1"), id("zm_2")]);
    assert_eq!(ed.history.history().commands()[1].kind(), CommandKind::Modify);

    assert!(ed.history.undo());
    assert_eq!(ed.app.scene().top_level_ids(), order);
    assert!(ed.history.redo());
    assert_eq!(ed.app.scene().top_level_ids(), vec![id("zm_3"), id("zm_1"), id("zm_2")]);
}

#[test]
fn clear_is_one_undo_step() {
    let ed = editor(50);
    ed.app
        .add(vec![rect("cl_1", 0.0, 0.0), rect("cl_2", 20.0, 0.0), rect("cl_3", 40.0, 0.0)])
        .unwrap();
    let order = ed.app.scene().top_level_ids();

    assert_eq!(ed.app.clear().len(), 3);
    assert!(ed.app.scene().top_level_ids().is_empty());
    assert!(ed.history.undo());
    assert_eq!(ed.app.scene().top_level_ids(), order);
}

#[test]
fn make_group_undoes_in_two_steps() {
    let ed = editor(50);
    ed.app.add(vec![rect("mg_1", 0.0, 0.0), rect("mg_2", 20.0, 0.0)]).unwrap();
    let group = ed.app.make_group(&[id("mg_1"), id("mg_2")]).unwrap().unwrap();
    assert_eq!(ed.app.scene().top_level_ids(), vec![group]);
    assert_eq!(ed.history.history().len(), 3);

    assert!(ed.history.undo());
    assert!(!ed.app.contains(group));
    assert!(!ed.app.contains(id("mg_1")));

    assert!(ed.history.undo());
    assert_eq!(ed.app.scene().top_level_ids(), vec![id("mg_1"), id("mg_2")]);
}

// ─── Gestures ───────────────────────────────────────────────────────────

#[test]
fn drag_records_one_modify_step() {
    let ed = editor(50);
    let a = id("drag_a");
    ed.app
        .add(vec![SceneNode::new(a, NodeKind::rect(100.0, 100.0))])
        .unwrap();
    assert!(ed.selector.select(&[a]));

    ed.app.pointer_down(PointerEvent::primary(50.0, 50.0));
    ed.app.pointer_move(PointerEvent::primary(55.0, 55.0));
    ed.app.pointer_move(PointerEvent::primary(60.0, 70.0));
    ed.app.pointer_up(PointerEvent::primary(60.0, 70.0));

    {
        let history = ed.history.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history.commands()[1].kind(), CommandKind::Modify);
    }
    let moved = ed.app.node(a).unwrap();
    assert!(close(moved.attrs.x, 10.0) && close(moved.attrs.y, 20.0));

    assert!(ed.history.undo());
    let back = ed.app.node(a).unwrap();
    assert!(close(back.attrs.x, 0.0) && close(back.attrs.y, 0.0));
    // The selection survives attribute replays.
    assert_eq!(ed.selector.selected(), vec![a]);

    assert!(ed.history.redo());
    let again = ed.app.node(a).unwrap();
    assert!(close(again.attrs.x, 10.0) && close(again.attrs.y, 20.0));
}

#[test]
fn corner_resize_is_undoable() {
    let ed = editor(50);
    let a = id("resize_a");
    ed.app
        .add(vec![SceneNode::new(a, NodeKind::rect(100.0, 100.0))])
        .unwrap();
    ed.selector.select(&[a]);

    // Bottom-right anchor sits on the node's corner (no handle padding).
    ed.app.pointer_down(PointerEvent::primary(100.0, 100.0));
    ed.app.pointer_move(PointerEvent::primary(150.0, 150.0));
    ed.app.pointer_up(PointerEvent::primary(150.0, 150.0));

    let resized = ed.app.node(a).unwrap();
    assert!(close(resized.attrs.scale_x, 1.5) && close(resized.attrs.scale_y, 1.5));
    assert!(close(resized.attrs.x, 0.0) && close(resized.attrs.y, 0.0));

    assert!(ed.history.undo());
    let back = ed.app.node(a).unwrap();
    assert!(close(back.attrs.scale_x, 1.0) && close(back.attrs.scale_y, 1.0));
}

#[test]
fn click_without_movement_records_nothing() {
    let ed = editor(50);
    let a = id("still_a");
    ed.app
        .add(vec![SceneNode::new(a, NodeKind::rect(100.0, 100.0))])
        .unwrap();
    ed.selector.select(&[a]);
    ed.app.pointer_down(PointerEvent::primary(50.0, 50.0));
    ed.app.pointer_up(PointerEvent::primary(50.0, 50.0));
    assert_eq!(ed.history.history().len(), 1);
}

// ─── Lifecycle ──────────────────────────────────────────────────────────

#[test]
fn dispose_detaches_and_announces() {
    let ed = editor(50);
    let destroyed = Rc::new(RefCell::new(0));
    let count = Rc::clone(&destroyed);
    ed.app.on(move |_: &HistoryDestroy| {
        *count.borrow_mut() += 1;
        Ok(())
    });
    ed.app.add(vec![rect("disp_a", 0.0, 0.0)]).unwrap();

    ed.history.dispose();
    assert_eq!(*destroyed.borrow(), 1);
    assert!(ed.history.history().is_empty());

    ed.app.add(vec![rect("disp_b", 0.0, 0.0)]).unwrap();
    assert!(ed.history.history().is_empty());
    assert!(!ed.history.undo());

    // Disposing the session afterwards does not announce twice.
    ed.app.dispose();
    assert_eq!(*destroyed.borrow(), 1);
}
