//! Integration tests: selection state machine and overlay geometry.

use easel_core::{NodeId, NodeKind, SceneNode, Stage};
use easel_editor::events::{MouseOut, SelectedChanged};
use easel_editor::{Anchor, Editor, EditorConfig, Modifiers, PointerButton, PointerEvent, SelectorState, Target};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

fn editor_with(config: EditorConfig) -> Editor {
    let _ = env_logger::builder().is_test(true).try_init();
    Editor::new(config).unwrap()
}

fn editor() -> Editor {
    editor_with(EditorConfig::default())
}

fn id(s: &str) -> NodeId {
    NodeId::intern(s)
}

fn square(name: &str, size: f64, x: f64, y: f64) -> SceneNode {
    SceneNode::new(id(name), NodeKind::rect(size, size)).at(x, y)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn record_changes(ed: &Editor) -> Rc<RefCell<Vec<Vec<NodeId>>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    ed.app.on(move |e: &SelectedChanged| {
        sink.borrow_mut().push(e.selected.clone());
        Ok(())
    });
    log
}

fn click(ed: &Editor, event: PointerEvent) {
    ed.app.pointer_down(event);
    ed.app.pointer_up(event);
}

fn same_set(mut a: Vec<NodeId>, mut b: Vec<NodeId>) -> bool {
    a.sort();
    b.sort();
    a == b
}

// ─── Selection set ──────────────────────────────────────────────────────

#[test]
fn selecting_the_same_set_twice_publishes_once() {
    let ed = editor();
    ed.app
        .add(vec![square("twice_a", 10.0, 0.0, 0.0), square("twice_b", 10.0, 20.0, 0.0)])
        .unwrap();
    let log = record_changes(&ed);

    assert!(ed.selector.select(&[id("twice_a"), id("twice_b")]));
    assert!(!ed.selector.select(&[id("twice_b"), id("twice_a")]));
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn removing_the_only_selected_node_clears_the_selection() {
    let ed = editor();
    let a = id("only_a");
    ed.app.add(vec![square("only_a", 10.0, 0.0, 0.0)]).unwrap();
    ed.selector.select(&[a]);
    let log = record_changes(&ed);

    ed.app.remove(&[a]);
    assert!(ed.selector.selected().is_empty());
    assert!(ed.selector.highlight(a).is_none());
    assert!(ed.selector.handles().is_none());
    assert_eq!(*log.borrow(), vec![Vec::<NodeId>::new()]);
}

#[test]
fn undoing_an_add_drops_the_node_from_the_selection() {
    let ed = editor();
    let a = id("undo_sel_a");
    let b = id("undo_sel_b");
    ed.app.add(vec![square("undo_sel_a", 10.0, 0.0, 0.0)]).unwrap();
    ed.app.add(vec![square("undo_sel_b", 10.0, 20.0, 0.0)]).unwrap();
    ed.selector.select(&[a, b]);

    assert!(ed.history.undo());
    assert_eq!(ed.selector.selected(), vec![a]);

    // Redo brings the node back unselected and not draggable.
    assert!(ed.history.redo());
    assert!(!ed.app.node(b).unwrap().draggable);
    assert_eq!(ed.selector.selected(), vec![a]);
}

#[test]
fn select_all_takes_every_top_level_node() {
    let ed = editor();
    ed.app
        .add(vec![square("all_a", 10.0, 0.0, 0.0), square("all_b", 10.0, 20.0, 0.0)])
        .unwrap();
    assert!(ed.selector.select_all());
    assert_eq!(ed.selector.selected(), vec![id("all_a"), id("all_b")]);
}

// ─── Pointer gestures ───────────────────────────────────────────────────

#[test]
fn rubber_band_selects_intersecting_nodes_only() {
    let ed = editor();
    ed.app
        .add(vec![
            square("band_a", 10.0, 0.0, 0.0),
            square("band_b", 10.0, 50.0, 0.0),
            square("band_c", 10.0, 0.0, 50.0),
        ])
        .unwrap();

    let drag = |ed: &Editor| {
        ed.app.pointer_down(PointerEvent::primary(-5.0, -5.0));
        assert_eq!(ed.selector.state(), SelectorState::RubberBanding);
        ed.app.pointer_move(PointerEvent::primary(15.0, 65.0));
        assert!(ed.selector.rubber_band().is_some());
        ed.app.pointer_up(PointerEvent::primary(15.0, 65.0));
        assert_eq!(ed.selector.state(), SelectorState::Idle);
        assert!(ed.selector.rubber_band().is_none());
    };

    drag(&ed);
    assert!(same_set(ed.selector.selected(), vec![id("band_a"), id("band_c")]));

    // Stacking order does not matter.
    ed.selector.cancel_select(&[]);
    ed.app.move_top(&[id("band_a")]);
    ed.app.move_bottom(&[id("band_c")]);
    drag(&ed);
    assert!(same_set(ed.selector.selected(), vec![id("band_a"), id("band_c")]));
}

#[test]
fn rubber_band_replaces_the_previous_selection() {
    let ed = editor();
    ed.app
        .add(vec![square("rep_a", 10.0, 0.0, 0.0), square("rep_b", 10.0, 100.0, 100.0)])
        .unwrap();
    ed.selector.select(&[id("rep_b")]);
    let log = record_changes(&ed);

    ed.app.pointer_down(PointerEvent::primary(-5.0, -5.0));
    ed.app.pointer_move(PointerEvent::primary(20.0, 20.0));
    ed.app.pointer_up(PointerEvent::primary(20.0, 20.0));
    assert_eq!(ed.selector.selected(), vec![id("rep_a")]);
    // Cleared on press, replaced on release.
    assert_eq!(*log.borrow(), vec![vec![], vec![id("rep_a")]]);
}

#[test]
fn click_selects_and_replaces() {
    let ed = editor();
    ed.app
        .add(vec![square("click_a", 20.0, 0.0, 0.0), square("click_b", 20.0, 40.0, 0.0)])
        .unwrap();
    click(&ed, PointerEvent::primary(10.0, 10.0));
    assert_eq!(ed.selector.selected(), vec![id("click_a")]);
    click(&ed, PointerEvent::primary(50.0, 10.0));
    assert_eq!(ed.selector.selected(), vec![id("click_b")]);
}

#[test]
fn shift_click_on_a_selected_node_removes_only_that_node() {
    let ed = editor();
    ed.app
        .add(vec![
            square("sh_a", 20.0, 0.0, 0.0),
            square("sh_b", 20.0, 40.0, 0.0),
            square("sh_c", 20.0, 80.0, 0.0),
        ])
        .unwrap();
    ed.selector.select(&[id("sh_a"), id("sh_b"), id("sh_c")]);

    click(&ed, PointerEvent::primary(50.0, 10.0).with_modifiers(Modifiers::SHIFT));
    assert_eq!(ed.selector.selected(), vec![id("sh_a"), id("sh_c")]);
    assert!(!ed.app.node(id("sh_b")).unwrap().draggable);
}

#[test]
fn clicking_a_transform_anchor_keeps_the_selection() {
    let ed = editor();
    ed.app
        .add(vec![square("anc_a", 10.0, 0.0, 0.0), square("anc_b", 10.0, 20.0, 0.0)])
        .unwrap();
    ed.selector.select(&[id("anc_a"), id("anc_b")]);
    let log = record_changes(&ed);

    let corner = ed.selector.handles().unwrap().position(Anchor::TopLeft).unwrap();
    assert!(close(corner.x, 0.0) && close(corner.y, 0.0));
    // Inside both the anchor and anc_a.
    let press = PointerEvent::primary(2.0, 2.0);
    ed.app.pointer_down(press);
    assert_eq!(ed.selector.state(), SelectorState::Transforming);
    ed.app.pointer_up(press);

    assert_eq!(ed.selector.selected(), vec![id("anc_a"), id("anc_b")]);
    assert!(log.borrow().is_empty());
    assert_eq!(ed.history.history().len(), 1);

    // The next plain click on a node selects again.
    click(&ed, PointerEvent::primary(23.0, 5.0));
    assert_eq!(ed.selector.selected(), vec![id("anc_b")]);
}

#[test]
fn shift_click_without_multiple_select_replaces() {
    let mut config = EditorConfig::default();
    config.selector.multiple_select = false;
    let ed = editor_with(config);
    ed.app
        .add(vec![square("single_a", 20.0, 0.0, 0.0), square("single_b", 20.0, 40.0, 0.0)])
        .unwrap();
    click(&ed, PointerEvent::primary(10.0, 10.0));
    click(&ed, PointerEvent::primary(50.0, 10.0).with_modifiers(Modifiers::SHIFT));
    assert_eq!(ed.selector.selected(), vec![id("single_b")]);
}

#[test]
fn clicking_a_grouped_leaf_selects_the_top_group() {
    let ed = editor();
    ed.app
        .add(vec![square("grp_a", 20.0, 0.0, 0.0), square("grp_b", 20.0, 40.0, 0.0)])
        .unwrap();
    let inner = ed.app.make_group(&[id("grp_a"), id("grp_b")]).unwrap().unwrap();
    let outer = ed.app.make_group(&[inner]).unwrap().unwrap();

    click(&ed, PointerEvent::primary(10.0, 10.0));
    assert_eq!(ed.selector.selected(), vec![outer]);

    let handles = ed.selector.handles().unwrap();
    assert!(!handles.is_visible(Anchor::MiddleLeft));
    assert!(handles.is_visible(Anchor::BottomRight));
}

#[test]
fn secondary_button_does_not_select() {
    let ed = editor();
    ed.app.add(vec![square("sec_a", 20.0, 0.0, 0.0)]).unwrap();
    click(&ed, PointerEvent::primary(10.0, 10.0).with_button(PointerButton::Secondary));
    assert!(ed.selector.selected().is_empty());
}

#[test]
fn leaving_the_canvas_cancels_a_band_only_when_released() {
    let ed = editor();
    ed.app.pointer_down(PointerEvent::primary(0.0, 0.0));
    ed.app.pointer_leave(PointerEvent::primary(-1.0, 0.0));
    assert_eq!(ed.selector.state(), SelectorState::RubberBanding);

    ed.app.publish(&MouseOut {
        event: PointerEvent::primary(-1.0, 0.0),
        target: Target::Stage,
        primary_held: false,
    });
    assert_eq!(ed.selector.state(), SelectorState::Idle);
}

#[test]
fn disabling_the_selector_stops_gestures() {
    let ed = editor();
    ed.app.add(vec![square("off_a", 20.0, 0.0, 0.0)]).unwrap();
    ed.app.pointer_down(PointerEvent::primary(100.0, 100.0));
    assert!(!ed.selector.trigger_selector(Some(false)));
    assert_eq!(ed.selector.state(), SelectorState::Idle);

    click(&ed, PointerEvent::primary(10.0, 10.0));
    assert!(ed.selector.selected().is_empty());
}

// ─── Geometry ───────────────────────────────────────────────────────────

#[test]
fn rotated_node_overlay_keeps_its_size_and_rotation() {
    let mut config = EditorConfig::default();
    config.selector.highlight.padding = 0.0;
    let ed = editor_with(config);
    let n = id("rot45");
    ed.app
        .add(vec![SceneNode::new(n, NodeKind::rect(10.0, 10.0)).rotated(45.0)])
        .unwrap();
    ed.selector.select(&[n]);

    let overlay = ed.selector.highlight(n).unwrap();
    assert!(close(overlay.width, 10.0) && close(overlay.height, 10.0));
    assert!(close(overlay.rotation, 45.0));

    let frame = ed.selector.handles().unwrap().frame;
    assert!(close(frame.width, 10.0) && close(frame.height, 10.0));
    assert!(close(frame.rotation, 45.0));

    // The client rect is the axis-aligned box of the rotated square.
    let client = ed.selector.selection_client_rect().unwrap();
    assert!(close(client.width(), 200f64.sqrt()));
}

#[test]
fn overlay_recompute_is_coalesced_per_frame() {
    let ed = editor();
    let n = id("coal_a");
    ed.app.add(vec![square("coal_a", 10.0, 0.0, 0.0)]).unwrap();
    ed.selector.select(&[n]);
    let before = ed.selector.highlight(n).unwrap();

    for step in 1..=10 {
        ed.app.update(&[n], |node| node.attrs.x = f64::from(step));
    }
    assert_eq!(ed.selector.pending_overlays(), vec![n]);
    assert_eq!(ed.selector.highlight(n).unwrap(), before);
    assert!(ed.app.frame_requested());

    assert!(ed.app.tick());
    assert!(close(ed.selector.highlight(n).unwrap().x, before.x + 10.0));
    assert!(!ed.app.tick());
}

#[test]
fn zoom_keeps_highlight_padding_in_screen_pixels() {
    let ed = editor();
    let n = id("zoom_a");
    ed.app.add(vec![square("zoom_a", 10.0, 0.0, 0.0)]).unwrap();
    ed.selector.select(&[n]);
    assert!(close(ed.selector.highlight(n).unwrap().x, -2.0));

    ed.app.set_stage(Stage::new(30.0, 40.0, 2.0));
    assert!(ed.app.tick());
    let overlay = ed.selector.highlight(n).unwrap();
    assert!(close(overlay.x, -1.0) && close(overlay.y, -1.0));
    assert!(close(overlay.width, 12.0));
}

#[test]
fn group_member_change_refreshes_the_group_overlay() {
    let ed = editor();
    ed.app
        .add(vec![square("gm_a", 10.0, 0.0, 0.0), square("gm_b", 10.0, 20.0, 0.0)])
        .unwrap();
    let group = ed.app.make_group(&[id("gm_a"), id("gm_b")]).unwrap().unwrap();
    ed.selector.select(&[group]);
    let before = ed.selector.highlight(group).unwrap();

    ed.app.update(&[id("gm_b")], |node| node.attrs.x = 40.0);
    assert_eq!(ed.selector.pending_overlays(), vec![group]);
    ed.app.tick();
    let after = ed.selector.highlight(group).unwrap();
    assert!(close(after.width, before.width + 20.0));
    assert!(close(after.rotation, 0.0));
}
