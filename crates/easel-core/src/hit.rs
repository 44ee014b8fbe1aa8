//! Hit testing: screen point → node, screen rectangle → nodes.
//!
//! Point hits reverse-walk the tree (front-to-back) and test the pointer in
//! each node's local frame, so rotated and scaled shapes hit exactly. Area
//! hits compare axis-aligned client boxes.

use crate::graph::SceneGraph;
use crate::id::NodeId;
use crate::model::rects_overlap;
use crate::stage::Stage;
use kurbo::{Point, Rect};
use petgraph::graph::NodeIndex;

/// Find the topmost evented leaf under `point` (screen space).
/// Returns `None` when only the background is hit.
pub fn hit_test(graph: &SceneGraph, stage: &Stage, point: Point) -> Option<NodeId> {
    let hit = hit_test_node(graph, graph.root, stage, point);
    log::trace!("HIT ({}, {}) -> {:?}", point.x, point.y, hit);
    hit
}

fn hit_test_node(graph: &SceneGraph, idx: NodeIndex, stage: &Stage, point: Point) -> Option<NodeId> {
    for &child in graph.children(idx).iter().rev() {
        let node = &graph.graph[child];
        if !node.evented {
            continue;
        }
        if node.is_group() {
            if let Some(hit) = hit_test_node(graph, child, stage, point) {
                return Some(hit);
            }
            continue;
        }
        let Some(rect) = node.self_rect(false) else {
            continue;
        };
        let Some(abs) = graph.absolute_transform(node.id, stage) else {
            continue;
        };
        if abs.determinant().abs() <= f64::EPSILON {
            continue;
        }
        if rect.contains(abs.inverse() * point) {
            return Some(node.id);
        }
    }
    None
}

/// Top-level evented nodes whose client box overlaps `area` (screen space),
/// bottom first. Used for rubber-band selection: a grouped shape is reported
/// as its group.
pub fn shapes_in_area(graph: &SceneGraph, stage: &Stage, area: Rect) -> Vec<NodeId> {
    let area = area.abs();
    graph
        .children(graph.root)
        .iter()
        .map(|&idx| &graph.graph[idx])
        .filter(|node| node.evented)
        .filter(|node| {
            graph
                .client_rect(node.id, stage, false)
                .is_some_and(|r| rects_overlap(r, area))
        })
        .map(|node| node.id)
        .collect()
}
