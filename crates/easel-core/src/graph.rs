//! The scene graph: a tree of [`SceneNode`] values under a single root.
//!
//! Edges go from parent → child. Paint order (z-order) is the explicit child
//! order kept per parent: index 0 is the bottom, the last child is on top.
//! Nodes are addressed from outside by [`NodeId`]; `NodeIndex` values are an
//! internal detail and are not stable across remove/restore.

use crate::error::SceneError;
use crate::id::NodeId;
use crate::model::{Attrs, NodeKind, SceneNode};
use crate::stage::Stage;
use kurbo::{Affine, Rect};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything needed to put a node (and its subtree) back where it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node: SceneNode,
    pub parent: NodeId,
    /// Position among the parent's children at capture time.
    pub z_index: usize,
    /// Children in paint order, for groups.
    pub children: Vec<NodeSnapshot>,
}

impl NodeSnapshot {
    pub fn id(&self) -> NodeId {
        self.node.id
    }

    /// This node's id followed by every descendant id, pre-order.
    pub fn subtree_ids(&self) -> Vec<NodeId> {
        let mut out = vec![self.id()];
        for child in &self.children {
            out.extend(child.subtree_ids());
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct SceneGraph {
    pub graph: StableDiGraph<SceneNode, ()>,
    pub root: NodeIndex,
    id_index: HashMap<NodeId, NodeIndex>,
    /// Children of each parent in paint order (bottom first).
    child_order: HashMap<NodeIndex, Vec<NodeIndex>>,
}

impl SceneGraph {
    #[must_use]
    pub fn new() -> Self {
        let mut graph = StableDiGraph::new();
        let root_id = NodeId::root();
        let root = graph.add_node(SceneNode::new(root_id, NodeKind::Root));
        let mut id_index = HashMap::new();
        id_index.insert(root_id, root);
        Self {
            graph,
            root,
            id_index,
            child_order: HashMap::new(),
        }
    }

    // ─── Structure ───────────────────────────────────────────────────────

    /// Append `node` on top of `parent`'s children.
    pub fn add_node(&mut self, parent: NodeIndex, node: SceneNode) -> Result<NodeIndex, SceneError> {
        let top = self.children(parent).len();
        self.insert_node(parent, top, node)
    }

    /// Insert `node` at `z_index` among `parent`'s children (clamped).
    pub fn insert_node(
        &mut self,
        parent: NodeIndex,
        z_index: usize,
        node: SceneNode,
    ) -> Result<NodeIndex, SceneError> {
        let id = node.id;
        if self.id_index.contains_key(&id) {
            return Err(SceneError::DuplicateId(id));
        }
        let idx = self.graph.add_node(node);
        self.graph.add_edge(parent, idx, ());
        self.id_index.insert(id, idx);
        let order = self.child_order.entry(parent).or_default();
        order.insert(z_index.min(order.len()), idx);
        Ok(idx)
    }

    /// Remove a node together with its subtree. Returns the removed node.
    pub fn remove_node(&mut self, idx: NodeIndex) -> Option<SceneNode> {
        if idx == self.root {
            return None;
        }
        if let Some(parent) = self.parent(idx)
            && let Some(order) = self.child_order.get_mut(&parent)
        {
            order.retain(|&c| c != idx);
        }
        for descendant in self.descendants(idx) {
            self.child_order.remove(&descendant);
            if let Some(removed) = self.graph.remove_node(descendant) {
                self.id_index.remove(&removed.id);
            }
        }
        self.child_order.remove(&idx);
        let removed = self.graph.remove_node(idx);
        if let Some(node) = &removed {
            self.id_index.remove(&node.id);
        }
        removed
    }

    pub fn get_by_id(&self, id: NodeId) -> Option<&SceneNode> {
        self.id_index.get(&id).map(|idx| &self.graph[*idx])
    }

    pub fn get_by_id_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.id_index.get(&id).copied().map(|idx| &mut self.graph[idx])
    }

    pub fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.id_index.get(&id).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.id_index.contains_key(&id)
    }

    /// Number of nodes, not counting the root.
    pub fn len(&self) -> usize {
        self.id_index.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph.neighbors_directed(idx, petgraph::Direction::Incoming).next()
    }

    pub fn parent_id(&self, id: NodeId) -> Option<NodeId> {
        let idx = self.index_of(id)?;
        self.parent(idx).map(|p| self.graph[p].id)
    }

    /// Children of `idx` in paint order (bottom first).
    pub fn children(&self, idx: NodeIndex) -> &[NodeIndex] {
        self.child_order.get(&idx).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn child_ids(&self, idx: NodeIndex) -> Vec<NodeId> {
        self.children(idx).iter().map(|&c| self.graph[c].id).collect()
    }

    /// Ids of the root's children, bottom first.
    pub fn top_level_ids(&self) -> Vec<NodeId> {
        self.child_ids(self.root)
    }

    /// Every node below `idx`, pre-order, excluding `idx` itself.
    pub fn descendants(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeIndex> = self.children(idx).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Move `child` under `new_parent` at `z_index` (top when `None`).
    pub fn reparent_node(&mut self, child: NodeIndex, new_parent: NodeIndex, z_index: Option<usize>) {
        self.unlink(child);
        self.link(child, new_parent, z_index.unwrap_or(usize::MAX));
    }

    /// Detach `child` from its parent's edge and paint order.
    fn unlink(&mut self, child: NodeIndex) {
        if let Some(old_parent) = self.parent(child) {
            if let Some(edge) = self.graph.find_edge(old_parent, child) {
                self.graph.remove_edge(edge);
            }
            if let Some(order) = self.child_order.get_mut(&old_parent) {
                order.retain(|&c| c != child);
            }
        }
    }

    fn link(&mut self, child: NodeIndex, parent: NodeIndex, z_index: usize) {
        self.graph.add_edge(parent, child, ());
        let order = self.child_order.entry(parent).or_default();
        order.insert(z_index.min(order.len()), child);
    }

    /// Highest group ancestor below the root, if `id` sits inside a group.
    pub fn top_group(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.index_of(id)?;
        let mut found = None;
        while let Some(parent) = self.parent(current) {
            if parent == self.root {
                break;
            }
            if self.graph[parent].is_group() {
                found = Some(self.graph[parent].id);
            }
            current = parent;
        }
        found
    }

    /// Whether `ancestor_id` is a parent/grandparent/… of `descendant_id`.
    pub fn is_ancestor_of(&self, ancestor_id: NodeId, descendant_id: NodeId) -> bool {
        if ancestor_id == descendant_id {
            return false;
        }
        let Some(mut current) = self.index_of(descendant_id) else {
            return false;
        };
        while let Some(parent) = self.parent(current) {
            if self.graph[parent].id == ancestor_id {
                return true;
            }
            current = parent;
        }
        false
    }

    // ─── Z-order ─────────────────────────────────────────────────────────

    pub fn z_index(&self, idx: NodeIndex) -> Option<usize> {
        let parent = self.parent(idx)?;
        self.children(parent).iter().position(|&c| c == idx)
    }

    /// Move `child` to position `to` among its siblings. Returns true if the
    /// order changed.
    pub fn move_to(&mut self, child: NodeIndex, to: usize) -> bool {
        let Some(parent) = self.parent(child) else {
            return false;
        };
        let Some(order) = self.child_order.get_mut(&parent) else {
            return false;
        };
        let Some(from) = order.iter().position(|&c| c == child) else {
            return false;
        };
        let to = to.min(order.len() - 1);
        if from == to {
            return false;
        }
        let moved = order.remove(from);
        order.insert(to, moved);
        true
    }

    /// One step toward the back.
    pub fn send_backward(&mut self, child: NodeIndex) -> bool {
        match self.z_index(child) {
            Some(pos) if pos > 0 => self.move_to(child, pos - 1),
            _ => false,
        }
    }

    /// One step toward the front.
    pub fn bring_forward(&mut self, child: NodeIndex) -> bool {
        match self.z_index(child) {
            Some(pos) => self.move_to(child, pos + 1),
            None => false,
        }
    }

    pub fn send_to_back(&mut self, child: NodeIndex) -> bool {
        self.move_to(child, 0)
    }

    pub fn bring_to_front(&mut self, child: NodeIndex) -> bool {
        self.move_to(child, usize::MAX)
    }

    // ─── Geometry ────────────────────────────────────────────────────────

    /// World → screen transform of a node: stage · ancestors · own.
    pub fn absolute_transform(&self, id: NodeId, stage: &Stage) -> Option<Affine> {
        let mut current = self.index_of(id)?;
        let mut chain = Vec::new();
        while current != self.root {
            chain.push(self.graph[current].attrs.local_transform());
            current = self.parent(current)?;
        }
        Some(chain.iter().rev().fold(stage.transform(), |acc, local| acc * *local))
    }

    /// The node's box in its own coordinates, ignoring its transform.
    /// Groups report the union of their children's transformed boxes.
    pub fn local_rect(&self, id: NodeId, skip_stroke: bool) -> Option<Rect> {
        let idx = self.index_of(id)?;
        let node = &self.graph[idx];
        if !node.is_group() {
            return node.self_rect(skip_stroke);
        }
        self.children(idx)
            .iter()
            .filter_map(|&c| {
                let child = &self.graph[c];
                let rect = self.local_rect(child.id, skip_stroke)?;
                Some(child.attrs.local_transform().transform_rect_bbox(rect))
            })
            .reduce(|a, b| a.union(b))
    }

    /// Axis-aligned box of a node in screen space. Groups report the union of
    /// their children's client boxes.
    pub fn client_rect(&self, id: NodeId, stage: &Stage, skip_stroke: bool) -> Option<Rect> {
        let idx = self.index_of(id)?;
        let node = &self.graph[idx];
        if node.is_group() {
            return self
                .children(idx)
                .iter()
                .filter_map(|&c| self.client_rect(self.graph[c].id, stage, skip_stroke))
                .reduce(|a, b| a.union(b));
        }
        let rect = node.self_rect(skip_stroke)?;
        Some(self.absolute_transform(id, stage)?.transform_rect_bbox(rect))
    }

    /// Set a node's attributes so that its absolute transform becomes `absolute`.
    pub fn set_absolute_transform(&mut self, id: NodeId, stage: &Stage, absolute: Affine) -> bool {
        let Some(parent) = self.parent_id(id) else {
            return false;
        };
        let parent_abs = if parent.is_root() {
            stage.transform()
        } else {
            match self.absolute_transform(parent, stage) {
                Some(t) => t,
                None => return false,
            }
        };
        let attrs = Attrs::from_affine(parent_abs.inverse() * absolute);
        match self.get_by_id_mut(id) {
            Some(node) => {
                node.attrs = attrs;
                true
            }
            None => false,
        }
    }

    // ─── Snapshots ───────────────────────────────────────────────────────

    /// Capture a node, its place in the tree, and its subtree.
    pub fn snapshot(&self, id: NodeId) -> Option<NodeSnapshot> {
        let idx = self.index_of(id)?;
        let parent = self.parent(idx)?;
        Some(NodeSnapshot {
            node: self.graph[idx].clone(),
            parent: self.graph[parent].id,
            z_index: self.z_index(idx)?,
            children: self
                .children(idx)
                .iter()
                .filter_map(|&c| self.snapshot(self.graph[c].id))
                .collect(),
        })
    }

    /// Snapshot and remove a node with its subtree.
    pub fn detach(&mut self, id: NodeId) -> Option<NodeSnapshot> {
        let snapshot = self.snapshot(id)?;
        let idx = self.index_of(id)?;
        self.remove_node(idx);
        log::trace!("DETACH @{} ({} node(s))", id.as_str(), snapshot.subtree_ids().len());
        Some(snapshot)
    }

    /// Re-insert a captured subtree at its recorded parent and z-index.
    ///
    /// Returns `Ok(false)` when the node is already present (nothing to do).
    pub fn restore(&mut self, snapshot: &NodeSnapshot) -> Result<bool, SceneError> {
        let id = snapshot.id();
        if id.is_root() {
            return Err(SceneError::RootImmutable("restored"));
        }
        if self.contains(id) {
            return Ok(false);
        }
        let parent = self.index_of(snapshot.parent).ok_or(SceneError::UnknownParent {
            parent: snapshot.parent,
            child: id,
        })?;
        let mut node = snapshot.node.clone();
        node.draggable = false;
        self.insert_node(parent, snapshot.z_index, node)?;
        log::trace!("RESTORE @{} under @{} z={}", id.as_str(), snapshot.parent.as_str(), snapshot.z_index);
        for child in &snapshot.children {
            self.restore(child)?;
        }
        Ok(true)
    }

    /// Write captured state back onto a node that is still present: kind,
    /// attributes, style, `evented`, and z-index, recursively for children.
    /// The `draggable` flag belongs to the current selection and is kept.
    pub fn apply_snapshot(&mut self, snapshot: &NodeSnapshot) -> Result<(), SceneError> {
        self.apply_snapshots(std::slice::from_ref(snapshot))
    }

    /// [`apply_snapshot`](Self::apply_snapshot) for several nodes at once.
    ///
    /// Z-indices are applied as a batch: every node is lifted out of its
    /// parent first, then re-inserted bottom-up, so each recorded position is
    /// relative to the untouched siblings. Nothing is written unless every
    /// node and parent is present.
    pub fn apply_snapshots(&mut self, snapshots: &[NodeSnapshot]) -> Result<(), SceneError> {
        let mut placements = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            let id = snapshot.id();
            let idx = self.index_of(id).ok_or(SceneError::UnknownNode(id))?;
            let parent = self.index_of(snapshot.parent).ok_or(SceneError::UnknownParent {
                parent: snapshot.parent,
                child: id,
            })?;
            placements.push((idx, parent, snapshot.z_index));
        }
        for (snapshot, &(idx, _, _)) in snapshots.iter().zip(&placements) {
            let node = &mut self.graph[idx];
            node.kind = snapshot.node.kind.clone();
            node.attrs = snapshot.node.attrs;
            node.style = snapshot.node.style.clone();
            node.evented = snapshot.node.evented;
        }
        for &(idx, _, _) in &placements {
            self.unlink(idx);
        }
        placements.sort_by_key(|&(_, _, z)| z);
        for (idx, parent, z) in placements {
            self.link(idx, parent, z);
        }
        for snapshot in snapshots {
            let present: Vec<NodeSnapshot> = snapshot
                .children
                .iter()
                .filter(|child| self.contains(child.id()))
                .cloned()
                .collect();
            if !present.is_empty() {
                self.apply_snapshots(&present)?;
            }
        }
        Ok(())
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rect(id: &str, x: f64, y: f64) -> SceneNode {
        SceneNode::new(NodeId::intern(id), NodeKind::rect(10.0, 10.0)).at(x, y)
    }

    #[test]
    fn add_and_lookup() {
        let mut sg = SceneGraph::new();
        let idx = sg.add_node(sg.root, rect("g_box1", 0.0, 0.0)).unwrap();
        assert!(sg.get_by_id(NodeId::intern("g_box1")).is_some());
        assert_eq!(sg.children(sg.root), &[idx]);
        assert_eq!(sg.len(), 1);
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut sg = SceneGraph::new();
        sg.add_node(sg.root, rect("g_dup", 0.0, 0.0)).unwrap();
        let err = sg.add_node(sg.root, rect("g_dup", 5.0, 5.0)).unwrap_err();
        assert_eq!(err, SceneError::DuplicateId(NodeId::intern("g_dup")));
    }

    #[test]
    fn z_order_moves() {
        let mut sg = SceneGraph::new();
        let a = sg.add_node(sg.root, rect("z_a", 0.0, 0.0)).unwrap();
        let b = sg.add_node(sg.root, rect("z_b", 0.0, 0.0)).unwrap();
        let c = sg.add_node(sg.root, rect("z_c", 0.0, 0.0)).unwrap();

        assert!(sg.bring_to_front(a));
        assert_eq!(sg.children(sg.root), &[b, c, a]);
        assert!(sg.send_backward(a));
        assert_eq!(sg.children(sg.root), &[b, a, c]);
        assert!(sg.send_to_back(c));
        assert_eq!(sg.children(sg.root), &[c, b, a]);
        assert!(!sg.send_to_back(c));
        assert!(!sg.bring_forward(a));
    }

    #[test]
    fn remove_takes_subtree() {
        let mut sg = SceneGraph::new();
        let group = sg
            .add_node(sg.root, SceneNode::new(NodeId::intern("rm_group"), NodeKind::Group))
            .unwrap();
        sg.add_node(group, rect("rm_child", 0.0, 0.0)).unwrap();
        sg.remove_node(group);
        assert!(!sg.contains(NodeId::intern("rm_child")));
        assert!(sg.is_empty());
    }

    #[test]
    fn top_group_walks_to_outermost() {
        let mut sg = SceneGraph::new();
        let outer = sg
            .add_node(sg.root, SceneNode::new(NodeId::intern("tg_outer"), NodeKind::Group))
            .unwrap();
        let inner = sg
            .add_node(outer, SceneNode::new(NodeId::intern("tg_inner"), NodeKind::Group))
            .unwrap();
        sg.add_node(inner, rect("tg_leaf", 0.0, 0.0)).unwrap();
        sg.add_node(sg.root, rect("tg_loose", 0.0, 0.0)).unwrap();

        assert_eq!(sg.top_group(NodeId::intern("tg_leaf")), Some(NodeId::intern("tg_outer")));
        assert_eq!(sg.top_group(NodeId::intern("tg_loose")), None);
        assert!(sg.is_ancestor_of(NodeId::intern("tg_outer"), NodeId::intern("tg_leaf")));
        assert!(!sg.is_ancestor_of(NodeId::intern("tg_leaf"), NodeId::intern("tg_outer")));
    }

    #[test]
    fn detach_restore_keeps_z_order() {
        let mut sg = SceneGraph::new();
        for id in ["dr_a", "dr_b", "dr_c"] {
            sg.add_node(sg.root, rect(id, 0.0, 0.0)).unwrap();
        }
        let snap = sg.detach(NodeId::intern("dr_b")).unwrap();
        assert_eq!(snap.z_index, 1);
        assert_eq!(sg.top_level_ids(), vec![NodeId::intern("dr_a"), NodeId::intern("dr_c")]);

        assert_eq!(sg.restore(&snap), Ok(true));
        assert_eq!(
            sg.top_level_ids(),
            vec![NodeId::intern("dr_a"), NodeId::intern("dr_b"), NodeId::intern("dr_c")]
        );
        assert_eq!(sg.restore(&snap), Ok(false));
    }

    #[test]
    fn restore_requires_parent() {
        let mut sg = SceneGraph::new();
        let group = sg
            .add_node(sg.root, SceneNode::new(NodeId::intern("rp_group"), NodeKind::Group))
            .unwrap();
        sg.add_node(group, rect("rp_child", 0.0, 0.0)).unwrap();
        let child = sg.snapshot(NodeId::intern("rp_child")).unwrap();
        sg.remove_node(group);
        assert!(matches!(sg.restore(&child), Err(SceneError::UnknownParent { .. })));
    }

    #[test]
    fn apply_snapshot_restores_attrs_and_z() {
        let mut sg = SceneGraph::new();
        sg.add_node(sg.root, rect("as_a", 1.0, 2.0)).unwrap();
        sg.add_node(sg.root, rect("as_b", 0.0, 0.0)).unwrap();
        let before = sg.snapshot(NodeId::intern("as_a")).unwrap();

        let a = sg.index_of(NodeId::intern("as_a")).unwrap();
        sg.bring_to_front(a);
        sg.get_by_id_mut(NodeId::intern("as_a")).unwrap().attrs.x = 99.0;

        sg.apply_snapshot(&before).unwrap();
        assert_eq!(sg.snapshot(NodeId::intern("as_a")).unwrap(), before);
    }

    #[test]
    fn apply_snapshots_restores_sibling_order_as_a_batch() {
        let mut sg = SceneGraph::new();
        for id in ["ab_a", "ab_b", "ab_c", "ab_d"] {
            sg.add_node(sg.root, rect(id, 0.0, 0.0)).unwrap();
        }
        let ids = |names: [&str; 4]| names.map(NodeId::intern).to_vec();
        let before = vec![
            sg.snapshot(NodeId::intern("ab_a")).unwrap(),
            sg.snapshot(NodeId::intern("ab_c")).unwrap(),
        ];
        let a = sg.index_of(NodeId::intern("ab_a")).unwrap();
        let c = sg.index_of(NodeId::intern("ab_c")).unwrap();
        sg.bring_to_front(a);
        sg.bring_to_front(c);
        assert_eq!(sg.top_level_ids(), ids(["ab_b", "ab_d", "ab_a", "ab_c"]));
        let after = vec![
            sg.snapshot(NodeId::intern("ab_a")).unwrap(),
            sg.snapshot(NodeId::intern("ab_c")).unwrap(),
        ];

        sg.apply_snapshots(&before).unwrap();
        assert_eq!(sg.top_level_ids(), ids(["ab_a", "ab_b", "ab_c", "ab_d"]));
        sg.apply_snapshots(&after).unwrap();
        assert_eq!(sg.top_level_ids(), ids(["ab_b", "ab_d", "ab_a", "ab_c"]));
    }

    #[test]
    fn client_rect_follows_stage_and_parents() {
        let mut sg = SceneGraph::new();
        let group = sg
            .add_node(
                sg.root,
                SceneNode::new(NodeId::intern("cr_group"), NodeKind::Group).at(100.0, 0.0),
            )
            .unwrap();
        sg.add_node(group, rect("cr_leaf", 5.0, 5.0)).unwrap();
        let stage = Stage::new(10.0, 10.0, 2.0);

        let leaf = sg.client_rect(NodeId::intern("cr_leaf"), &stage, true).unwrap();
        assert_eq!(leaf, Rect::new(220.0, 20.0, 240.0, 40.0));
        let g = sg.client_rect(NodeId::intern("cr_group"), &stage, true).unwrap();
        assert_eq!(g, leaf);
    }

    #[test]
    fn set_absolute_transform_roundtrips() {
        let mut sg = SceneGraph::new();
        sg.add_node(sg.root, rect("sat", 3.0, 4.0).rotated(30.0)).unwrap();
        let stage = Stage::new(7.0, -3.0, 1.5);
        let id = NodeId::intern("sat");
        let abs = sg.absolute_transform(id, &stage).unwrap();
        let moved = Affine::translate((12.0, 0.0)) * abs;
        assert!(sg.set_absolute_transform(id, &stage, moved));
        let attrs = sg.get_by_id(id).unwrap().attrs;
        assert!((attrs.x - 11.0).abs() < 1e-9);
        assert!((attrs.y - 4.0).abs() < 1e-9);
        assert!((attrs.rotation - 30.0).abs() < 1e-9);
    }
}
