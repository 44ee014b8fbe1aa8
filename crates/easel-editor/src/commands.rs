//! Reversible scene commands.
//!
//! A command is a value: it owns the node snapshots it needs and never holds
//! a reference into the scene. Commands are built once from lifecycle events
//! and replayed against any [`Replay`] target (the live session, or a bare
//! `SceneGraph` in tests).

use crate::error::EditorError;
use easel_core::{NodeId, NodeSnapshot, SceneGraph};
use log::debug;

/// The scene primitives a command needs to move state forward and back.
pub trait Replay {
    /// Re-insert captured subtrees at their recorded parent and z-index.
    /// Nodes that are already present are left alone.
    fn restore(&mut self, nodes: &[NodeSnapshot]) -> Result<(), EditorError>;

    /// Remove nodes (with their subtrees). Missing ids are skipped.
    fn detach(&mut self, ids: &[NodeId]);

    /// Write captured attributes and z-order back onto present nodes.
    fn apply(&mut self, nodes: &[NodeSnapshot]) -> Result<(), EditorError>;
}

/// Restore order: bottom-most first, so each recorded z-index is valid when
/// its node goes back in.
pub(crate) fn restore_order(nodes: &[NodeSnapshot]) -> Vec<&NodeSnapshot> {
    let mut ordered: Vec<&NodeSnapshot> = nodes.iter().collect();
    ordered.sort_by_key(|snap| snap.z_index);
    ordered
}

impl Replay for SceneGraph {
    fn restore(&mut self, nodes: &[NodeSnapshot]) -> Result<(), EditorError> {
        for snap in restore_order(nodes) {
            SceneGraph::restore(self, snap)?;
        }
        Ok(())
    }

    fn detach(&mut self, ids: &[NodeId]) {
        for &id in ids {
            SceneGraph::detach(self, id);
        }
    }

    fn apply(&mut self, nodes: &[NodeSnapshot]) -> Result<(), EditorError> {
        Ok(self.apply_snapshots(nodes)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Add,
    Remove,
    Modify,
}

/// Nodes were added; undo removes them again.
#[derive(Debug, Clone, PartialEq)]
pub struct AddCommand {
    nodes: Vec<NodeSnapshot>,
}

impl AddCommand {
    pub fn new(nodes: Vec<NodeSnapshot>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[NodeSnapshot] {
        &self.nodes
    }

    pub fn execute(&self, target: &mut dyn Replay) -> Result<(), EditorError> {
        target.restore(&self.nodes)
    }

    pub fn undo(&self, target: &mut dyn Replay) -> Result<(), EditorError> {
        target.detach(&ids(&self.nodes));
        Ok(())
    }
}

/// Nodes were removed; undo puts them back at their old place.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveCommand {
    nodes: Vec<NodeSnapshot>,
}

impl RemoveCommand {
    pub fn new(nodes: Vec<NodeSnapshot>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[NodeSnapshot] {
        &self.nodes
    }

    pub fn execute(&self, target: &mut dyn Replay) -> Result<(), EditorError> {
        target.detach(&ids(&self.nodes));
        Ok(())
    }

    pub fn undo(&self, target: &mut dyn Replay) -> Result<(), EditorError> {
        target.restore(&self.nodes)
    }
}

/// Before/after state of a fixed node set across one gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifyCommand {
    old_nodes: Vec<NodeSnapshot>,
    new_nodes: Vec<NodeSnapshot>,
}

impl ModifyCommand {
    /// # Errors
    /// [`EditorError::MismatchedNodeSets`] when `old_nodes` and `new_nodes`
    /// do not cover the same ids (order does not matter).
    pub fn new(old_nodes: Vec<NodeSnapshot>, new_nodes: Vec<NodeSnapshot>) -> Result<Self, EditorError> {
        let mut before = ids(&old_nodes);
        let mut after = ids(&new_nodes);
        before.sort_unstable();
        before.dedup();
        after.sort_unstable();
        after.dedup();
        if before != after {
            return Err(EditorError::MismatchedNodeSets { before, after });
        }
        Ok(Self { old_nodes, new_nodes })
    }

    pub fn old_nodes(&self) -> &[NodeSnapshot] {
        &self.old_nodes
    }

    pub fn new_nodes(&self) -> &[NodeSnapshot] {
        &self.new_nodes
    }

    /// True when the gesture left every node as it found it.
    pub fn is_noop(&self) -> bool {
        self.old_nodes.iter().all(|old| self.new_nodes.iter().any(|new| new == old))
    }

    pub fn execute(&self, target: &mut dyn Replay) -> Result<(), EditorError> {
        target.apply(&self.new_nodes)
    }

    pub fn undo(&self, target: &mut dyn Replay) -> Result<(), EditorError> {
        target.apply(&self.old_nodes)
    }
}

/// A recorded, invertible unit of scene mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add(AddCommand),
    Remove(RemoveCommand),
    Modify(ModifyCommand),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Add(_) => CommandKind::Add,
            Command::Remove(_) => CommandKind::Remove,
            Command::Modify(_) => CommandKind::Modify,
        }
    }

    /// Ids of the top-level nodes this command touches.
    pub fn node_ids(&self) -> Vec<NodeId> {
        match self {
            Command::Add(cmd) => ids(cmd.nodes()),
            Command::Remove(cmd) => ids(cmd.nodes()),
            Command::Modify(cmd) => ids(cmd.new_nodes()),
        }
    }

    /// Short human-readable label, e.g. `"remove 2 nodes"`.
    pub fn label(&self) -> String {
        let verb = match self.kind() {
            CommandKind::Add => "add",
            CommandKind::Remove => "remove",
            CommandKind::Modify => "modify",
        };
        match self.node_ids().len() {
            1 => format!("{verb} 1 node"),
            n => format!("{verb} {n} nodes"),
        }
    }

    /// Apply the command forward (redo).
    pub fn execute(&self, target: &mut dyn Replay) -> Result<(), EditorError> {
        debug!("execute {}", self.label());
        match self {
            Command::Add(cmd) => cmd.execute(target),
            Command::Remove(cmd) => cmd.execute(target),
            Command::Modify(cmd) => cmd.execute(target),
        }
    }

    /// Apply the inverse (undo).
    pub fn undo(&self, target: &mut dyn Replay) -> Result<(), EditorError> {
        debug!("undo {}", self.label());
        match self {
            Command::Add(cmd) => cmd.undo(target),
            Command::Remove(cmd) => cmd.undo(target),
            Command::Modify(cmd) => cmd.undo(target),
        }
    }
}

impl From<AddCommand> for Command {
    fn from(cmd: AddCommand) -> Self {
        Command::Add(cmd)
    }
}

impl From<RemoveCommand> for Command {
    fn from(cmd: RemoveCommand) -> Self {
        Command::Remove(cmd)
    }
}

impl From<ModifyCommand> for Command {
    fn from(cmd: ModifyCommand) -> Self {
        Command::Modify(cmd)
    }
}

fn ids(nodes: &[NodeSnapshot]) -> Vec<NodeId> {
    nodes.iter().map(NodeSnapshot::id).collect()
}
