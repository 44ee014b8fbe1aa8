use crate::id::NodeId;
use thiserror::Error;

/// Failures of scene-graph primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("node `{0}` already exists in the scene")]
    DuplicateId(NodeId),

    #[error("node `{0}` is not in the scene")]
    UnknownNode(NodeId),

    #[error("parent `{parent}` of `{child}` is not in the scene")]
    UnknownParent { parent: NodeId, child: NodeId },

    #[error("the root node cannot be {0}")]
    RootImmutable(&'static str),
}
