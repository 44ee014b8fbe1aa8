use easel_core::{NodeId, SceneError};
use thiserror::Error;

/// Errors raised inside the editor engines.
///
/// None of these cross the event bus: a handler returning one is logged and
/// the remaining subscribers still run.
#[derive(Debug, Error)]
pub enum EditorError {
    /// A modify command's before/after snapshots cover different nodes.
    #[error("modify command node sets differ: before {before:?}, after {after:?}")]
    MismatchedNodeSets { before: Vec<NodeId>, after: Vec<NodeId> },

    #[error("handler for `{event}` was re-entered while still running")]
    ReentrantHandler { event: &'static str },

    #[error("handler for `{event}` panicked: {message}")]
    HandlerPanicked { event: &'static str, message: String },

    #[error("event name `{name}` is already registered for another payload type")]
    EventNameConflict { name: &'static str },

    #[error("the editing session has been dropped")]
    SessionGone,

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
