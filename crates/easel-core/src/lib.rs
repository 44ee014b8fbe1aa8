pub mod error;
pub mod graph;
pub mod hit;
pub mod id;
pub mod model;
pub mod stage;

pub use error::SceneError;
pub use graph::{NodeSnapshot, SceneGraph};
pub use hit::{hit_test, shapes_in_area};
pub use id::NodeId;
pub use model::*;
pub use stage::Stage;

// Re-export geometry and graph types so downstream crates agree on versions.
pub use kurbo::{Affine, Point, Rect, Vec2};
pub use petgraph::graph::NodeIndex;
