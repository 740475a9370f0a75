//! Scene-side half of marker-follow.
//!
//! Current focus:
//! - the [`SceneHost`] trait a compositor implements,
//! - node leases and re-resolution of the target and host scene items,
//! - the pose -> item transform with aspect preservation and scale clamping,
//! - the visibility gate.
//!
//! [`memory::MemoryScene`] is a complete in-memory host used by tests and
//! offline replay.

mod host;
mod lease;
pub mod memory;
mod resolver;
mod transform;
mod visibility;

pub use host::{
    find_scene_item, ItemId, NodeId, NodeKind, SceneHost, SceneItem, TickCallback, TickToken,
};
pub use lease::NodeLease;
pub use resolver::SceneBinding;
pub use transform::{
    compute_transform, CoordinateSpace, NodeTransform, Placement, TransformError, TransformParams,
};
pub use visibility::{GateAction, VisibilityGate};
