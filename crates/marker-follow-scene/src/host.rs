//! The compositing host as seen by the controller.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

/// Stable external identifier of a node (source, scene or filter).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one placement of a node inside a scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    #[default]
    Input,
    Filter,
    Transition,
    Scene,
}

/// One entry produced by scene enumeration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SceneItem {
    pub id: ItemId,
    pub node: NodeId,
    pub name: String,
    pub kind: NodeKind,
}

/// Handle returned by tick registration, passed back to unregister.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TickToken(pub u64);

/// Periodic callback; the argument is the elapsed time in seconds.
pub type TickCallback = Arc<dyn Fn(f32) + Send + Sync>;

/// Scene graph operations the controller consumes.
///
/// Mutating calls (`set_item_*`) are only ever issued from the tick callback.
/// Implementations must not hold internal locks while invoking a tick
/// callback or an enumeration visitor.
pub trait SceneHost: Send + Sync {
    /// Take a reference on the node with this id. Every successful call is
    /// balanced by exactly one `release_node`.
    fn acquire_node(&self, id: &str) -> Option<NodeId>;

    fn release_node(&self, node: &NodeId);

    /// Intrinsic `(width, height)` of the node, `(0, 0)` when unknown.
    fn node_size(&self, node: &NodeId) -> (u32, u32);

    /// Node a filter is attached to.
    fn filter_parent(&self, filter: &NodeId) -> Option<NodeId>;

    /// Scene currently shown by the frontend.
    fn current_scene(&self) -> Option<NodeId>;

    /// Visit the items of `scene` in order until the visitor breaks.
    fn enum_scene_items(&self, scene: &NodeId, visitor: &mut dyn FnMut(&SceneItem) -> ControlFlow<()>);

    fn item_position(&self, item: ItemId) -> Option<Vector2<f32>>;
    fn item_scale(&self, item: ItemId) -> Option<Vector2<f32>>;

    fn set_item_position(&self, item: ItemId, position: Vector2<f32>);
    fn set_item_scale(&self, item: ItemId, scale: Vector2<f32>);
    fn set_item_rotation(&self, item: ItemId, degrees: f32);
    fn set_item_visible(&self, item: ItemId, visible: bool);

    fn add_tick_callback(&self, callback: TickCallback) -> TickToken;
    fn remove_tick_callback(&self, token: TickToken);
}

/// First item of the current scene whose node is `node`.
///
/// Duplicate placements resolve to the first one in enumeration order.
pub fn find_scene_item<H: SceneHost + ?Sized>(host: &H, node: &NodeId) -> Option<ItemId> {
    let scene = host.current_scene()?;
    let mut found = None;
    host.enum_scene_items(&scene, &mut |item: &SceneItem| {
        if &item.node == node {
            found = Some(item.id);
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    });
    found
}
