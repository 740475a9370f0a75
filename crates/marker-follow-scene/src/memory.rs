//! In-memory [`SceneHost`] for tests and offline replay.
//!
//! Tracks node reference counts and per-item mutation counts so callers can
//! check that leases are balanced and transforms are applied once per pose.

use crate::{ItemId, NodeId, NodeKind, SceneHost, SceneItem, TickCallback, TickToken};
use nalgebra::Vector2;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;
use std::sync::{Mutex, MutexGuard};

#[derive(Clone, Debug)]
struct MemoryNode {
    name: String,
    kind: NodeKind,
    width: u32,
    height: u32,
    refs: usize,
}

/// Snapshot of one scene item.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ItemState {
    pub id: ItemId,
    pub node: NodeId,
    pub position: Vector2<f32>,
    pub scale: Vector2<f32>,
    pub rotation: f32,
    pub visible: bool,
    /// Number of transform writes (position, scale or rotation) received.
    pub transform_writes: usize,
}

#[derive(Default)]
struct Inner {
    nodes: HashMap<NodeId, MemoryNode>,
    scenes: HashMap<NodeId, Vec<ItemId>>,
    items: BTreeMap<ItemId, ItemState>,
    filters: HashMap<NodeId, NodeId>,
    current_scene: Option<NodeId>,
    ticks: Vec<(TickToken, TickCallback)>,
    next_item: u64,
    next_tick: u64,
    released_unknown: usize,
}

#[derive(Default)]
pub struct MemoryScene {
    inner: Mutex<Inner>,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_node(&self, id: &str, name: &str, kind: NodeKind, width: u32, height: u32) {
        let mut inner = self.lock();
        inner.nodes.insert(
            NodeId::new(id),
            MemoryNode {
                name: name.to_string(),
                kind,
                width,
                height,
                refs: 0,
            },
        );
        if kind == NodeKind::Scene {
            inner.scenes.entry(NodeId::new(id)).or_default();
        }
    }

    /// Forget a node; later acquisitions by its id fail. Items stay placed.
    pub fn remove_node(&self, id: &str) {
        self.lock().nodes.remove(&NodeId::new(id));
    }

    pub fn set_node_size(&self, id: &str, width: u32, height: u32) {
        if let Some(node) = self.lock().nodes.get_mut(&NodeId::new(id)) {
            node.width = width;
            node.height = height;
        }
    }

    pub fn set_current_scene(&self, scene: &str) {
        self.lock().current_scene = Some(NodeId::new(scene));
    }

    /// Place `node` in `scene` at the origin, unit scale, visible.
    pub fn add_item(&self, scene: &str, node: &str) -> ItemId {
        let mut inner = self.lock();
        inner.next_item += 1;
        let id = ItemId(inner.next_item);
        inner.items.insert(
            id,
            ItemState {
                id,
                node: NodeId::new(node),
                position: Vector2::zeros(),
                scale: Vector2::new(1.0, 1.0),
                rotation: 0.0,
                visible: true,
                transform_writes: 0,
            },
        );
        inner.scenes.entry(NodeId::new(scene)).or_default().push(id);
        id
    }

    /// Move an item without counting it as a controller write.
    pub fn place_item(&self, item: ItemId, position: Vector2<f32>, scale: Vector2<f32>) {
        if let Some(state) = self.lock().items.get_mut(&item) {
            state.position = position;
            state.scale = scale;
        }
    }

    pub fn attach_filter(&self, filter: &str, parent: &str) {
        self.lock()
            .filters
            .insert(NodeId::new(filter), NodeId::new(parent));
    }

    pub fn item(&self, item: ItemId) -> Option<ItemState> {
        self.lock().items.get(&item).cloned()
    }

    pub fn ref_count(&self, id: &str) -> usize {
        self.lock()
            .nodes
            .get(&NodeId::new(id))
            .map_or(0, |n| n.refs)
    }

    /// Sum of all outstanding node references.
    pub fn outstanding_refs(&self) -> usize {
        self.lock().nodes.values().map(|n| n.refs).sum()
    }

    /// Releases that did not match an outstanding reference.
    pub fn unbalanced_releases(&self) -> usize {
        self.lock().released_unknown
    }

    pub fn tick_callbacks(&self) -> usize {
        self.lock().ticks.len()
    }

    /// Invoke every registered tick callback, outside the internal lock.
    pub fn run_tick(&self, seconds: f32) {
        let callbacks: Vec<TickCallback> = self
            .lock()
            .ticks
            .iter()
            .map(|(_, cb)| TickCallback::clone(cb))
            .collect();
        for cb in callbacks {
            cb(seconds);
        }
    }

    fn with_item(&self, item: ItemId, f: impl FnOnce(&mut ItemState)) {
        match self.lock().items.get_mut(&item) {
            Some(state) => f(state),
            None => log::warn!("write to unknown scene item {item:?}"),
        }
    }
}

impl SceneHost for MemoryScene {
    fn acquire_node(&self, id: &str) -> Option<NodeId> {
        let mut inner = self.lock();
        let key = NodeId::new(id);
        let node = inner.nodes.get_mut(&key)?;
        node.refs += 1;
        Some(key)
    }

    fn release_node(&self, node: &NodeId) {
        let mut inner = self.lock();
        match inner.nodes.get_mut(node) {
            Some(n) if n.refs > 0 => n.refs -= 1,
            _ => inner.released_unknown += 1,
        }
    }

    fn node_size(&self, node: &NodeId) -> (u32, u32) {
        self.lock()
            .nodes
            .get(node)
            .map_or((0, 0), |n| (n.width, n.height))
    }

    fn filter_parent(&self, filter: &NodeId) -> Option<NodeId> {
        self.lock().filters.get(filter).cloned()
    }

    fn current_scene(&self) -> Option<NodeId> {
        self.lock().current_scene.clone()
    }

    fn enum_scene_items(
        &self,
        scene: &NodeId,
        visitor: &mut dyn FnMut(&SceneItem) -> ControlFlow<()>,
    ) {
        let entries: Vec<SceneItem> = {
            let inner = self.lock();
            let Some(ids) = inner.scenes.get(scene) else {
                return;
            };
            ids.iter()
                .filter_map(|id| {
                    let item = inner.items.get(id)?;
                    let node = inner.nodes.get(&item.node);
                    Some(SceneItem {
                        id: *id,
                        node: item.node.clone(),
                        name: node.map(|n| n.name.clone()).unwrap_or_default(),
                        kind: node.map(|n| n.kind).unwrap_or_default(),
                    })
                })
                .collect()
        };
        for entry in &entries {
            if visitor(entry).is_break() {
                break;
            }
        }
    }

    fn item_position(&self, item: ItemId) -> Option<Vector2<f32>> {
        self.lock().items.get(&item).map(|s| s.position)
    }

    fn item_scale(&self, item: ItemId) -> Option<Vector2<f32>> {
        self.lock().items.get(&item).map(|s| s.scale)
    }

    fn set_item_position(&self, item: ItemId, position: Vector2<f32>) {
        self.with_item(item, |s| {
            s.position = position;
            s.transform_writes += 1;
        });
    }

    fn set_item_scale(&self, item: ItemId, scale: Vector2<f32>) {
        self.with_item(item, |s| {
            s.scale = scale;
            s.transform_writes += 1;
        });
    }

    fn set_item_rotation(&self, item: ItemId, degrees: f32) {
        self.with_item(item, |s| {
            s.rotation = degrees;
            s.transform_writes += 1;
        });
    }

    fn set_item_visible(&self, item: ItemId, visible: bool) {
        self.with_item(item, |s| s.visible = visible);
    }

    fn add_tick_callback(&self, callback: TickCallback) -> TickToken {
        let mut inner = self.lock();
        inner.next_tick += 1;
        let token = TickToken(inner.next_tick);
        inner.ticks.push((token, callback));
        token
    }

    fn remove_tick_callback(&self, token: TickToken) {
        let mut inner = self.lock();
        let before = inner.ticks.len();
        inner.ticks.retain(|(t, _)| *t != token);
        if inner.ticks.len() == before {
            log::warn!("tick callback {token:?} was not registered");
        }
    }
}
