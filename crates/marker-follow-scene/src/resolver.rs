//! Keeps track of which scene item is moved and where the host node sits.

use crate::host::find_scene_item;
use crate::{ItemId, NodeId, NodeLease, SceneHost};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Resolved references for one controller.
///
/// The target is held through a [`NodeLease`]; the host node (the node the
/// filter is attached to) is only remembered by id.
pub struct SceneBinding<H: SceneHost + ?Sized> {
    host: Arc<H>,
    filter: NodeId,
    host_node: Option<NodeId>,
    host_item: Option<ItemId>,
    target: Option<NodeLease<H>>,
    target_item: Option<ItemId>,
    target_size: (u32, u32),
}

impl<H: SceneHost + ?Sized> SceneBinding<H> {
    /// Empty binding; nothing is resolved until [`Self::resolve_all`].
    pub fn new(host: Arc<H>, filter: NodeId) -> Self {
        Self {
            host,
            filter,
            host_node: None,
            host_item: None,
            target: None,
            target_item: None,
            target_size: (0, 0),
        }
    }

    /// Re-resolve the target, its scene item and the host item.
    ///
    /// Runs on creation, activation and every settings update.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn resolve_all(&mut self, target_id: &str) {
        self.resolve_target(target_id);
        self.target_item = self
            .target
            .as_ref()
            .and_then(|lease| find_scene_item(&*self.host, lease.node()));
        self.resolve_host();

        log::debug!(
            "resolved target {:?} (item {:?}, {}x{}), host {:?} (item {:?})",
            self.target.as_ref().map(|l| l.node().as_str()),
            self.target_item,
            self.target_size.0,
            self.target_size.1,
            self.host_node.as_ref().map(NodeId::as_str),
            self.host_item,
        );
    }

    /// Swap the target lease. The old lease is released before the new one
    /// is acquired.
    pub fn resolve_target(&mut self, target_id: &str) {
        self.target = None;
        self.target_item = None;
        self.target_size = (0, 0);

        if target_id.is_empty() {
            return;
        }

        match NodeLease::acquire(&self.host, target_id) {
            Some(lease) => {
                self.target_size = self.host.node_size(lease.node());
                self.target = Some(lease);
            }
            None => log::debug!("target node {target_id:?} not found"),
        }
    }

    /// Resolve the host node lazily; returns `true` once it is known.
    ///
    /// The host node may not exist yet when the filter is created, so the
    /// frame path calls this until it succeeds.
    pub fn ensure_host(&mut self) -> bool {
        if self.host_node.is_some() {
            return true;
        }
        self.resolve_host();
        self.host_node.is_some()
    }

    fn resolve_host(&mut self) {
        if self.host_node.is_none() {
            self.host_node = self.host.filter_parent(&self.filter);
        }
        self.host_item = self
            .host_node
            .as_ref()
            .and_then(|node| find_scene_item(&*self.host, node));
    }

    /// Drop the target lease and forget every resolved item.
    pub fn release(&mut self) {
        self.target = None;
        self.target_item = None;
        self.target_size = (0, 0);
        self.host_item = None;
    }

    #[inline]
    pub fn filter(&self) -> &NodeId {
        &self.filter
    }

    #[inline]
    pub fn target(&self) -> Option<&NodeId> {
        self.target.as_ref().map(NodeLease::node)
    }

    #[inline]
    pub fn target_item(&self) -> Option<ItemId> {
        self.target_item
    }

    #[inline]
    pub fn target_size(&self) -> (u32, u32) {
        self.target_size
    }

    #[inline]
    pub fn host_node(&self) -> Option<&NodeId> {
        self.host_node.as_ref()
    }

    #[inline]
    pub fn host_item(&self) -> Option<ItemId> {
        self.host_item
    }
}
