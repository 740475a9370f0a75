use crate::{NodeId, SceneHost};
use std::fmt;
use std::sync::Arc;

/// A node reference taken from the host, released exactly once on drop.
pub struct NodeLease<H: SceneHost + ?Sized> {
    host: Arc<H>,
    node: NodeId,
}

impl<H: SceneHost + ?Sized> NodeLease<H> {
    /// Acquire a reference on `id`. Empty ids and unknown nodes yield `None`.
    pub fn acquire(host: &Arc<H>, id: &str) -> Option<Self> {
        if id.is_empty() {
            return None;
        }
        let node = host.acquire_node(id)?;
        Some(Self {
            host: Arc::clone(host),
            node,
        })
    }

    #[inline]
    pub fn node(&self) -> &NodeId {
        &self.node
    }
}

impl<H: SceneHost + ?Sized> Drop for NodeLease<H> {
    fn drop(&mut self) {
        self.host.release_node(&self.node);
    }
}

impl<H: SceneHost + ?Sized> fmt::Debug for NodeLease<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeLease").field(&self.node).finish()
    }
}
