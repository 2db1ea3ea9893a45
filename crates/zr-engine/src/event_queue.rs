//! Time-ordered queue of deferred graph actions.

use crate::graph::NodeKey;

/// Work the engine performs on a node once its time comes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeferredAction {
    /// Disconnect and drop the node.
    Dispose(NodeKey),
    /// Stop the node (it is reaped once ended).
    Stop(NodeKey),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Deferred {
    pub time: f64,
    pub action: DeferredAction,
}

/// Deferred actions sorted by time. Equal times keep insertion order.
#[derive(Clone, Debug, Default)]
pub struct DeferredQueue {
    items: Vec<Deferred>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Insert an action due at `time`.
    pub fn push(&mut self, time: f64, action: DeferredAction) {
        let pos = self.items.partition_point(|d| d.time <= time);
        self.items.insert(pos, Deferred { time, action });
    }

    /// Next item without removing it.
    #[cfg(test)]
    pub fn peek(&self) -> Option<&Deferred> {
        self.items.first()
    }

    /// Remove and return everything due at or before `time`, in order.
    pub fn pop_until(&mut self, time: f64) -> impl Iterator<Item = Deferred> + '_ {
        let end = self.items.partition_point(|d| d.time <= time);
        self.items.drain(..end)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
