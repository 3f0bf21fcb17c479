// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::node::NodeId;
use crate::port::PinRef;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// A connection from an output pin to an input pin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Source node ID
    pub from_node: NodeId,
    /// Source (output) pin name
    pub from_pin: String,
    /// Target node ID
    pub to_node: NodeId,
    /// Target (input) pin name
    pub to_pin: String,
}

impl Connection {
    /// Create a new connection
    pub fn new(
        from_node: NodeId,
        from_pin: impl Into<String>,
        to_node: NodeId,
        to_pin: impl Into<String>,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            from_node,
            from_pin: from_pin.into(),
            to_node,
            to_pin: to_pin.into(),
        }
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from_node == node_id || self.to_node == node_id
    }

    /// The opposite end of this connection when seen from `node`/`pin`.
    pub fn far_end(&self, node: NodeId, pin: &str) -> Option<PinRef> {
        if self.from_node == node && self.from_pin == pin {
            Some(PinRef::new(self.to_node, self.to_pin.clone()))
        } else if self.to_node == node && self.to_pin == pin {
            Some(PinRef::new(self.from_node, self.from_pin.clone()))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_far_end_both_directions() {
        let a = NodeId::new();
        let b = NodeId::new();
        let c = Connection::new(a, "ExecOut", b, "ExecIn");
        assert_eq!(c.far_end(a, "ExecOut"), Some(PinRef::new(b, "ExecIn")));
        assert_eq!(c.far_end(b, "ExecIn"), Some(PinRef::new(a, "ExecOut")));
        assert_eq!(c.far_end(a, "ExecIn"), None);
        assert!(c.involves_node(b));
    }
}
