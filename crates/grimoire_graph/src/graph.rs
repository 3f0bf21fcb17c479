// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing spell nodes and connections.

use crate::connection::{Connection, ConnectionId};
use crate::node::{NodeId, NodeKindTag, SpellNode};
use crate::port::{PinDirection, PinRef};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A spell graph: an arena of nodes addressed by ID plus pin-to-pin connections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Nodes in insertion order
    nodes: IndexMap<NodeId, SpellNode>,
    /// Connections in creation order
    connections: IndexMap<ConnectionId, Connection>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
        }
    }

    /// Add a node to the graph.
    ///
    /// A node whose ID is already present is ignored.
    pub fn add_node(&mut self, node: SpellNode) -> NodeId {
        let id = node.id;
        if self.nodes.contains_key(&id) {
            tracing::warn!("Node {} already in graph '{}', ignoring", id, self.name);
            return id;
        }
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node and its connections
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<SpellNode> {
        self.connections.retain(|_, c| !c.involves_node(node_id));
        self.nodes.shift_remove(&node_id)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&SpellNode> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut SpellNode> {
        self.nodes.get_mut(&node_id)
    }

    /// Check whether a node is present
    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Get all nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &SpellNode> {
        self.nodes.values()
    }

    /// Get all node IDs in insertion order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get nodes of one kind
    pub fn nodes_of_kind(&self, tag: NodeKindTag) -> impl Iterator<Item = &SpellNode> {
        self.nodes.values().filter(move |n| n.tag() == tag)
    }

    /// Connect an output pin to an input pin
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_pin: &str,
        to_node: NodeId,
        to_pin: &str,
    ) -> Result<ConnectionId, ConnectionError> {
        let source_node = self
            .nodes
            .get(&from_node)
            .ok_or(ConnectionError::NodeNotFound(from_node))?;
        let target_node = self
            .nodes
            .get(&to_node)
            .ok_or(ConnectionError::NodeNotFound(to_node))?;

        let source_pin = source_node
            .output_pin(from_pin)
            .ok_or_else(|| ConnectionError::PinNotFound(from_node, from_pin.to_string()))?;
        let target_pin = target_node
            .input_pin(to_pin)
            .ok_or_else(|| ConnectionError::PinNotFound(to_node, to_pin.to_string()))?;

        if !source_pin.can_connect(&target_pin) {
            return Err(ConnectionError::IncompatiblePins);
        }

        if from_node == to_node {
            return Err(ConnectionError::SelfLoop);
        }

        // Data inputs take a single source
        if !target_pin.pin_type.is_execution()
            && self
                .connections
                .values()
                .any(|c| c.to_node == to_node && c.to_pin == to_pin)
        {
            return Err(ConnectionError::PinAlreadyConnected(to_node, to_pin.to_string()));
        }

        if source_pin.pin_type.is_execution() {
            let limit = source_node.rarity.max_connections();
            let existing = self
                .connections
                .values()
                .filter(|c| c.from_node == from_node && c.from_pin == from_pin)
                .count();
            if existing >= limit {
                return Err(ConnectionError::ConnectionLimit {
                    node: from_node,
                    pin: from_pin.to_string(),
                    limit,
                });
            }
        }

        let connection = Connection::new(from_node, from_pin, to_node, to_pin);
        let id = connection.id;
        self.connections.insert(id, connection);
        Ok(id)
    }

    /// Remove a connection
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        self.connections.shift_remove(&connection_id)
    }

    /// Get a connection by ID
    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get connections involving a node
    pub fn connections_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.involves_node(node_id))
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Far ends of every connection attached to a pin, in connection order.
    ///
    /// Works for both input and output pins.
    pub fn connected_pins(&self, node_id: NodeId, pin: &str) -> Vec<PinRef> {
        self.connections
            .values()
            .filter_map(|c| c.far_end(node_id, pin))
            .collect()
    }

    /// Nodes on the far end of a pin, in connection order
    pub fn connected_nodes(&self, node_id: NodeId, pin: &str) -> Vec<NodeId> {
        self.connected_pins(node_id, pin)
            .into_iter()
            .map(|p| p.node)
            .collect()
    }

    /// Nodes fed by an output pin, in connection order
    pub fn targets_of(&self, node_id: NodeId, pin: &str) -> Vec<NodeId> {
        self.connections
            .values()
            .filter(|c| c.from_node == node_id && c.from_pin == pin)
            .map(|c| c.to_node)
            .collect()
    }

    /// Source of a connected data input pin
    pub fn data_source(&self, node_id: NodeId, pin: &str) -> Option<PinRef> {
        self.connections
            .values()
            .find(|c| c.to_node == node_id && c.to_pin == pin)
            .map(|c| PinRef::new(c.from_node, c.from_pin.clone()))
    }

    /// Declared pins of a node in one direction
    pub fn pins_of(&self, node_id: NodeId, direction: PinDirection) -> Vec<String> {
        let Some(node) = self.nodes.get(&node_id) else {
            return Vec::new();
        };
        let pins = match direction {
            PinDirection::Input => node.input_pins(),
            PinDirection::Output => node.output_pins(),
        };
        pins.into_iter().map(|p| p.name).collect()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Error when creating a connection
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Pin not found on the node
    #[error("Pin '{1}' not found on node {0}")]
    PinNotFound(NodeId, String),

    /// Incompatible pin directions or types
    #[error("Incompatible pins")]
    IncompatiblePins,

    /// Data input already has a source
    #[error("Pin '{1}' on node {0} is already connected")]
    PinAlreadyConnected(NodeId, String),

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,

    /// Execution output pin is at its rarity limit
    #[error("Pin '{pin}' on node {node} already has {limit} connection(s)")]
    ConnectionLimit {
        /// Source node
        node: NodeId,
        /// Source pin
        pin: String,
        /// Limit for the node's rarity
        limit: usize,
    },
}
