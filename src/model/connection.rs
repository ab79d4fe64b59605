//! Connections: directed edges between an output port and an input port.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::node::NodeId;

/// Identifies a specific port on a specific node.
///
/// This is a weak reference: it does not keep the port alive and is
/// invalidated when the port or its node is removed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub node: NodeId,
    pub port: String,
}

impl PortRef {
    pub fn new(node: NodeId, port: &str) -> Self {
        Self {
            node,
            port: port.to_string(),
        }
    }
}

/// A directed edge from one output port to one input port.
///
/// The connection runs from the upstream output to the downstream input. Both
/// endpoints are children of the same container, which owns the connection.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Connection {
    pub id: Uuid,
    /// Downstream input port.
    pub input: PortRef,
    /// Upstream output port.
    pub output: PortRef,
}

impl Connection {
    pub fn new(input: PortRef, output: PortRef) -> Self {
        Self {
            id: Uuid::new_v4(),
            input,
            output,
        }
    }

    /// The node the input port belongs to.
    pub fn input_node(&self) -> NodeId {
        self.input.node
    }

    /// The node the output port belongs to.
    pub fn output_node(&self) -> NodeId {
        self.output.node
    }

    /// Check if either endpoint belongs to the given node.
    pub fn touches_node(&self, node: NodeId) -> bool {
        self.input.node == node || self.output.node == node
    }

    /// Check if either endpoint is the given port.
    pub fn touches_port(&self, port: &PortRef) -> bool {
        self.input == *port || self.output == *port
    }
}
