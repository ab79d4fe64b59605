//! The graph arena: node ownership, hierarchy and connection management.
//!
//! All mutation goes through `Graph` methods so the container invariants hold
//! (sibling names unique, connections scoped to one container, at most one
//! connection per input) and change events fire atomically with the edit.

use std::collections::{HashSet, VecDeque};
use std::collections::HashMap;
use std::sync::mpsc::Receiver;

use log::debug;

use crate::error::{ConnectionError, GraphError};
use crate::event::{EventBus, GraphEvent};
use crate::model::connection::{Connection, PortRef};
use crate::model::node::{
    ContainerData, Mode, Node, NodeId, NodeKind, NodeSpec, NodeState,
};
use crate::model::port::{Port, PortSet, validate_name};
use crate::model::value::Value;

pub struct Graph {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    events: EventBus,
}

impl Graph {
    /// Create a graph holding a single root container named `root`.
    pub fn new() -> Self {
        let root_id = NodeId::new();
        let root = Node {
            id: root_id,
            // The reserved word is deliberate: only the root carries it.
            name: "root".to_string(),
            type_name: "macro".to_string(),
            parent: None,
            mode: Mode::Consumer,
            x: 0.0,
            y: 0.0,
            exported: false,
            description: String::new(),
            ports: PortSet::new(),
            state: NodeState::Dirty,
            error: None,
            kind: NodeKind::Container(ContainerData::default()),
        };
        let mut nodes = HashMap::new();
        nodes.insert(root_id, root);
        Self {
            nodes,
            root: root_id,
            events: EventBus::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&mut self) -> Receiver<GraphEvent> {
        self.events.subscribe()
    }

    //// Lookup ////

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.nodes.get(&id).ok_or(GraphError::NodeNotFound)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, GraphError> {
        self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound)
    }

    /// Look up a direct child by name.
    pub fn child(&self, parent: NodeId, name: &str) -> Result<NodeId, GraphError> {
        let parent_node = self.node(parent)?;
        let container = self.container_of(parent)?;
        container
            .children
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::ChildNotFound {
                container: parent_node.name.clone(),
                name: name.to_string(),
            })
    }

    pub fn has_child(&self, parent: NodeId, name: &str) -> bool {
        self.container_of(parent)
            .map(|c| c.children.contains_key(name))
            .unwrap_or(false)
    }

    /// The direct children of a container.
    pub fn children(&self, parent: NodeId) -> Result<Vec<NodeId>, GraphError> {
        Ok(self.container_of(parent)?.children.values().copied().collect())
    }

    fn container_of(&self, id: NodeId) -> Result<&ContainerData, GraphError> {
        let node = self.node(id)?;
        node.container()
            .ok_or_else(|| GraphError::NotAContainer(node.name.clone()))
    }

    fn container_of_mut(&mut self, id: NodeId) -> Result<&mut ContainerData, GraphError> {
        let node = self.node_mut(id)?;
        let name = node.name.clone();
        node.container_mut().ok_or(GraphError::NotAContainer(name))
    }

    fn port(&self, port: &PortRef) -> Result<&Port, GraphError> {
        let node = self.node(port.node)?;
        node.ports.get(&port.port).ok_or_else(|| GraphError::PortNotFound {
            node: node.name.clone(),
            port: port.port.clone(),
        })
    }

    //// Paths ////

    /// The absolute path of a node, e.g. `/root/parent/child`.
    pub fn absolute_path(&self, id: NodeId) -> Result<String, GraphError> {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id)?;
            segments.push(node.name.clone());
            current = node.parent;
        }
        segments.reverse();
        Ok(format!("/{}", segments.join("/")))
    }

    /// Resolve an absolute path back to a node.
    pub fn node_at_path(&self, path: &str) -> Option<NodeId> {
        let mut segments = path.strip_prefix('/')?.split('/');
        if segments.next()? != self.node(self.root).ok()?.name {
            return None;
        }
        let mut current = self.root;
        for segment in segments {
            current = self.get(current)?.container()?.children.get(segment).copied()?;
        }
        Some(current)
    }

    //// Hierarchy ////

    /// Generate a child name that is unique within the container.
    ///
    /// A trailing number on the prefix is used as the starting counter:
    /// `multiply` gives `multiply1`, `multiply2`, ...
    pub fn unique_name(&self, parent: NodeId, prefix: &str) -> String {
        let trimmed = prefix.trim_end_matches(|c: char| c.is_ascii_digit());
        let mut counter: u64 = prefix[trimmed.len()..].parse().unwrap_or(1);
        loop {
            let candidate = format!("{}{}", trimmed, counter);
            if !self.has_child(parent, &candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Create a child node in the given container from a spec.
    ///
    /// Without an explicit name, one is derived from the spec's type name and
    /// guaranteed unique. An explicit name must pass the identifier rules and
    /// not collide with a sibling; on failure the container is unchanged.
    pub fn create_child(&mut self, parent: NodeId, spec: NodeSpec) -> Result<NodeId, GraphError> {
        // Validate everything before touching the graph.
        self.container_of(parent)?;
        let name = match &spec.name {
            Some(name) => {
                validate_name(name)?;
                if self.has_child(parent, name) {
                    return Err(GraphError::invalid_name(
                        name,
                        "this container already has a child with this name",
                    ));
                }
                name.clone()
            }
            None => self.unique_name(parent, &spec.type_name),
        };
        let mut ports = PortSet::new();
        for port in spec.ports {
            ports.add(port)?;
        }

        let id = NodeId::new();
        let kind = if spec.container {
            NodeKind::Container(ContainerData::default())
        } else {
            NodeKind::Leaf {
                behavior: spec
                    .behavior
                    .unwrap_or_else(|| Box::new(|_: &mut PortSet| Ok(()))),
            }
        };
        let node = Node {
            id,
            name: name.clone(),
            type_name: spec.type_name,
            parent: Some(parent),
            mode: spec.mode,
            x: 0.0,
            y: 0.0,
            exported: false,
            description: spec.description,
            ports,
            state: NodeState::Dirty,
            error: None,
            kind,
        };
        self.nodes.insert(id, node);
        self.container_of_mut(parent)?.children.insert(name, id);
        self.events.emit(GraphEvent::ChildAdded { parent, child: id });
        Ok(id)
    }

    /// Remove a child node and its whole subtree.
    ///
    /// Every connection touching the child is removed first, so no dangling
    /// connection can reference a missing node.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        let child_node = self.node(child)?;
        if child_node.parent != Some(parent) {
            return Err(GraphError::ChildNotFound {
                container: self.node(parent)?.name.clone(),
                name: child_node.name.clone(),
            });
        }
        self.disconnect_node(child)?;

        let name = self.node(child)?.name.clone();
        self.container_of_mut(parent)?.children.remove(&name);
        self.remove_subtree(child);
        self.events.emit(GraphEvent::ChildRemoved {
            parent,
            child,
            name,
        });
        Ok(())
    }

    fn remove_subtree(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(&id) {
            if let NodeKind::Container(data) = node.kind {
                for child in data.children.values() {
                    self.remove_subtree(*child);
                }
            }
        }
    }

    /// Rename a node. The new name must be valid and unique among siblings.
    pub fn rename(&mut self, id: NodeId, new_name: &str) -> Result<(), GraphError> {
        let node = self.node(id)?;
        let old_name = node.name.clone();
        if old_name == new_name {
            return Ok(());
        }
        let parent = node.parent.ok_or_else(|| {
            GraphError::invalid_name(new_name, "the root container cannot be renamed")
        })?;
        validate_name(new_name)?;
        if self.has_child(parent, new_name) {
            return Err(GraphError::invalid_name(
                new_name,
                "this container already has a child with this name",
            ));
        }
        let container = self.container_of_mut(parent)?;
        container.children.remove(&old_name);
        container.children.insert(new_name.to_string(), id);
        self.node_mut(id)?.name = new_name.to_string();
        self.events.emit(GraphEvent::ChildRenamed {
            node: id,
            old_name,
            new_name: new_name.to_string(),
        });
        Ok(())
    }

    //// Attributes ////

    pub fn set_position(&mut self, id: NodeId, x: f64, y: f64) -> Result<(), GraphError> {
        let node = self.node_mut(id)?;
        if node.x == x && node.y == y {
            return Ok(());
        }
        node.x = x;
        node.y = y;
        self.events.emit(GraphEvent::PositionChanged { node: id });
        Ok(())
    }

    pub fn set_mode(&mut self, id: NodeId, mode: Mode) -> Result<(), GraphError> {
        self.node_mut(id)?.mode = mode;
        self.events.emit(GraphEvent::AttributesChanged { node: id });
        Ok(())
    }

    pub fn set_description(&mut self, id: NodeId, description: &str) -> Result<(), GraphError> {
        self.node_mut(id)?.description = description.to_string();
        self.events.emit(GraphEvent::AttributesChanged { node: id });
        Ok(())
    }

    pub fn set_exported(&mut self, id: NodeId, exported: bool) -> Result<(), GraphError> {
        self.node_mut(id)?.exported = exported;
        self.events.emit(GraphEvent::AttributesChanged { node: id });
        Ok(())
    }

    //// Ports ////

    /// Add a port to a node. Port names share the identifier rules and must
    /// be unique on the node.
    pub fn add_port(&mut self, id: NodeId, port: Port) -> Result<(), GraphError> {
        self.node_mut(id)?.ports.add(port)?;
        self.events.emit(GraphEvent::PortsChanged { node: id });
        Ok(())
    }

    /// Remove a port. Any connection touching it is removed as well.
    pub fn remove_port(&mut self, id: NodeId, name: &str) -> Result<(), GraphError> {
        let port_ref = PortRef::new(id, name);
        self.port(&port_ref)?;
        if let Some(parent) = self.node(id)?.parent {
            self.remove_connections_where(parent, |c| c.touches_port(&port_ref))?;
        }
        self.node_mut(id)?.ports.remove(name);
        self.events.emit(GraphEvent::PortsChanged { node: id });
        Ok(())
    }

    /// The current value of a port.
    pub fn port_value(&self, port: &PortRef) -> Result<Option<Value>, GraphError> {
        Ok(self.port(port)?.value().cloned())
    }

    /// Set a port value. Marks the node and its downstream dependents dirty.
    pub fn set_port_value(&mut self, port: &PortRef, value: Value) -> Result<(), GraphError> {
        self.port(port)?;
        let node = self.node_mut(port.node)?;
        node.ports
            .get_mut(&port.port)
            .expect("port existence checked above")
            .set_value(value)?;
        self.events.emit(GraphEvent::ValueChanged {
            node: port.node,
            port: port.port.clone(),
        });
        self.mark_dirty(port.node);
        Ok(())
    }

    /// Attach or clear the expression on a port. The expression is evaluated
    /// by the engine's evaluator seam during cooking.
    pub fn set_port_expression(
        &mut self,
        port: &PortRef,
        expression: Option<String>,
    ) -> Result<(), GraphError> {
        self.port(port)?;
        let node = self.node_mut(port.node)?;
        node.ports
            .get_mut(&port.port)
            .expect("port existence checked above")
            .set_expression(expression);
        self.mark_dirty(port.node);
        Ok(())
    }

    //// Connections ////

    /// Connect a downstream input port to an upstream output port.
    ///
    /// Both ports must live on different direct children of the same
    /// container, the input's declared type must accept the output's, and the
    /// connection may not create a cycle. An existing connection on the input
    /// is silently replaced.
    pub fn connect(&mut self, input: &PortRef, output: &PortRef) -> Result<Connection, GraphError> {
        let input_port = self.port(input)?;
        let output_port = self.port(output)?;
        if !input_port.is_input() {
            return Err(ConnectionError::NotAnInput(input.port.clone()).into());
        }
        if !output_port.is_output() {
            return Err(ConnectionError::NotAnOutput(output.port.clone()).into());
        }
        if input.node == output.node {
            return Err(ConnectionError::SameNode.into());
        }
        let input_parent = self.node(input.node)?.parent;
        let output_parent = self.node(output.node)?.parent;
        let container = match (input_parent, output_parent) {
            (Some(a), Some(b)) if a == b => a,
            _ => return Err(ConnectionError::CrossContainer.into()),
        };
        let input_type = input_port.port_type();
        let output_type = output_port.port_type();
        if !input_type.accepts(output_type) {
            return Err(ConnectionError::IncompatibleTypes {
                input: input_type,
                output: output_type,
            }
            .into());
        }
        // Reject indirect cycles too: the topological cook order is only
        // well-defined over an acyclic connection set.
        if self.reaches(container, input.node, output.node)? {
            return Err(ConnectionError::WouldCycle.into());
        }

        // An input holds at most one connection; replace silently.
        self.remove_connections_where(container, |c| c.input == *input)?;

        let connection = Connection::new(input.clone(), output.clone());
        self.container_of_mut(container)?
            .connections
            .push(connection.clone());
        debug!(
            "connected {}.{} <- {}.{}",
            connection.input.node, connection.input.port, connection.output.node,
            connection.output.port
        );
        self.events.emit(GraphEvent::ConnectionAdded {
            container,
            connection: connection.clone(),
        });
        self.mark_dirty(input.node);
        Ok(connection)
    }

    /// Check whether `to` is reachable from `from` following connections
    /// downstream within the container.
    fn reaches(&self, container: NodeId, from: NodeId, to: NodeId) -> Result<bool, GraphError> {
        let connections = &self.container_of(container)?.connections;
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(from);
        while let Some(current) = queue.pop_front() {
            if current == to {
                return Ok(true);
            }
            if !visited.insert(current) {
                continue;
            }
            for c in connections {
                if c.output_node() == current {
                    queue.push_back(c.input_node());
                }
            }
        }
        Ok(false)
    }

    /// Remove the single connection into an input port, reverting the port to
    /// its default value. Passing a port that is not an input is an error:
    /// disconnecting by output is a distinct operation, `disconnect_output`.
    pub fn disconnect_input(&mut self, input: &PortRef) -> Result<bool, GraphError> {
        if !self.port(input)?.is_input() {
            return Err(ConnectionError::NotAnInput(input.port.clone()).into());
        }
        let parent = match self.node(input.node)?.parent {
            Some(parent) => parent,
            None => return Ok(false),
        };
        let removed = self.remove_connections_where(parent, |c| c.input == *input)?;
        Ok(removed > 0)
    }

    /// Remove every connection sourced from an output port. Each affected
    /// input reverts to its default value.
    pub fn disconnect_output(&mut self, output: &PortRef) -> Result<bool, GraphError> {
        if !self.port(output)?.is_output() {
            return Err(ConnectionError::NotAnOutput(output.port.clone()).into());
        }
        let parent = match self.node(output.node)?.parent {
            Some(parent) => parent,
            None => return Ok(false),
        };
        let removed = self.remove_connections_where(parent, |c| c.output == *output)?;
        Ok(removed > 0)
    }

    /// Remove every connection where the node owns either endpoint.
    pub fn disconnect_node(&mut self, id: NodeId) -> Result<bool, GraphError> {
        let parent = match self.node(id)?.parent {
            Some(parent) => parent,
            None => return Ok(false),
        };
        let removed = self.remove_connections_where(parent, |c| c.touches_node(id))?;
        Ok(removed > 0)
    }

    /// Remove all connections in `container` matching the predicate, revert
    /// the affected input ports and emit removal events. Returns the number
    /// of removed connections.
    fn remove_connections_where(
        &mut self,
        container: NodeId,
        predicate: impl Fn(&Connection) -> bool,
    ) -> Result<usize, GraphError> {
        let data = self.container_of_mut(container)?;
        let mut removed = Vec::new();
        data.connections.retain(|c| {
            if predicate(c) {
                removed.push(c.clone());
                false
            } else {
                true
            }
        });
        for connection in &removed {
            if let Ok(node) = self.node_mut(connection.input.node) {
                if let Some(port) = node.ports.get_mut(&connection.input.port) {
                    port.revert_to_default();
                }
            }
            self.events.emit(GraphEvent::ConnectionRemoved {
                container,
                connection: connection.clone(),
            });
        }
        Ok(removed.len())
    }

    /// A snapshot of the container's connections, safe to iterate while
    /// mutating the graph.
    pub fn connections(&self, container: NodeId) -> Result<Vec<Connection>, GraphError> {
        Ok(self.container_of(container)?.connections.clone())
    }

    /// Check if any connection touches the node.
    pub fn is_connected_node(&self, id: NodeId) -> Result<bool, GraphError> {
        let parent = match self.node(id)?.parent {
            Some(parent) => parent,
            None => return Ok(false),
        };
        Ok(self
            .container_of(parent)?
            .connections
            .iter()
            .any(|c| c.touches_node(id)))
    }

    /// Check if any connection touches the port.
    pub fn is_connected_port(&self, port: &PortRef) -> Result<bool, GraphError> {
        self.port(port)?;
        let parent = match self.node(port.node)?.parent {
            Some(parent) => parent,
            None => return Ok(false),
        };
        Ok(self
            .container_of(parent)?
            .connections
            .iter()
            .any(|c| c.touches_port(port)))
    }

    /// Check if the input port is connected to the output port.
    pub fn is_connected_to(&self, input: &PortRef, output: &PortRef) -> Result<bool, GraphError> {
        self.port(input)?;
        self.port(output)?;
        let parent = match self.node(input.node)?.parent {
            Some(parent) => parent,
            None => return Ok(false),
        };
        Ok(self
            .container_of(parent)?
            .connections
            .iter()
            .any(|c| c.input == *input && c.output == *output))
    }

    //// Dirty tracking ////

    /// Mark a node dirty, together with its transitive downstream dependents
    /// and its ancestor containers. Reverting a disconnected input does not
    /// come through here: a removed dependency does not invalidate results.
    pub(crate) fn mark_dirty(&mut self, id: NodeId) {
        let mut visited = HashSet::new();
        self.mark_dirty_inner(id, &mut visited);
    }

    fn mark_dirty_inner(&mut self, id: NodeId, visited: &mut HashSet<NodeId>) {
        if !visited.insert(id) {
            return;
        }
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        node.state = NodeState::Dirty;
        let parent = node.parent;
        if let Some(parent) = parent {
            let downstream: Vec<NodeId> = self
                .container_of(parent)
                .map(|c| {
                    c.connections
                        .iter()
                        .filter(|c| c.output_node() == id)
                        .map(|c| c.input_node())
                        .collect()
                })
                .unwrap_or_default();
            for dependent in downstream {
                self.mark_dirty_inner(dependent, visited);
            }
            self.mark_dirty_inner(parent, visited);
        }
    }

    pub(crate) fn set_state(&mut self, id: NodeId, state: NodeState) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.state = state;
        }
    }

    pub(crate) fn set_error(
        &mut self,
        id: NodeId,
        error: Option<std::sync::Arc<dyn std::error::Error + Send + Sync>>,
    ) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.error = error;
        }
    }

    pub(crate) fn emit(&mut self, event: GraphEvent) {
        self.events.emit(event);
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
