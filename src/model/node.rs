//! Nodes: the processing units of the graph.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::connection::Connection;
use crate::model::port::{Port, PortSet};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(Uuid);

impl NodeId {
    pub(crate) fn new() -> Self {
        NodeId(Uuid::new_v4())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution mode of a node.
///
/// `Producer` nodes are never cooked implicitly by their container; they seed
/// values when cooked explicitly. `Filter` and `Consumer` nodes take part in
/// the container's cooking pass.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Producer,
    Filter,
    Consumer,
}

/// Cooking state of a node. Nodes start out dirty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    Dirty,
    Clean,
    Errored,
}

/// Error produced by a node's own processing logic.
pub type CookError = Box<dyn Error + Send + Sync>;

/// The processing capability of a leaf node.
///
/// Implementations read their input ports and write their output ports. They
/// must not reach outside their own port set; value propagation across
/// connections is the engine's job.
pub trait NodeBehavior: Send + Sync {
    fn cook(&mut self, ports: &mut PortSet) -> Result<(), CookError>;
}

impl<F> NodeBehavior for F
where
    F: FnMut(&mut PortSet) -> Result<(), CookError> + Send + Sync,
{
    fn cook(&mut self, ports: &mut PortSet) -> Result<(), CookError> {
        self(ports)
    }
}

/// Children and connections owned by a container node.
///
/// Connections only ever join ports on this container's direct children.
#[derive(Default)]
pub struct ContainerData {
    pub(crate) children: HashMap<String, NodeId>,
    pub(crate) connections: Vec<Connection>,
}

pub enum NodeKind {
    Leaf { behavior: Box<dyn NodeBehavior> },
    Container(ContainerData),
}

/// A processing unit that owns ports and, for containers, child nodes and
/// the connections between them.
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) type_name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) mode: Mode,
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) exported: bool,
    pub(crate) description: String,
    pub(crate) ports: PortSet,
    pub(crate) state: NodeState,
    pub(crate) error: Option<Arc<dyn Error + Send + Sync>>,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type tag used for factory dispatch and serialization.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn is_exported(&self) -> bool {
        self.exported
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn ports(&self) -> &PortSet {
        &self.ports
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    /// The error recorded during the last cook, if any.
    pub fn error(&self) -> Option<&Arc<dyn Error + Send + Sync>> {
        self.error.as_ref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Container(_))
    }

    pub(crate) fn container(&self) -> Option<&ContainerData> {
        match &self.kind {
            NodeKind::Container(data) => Some(data),
            NodeKind::Leaf { .. } => None,
        }
    }

    pub(crate) fn container_mut(&mut self) -> Option<&mut ContainerData> {
        match &mut self.kind {
            NodeKind::Container(data) => Some(data),
            NodeKind::Leaf { .. } => None,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("container", &self.is_container())
            .finish()
    }
}

/// Blueprint for a node, handed to [`crate::model::graph::Graph::create_child`].
///
/// The type name doubles as the prefix for automatically generated names:
/// a spec with type name `multiply` yields `multiply1`, `multiply2`, ...
pub struct NodeSpec {
    pub(crate) type_name: String,
    pub(crate) mode: Mode,
    pub(crate) name: Option<String>,
    pub(crate) description: String,
    pub(crate) ports: Vec<Port>,
    pub(crate) behavior: Option<Box<dyn NodeBehavior>>,
    pub(crate) container: bool,
}

impl fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSpec")
            .field("type_name", &self.type_name)
            .field("mode", &self.mode)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("ports", &self.ports)
            .field("behavior", &self.behavior.is_some())
            .field("container", &self.container)
            .finish()
    }
}

impl NodeSpec {
    /// A leaf node spec. A behavior should be attached with
    /// [`NodeSpec::with_behavior`]; without one the node cooks as a no-op.
    pub fn new(type_name: &str, mode: Mode) -> Self {
        Self {
            type_name: type_name.to_string(),
            mode,
            name: None,
            description: String::new(),
            ports: Vec::new(),
            behavior: None,
            container: false,
        }
    }

    /// A container node spec.
    pub fn container(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            mode: Mode::Consumer,
            name: None,
            description: String::new(),
            ports: Vec::new(),
            behavior: None,
            container: true,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_port(mut self, port: Port) -> Self {
        self.ports.push(port);
        self
    }

    pub fn with_behavior(mut self, behavior: impl NodeBehavior + 'static) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }
}
