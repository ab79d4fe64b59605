//! Error types for graph mutation and name validation.
//!
//! Structural errors are synchronous call failures: validation happens before
//! any mutation, so a failed call never leaves the graph half-changed. Errors
//! raised while cooking live in [`crate::engine::cook::ExecuteError`].

use thiserror::Error;

use crate::model::value::PortType;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
    #[error("invalid connection: {0}")]
    InvalidConnection(#[from] ConnectionError),
    #[error("type mismatch on port '{port}': expected {expected}, got {actual}")]
    TypeMismatch {
        port: String,
        expected: PortType,
        actual: PortType,
    },
    #[error("container '{container}' has no child named '{name}'")]
    ChildNotFound { container: String, name: String },
    #[error("node '{node}' has no port named '{port}'")]
    PortNotFound { node: String, port: String },
    #[error("node is not part of this graph")]
    NodeNotFound,
    #[error("node '{0}' is not a container")]
    NotAContainer(String),
    #[error("no node type named '{0}' is registered")]
    UnknownNodeType(String),
}

impl GraphError {
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        GraphError::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// The distinct reasons a `connect` call can be rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("port '{0}' is not an input port")]
    NotAnInput(String),
    #[error("port '{0}' is not an output port")]
    NotAnOutput(String),
    #[error("input and output ports are on the same node")]
    SameNode,
    #[error("input and output nodes are not children of the same container")]
    CrossContainer,
    #[error("input type {input} does not accept output type {output}")]
    IncompatibleTypes { input: PortType, output: PortType },
    #[error("connection would create a cyclic dependency")]
    WouldCycle,
}
