//! The data model: values, ports, connections, nodes and the graph arena.

pub mod connection;
pub mod graph;
pub mod node;
pub mod port;
pub mod value;
