//! The node type catalog: named factories for node specs.
//!
//! A catalog maps type names to factory closures. Creating a node by type
//! name stamps out a fresh spec, so every instance carries its own behavior
//! and default port values.

use std::collections::BTreeMap;

use log::debug;

use crate::error::GraphError;
use crate::model::graph::Graph;
use crate::model::node::{NodeId, NodeSpec};

type SpecFactory = Box<dyn Fn() -> NodeSpec + Send + Sync>;

#[derive(Default)]
pub struct NodeCatalog {
    factories: BTreeMap<String, SpecFactory>,
}

impl NodeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type. A later registration under the same name
    /// replaces the earlier one.
    pub fn register(
        &mut self,
        type_name: &str,
        factory: impl Fn() -> NodeSpec + Send + Sync + 'static,
    ) {
        debug!("registering node type '{}'", type_name);
        self.factories
            .insert(type_name.to_string(), Box::new(factory));
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// The registered type names, sorted.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// A fresh spec for a registered type.
    pub fn spec(&self, type_name: &str) -> Result<NodeSpec, GraphError> {
        self.factories
            .get(type_name)
            .map(|factory| factory())
            .ok_or_else(|| GraphError::UnknownNodeType(type_name.to_string()))
    }

    /// Instantiate a registered type as a child of `parent`, with an
    /// automatically generated unique name.
    pub fn create(
        &self,
        graph: &mut Graph,
        parent: NodeId,
        type_name: &str,
    ) -> Result<NodeId, GraphError> {
        graph.create_child(parent, self.spec(type_name)?)
    }

    /// Instantiate a registered type under an explicit name.
    pub fn create_named(
        &self,
        graph: &mut Graph,
        parent: NodeId,
        type_name: &str,
        name: &str,
    ) -> Result<NodeId, GraphError> {
        graph.create_child(parent, self.spec(type_name)?.named(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin;
    use crate::model::graph::Graph;

    #[test]
    fn test_unknown_type_is_an_error() {
        let catalog = NodeCatalog::new();
        let err = catalog.spec("missing").unwrap_err();
        assert!(matches!(err, GraphError::UnknownNodeType(_)));
    }

    #[test]
    fn test_create_generates_unique_names() {
        let catalog = builtin::catalog();
        let mut graph = Graph::new();
        let root = graph.root();
        let a = catalog.create(&mut graph, root, "number").unwrap();
        let b = catalog.create(&mut graph, root, "number").unwrap();
        assert_eq!(graph.node(a).unwrap().name(), "number1");
        assert_eq!(graph.node(b).unwrap().name(), "number2");
        assert_eq!(graph.node(a).unwrap().type_name(), "number");
    }

    #[test]
    fn test_create_named() {
        let catalog = builtin::catalog();
        let mut graph = Graph::new();
        let root = graph.root();
        let a = catalog
            .create_named(&mut graph, root, "number", "amount")
            .unwrap();
        assert_eq!(graph.node(a).unwrap().name(), "amount");
        assert!(
            catalog
                .create_named(&mut graph, root, "number", "amount")
                .is_err()
        );
    }

    #[test]
    fn test_type_names_are_sorted() {
        let catalog = builtin::catalog();
        let names: Vec<&str> = catalog.type_names().collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(catalog.contains("multiply"));
    }
}
