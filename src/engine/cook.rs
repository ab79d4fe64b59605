//! The cooking engine: dependency-ordered evaluation of a container's
//! children, with value propagation along connections.

use std::collections::{HashMap, HashSet, VecDeque};
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use log::{debug, error};

use crate::event::GraphEvent;
use crate::model::graph::Graph;
use crate::model::node::{CookError, Mode, NodeId, NodeKind, NodeState};
use crate::model::value::Value;

/// Raised when a node fails to cook.
///
/// Carries the absolute path of the node that failed. Containers wrap the
/// child's error rather than flattening it, so the chain names the innermost
/// failing node and every containing container.
#[derive(Debug, Clone)]
pub struct ExecuteError {
    node: String,
    cause: Arc<dyn Error + Send + Sync>,
}

impl ExecuteError {
    pub(crate) fn new(node: &str, cause: Arc<dyn Error + Send + Sync>) -> Self {
        Self {
            node: node.to_string(),
            cause,
        }
    }

    /// Absolute path of the node this error was raised on.
    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn cause(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.cause.as_ref()
    }

    /// The innermost failure in a chain of wrapped container errors.
    pub fn innermost(&self) -> &ExecuteError {
        let mut current = self;
        while let Some(next) = current.cause.downcast_ref::<ExecuteError>() {
            current = next;
        }
        current
    }

    /// Human-readable description of the full cause chain.
    pub fn chain_description(&self) -> String {
        let mut parts = vec![self.to_string()];
        let mut source: Option<&(dyn Error + 'static)> = self.source();
        while let Some(err) = source {
            parts.push(err.to_string());
            source = err.source();
        }
        parts.join(": ")
    }
}

impl fmt::Display for ExecuteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error while cooking node '{}'", self.node)
    }
}

impl Error for ExecuteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.cause as &(dyn Error + 'static))
    }
}

/// Opaque seam to the embedded-language evaluator.
///
/// The contract is "give me a value for this expression, given the port
/// values visible in scope"; the call may fail, which counts as a cook
/// failure of the owning node.
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(
        &self,
        expression: &str,
        scope: &HashMap<String, Value>,
    ) -> Result<Value, CookError>;
}

/// Cooks nodes against an explicit graph handle.
///
/// The engine is synchronous and single-threaded per pass; concurrency lives
/// in [`crate::engine::scheduler`].
#[derive(Default)]
pub struct CookEngine {
    evaluator: Option<Arc<dyn ExpressionEvaluator>>,
}

impl CookEngine {
    pub fn new() -> Self {
        Self { evaluator: None }
    }

    pub fn with_evaluator(evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self {
            evaluator: Some(evaluator),
        }
    }

    /// Cook a node. Containers are cooked exactly like leaves: callers never
    /// special-case them.
    ///
    /// On success the node is `Clean` and its error slot empty. On failure
    /// the failing node keeps its causing error, every containing container
    /// records a wrapping error, and the returned chain describes both.
    pub fn cook(&self, graph: &mut Graph, id: NodeId) -> Result<(), ExecuteError> {
        let path = graph
            .absolute_path(id)
            .unwrap_or_else(|_| id.to_string());
        let is_container = match graph.get(id) {
            Some(node) => node.is_container(),
            None => {
                return Err(ExecuteError::new(
                    &path,
                    Arc::new(crate::error::GraphError::NodeNotFound),
                ));
            }
        };
        debug!("cooking {}", path);
        let result = if is_container {
            self.cook_container(graph, id, &path)
        } else {
            self.cook_leaf(graph, id, &path)
        };
        match result {
            Ok(()) => {
                graph.set_error(id, None);
                graph.set_state(id, NodeState::Clean);
                Ok(())
            }
            Err(err) => {
                graph.set_state(id, NodeState::Errored);
                Err(err)
            }
        }
    }

    fn cook_leaf(&self, graph: &mut Graph, id: NodeId, path: &str) -> Result<(), ExecuteError> {
        self.evaluate_expressions(graph, id, path)?;
        let node = match graph.node_mut(id) {
            Ok(node) => node,
            Err(err) => return Err(record_failure(graph, id, path, Box::new(err))),
        };
        let result = match &mut node.kind {
            NodeKind::Leaf { behavior } => behavior.cook(&mut node.ports),
            NodeKind::Container(_) => Ok(()),
        };
        match result {
            Ok(()) => Ok(()),
            Err(cause) => Err(record_failure(graph, id, path, cause)),
        }
    }

    /// Evaluate any port expressions through the evaluator seam, before the
    /// node's own cook runs. The scope is the node's visible port values.
    fn evaluate_expressions(
        &self,
        graph: &mut Graph,
        id: NodeId,
        path: &str,
    ) -> Result<(), ExecuteError> {
        let Some(evaluator) = &self.evaluator else {
            return Ok(());
        };
        let node = match graph.node(id) {
            Ok(node) => node,
            Err(_) => return Ok(()),
        };
        let expressions: Vec<(String, String)> = node
            .ports()
            .iter()
            .filter_map(|p| p.expression().map(|e| (p.name().to_string(), e.to_string())))
            .collect();
        if expressions.is_empty() {
            return Ok(());
        }
        let scope: HashMap<String, Value> = node
            .ports()
            .iter()
            .filter_map(|p| p.value().map(|v| (p.name().to_string(), v.clone())))
            .collect();
        for (port_name, expression) in expressions {
            let value = match evaluator.evaluate(&expression, &scope) {
                Ok(value) => value,
                Err(cause) => return Err(record_failure(graph, id, path, cause)),
            };
            let assign = graph
                .node_mut(id)
                .ok()
                .and_then(|n| n.ports.get_mut(&port_name))
                .map(|p| p.set_value(value));
            if let Some(Err(err)) = assign {
                return Err(record_failure(graph, id, path, Box::new(err)));
            }
            graph.emit(GraphEvent::ValueChanged {
                node: id,
                port: port_name,
            });
        }
        Ok(())
    }

    fn cook_container(
        &self,
        graph: &mut Graph,
        id: NodeId,
        path: &str,
    ) -> Result<(), ExecuteError> {
        for child in self.topological_order(graph, id) {
            let state = match graph.get(child) {
                Some(node) => node.state(),
                None => continue,
            };
            // A clean child is skipped entirely: its inputs are not
            // re-propagated and its cook does not run.
            if state == NodeState::Clean {
                continue;
            }
            let result = match self.propagate_inputs(graph, id, child) {
                Ok(()) => self.cook(graph, child),
                Err(err) => Err(err),
            };
            if let Err(child_err) = result {
                // Fail fast: the rest of the order is abandoned. The child
                // keeps its own error; this container records the wrapper.
                let wrapper = ExecuteError::new(path, Arc::new(child_err));
                graph.set_error(id, Some(Arc::new(wrapper.clone())));
                error!("cook aborted: {}", wrapper.chain_description());
                return Err(wrapper);
            }
        }
        Ok(())
    }

    /// The container's `Consumer` and `Filter` children in dependency order.
    ///
    /// `Producer` children are never cooked implicitly; values already
    /// sitting on their output ports are read as-is during propagation. Only
    /// edges within the cooked subset order the pass; mutually independent
    /// nodes run in name order for stability.
    fn topological_order(&self, graph: &Graph, container: NodeId) -> Vec<NodeId> {
        let children = match graph.children(container) {
            Ok(children) => children,
            Err(_) => return Vec::new(),
        };
        let mut eligible: Vec<NodeId> = children
            .into_iter()
            .filter(|&c| {
                graph
                    .get(c)
                    .map(|n| matches!(n.mode(), Mode::Consumer | Mode::Filter))
                    .unwrap_or(false)
            })
            .collect();
        eligible.sort_by_key(|&c| graph.get(c).map(|n| n.name().to_string()));
        let eligible_set: HashSet<NodeId> = eligible.iter().copied().collect();

        let mut in_degree: HashMap<NodeId, usize> =
            eligible.iter().map(|&c| (c, 0)).collect();
        let mut downstream: HashMap<NodeId, Vec<NodeId>> =
            eligible.iter().map(|&c| (c, Vec::new())).collect();
        let connections = graph.connections(container).unwrap_or_default();
        for c in &connections {
            let (from, to) = (c.output_node(), c.input_node());
            if eligible_set.contains(&from) && eligible_set.contains(&to) {
                downstream.entry(from).or_default().push(to);
                *in_degree.entry(to).or_default() += 1;
            }
        }

        let mut queue: VecDeque<NodeId> = eligible
            .iter()
            .copied()
            .filter(|c| in_degree[c] == 0)
            .collect();
        let mut order = Vec::with_capacity(eligible.len());
        while let Some(node) = queue.pop_front() {
            order.push(node);
            let next_nodes = downstream.get(&node).cloned().unwrap_or_default();
            for next in next_nodes {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }
        // connect() rejects cycles, so the order always covers the subset.
        order
    }

    /// Copy the current value of each incoming connection's output port into
    /// the child's input port. This is the sole value-propagation mechanism:
    /// one hop per cook pass, no implicit pull beyond it.
    fn propagate_inputs(
        &self,
        graph: &mut Graph,
        container: NodeId,
        child: NodeId,
    ) -> Result<(), ExecuteError> {
        let incoming: Vec<_> = graph
            .connections(container)
            .unwrap_or_default()
            .into_iter()
            .filter(|c| c.input_node() == child)
            .collect();
        for connection in incoming {
            let value = match graph.port_value(&connection.output) {
                Ok(value) => value,
                Err(_) => continue,
            };
            let assign = graph
                .node_mut(child)
                .ok()
                .and_then(|n| n.ports.get_mut(&connection.input.port))
                .map(|p| p.assign(value));
            match assign {
                Some(Ok(())) => {
                    graph.emit(GraphEvent::ValueChanged {
                        node: child,
                        port: connection.input.port.clone(),
                    });
                }
                Some(Err(err)) => {
                    let path = graph
                        .absolute_path(child)
                        .unwrap_or_else(|_| child.to_string());
                    let failure = record_failure(graph, child, &path, Box::new(err));
                    graph.set_state(child, NodeState::Errored);
                    return Err(failure);
                }
                None => continue,
            }
        }
        Ok(())
    }
}

/// Record a causing error on the failed node and wrap it with the node's
/// identity.
fn record_failure(graph: &mut Graph, id: NodeId, path: &str, cause: CookError) -> ExecuteError {
    let cause: Arc<dyn Error + Send + Sync> = Arc::from(cause);
    graph.set_error(id, Some(cause.clone()));
    ExecuteError::new(path, cause)
}
