//! Node graph core for a visual dataflow editor.
//!
//! The crate has three layers:
//!
//! * [`model`] holds the document: typed ports, connections, nodes and the
//!   container hierarchy, all owned by a [`Graph`] arena. Mutation goes
//!   through the graph so structural invariants hold and change events fire.
//! * [`engine::cook`] evaluates a container's children in dependency order,
//!   propagating values along connections and recording failures on the
//!   nodes that caused them.
//! * [`engine::scheduler`] runs cooks on a worker thread, coalescing bursts
//!   of render requests into at most one follow-up pass.

pub mod builtin;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod event;
pub mod model;

pub use catalog::NodeCatalog;
pub use engine::cook::{CookEngine, ExecuteError, ExpressionEvaluator};
pub use engine::scheduler::{
    NullCallbacks, PortSnapshot, RenderCallbacks, RenderOutcome, RenderScheduler,
};
pub use error::{ConnectionError, GraphError};
pub use event::GraphEvent;
pub use model::connection::{Connection, PortRef};
pub use model::graph::Graph;
pub use model::node::{CookError, Mode, NodeBehavior, NodeId, NodeSpec, NodeState};
pub use model::port::{Direction, Port, PortSet};
pub use model::value::{Color, Graphic, Point, PortType, Value};
