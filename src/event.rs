//! Change notifications emitted by the graph.
//!
//! The graph announces structural changes over plain mpsc channels. Nothing
//! in the core depends on a subscriber existing; senders whose receiver is
//! gone are pruned on the next emit.

use std::sync::mpsc::{Receiver, Sender, channel};

use crate::model::connection::Connection;
use crate::model::node::NodeId;

#[derive(Clone, Debug)]
pub enum GraphEvent {
    ChildAdded {
        parent: NodeId,
        child: NodeId,
    },
    ChildRemoved {
        parent: NodeId,
        child: NodeId,
        name: String,
    },
    ChildRenamed {
        node: NodeId,
        old_name: String,
        new_name: String,
    },
    ConnectionAdded {
        container: NodeId,
        connection: Connection,
    },
    ConnectionRemoved {
        container: NodeId,
        connection: Connection,
    },
    ValueChanged {
        node: NodeId,
        port: String,
    },
    PortsChanged {
        node: NodeId,
    },
    PositionChanged {
        node: NodeId,
    },
    AttributesChanged {
        node: NodeId,
    },
}

#[derive(Default)]
pub(crate) struct EventBus {
    senders: Vec<Sender<GraphEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<GraphEvent> {
        let (tx, rx) = channel();
        self.senders.push(tx);
        rx
    }

    pub fn emit(&mut self, event: GraphEvent) {
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::NodeId;

    fn some_node() -> NodeId {
        // Events carry ids opaquely; any id will do here.
        crate::model::node::NodeId::new()
    }

    #[test]
    fn test_subscribe_and_emit() {
        let mut bus = EventBus::new();
        let rx = bus.subscribe();
        bus.emit(GraphEvent::PortsChanged { node: some_node() });
        assert!(matches!(
            rx.try_recv().unwrap(),
            GraphEvent::PortsChanged { .. }
        ));
    }

    #[test]
    fn test_dead_receivers_are_pruned() {
        let mut bus = EventBus::new();
        let rx = bus.subscribe();
        drop(rx);
        bus.emit(GraphEvent::PortsChanged { node: some_node() });
        assert!(bus.senders.is_empty());
    }
}
