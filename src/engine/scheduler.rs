//! Coalescing render scheduler.
//!
//! Renders run on a dedicated worker thread. Requests arriving while a pass
//! is in flight collapse into a single follow-up pass, so a burst of edits
//! costs at most one extra render.

use std::sync::mpsc::{Sender, channel};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::engine::cook::{CookEngine, ExecuteError};
use crate::model::graph::Graph;
use crate::model::node::NodeId;
use crate::model::value::Value;

/// The value of one output port after a render pass.
#[derive(Clone, Debug, PartialEq)]
pub struct PortSnapshot {
    /// Absolute path of the owning node.
    pub node: String,
    pub port: String,
    pub value: Option<Value>,
}

pub type RenderOutcome = Result<Vec<PortSnapshot>, ExecuteError>;

/// Observer hooks invoked on the worker thread around each render pass.
pub trait RenderCallbacks: Send + Sync {
    fn on_render_started(&self) {}
    fn on_render_finished(&self, _outcome: &RenderOutcome) {}
}

/// Callbacks that observe nothing.
pub struct NullCallbacks;

impl RenderCallbacks for NullCallbacks {}

#[derive(Default)]
struct RenderFlags {
    in_progress: bool,
    requested: bool,
}

/// Schedules render passes over a shared graph.
///
/// [`RenderScheduler::request_render`] never blocks and may be called from
/// any thread. While a pass runs, any number of further requests fold into
/// exactly one follow-up pass; a pass that is already running is never
/// cancelled.
pub struct RenderScheduler {
    flags: Arc<Mutex<RenderFlags>>,
    active: Arc<Mutex<NodeId>>,
    job_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl RenderScheduler {
    /// Spawn the worker thread. The active container starts at the graph's
    /// root.
    pub fn new(
        graph: Arc<RwLock<Graph>>,
        engine: CookEngine,
        callbacks: Arc<dyn RenderCallbacks>,
    ) -> Self {
        let root = graph.read().expect("graph lock poisoned").root();
        let flags = Arc::new(Mutex::new(RenderFlags::default()));
        let active = Arc::new(Mutex::new(root));

        let (job_tx, job_rx) = channel::<()>();
        let worker_flags = Arc::clone(&flags);
        let worker_active = Arc::clone(&active);
        let worker = thread::spawn(move || {
            while job_rx.recv().is_ok() {
                loop {
                    callbacks.on_render_started();
                    let target = *worker_active.lock().expect("active lock poisoned");
                    let outcome = {
                        let mut graph = graph.write().expect("graph lock poisoned");
                        engine
                            .cook(&mut graph, target)
                            .map(|_| snapshot_outputs(&graph, target))
                    };
                    if let Err(err) = &outcome {
                        warn!("render pass failed: {}", err.chain_description());
                    }
                    callbacks.on_render_finished(&outcome);

                    let mut flags = worker_flags.lock().expect("flags lock poisoned");
                    if flags.requested {
                        // Everything requested during the pass collapses
                        // into this one follow-up.
                        flags.requested = false;
                        debug!("running coalesced follow-up render");
                    } else {
                        flags.in_progress = false;
                        break;
                    }
                }
            }
        });

        Self {
            flags,
            active,
            job_tx: Some(job_tx),
            worker: Some(worker),
        }
    }

    /// The container cooked by render passes.
    pub fn active_container(&self) -> NodeId {
        *self.active.lock().expect("active lock poisoned")
    }

    /// Point subsequent render passes at a different container. A pass that
    /// is already running finishes against the old target.
    pub fn set_active_container(&self, node: NodeId) {
        *self.active.lock().expect("active lock poisoned") = node;
    }

    /// Ask for a render pass. Never blocks.
    ///
    /// If no pass is running, one starts. If one is running, a single
    /// follow-up pass is noted regardless of how many requests arrive.
    pub fn request_render(&self) {
        {
            let mut flags = self.flags.lock().expect("flags lock poisoned");
            if flags.in_progress {
                flags.requested = true;
                return;
            }
            flags.in_progress = true;
        }
        if let Some(tx) = &self.job_tx {
            // Failure means the worker is gone, which only happens on drop.
            let _ = tx.send(());
        }
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        if let Some(tx) = self.job_tx.take() {
            drop(tx);
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Collect the output port values of a container's children, in name order.
fn snapshot_outputs(graph: &Graph, container: NodeId) -> Vec<PortSnapshot> {
    let mut children = graph.children(container).unwrap_or_default();
    children.sort_by_key(|&c| graph.get(c).map(|n| n.name().to_string()));
    let mut snapshots = Vec::new();
    for child in children {
        let Some(node) = graph.get(child) else {
            continue;
        };
        let Ok(path) = graph.absolute_path(child) else {
            continue;
        };
        for port in node.ports().outputs() {
            snapshots.push(PortSnapshot {
                node: path.clone(),
                port: port.name().to_string(),
                value: port.value().cloned(),
            });
        }
    }
    snapshots
}
