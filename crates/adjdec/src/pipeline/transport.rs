//! Session/transport contract and the in-process channel implementation.
//!
//! A transport knows its own rank and the node count, carries requests from
//! any worker to the coordinator, and carries replies back to one worker.
//! `ChannelCluster` simulates a cluster inside one process: one transport per
//! node, all sharing the same channel fabric.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

use super::messages::{NodeId, Reply, Request, WorkerId};
use super::PipelineError;

pub trait Transport: Send + Sync {
    fn rank(&self) -> NodeId;

    fn node_count(&self) -> usize;

    /// Worker slots available on every node.
    fn slots(&self) -> usize;

    fn send_request(&self, request: Request) -> Result<(), PipelineError>;

    /// Blocking receive; only valid on the coordinator.
    fn recv_request(&self) -> Result<Request, PipelineError>;

    fn send_reply(&self, to: WorkerId, reply: Reply) -> Result<(), PipelineError>;

    /// Blocking receive of the next reply addressed to `slot` on this node.
    fn recv_reply(&self, slot: usize) -> Result<Reply, PipelineError>;
}

struct Mailbox {
    tx: Sender<Reply>,
    rx: Mutex<Receiver<Reply>>,
}

struct Fabric {
    requests_tx: Sender<Request>,
    requests_rx: Mutex<Receiver<Request>>,
    // [node][slot]
    mailboxes: Vec<Vec<Mailbox>>,
}

/// Builder for a set of in-process nodes.
pub struct ChannelCluster;

impl ChannelCluster {
    /// One transport per node, ranks `0..nodes`, each with `slots` worker
    /// mailboxes.
    pub fn new(nodes: usize, slots: usize) -> Vec<ChannelTransport> {
        let (requests_tx, requests_rx) = channel();
        let mailboxes = (0..nodes)
            .map(|_| {
                (0..slots)
                    .map(|_| {
                        let (tx, rx) = channel();
                        Mailbox {
                            tx,
                            rx: Mutex::new(rx),
                        }
                    })
                    .collect()
            })
            .collect();
        let fabric = Arc::new(Fabric {
            requests_tx,
            requests_rx: Mutex::new(requests_rx),
            mailboxes,
        });
        (0..nodes)
            .map(|rank| ChannelTransport {
                rank: NodeId(rank),
                fabric: Arc::clone(&fabric),
            })
            .collect()
    }

    /// Single-node session.
    pub fn single(slots: usize) -> ChannelTransport {
        let mut nodes = Self::new(1, slots);
        nodes.remove(0)
    }
}

pub struct ChannelTransport {
    rank: NodeId,
    fabric: Arc<Fabric>,
}

impl ChannelTransport {
    fn mailbox(&self, worker: WorkerId) -> Result<&Mailbox, PipelineError> {
        self.fabric
            .mailboxes
            .get(worker.node.0)
            .and_then(|node| node.get(worker.slot))
            .ok_or(PipelineError::UnknownWorker(worker))
    }
}

impl Transport for ChannelTransport {
    fn rank(&self) -> NodeId {
        self.rank
    }

    fn node_count(&self) -> usize {
        self.fabric.mailboxes.len()
    }

    fn slots(&self) -> usize {
        self.fabric.mailboxes.first().map_or(0, Vec::len)
    }

    fn send_request(&self, request: Request) -> Result<(), PipelineError> {
        self.fabric
            .requests_tx
            .send(request)
            .map_err(|_| PipelineError::Disconnected)
    }

    fn recv_request(&self) -> Result<Request, PipelineError> {
        if !self.rank.is_coordinator() {
            return Err(PipelineError::NotCoordinator(self.rank));
        }
        let rx = self
            .fabric
            .requests_rx
            .lock()
            .map_err(|_| PipelineError::Disconnected)?;
        rx.recv().map_err(|_| PipelineError::Disconnected)
    }

    fn send_reply(&self, to: WorkerId, reply: Reply) -> Result<(), PipelineError> {
        self.mailbox(to)?
            .tx
            .send(reply)
            .map_err(|_| PipelineError::Disconnected)
    }

    fn recv_reply(&self, slot: usize) -> Result<Reply, PipelineError> {
        let mailbox = self.mailbox(WorkerId {
            node: self.rank,
            slot,
        })?;
        let rx = mailbox.rx.lock().map_err(|_| PipelineError::Disconnected)?;
        rx.recv().map_err(|_| PipelineError::Disconnected)
    }
}
