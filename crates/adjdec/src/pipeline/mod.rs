//! Distributed job pipeline.
//!
//! One coordinator (rank 0) owns the job queue and the class registry; every
//! node runs worker threads that claim a job, explore it, and put back its
//! reduced neighbours. Nodes only exchange `Request`/`Reply` messages through
//! a `Transport`; `ChannelCluster` provides an in-process one.
//!
//! Flow
//! - worker: `get` -> explore -> `put`, until `get` returns `None`;
//! - coordinator: admit each put row unless an equivalent one is known, hand
//!   admitted rows out FIFO, and release every worker with `Empty` once the
//!   queue is drained, nothing is in flight, and seeding is done.

mod manager;
mod messages;
mod queue;
mod transport;

pub use manager::{JobManager, JobManagerProxy, WorkerHandle};
pub use messages::{NodeId, Reply, Request, WorkerId};
pub use queue::{JobQueue, Outbox};
pub use transport::{ChannelCluster, ChannelTransport, Transport};

use std::any::Any;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transport disconnected")]
    Disconnected,

    #[error("node {0} is not the coordinator")]
    NotCoordinator(NodeId),

    #[error("no mailbox for worker {0}")]
    UnknownWorker(WorkerId),

    #[error("worker {0} asked for a job while still holding one")]
    StillHolding(WorkerId),

    #[error("put without a claimed job")]
    NoClaimedJob,

    #[error("put after termination")]
    PutAfterTermination,

    #[error("run aborted: {0}")]
    Aborted(String),

    #[error("coordinator panicked: {0}")]
    CoordinatorPanicked(String),
}

/// Message of a caught panic, if it carried one.
pub(crate) fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
