//! Coordinator actor and the per-node client side.
//!
//! `JobManager` runs on rank 0 only: it owns the `JobQueue` and serves
//! requests from every node until each worker has been released. Every node
//! (rank 0 included) talks to it through a stateless `JobManagerProxy`,
//! which hands out one `WorkerHandle` per worker slot.

use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, info};

use crate::classes::ClassRegistry;
use crate::row::{Matrix, Row};

use super::messages::{NodeId, Reply, Request, WorkerId};
use super::queue::JobQueue;
use super::transport::Transport;
use super::{panic_reason, PipelineError};

pub struct JobManager<'t, T: Transport + ?Sized> {
    transport: &'t T,
    queue: JobQueue,
    threads: usize,
}

impl<'t, T: Transport + ?Sized> JobManager<'t, T> {
    /// Coordinator for `transport.node_count() * threads` workers.
    pub fn new(
        transport: &'t T,
        registry: ClassRegistry,
        threads: usize,
    ) -> Result<Self, PipelineError> {
        let rank = transport.rank();
        if !rank.is_coordinator() {
            return Err(PipelineError::NotCoordinator(rank));
        }
        let workers = transport.node_count() * threads;
        Ok(Self {
            transport,
            queue: JobQueue::new(registry, workers),
            threads,
        })
    }

    /// Serve requests until every worker has received `Empty` or `Abort`.
    /// Returns the admitted representatives in discovery order.
    ///
    /// A panic while serving aborts every worker slot of every node, so no
    /// peer is left waiting on a reply.
    pub fn run(mut self) -> Result<Matrix, PipelineError> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.serve())) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(payload) => {
                let reason = panic_reason(payload.as_ref());
                error!(%reason, "coordinator panicked; aborting every worker");
                self.abort_everyone(&reason);
                return Err(PipelineError::CoordinatorPanicked(reason));
            }
        }
        if let Some(reason) = self.queue.abort_reason() {
            return Err(PipelineError::Aborted(reason.to_owned()));
        }
        info!(classes = self.queue.registry().len(), "coordinator finished");
        Ok(self.queue.into_rows())
    }

    fn serve(&mut self) -> Result<(), PipelineError> {
        while !self.queue.is_finished() {
            let request = self.transport.recv_request()?;
            match self.queue.handle(request) {
                Ok(out) => {
                    for (to, reply) in out {
                        self.transport.send_reply(to, reply)?;
                    }
                }
                Err(err) => debug!(%err, "request rejected"),
            }
        }
        Ok(())
    }

    /// One `Abort` into every mailbox. Workers that were already released
    /// never read theirs.
    fn abort_everyone(&self, reason: &str) {
        let reason = format!("coordinator panicked: {reason}");
        for node in 0..self.transport.node_count() {
            for slot in 0..self.threads {
                let to = WorkerId {
                    node: NodeId(node),
                    slot,
                };
                if let Err(err) = self.transport.send_reply(to, Reply::Abort(reason.clone())) {
                    debug!(worker = %to, %err, "abort not delivered");
                }
            }
        }
    }
}

/// Stateless client of the coordinator.
pub struct JobManagerProxy<'t, T: Transport + ?Sized> {
    transport: &'t T,
}

impl<'t, T: Transport + ?Sized> JobManagerProxy<'t, T> {
    pub fn new(transport: &'t T) -> Self {
        Self { transport }
    }

    pub fn worker(&self, slot: usize) -> WorkerHandle<'t, T> {
        WorkerHandle {
            transport: self.transport,
            id: WorkerId {
                node: self.transport.rank(),
                slot,
            },
            holding: false,
            finished: false,
        }
    }

    /// Admit rows without claiming a job.
    pub fn seed(&self, rows: Matrix) -> Result<(), PipelineError> {
        self.transport.send_request(Request::Seed { rows })
    }

    pub fn finish_seeding(&self) -> Result<(), PipelineError> {
        self.transport.send_request(Request::SeedingDone)
    }

    /// Abort before any worker holds a job.
    pub fn abort(&self, reason: String) -> Result<(), PipelineError> {
        self.transport
            .send_request(Request::Abort { from: None, reason })
    }
}

/// Client side of one worker thread.
///
/// Protocol: `get` then `put`, repeated, until `get` yields `None`.
pub struct WorkerHandle<'t, T: Transport + ?Sized> {
    transport: &'t T,
    id: WorkerId,
    holding: bool,
    finished: bool,
}

impl<'t, T: Transport + ?Sized> WorkerHandle<'t, T> {
    #[inline]
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Blocks until a job is available or the run is over. `None` means
    /// cluster-wide termination.
    pub fn get(&mut self) -> Result<Option<Row>, PipelineError> {
        if self.finished {
            return Ok(None);
        }
        if self.holding {
            return Err(PipelineError::StillHolding(self.id));
        }
        self.transport.send_request(Request::Get { from: self.id })?;
        match self.transport.recv_reply(self.id.slot)? {
            Reply::Job(row) => {
                self.holding = true;
                Ok(Some(row))
            }
            Reply::Empty => {
                self.finished = true;
                Ok(None)
            }
            Reply::Abort(reason) => {
                self.finished = true;
                Err(PipelineError::Aborted(reason))
            }
        }
    }

    /// Retire the claimed job with its (already reduced) neighbours.
    pub fn put(&mut self, rows: Matrix) -> Result<(), PipelineError> {
        if self.finished {
            return Err(PipelineError::PutAfterTermination);
        }
        if !self.holding {
            return Err(PipelineError::NoClaimedJob);
        }
        self.transport.send_request(Request::Complete {
            from: self.id,
            rows,
        })?;
        self.holding = false;
        Ok(())
    }

    /// Stop the whole run; this worker counts as released. No-op once the
    /// worker has been released.
    pub fn abort(&mut self, reason: String) -> Result<(), PipelineError> {
        if self.finished {
            return Ok(());
        }
        self.holding = false;
        self.finished = true;
        self.transport.send_request(Request::Abort {
            from: Some(self.id),
            reason,
        })
    }
}
