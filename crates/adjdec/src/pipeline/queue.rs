//! Coordinator-side job state machine.
//!
//! `JobQueue` owns the pending jobs, the class registry, the set of claimed
//! jobs and the parked `Get` requests. It is driven one `Request` at a time
//! and answers with the replies to send; no I/O happens here.
//!
//! Termination fires when nothing is pending, nothing is claimed and seeding
//! has finished. From then on every worker gets exactly one `Empty`.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, error, warn};

use crate::classes::ClassRegistry;
use crate::row::{Matrix, Row};

use super::messages::{Reply, Request, WorkerId};
use super::PipelineError;

#[derive(Clone, Debug, PartialEq, Eq)]
enum State {
    Running,
    Terminated,
    Aborted(String),
}

pub type Outbox = Vec<(WorkerId, Reply)>;

#[derive(Debug)]
pub struct JobQueue {
    pending: VecDeque<Row>,
    registry: ClassRegistry,
    claimed: HashMap<WorkerId, Row>,
    parked: VecDeque<WorkerId>,
    seeding: bool,
    state: State,
    workers: usize,
    released: usize,
}

impl JobQueue {
    /// Queue for `workers` workers in total (all nodes). Seeding is open
    /// until a `SeedingDone` request arrives.
    pub fn new(registry: ClassRegistry, workers: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            registry,
            claimed: HashMap::new(),
            parked: VecDeque::new(),
            seeding: true,
            state: State::Running,
            workers,
            released: 0,
        }
    }

    pub fn handle(&mut self, request: Request) -> Result<Outbox, PipelineError> {
        let mut out = Outbox::new();
        match request {
            Request::Get { from } => self.get(from, &mut out),
            Request::Complete { from, rows } => self.complete(from, rows)?,
            Request::Seed { rows } => {
                if self.state == State::Running {
                    self.admit_all(rows);
                }
            }
            Request::SeedingDone => self.seeding = false,
            Request::Abort { from, reason } => self.abort(from, reason, &mut out),
        }
        self.dispatch(&mut out);
        Ok(out)
    }

    /// Every worker has received its final `Empty` or `Abort`.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.released >= self.workers
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.state == State::Terminated
    }

    pub fn abort_reason(&self) -> Option<&str> {
        match &self.state {
            State::Aborted(reason) => Some(reason),
            _ => None,
        }
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn in_flight(&self) -> usize {
        self.claimed.len()
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub fn into_rows(self) -> Matrix {
        self.registry.into_rows()
    }

    fn get(&mut self, from: WorkerId, out: &mut Outbox) {
        if let Some(job) = self.claimed.remove(&from) {
            // A worker never asks twice without completing; put the job back.
            warn!(worker = %from, "get while holding a job; requeueing it");
            self.pending.push_front(job);
        }
        match self.state.clone() {
            State::Running => self.parked.push_back(from),
            State::Terminated => self.release(from, Reply::Empty, out),
            State::Aborted(reason) => self.release(from, Reply::Abort(reason), out),
        }
    }

    fn complete(&mut self, from: WorkerId, rows: Matrix) -> Result<(), PipelineError> {
        match self.state {
            State::Terminated => {
                error!(worker = %from, "put after termination; ignoring {} rows", rows.len());
                return Err(PipelineError::PutAfterTermination);
            }
            State::Aborted(_) => return Ok(()),
            State::Running => {}
        }
        if self.claimed.remove(&from).is_none() {
            error!(worker = %from, "put without a claimed job");
            return Err(PipelineError::NoClaimedJob);
        }
        let offered = rows.len();
        let admitted = self.admit_all(rows);
        debug!(worker = %from, offered, admitted, pending = self.pending.len(), "job retired");
        Ok(())
    }

    fn abort(&mut self, from: Option<WorkerId>, reason: String, out: &mut Outbox) {
        if let Some(worker) = from {
            self.claimed.remove(&worker);
            // The aborting worker stops on its own.
            self.released += 1;
        }
        if self.state == State::Running {
            warn!(%reason, "run aborted");
            self.state = State::Aborted(reason.clone());
        }
        self.pending.clear();
        while let Some(worker) = self.parked.pop_front() {
            self.release(worker, Reply::Abort(reason.clone()), out);
        }
    }

    fn admit_all(&mut self, rows: Matrix) -> usize {
        let mut admitted = 0;
        for row in rows {
            if self.registry.admit(row.clone()) {
                self.pending.push_back(row);
                admitted += 1;
            }
        }
        admitted
    }

    /// Hand out pending jobs to parked workers, then check for termination.
    fn dispatch(&mut self, out: &mut Outbox) {
        if self.state != State::Running {
            return;
        }
        while !self.pending.is_empty() {
            let Some(worker) = self.parked.pop_front() else {
                break;
            };
            let Some(job) = self.pending.pop_front() else {
                break;
            };
            self.claimed.insert(worker, job.clone());
            out.push((worker, Reply::Job(job)));
        }
        if self.pending.is_empty() && self.claimed.is_empty() && !self.seeding {
            debug!(classes = self.registry.len(), "queue drained; terminating");
            self.state = State::Terminated;
            while let Some(worker) = self.parked.pop_front() {
                self.release(worker, Reply::Empty, out);
            }
        }
    }

    fn release(&mut self, worker: WorkerId, reply: Reply, out: &mut Outbox) {
        self.released += 1;
        out.push((worker, reply));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::messages::NodeId;

    fn w(node: usize, slot: usize) -> WorkerId {
        WorkerId {
            node: NodeId(node),
            slot,
        }
    }

    fn jobs(out: &Outbox) -> Vec<(WorkerId, Row)> {
        out.iter()
            .filter_map(|(to, reply)| match reply {
                Reply::Job(row) => Some((*to, row.clone())),
                _ => None,
            })
            .collect()
    }

    fn empties(out: &Outbox) -> Vec<WorkerId> {
        out.iter()
            .filter(|(_, reply)| *reply == Reply::Empty)
            .map(|(to, _)| *to)
            .collect()
    }

    #[test]
    fn get_is_parked_until_a_seed_arrives() {
        let mut q = JobQueue::new(ClassRegistry::exact(), 1);
        assert!(q.handle(Request::Get { from: w(0, 0) }).unwrap().is_empty());
        let out = q
            .handle(Request::Seed {
                rows: vec![Row::from([1, 0])],
            })
            .unwrap();
        assert_eq!(jobs(&out), vec![(w(0, 0), Row::from([1, 0]))]);
        assert_eq!(q.in_flight(), 1);
    }

    #[test]
    fn duplicates_are_admitted_once() {
        let mut q = JobQueue::new(ClassRegistry::exact(), 1);
        q.handle(Request::Seed {
            rows: vec![Row::from([1, 0]), Row::from([1, 0]), Row::from([0, 1])],
        })
        .unwrap();
        assert_eq!(q.pending(), 2);
        assert_eq!(q.registry().len(), 2);
    }

    #[test]
    fn termination_waits_for_seeding_and_in_flight_jobs() {
        let mut q = JobQueue::new(ClassRegistry::exact(), 2);
        q.handle(Request::Seed {
            rows: vec![Row::from([1, 0])],
        })
        .unwrap();
        let out = q.handle(Request::Get { from: w(0, 0) }).unwrap();
        assert_eq!(jobs(&out).len(), 1);
        // idle worker with nothing queued, but a job is still in flight
        assert!(q.handle(Request::Get { from: w(0, 1) }).unwrap().is_empty());
        q.handle(Request::SeedingDone).unwrap();
        assert!(!q.is_terminated());

        // the in-flight job yields one new class, handed to the idle worker
        let out = q
            .handle(Request::Complete {
                from: w(0, 0),
                rows: vec![Row::from([1, 0]), Row::from([0, 1])],
            })
            .unwrap();
        assert_eq!(jobs(&out), vec![(w(0, 1), Row::from([0, 1]))]);

        assert!(q.handle(Request::Get { from: w(0, 0) }).unwrap().is_empty());
        let out = q
            .handle(Request::Complete {
                from: w(0, 1),
                rows: vec![],
            })
            .unwrap();
        assert!(q.is_terminated());
        assert_eq!(empties(&out), vec![w(0, 0)]);
        assert!(!q.is_finished());

        let out = q.handle(Request::Get { from: w(0, 1) }).unwrap();
        assert_eq!(empties(&out), vec![w(0, 1)]);
        assert!(q.is_finished());
        assert_eq!(q.into_rows(), vec![Row::from([1, 0]), Row::from([0, 1])]);
    }

    #[test]
    fn open_seeding_blocks_termination() {
        let mut q = JobQueue::new(ClassRegistry::exact(), 1);
        assert!(q.handle(Request::Get { from: w(0, 0) }).unwrap().is_empty());
        assert!(!q.is_terminated());
        let out = q.handle(Request::SeedingDone).unwrap();
        assert_eq!(empties(&out), vec![w(0, 0)]);
        assert!(q.is_finished());
    }

    #[test]
    fn put_after_termination_is_rejected() {
        let mut q = JobQueue::new(ClassRegistry::exact(), 1);
        q.handle(Request::SeedingDone).unwrap();
        assert!(q.is_terminated());
        let err = q
            .handle(Request::Complete {
                from: w(0, 0),
                rows: vec![Row::from([5, 5])],
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::PutAfterTermination));
        assert!(q.registry().is_empty());
    }

    #[test]
    fn put_without_claim_is_rejected() {
        let mut q = JobQueue::new(ClassRegistry::exact(), 1);
        let err = q
            .handle(Request::Complete {
                from: w(0, 0),
                rows: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoClaimedJob));
    }

    #[test]
    fn abort_releases_parked_and_later_workers() {
        let mut q = JobQueue::new(ClassRegistry::exact(), 3);
        q.handle(Request::Seed {
            rows: vec![Row::from([1, 0])],
        })
        .unwrap();
        q.handle(Request::Get { from: w(0, 0) }).unwrap();
        q.handle(Request::Get { from: w(1, 0) }).unwrap();
        let out = q
            .handle(Request::Abort {
                from: Some(w(0, 0)),
                reason: "boom".into(),
            })
            .unwrap();
        assert_eq!(out, vec![(w(1, 0), Reply::Abort("boom".into()))]);
        assert_eq!(q.abort_reason(), Some("boom"));
        assert!(!q.is_finished());
        let out = q.handle(Request::Get { from: w(1, 1) }).unwrap();
        assert_eq!(out, vec![(w(1, 1), Reply::Abort("boom".into()))]);
        assert!(q.is_finished());
    }

    #[test]
    fn setup_abort_does_not_count_as_a_worker() {
        let mut q = JobQueue::new(ClassRegistry::exact(), 1);
        q.handle(Request::Abort {
            from: None,
            reason: "no seed".into(),
        })
        .unwrap();
        assert!(!q.is_finished());
        q.handle(Request::Get { from: w(0, 0) }).unwrap();
        assert!(q.is_finished());
    }
}
