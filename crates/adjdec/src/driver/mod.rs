//! Adjacency decomposition driver.
//!
//! One call per node. Every node resolves its thread count, prepares the
//! equations and normalized maps once, and runs a fixed pool of workers:
//! `get` a job, rotate it, normalize and reduce the neighbours, `put` the
//! survivors. Rank 0 also runs the coordinator and seeds the queue, first
//! synchronously with one row, then asynchronously with the remaining known
//! rows while the workers are already busy.
//!
//! Entry points
//! - `adjacency_decomposition`: one node of a session over any `Transport`;
//! - `run_local`: single node over an in-process transport;
//! - `run_cluster`: several simulated nodes in one process.

mod cfg;

pub use cfg::{RunCfg, SearchMode, Threads};

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::classes::{class_representative, classes, classes_deterministic};
use crate::classes::{ClassRegistry, Deterministics};
use crate::geometry::{Equations, Geometry, GeometryError};
use crate::maps::{Maps, SymmetryMap};
use crate::pipeline::{
    panic_reason, ChannelCluster, JobManager, JobManagerProxy, PipelineError, Transport,
    WorkerHandle,
};
use crate::row::{Matrix, Row};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("thread count must be at least 1")]
    NoThreads,

    #[error("node count must be at least 1")]
    NoNodes,

    #[error("{requested} threads requested but the transport has {available} worker slots")]
    TooManyThreads { requested: usize, available: usize },

    #[error("{what} has length {found}, expected {expected} like the input rows")]
    Shape {
        what: String,
        expected: usize,
        found: usize,
    },

    #[error("a worker thread panicked")]
    WorkerPanicked,
}

impl RunError {
    /// Secondary failures: this node was told to stop because of an error
    /// somewhere else.
    fn is_remote_abort(&self) -> bool {
        matches!(self, RunError::Pipeline(PipelineError::Aborted(_)))
    }
}

/// Everything a node needs to know about the instance.
#[derive(Clone, Debug)]
pub struct Problem {
    /// Facet mode: homogenized vertices `(x, 1)` and rays `(x, 0)`.
    /// Vertex mode: inequalities `(a, b)` for `a·x <= b`.
    pub input: Matrix,
    /// Coordinate names, used for log output only.
    pub names: Vec<String>,
    pub maps: Maps,
    /// Rows already known to be part of the output; may be empty.
    pub known_output: Matrix,
    pub deterministics: Deterministics,
}

impl Problem {
    pub fn new(input: Matrix) -> Self {
        Self {
            input,
            names: Vec::new(),
            maps: Maps::new(),
            known_output: Matrix::new(),
            deterministics: Deterministics::empty(),
        }
    }

    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }

    pub fn with_maps(mut self, maps: Maps) -> Self {
        self.maps = maps;
        self
    }

    pub fn with_known_output(mut self, rows: Matrix) -> Self {
        self.known_output = rows;
        self
    }

    pub fn with_deterministics(mut self, deterministics: Deterministics) -> Self {
        self.deterministics = deterministics;
        self
    }
}

/// Read-only state shared by the workers of one node.
struct Search<'a, G: ?Sized> {
    input: &'a [Row],
    geometry: &'a G,
    equations: Arc<Equations>,
    maps: Maps,
    deterministics: &'a Deterministics,
}

impl<'a, G: Geometry + ?Sized> Search<'a, G> {
    /// Equations and normalized maps, computed once per node (facet mode).
    fn prepare(problem: &'a Problem, geometry: &'a G, mode: SearchMode, log: bool) -> Self {
        let (equations, maps) = match mode {
            SearchMode::Facet => {
                let equations = Arc::new(geometry.extract_equations(&problem.input));
                if log && !equations.is_empty() {
                    info!("Equations:");
                    for e in equations.rows() {
                        info!("  {}", render_equation(e, &problem.names));
                    }
                }
                let maps = if equations.is_empty() {
                    problem.maps.clone()
                } else {
                    problem.maps.normalized(&equations)
                };
                (equations, maps)
            }
            SearchMode::Vertex => (Arc::new(Equations::empty()), problem.maps.clone()),
        };
        Self {
            input: &problem.input,
            geometry,
            equations,
            maps,
            deterministics: &problem.deterministics,
        }
    }

    #[inline]
    fn deterministic(&self) -> bool {
        !self.deterministics.is_empty()
    }

    fn registry(&self) -> ClassRegistry {
        ClassRegistry::deterministic(self.deterministics.clone(), self.maps.clone())
    }

    /// Normalized row, replaced by its orbit maximum.
    fn canonical(&self, row: &Row) -> Row {
        class_representative(&self.equations.normalize_row(row), &self.maps)
    }

    fn first_seed(&self, known: &[Row]) -> Result<Row, GeometryError> {
        if let Some(first) = known.first() {
            return Ok(self.canonical(first));
        }
        let seeds = self.geometry.seed(self.input)?;
        seeds
            .first()
            .map(|row| self.canonical(row))
            .ok_or(GeometryError::NoSeed(self.input.len()))
    }

    /// Neighbours of `job`, normalized and reduced to one row per class.
    /// `seen` is the worker-local filter of the deterministic variant.
    fn explore(
        &self,
        job: &Row,
        seen: Option<&mut ClassRegistry>,
    ) -> Result<Matrix, GeometryError> {
        let raw = if self.deterministic() {
            self.geometry
                .rotation_deterministic(self.input, job, &self.maps, self.deterministics)?
        } else {
            self.geometry.rotation(self.input, job, &self.maps)?
        };
        let normalized = raw.iter().map(|r| self.equations.normalize_row(r));
        let mut reduced = if self.deterministic() {
            classes_deterministic(normalized, &self.maps, self.deterministics)
        } else {
            classes(normalized, &self.maps)
        };
        if let Some(seen) = seen {
            seen.admit(job.clone());
            reduced.retain(|r| seen.admit(r.clone()));
        }
        Ok(reduced)
    }

    /// Worker loop. A panic inside it aborts the run instead of leaving the
    /// claimed job in flight forever.
    fn work<T: Transport + ?Sized>(&self, mut handle: WorkerHandle<'_, T>) -> Result<usize, RunError> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.drain(&mut handle))) {
            Ok(result) => result,
            Err(payload) => {
                let reason = panic_reason(payload.as_ref());
                error!(worker = %handle.id(), %reason, "worker panicked; aborting run");
                let _ = handle.abort(format!("worker {} panicked: {reason}", handle.id()));
                Err(RunError::WorkerPanicked)
            }
        }
    }

    fn drain<T: Transport + ?Sized>(&self, handle: &mut WorkerHandle<'_, T>) -> Result<usize, RunError> {
        let mut seen = self.deterministic().then(|| self.registry());
        let mut processed = 0usize;
        while let Some(job) = handle.get()? {
            match self.explore(&job, seen.as_mut()) {
                Ok(found) => {
                    debug!(worker = %handle.id(), %job, new = found.len(), "job explored");
                    handle.put(found)?;
                }
                Err(err) => {
                    error!(worker = %handle.id(), %job, %err, "rotation failed; aborting run");
                    handle.abort(err.to_string())?;
                    return Err(err.into());
                }
            }
            processed += 1;
        }
        debug!(worker = %handle.id(), processed, "worker released");
        Ok(processed)
    }

    /// Remaining known rows. Aborts the run if seeding panics, since
    /// `SeedingDone` would otherwise never arrive.
    fn seed_rest<T: Transport + ?Sized>(
        &self,
        proxy: &JobManagerProxy<'_, T>,
        rest: &[Row],
    ) -> Result<(), RunError> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.send_seeds(proxy, rest))) {
            Ok(result) => result.map_err(RunError::from),
            Err(payload) => {
                let reason = panic_reason(payload.as_ref());
                error!(%reason, "seeding panicked; aborting run");
                let _ = proxy.abort(format!("seeding panicked: {reason}"));
                Err(RunError::WorkerPanicked)
            }
        }
    }

    /// One `Seed` request per row, then `SeedingDone`.
    fn send_seeds<T: Transport + ?Sized>(
        &self,
        proxy: &JobManagerProxy<'_, T>,
        rest: &[Row],
    ) -> Result<(), PipelineError> {
        for (i, row) in rest.iter().enumerate() {
            proxy.seed(vec![self.canonical(row)])?;
            if (i + 1) % 1000 == 0 {
                info!(seeded = i + 1, total = rest.len(), "seeding known rows");
            }
        }
        if !rest.is_empty() {
            info!(seeded = rest.len(), "seeding finished");
        }
        proxy.finish_seeding()
    }
}

/// Equation row `(a, b)` rendered as `a1*x1 + a2*x2 + ... = b`.
fn render_equation(row: &Row, names: &[String]) -> String {
    let last = row.last_index();
    let mut terms = Vec::new();
    for (i, &a) in row.iter().take(last).enumerate() {
        if a == 0 {
            continue;
        }
        let name = names
            .get(i)
            .cloned()
            .unwrap_or_else(|| format!("x{}", i + 1));
        terms.push(format!("{a}*{name}"));
    }
    if terms.is_empty() {
        terms.push("0".to_owned());
    }
    format!("{} = {}", terms.join(" + "), row[last])
}

/// Run one node of an adjacency decomposition.
///
/// Returns the discovered representatives on the coordinator (rank 0) and
/// `None` on every other node.
pub fn adjacency_decomposition<T, G>(
    transport: &T,
    problem: &Problem,
    geometry: &G,
    cfg: &RunCfg,
) -> Result<Option<Matrix>, RunError>
where
    T: Transport + ?Sized,
    G: Geometry + ?Sized,
{
    check_shapes(problem)?;
    let threads = cfg.threads.resolve()?;
    if threads > transport.slots() {
        return Err(RunError::TooManyThreads {
            requested: threads,
            available: transport.slots(),
        });
    }
    let rank = transport.rank();
    let coordinator = rank.is_coordinator();
    if coordinator {
        info!(
            nodes = transport.node_count(),
            threads,
            mode = %cfg.mode,
            input = problem.input.len(),
            maps = problem.maps.len(),
            deterministic = !problem.deterministics.is_empty(),
            "adjacency decomposition"
        );
    }

    let search = Search::prepare(problem, geometry, cfg.mode, coordinator);
    let manager = if coordinator {
        Some(JobManager::new(transport, search.registry(), threads)?)
    } else {
        None
    };
    let proxy = JobManagerProxy::new(transport);

    let (setup, seeding, workers, coordinated) = thread::scope(|s| {
        let coordinator_thread = manager.map(|m| s.spawn(move || m.run()));

        let mut setup = None;
        let mut seeder = None;
        if coordinator {
            let first = match panic::catch_unwind(AssertUnwindSafe(|| {
                search.first_seed(&problem.known_output)
            })) {
                Ok(found) => found.map_err(RunError::from),
                Err(payload) => {
                    error!(reason = %panic_reason(payload.as_ref()), "seeding panicked");
                    Err(RunError::WorkerPanicked)
                }
            };
            match first {
                Ok(first) => {
                    let sent = proxy.seed(vec![first]);
                    let rest = problem.known_output.get(1..).unwrap_or_default();
                    let (search, proxy) = (&search, &proxy);
                    seeder = Some(sent.map(|()| s.spawn(move || search.seed_rest(proxy, rest))));
                }
                Err(err) => {
                    error!(%err, "no starting row; aborting run");
                    // Peers are already waiting on the coordinator; release them.
                    let _ = proxy.abort(err.to_string());
                    setup = Some(err);
                }
            }
        }

        let handles: Vec<_> = (0..threads)
            .map(|slot| {
                let handle = proxy.worker(slot);
                let search = &search;
                s.spawn(move || search.work(handle))
            })
            .collect();

        let workers: Vec<Result<usize, RunError>> = handles
            .into_iter()
            .map(|h| h.join().unwrap_or(Err(RunError::WorkerPanicked)))
            .collect();
        let seeding: Option<Result<(), RunError>> = seeder.map(|spawned| match spawned {
            Ok(h) => h.join().unwrap_or(Err(RunError::WorkerPanicked)),
            Err(err) => Err(err.into()),
        });
        let coordinated: Option<Result<Matrix, RunError>> = coordinator_thread.map(|h| {
            match h.join() {
                Ok(Ok(rows)) => Ok(rows),
                Ok(Err(PipelineError::CoordinatorPanicked(_))) | Err(_) => {
                    Err(RunError::WorkerPanicked)
                }
                Ok(Err(err)) => Err(err.into()),
            }
        });
        (setup, seeding, workers, coordinated)
    });

    if let Some(err) = setup {
        return Err(err);
    }
    let mut errors: Vec<RunError> = workers.into_iter().filter_map(Result::err).collect();
    if let Some(Err(err)) = seeding {
        errors.push(err);
    }
    let rows = match coordinated {
        Some(Ok(rows)) => Some(rows),
        Some(Err(err)) => {
            errors.push(err);
            None
        }
        None => None,
    };
    if let Some(err) = first_cause(errors) {
        return Err(err);
    }
    if let Some(rows) = &rows {
        info!(classes = rows.len(), "{} found", cfg.mode.label());
    }
    Ok(rows)
}

/// Every row of the problem must be as long as the first input row, and so
/// must every map with a fixed arity and the deterministic probes. Checked
/// on every node before any thread starts, so a bad problem fails the same
/// way everywhere.
fn check_shapes(problem: &Problem) -> Result<(), RunError> {
    let Some(width) = problem.input.first().map(Row::len).filter(|&w| w > 0) else {
        return Err(GeometryError::EmptyInput.into());
    };
    let expect = |found: usize, what: &dyn Fn() -> String| {
        if found == width {
            Ok(())
        } else {
            Err(RunError::Shape {
                what: what(),
                expected: width,
                found,
            })
        }
    };
    for (i, row) in problem.input.iter().enumerate() {
        expect(row.len(), &|| format!("input row {i}"))?;
    }
    for (i, row) in problem.known_output.iter().enumerate() {
        expect(row.len(), &|| format!("known output row {i}"))?;
    }
    for (i, map) in problem.maps.iter().enumerate() {
        if let Some(arity) = map.arity() {
            expect(arity, &|| format!("map #{i}"))?;
        }
    }
    if !problem.deterministics.is_empty() {
        expect(problem.deterministics.width(), &|| "deterministics".to_owned())?;
    }
    Ok(())
}

/// The original failure wins over the aborts it caused elsewhere.
fn first_cause(errors: Vec<RunError>) -> Option<RunError> {
    let mut remote = None;
    for err in errors {
        if !err.is_remote_abort() {
            return Some(err);
        }
        remote.get_or_insert(err);
    }
    remote
}

/// Single-node run over an in-process transport.
pub fn run_local<G: Geometry + ?Sized>(
    problem: &Problem,
    geometry: &G,
    cfg: &RunCfg,
) -> Result<Matrix, RunError> {
    run_cluster(1, problem, geometry, cfg)
}

/// Run `nodes` simulated nodes in this process, one thread pool each.
/// Returns the coordinator's result.
pub fn run_cluster<G: Geometry + ?Sized>(
    nodes: usize,
    problem: &Problem,
    geometry: &G,
    cfg: &RunCfg,
) -> Result<Matrix, RunError> {
    if nodes == 0 {
        return Err(RunError::NoNodes);
    }
    let threads = cfg.threads.resolve()?;
    let cluster = ChannelCluster::new(nodes, threads);
    let cfg = RunCfg {
        threads: Threads::Fixed(threads),
        ..*cfg
    };
    let results: Vec<Result<Option<Matrix>, RunError>> = thread::scope(|s| {
        let handles: Vec<_> = cluster
            .iter()
            .map(|transport| {
                let cfg = &cfg;
                s.spawn(move || adjacency_decomposition(transport, problem, geometry, cfg))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(Err(RunError::WorkerPanicked)))
            .collect()
    });

    let mut rows = None;
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(Some(found)) => rows = Some(found),
            Ok(None) => {}
            Err(err) => errors.push(err),
        }
    }
    if let Some(err) = first_cause(errors) {
        return Err(err);
    }
    Ok(rows.unwrap_or_default())
}

#[cfg(test)]
mod tests;
