//! Curated surface for callers (CLI, benches, experiments).
//!
//! Not a stability promise; it only spares callers the module layout.

// Rows and symmetry
pub use crate::maps::{MapError, Maps, Permutation, SymmetryMap};
pub use crate::row::{Integer, Matrix, Row, RowSet};
// Orbits and reduction
pub use crate::classes::{
    affine_normalize, check_equivalence, check_equivalence_maps, class_representative, classes,
    classes_deterministic, get_class, ClassRegistry, Deterministics, Fingerprint,
};
// Geometry
pub use crate::geometry::{extract_equations, Equations, ExactRotation, Geometry, GeometryError};
// Pipeline
pub use crate::pipeline::{
    ChannelCluster, ChannelTransport, JobManager, JobManagerProxy, NodeId, PipelineError,
    Transport, WorkerHandle, WorkerId,
};
// Driver
pub use crate::driver::{
    adjacency_decomposition, run_cluster, run_local, Problem, RunCfg, RunError, SearchMode,
    Threads,
};
