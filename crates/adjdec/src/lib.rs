//! Adjacency decomposition of polytopes with symmetry-class bookkeeping.
//!
//! Layout
//! - `row`, `maps`: exact rows and the symmetry generators acting on them.
//! - `classes`: orbits, canonical representatives, class reduction and the
//!   fingerprint-based fast path.
//! - `geometry`: rotation, seeding and equations behind the `Geometry` trait,
//!   plus the exact reference backend.
//! - `pipeline`: coordinator/worker job protocol over a `Transport`.
//! - `driver`: the per-node entry point tying all of the above together.
//!
//! API Policy
//! - Prefer `api` (or `prelude`) over deep module paths in callers; module
//!   internals move freely.

pub mod api;
pub mod classes;
pub mod driver;
pub mod geometry;
pub mod maps;
pub mod pipeline;
pub mod row;

#[cfg(test)]
mod testing;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use row::{Integer, Matrix, Row, RowSet};

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::driver::{run_cluster, run_local, Problem, RunCfg, RunError, SearchMode};
    pub use crate::geometry::{ExactRotation, Geometry};
    pub use crate::maps::{Maps, Permutation, SymmetryMap};
    pub use crate::row::{Matrix, Row};
}
