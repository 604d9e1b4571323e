//! Geometric collaborators of the search: rotation, seeding, equations.
//!
//! Purpose
//! - The adjacency search itself only needs three geometric primitives:
//!   neighbours of a facet (rotation), one starting facet (seeding), and
//!   the implied equalities of the input (equations). They sit behind the
//!   `Geometry` trait so the pipeline can be driven by any exact backend.
//! - `ExactRotation` is the bundled backend: exact integer elimination,
//!   combinatorial ridge enumeration, no LP.
//!
//! Conventions
//! - Facet rows `(a, b)` mean `a·x <= b`; vertex rows are `(x, 1)`, rays
//!   `(x, 0)`. Incidence is `Row::pairing`, zero when tight.

mod equations;
pub(crate) mod linalg;
mod rotation;
mod util;

pub use equations::{extract_equations, Equations};
pub use rotation::ExactRotation;

use thiserror::Error;

use crate::classes::Deterministics;
use crate::maps::Maps;
use crate::row::{Matrix, Row};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("input matrix is empty")]
    EmptyInput,
    #[error("row [{row}] has negative slack on input row {index}")]
    Invalid { row: Row, index: usize },
    #[error("row [{row}] is not a facet: tight rows have rank {rank}, expected {expected}")]
    NotAFacet {
        row: Row,
        rank: usize,
        expected: usize,
    },
    #[error("no starting facet found among {0} input rows")]
    NoSeed(usize),
}

/// Geometric primitives consumed by the adjacency decomposition.
pub trait Geometry: Sync {
    /// All rows adjacent to `row`. Not reduced to classes; callers reduce.
    fn rotation(&self, input: &[Row], row: &Row, maps: &Maps) -> Result<Matrix, GeometryError>;

    /// Variant used when deterministic probes are available. Backends that
    /// cannot exploit the probes fall back to plain rotation.
    fn rotation_deterministic(
        &self,
        input: &[Row],
        row: &Row,
        maps: &Maps,
        deterministics: &Deterministics,
    ) -> Result<Matrix, GeometryError> {
        let _ = deterministics;
        self.rotation(input, row, maps)
    }

    /// At least one valid starting row; used when no known output is given.
    fn seed(&self, input: &[Row]) -> Result<Matrix, GeometryError>;

    fn extract_equations(&self, input: &[Row]) -> Equations {
        extract_equations(input)
    }
}
