//! Exact reference rotation: adjacent facets by pivoting around ridges.
//!
//! Algorithm
//! - The tight set of a facet `f` is the set of input rows with zero slack.
//! - Every independent `(k-2)`-subset `S` of that tight set spans a candidate
//!   ridge (`k` = rank of the input). For each input row `v` off the facet,
//!   the hyperplane through `S ∪ {v}` is a candidate neighbour.
//! - A candidate is kept when it is valid (all slacks non-negative after
//!   orientation) and its tight set meets `tight(f)` in rank exactly `k-2`.
//!
//! Works unchanged for vertex mode because the pairing form is symmetric:
//! the input is then a list of inequalities and the output rows are vertices.
//!
//! Complexity is combinatorial in the size of the tight set; this is meant
//! for moderate instances and as a test oracle, not for huge polytopes.

use std::collections::BTreeSet;

use crate::maps::Maps;
use crate::row::{Matrix, Row};

use super::linalg::{narrow, nullspace, rank, to_dual_matrix, to_matrix};
use super::util::Combinations;
use super::{Geometry, GeometryError};

/// Stateless exact rotation over `i64` rows.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExactRotation;

impl ExactRotation {
    fn tight_set(input: &[Row], row: &Row) -> Result<Vec<usize>, GeometryError> {
        let mut tight = Vec::new();
        for (i, v) in input.iter().enumerate() {
            let s = row.pairing(v);
            if s < 0 {
                return Err(GeometryError::Invalid {
                    row: row.clone(),
                    index: i,
                });
            }
            if s == 0 {
                tight.push(i);
            }
        }
        Ok(tight)
    }

    /// Hyperplane through the given input rows, oriented to be valid, or
    /// `None` when the rows do not pin down a unique valid hyperplane.
    fn hyperplane_through(input: &[Row], through: &[usize]) -> Option<Row> {
        let ncols = input[0].len();
        let basis = nullspace(to_dual_matrix(through.iter().map(|&i| &input[i]), ncols));
        // Directions in the lineality space pair to zero with everything;
        // skip them and orient the first direction that separates.
        for b in basis {
            let candidate = Row::new(b.into_iter().map(narrow).collect());
            let mut sign = 0i32;
            let mut mixed = false;
            for v in input {
                let s = candidate.pairing(v).signum() as i32;
                if s == 0 {
                    continue;
                }
                if sign == 0 {
                    sign = s;
                } else if s != sign {
                    mixed = true;
                    break;
                }
            }
            if sign == 0 {
                continue;
            }
            if mixed {
                return None;
            }
            let oriented = if sign < 0 {
                Row::new(candidate.iter().map(|x| -x).collect())
            } else {
                candidate
            };
            return Some(oriented.primitive());
        }
        None
    }

    fn input_rank(input: &[Row]) -> usize {
        rank(to_matrix(input, input[0].len()))
    }

    fn subset_rank(input: &[Row], idxs: &[usize]) -> usize {
        rank(to_matrix(idxs.iter().map(|&i| &input[i]), input[0].len()))
    }
}

impl Geometry for ExactRotation {
    fn rotation(&self, input: &[Row], row: &Row, _maps: &Maps) -> Result<Matrix, GeometryError> {
        if input.is_empty() {
            return Err(GeometryError::EmptyInput);
        }
        let k = Self::input_rank(input);
        let tight = Self::tight_set(input, row)?;
        let facet_rank = Self::subset_rank(input, &tight);
        if facet_rank + 1 != k {
            return Err(GeometryError::NotAFacet {
                row: row.clone(),
                rank: facet_rank,
                expected: k.saturating_sub(1),
            });
        }
        let off: Vec<usize> = (0..input.len()).filter(|i| !tight.contains(i)).collect();
        let mut ridges_seen: BTreeSet<Vec<usize>> = BTreeSet::new();
        let mut neighbours_seen: BTreeSet<Vec<usize>> = BTreeSet::new();
        let mut out = Matrix::new();
        for pick in Combinations::new(tight.len(), k.saturating_sub(2)) {
            let basis: Vec<usize> = pick.iter().map(|&j| tight[j]).collect();
            if Self::subset_rank(input, &basis) != basis.len() {
                continue;
            }
            // Ridge = tight rows spanned by the basis; dedup equal ridges.
            let ridge: Vec<usize> = tight
                .iter()
                .copied()
                .filter(|&i| {
                    let mut with = basis.clone();
                    with.push(i);
                    Self::subset_rank(input, &with) == basis.len()
                })
                .collect();
            if !ridges_seen.insert(ridge) {
                continue;
            }
            for &v in &off {
                let mut through = basis.clone();
                through.push(v);
                let Some(candidate) = Self::hyperplane_through(input, &through) else {
                    continue;
                };
                let cand_tight = Self::tight_set(input, &candidate)?;
                if Self::subset_rank(input, &cand_tight) + 1 != k {
                    continue;
                }
                let shared: Vec<usize> = cand_tight
                    .iter()
                    .copied()
                    .filter(|i| tight.contains(i))
                    .collect();
                if Self::subset_rank(input, &shared) + 2 != k {
                    continue;
                }
                if neighbours_seen.insert(cand_tight) {
                    out.push(candidate);
                }
            }
        }
        Ok(out)
    }

    /// First valid facet in lexicographic order of `(k-1)`-subsets.
    fn seed(&self, input: &[Row]) -> Result<Matrix, GeometryError> {
        if input.is_empty() {
            return Err(GeometryError::EmptyInput);
        }
        let k = Self::input_rank(input);
        for pick in Combinations::new(input.len(), k.saturating_sub(1)) {
            if Self::subset_rank(input, &pick) != pick.len() {
                continue;
            }
            if let Some(candidate) = Self::hyperplane_through(input, &pick) {
                let tight = Self::tight_set(input, &candidate)?;
                if Self::subset_rank(input, &tight) + 1 == k {
                    return Ok(vec![candidate]);
                }
            }
        }
        Err(GeometryError::NoSeed(input.len()))
    }
}
