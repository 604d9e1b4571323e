//! Orbits, canonical representatives and class reduction.
//!
//! Purpose
//! - Every piece of search bookkeeping runs on symmetry classes. This module
//!   closes a row under the generators, picks the canonical member, and
//!   reduces batches of rows to one member per class.
//!
//! Conventions
//! - The canonical representative is the lexicographic **maximum** of the
//!   orbit. Registry, queue and reducers all rely on that choice.
//! - Facet rows must already be normalized against the equations; the maps
//!   passed in are expected to be normalized the same way.
//!
//! The deterministic path (`classes_deterministic`, `ClassRegistry` in
//! fingerprint mode) never builds an orbit; see `affine` for the trade-off.

mod affine;
mod cfg;
mod registry;

pub use affine::{
    affine_normalize, check_equivalence, check_equivalence_maps, Deterministics, Fingerprint,
};
pub use registry::ClassRegistry;

use crate::maps::Maps;
use crate::row::{Matrix, Row, RowSet};

/// Complete orbit of `row` under the group generated by `maps`.
///
/// Pre: `row` is non-empty (and normalized, for facets).
pub fn get_class(row: &Row, maps: &Maps) -> RowSet {
    assert!(!row.is_empty(), "orbit of an empty row");
    let mut orbit = RowSet::new();
    orbit.insert(row.clone());
    // Worklist of admitted but not yet expanded members.
    let mut frontier = vec![row.clone()];
    while let Some(current) = frontier.pop() {
        for map in maps.iter() {
            let image = map.apply(&current);
            if !orbit.contains(&image) {
                orbit.insert(image.clone());
                frontier.push(image);
            }
        }
    }
    orbit
}

/// Canonical member (maximum) of the orbit of `row`.
pub fn class_representative(row: &Row, maps: &Maps) -> Row {
    get_class(row, maps)
        .pop_last()
        .unwrap_or_else(|| row.clone())
}

/// One canonical representative per orbit present in `rows`, in the order
/// the orbits are discovered.
pub fn classes<I>(rows: I, maps: &Maps) -> Matrix
where
    I: IntoIterator<Item = Row>,
{
    let mut remaining: RowSet = rows.into_iter().collect();
    let mut out = Matrix::new();
    while let Some(row) = remaining.pop_first() {
        let mut orbit = get_class(&row, maps);
        for member in &orbit {
            remaining.remove(member);
        }
        if let Some(rep) = orbit.pop_last() {
            out.push(rep);
        }
    }
    out
}

/// Class reduction through fingerprints: a row becomes a new representative
/// only if `check_equivalence_maps` rejects it against every representative
/// found so far. Representatives are the first member seen, not the maximum.
///
/// Empty `deterministics` falls back to `classes`.
pub fn classes_deterministic<I>(rows: I, maps: &Maps, deterministics: &Deterministics) -> Matrix
where
    I: IntoIterator<Item = Row>,
{
    if deterministics.is_empty() {
        return classes(rows, maps);
    }
    let unique: RowSet = rows.into_iter().collect();
    let mut reps = Matrix::new();
    for row in unique {
        let known = reps
            .iter()
            .any(|rep| check_equivalence_maps(&row, rep, deterministics, maps));
        if !known {
            reps.push(row);
        }
    }
    reps
}
