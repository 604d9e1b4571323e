//! Shared fixtures for unit tests.

use crate::maps::{Maps, Permutation};
use crate::row::Row;

/// Homogenized vertices of the unit square.
pub(crate) fn square() -> Vec<Row> {
    vec![
        Row::from([0, 0, 1]),
        Row::from([1, 0, 1]),
        Row::from([0, 1, 1]),
        Row::from([1, 1, 1]),
    ]
}

/// Homogenized vertices of the unit cube.
pub(crate) fn cube3() -> Vec<Row> {
    let mut out = Vec::new();
    for x in 0..2 {
        for y in 0..2 {
            for z in 0..2 {
                out.push(Row::from([x, y, z, 1]));
            }
        }
    }
    out
}

/// Triangle in the plane x1 + x2 + x3 = 1 (standard simplex in R^3).
pub(crate) fn simplex3() -> Vec<Row> {
    vec![
        Row::from([1, 0, 0, 1]),
        Row::from([0, 1, 0, 1]),
        Row::from([0, 0, 1, 1]),
    ]
}

/// Generators of the coordinate permutations of R^3 acting on 4-slot rows.
pub(crate) fn s3_coordinates() -> Maps {
    [
        Permutation::new(vec![1, 0, 2, 3]),
        Permutation::new(vec![0, 2, 1, 3]),
    ]
    .into_iter()
    .map(|p| p.expect("valid permutation"))
    .collect()
}
