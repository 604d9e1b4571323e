//! Affine invariant of deterministic fingerprints and the fast equivalence
//! tests built on it.
//!
//! A fingerprint is the product `deterministics × row` (exact), converted to
//! `f64` and affinely normalized: shift so the minimum is 0, scale so the
//! second distinct value is 1, round to three decimals. Equal fingerprints
//! are a necessary, not sufficient, condition for two rows to share an orbit.

use nalgebra::{DMatrix, DVector};

use crate::maps::Maps;
use crate::row::Row;

use super::cfg::ROUND_SCALE;

/// Fixed probe matrix; one probe per row, as wide as the rows it fingerprints.
#[derive(Clone, Debug, PartialEq)]
pub struct Deterministics {
    probes: DMatrix<i128>,
}

impl Deterministics {
    /// No probes: the fast path is disabled.
    pub fn empty() -> Self {
        Self {
            probes: DMatrix::zeros(0, 0),
        }
    }

    pub fn new(probes: &[Row]) -> Self {
        let Some(first) = probes.first() else {
            return Self::empty();
        };
        let ncols = first.len();
        assert!(
            probes.iter().all(|p| p.len() == ncols),
            "deterministic probes must all have the same length"
        );
        Self {
            probes: DMatrix::from_fn(probes.len(), ncols, |i, j| probes[i][j] as i128),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.probes.nrows() == 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.probes.nrows()
    }

    /// Row length the probes apply to; 0 when empty.
    #[inline]
    pub fn width(&self) -> usize {
        self.probes.ncols()
    }

    /// Exact projection of `row` onto the probes, then widened to `f64`.
    pub fn project(&self, row: &Row) -> Vec<f64> {
        assert!(!self.is_empty(), "projection through empty deterministics");
        assert_eq!(
            self.probes.ncols(),
            row.len(),
            "row length {} does not match deterministics width {}",
            row.len(),
            self.probes.ncols()
        );
        let v = DVector::from_iterator(row.len(), row.iter().map(|&x| x as i128));
        let p = &self.probes * v;
        p.iter().map(|&x| x as f64).collect()
    }
}

/// Shift-and-scale normal form of `v`, rounded to three decimals.
///
/// The divisor is the gap between the smallest and the second smallest
/// distinct value. All-equal input (no second value) maps to all zeros.
pub fn affine_normalize(v: &[f64]) -> Vec<f64> {
    let Some(f) = v.iter().copied().reduce(f64::min) else {
        return Vec::new();
    };
    let second = v.iter().copied().filter(|&x| x > f).reduce(f64::min);
    let Some(second) = second else {
        return vec![0.0; v.len()];
    };
    let g = second - f;
    v.iter().map(|&x| round_decimals((x - f) / g)).collect()
}

fn round_decimals(x: f64) -> f64 {
    (x * ROUND_SCALE).round() / ROUND_SCALE
}

/// Normalized fingerprint in thousandths, so it can be
/// hashed and ordered.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(Vec<i64>);

impl Fingerprint {
    pub fn of(row: &Row, deterministics: &Deterministics) -> Self {
        let normalized = affine_normalize(&deterministics.project(row));
        Self(
            normalized
                .into_iter()
                .map(|x| (x * ROUND_SCALE).round() as i64)
                .collect(),
        )
    }

    /// Same values as sorted multiset; invariant under reordering probes.
    pub fn sorted(&self) -> Self {
        let mut values = self.0.clone();
        values.sort_unstable();
        Self(values)
    }
}

/// Fingerprint equality of `a` and `b` under `deterministics`.
pub fn check_equivalence(a: &Row, b: &Row, deterministics: &Deterministics) -> bool {
    assert_eq!(
        a.len(),
        b.len(),
        "equivalence test on rows of different lengths"
    );
    Fingerprint::of(a, deterministics) == Fingerprint::of(b, deterministics)
}

/// Fingerprint equality, falling back to one level of generator images of
/// `b` when the fingerprints differ but their sorted values agree.
///
/// Only images `map(b)` are tried, never compositions: rows related by a
/// product of two generators are reported non-equivalent unless the product
/// itself is in `maps`.
pub fn check_equivalence_maps(
    a: &Row,
    b: &Row,
    deterministics: &Deterministics,
    maps: &Maps,
) -> bool {
    assert_eq!(
        a.len(),
        b.len(),
        "equivalence test on rows of different lengths"
    );
    let fa = Fingerprint::of(a, deterministics);
    let fb = Fingerprint::of(b, deterministics);
    if fa == fb {
        return true;
    }
    if maps.is_empty() || fa.sorted() != fb.sorted() {
        return false;
    }
    let no_maps = Maps::new();
    maps.iter()
        .map(|m| m.apply(b))
        .filter(|image| image != b)
        .any(|image| check_equivalence_maps(a, &image, deterministics, &no_maps))
}
