//! Exact-integer rows and the matrix/row-set containers built on them.
//!
//! Conventions
//! - A row carries its coefficients plus one trailing slot. For a facet
//!   `(a, b)` the row reads `a·x <= b`; for a vertex `(x, 1)` (or a ray
//!   `(x, 0)`) the trailing slot is the homogenizing coordinate.
//! - Ordering is lexicographic on the coefficients; the orbit machinery picks
//!   the maximum as canonical representative, so the derived `Ord` is load
//!   bearing.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Index;

use serde::{Deserialize, Serialize};

/// Exact coefficient type.
pub type Integer = i64;

/// One facet (or vertex) as an immutable coefficient vector.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Vec<Integer>);

/// Ordered rows; insertion order is kept for output.
pub type Matrix = Vec<Row>;

/// Unique, ordered rows (orbit bookkeeping, duplicate elimination).
pub type RowSet = BTreeSet<Row>;

impl Row {
    #[inline]
    pub fn new(values: Vec<Integer>) -> Self {
        Self(values)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Integer] {
        &self.0
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Integer> {
        self.0.iter()
    }

    /// Index of the trailing (offset / homogenizing) slot.
    ///
    /// Pre: row is non-empty.
    #[inline]
    pub fn last_index(&self) -> usize {
        assert!(!self.0.is_empty(), "empty row has no trailing slot");
        self.0.len() - 1
    }

    /// Incidence pairing `f_last·v_last − Σ f_i·v_i`.
    ///
    /// For a facet `f` and a homogenized vertex `v` this is the slack of `v`
    /// in `f`: zero when tight, positive when strictly inside. The form is
    /// symmetric, so the same pairing serves vertex-mode enumeration.
    pub fn pairing(&self, other: &Row) -> i128 {
        assert_eq!(
            self.len(),
            other.len(),
            "pairing of rows with different lengths"
        );
        let last = self.last_index();
        let mut acc = self.0[last] as i128 * other.0[last] as i128;
        for i in 0..last {
            acc -= self.0[i] as i128 * other.0[i] as i128;
        }
        acc
    }

    /// Divide by the content (positive gcd of all entries). Orientation is
    /// kept; the zero row is returned unchanged.
    pub fn primitive(self) -> Row {
        let g = self.0.iter().fold(0, |acc, &x| gcd(acc, x));
        if g <= 1 {
            return self;
        }
        Row(self.0.into_iter().map(|x| x / g).collect())
    }
}

impl From<Vec<Integer>> for Row {
    fn from(values: Vec<Integer>) -> Self {
        Self(values)
    }
}

impl<const N: usize> From<[Integer; N]> for Row {
    fn from(values: [Integer; N]) -> Self {
        Self(values.to_vec())
    }
}

impl Index<usize> for Row {
    type Output = Integer;

    #[inline]
    fn index(&self, i: usize) -> &Integer {
        &self.0[i]
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a Integer;
    type IntoIter = std::slice::Iter<'a, Integer>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for x in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{x}")?;
            first = false;
        }
        Ok(())
    }
}

/// Non-negative gcd; `gcd(0, 0) == 0`.
pub(crate) fn gcd(a: Integer, b: Integer) -> Integer {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a as Integer
}
