//! Implied equalities of the input and the normalization they induce.
//!
//! When the input rows do not span the full space, every facet is only
//! determined modulo the equations `{e : ⟨e, v⟩ = 0 for all inputs v}`.
//! Orbit bookkeeping compares rows by value, so each facet is reduced to a
//! unique representative first: the equations are kept in reduced echelon
//! form, a row has its pivot coordinates eliminated and is divided by its
//! content.

use crate::row::Row;

use super::linalg::{narrow, nullspace, reduced_echelon, to_dual_matrix};

/// Equalities in reduced echelon form, computed once and never mutated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Equations {
    rows: Vec<Row>,
    pivots: Vec<usize>,
}

impl Equations {
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Unique representative of `row` modulo the equations, scaled to be
    /// primitive. Orientation (`a·x <= b` vs `>=`) is preserved.
    pub fn normalize_row(&self, row: &Row) -> Row {
        assert!(!row.is_empty(), "cannot normalize an empty row");
        if self.rows.is_empty() {
            return row.clone().primitive();
        }
        assert_eq!(
            row.len(),
            self.rows[0].len(),
            "row length does not match the equations"
        );
        let mut work: Vec<i128> = row.iter().map(|&x| x as i128).collect();
        for (e, &p) in self.rows.iter().zip(&self.pivots) {
            let b = work[p];
            if b == 0 {
                continue;
            }
            let a = e[p] as i128;
            for (w, &ej) in work.iter_mut().zip(e.iter()) {
                *w = a * *w - b * ej as i128;
            }
            super::linalg::primitive(&mut work);
        }
        Row::new(work.into_iter().map(narrow).collect())
    }
}

/// Equalities satisfied by every input row under the pairing form.
///
/// For homogenized vertices `(x, 1)` an equation `(a, b)` reads `a·x = b`.
pub fn extract_equations(input: &[Row]) -> Equations {
    let Some(first) = input.first() else {
        return Equations::empty();
    };
    let ncols = first.len();
    let basis = nullspace(to_dual_matrix(input, ncols));
    if basis.is_empty() {
        return Equations::empty();
    }
    let m = nalgebra::DMatrix::from_fn(basis.len(), ncols, |i, j| basis[i][j]);
    let ech = reduced_echelon(m);
    let rows = (0..ech.rank())
        .map(|i| Row::new(ech.rows.row(i).iter().map(|&x| narrow(x)).collect()))
        .collect();
    Equations {
        rows,
        pivots: ech.pivots,
    }
}
