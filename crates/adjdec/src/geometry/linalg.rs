//! Fraction-free integer elimination: rank, nullspace, reduced echelon form.
//!
//! Entries are `i128`; every row is divided by its content after each
//! elimination step to keep growth in check.

use nalgebra::DMatrix;

use crate::row::{Integer, Row};

/// Reduced echelon form: each pivot column is zero outside its pivot row and
/// every pivot entry is positive. Rows are primitive.
#[derive(Clone, Debug)]
pub(crate) struct Echelon {
    pub rows: DMatrix<i128>,
    pub pivots: Vec<usize>,
}

impl Echelon {
    #[inline]
    pub fn rank(&self) -> usize {
        self.pivots.len()
    }
}

pub(crate) fn reduced_echelon(mut m: DMatrix<i128>) -> Echelon {
    let (nrows, ncols) = m.shape();
    let mut pivots = Vec::new();
    let mut r = 0;
    for c in 0..ncols {
        if r == nrows {
            break;
        }
        let Some(p) = (r..nrows).find(|&i| m[(i, c)] != 0) else {
            continue;
        };
        m.swap_rows(p, r);
        for k in 0..nrows {
            if k == r || m[(k, c)] == 0 {
                continue;
            }
            let a = m[(r, c)];
            let b = m[(k, c)];
            for j in 0..ncols {
                m[(k, j)] = a * m[(k, j)] - b * m[(r, j)];
            }
            make_primitive(&mut m, k);
        }
        make_primitive(&mut m, r);
        pivots.push(c);
        r += 1;
    }
    for (i, &c) in pivots.iter().enumerate() {
        if m[(i, c)] < 0 {
            for j in 0..ncols {
                m[(i, j)] = -m[(i, j)];
            }
        }
    }
    Echelon {
        rows: m.rows(0, r).into_owned(),
        pivots,
    }
}

/// Integer basis of `{x : m x = 0}`; one primitive vector per free column.
pub(crate) fn nullspace(m: DMatrix<i128>) -> Vec<Vec<i128>> {
    let ncols = m.ncols();
    let ech = reduced_echelon(m);
    let lcm = ech
        .pivots
        .iter()
        .enumerate()
        .fold(1i128, |acc, (i, &p)| lcm(acc, ech.rows[(i, p)]));
    let mut out = Vec::new();
    for f in (0..ncols).filter(|c| !ech.pivots.contains(c)) {
        let mut x = vec![0i128; ncols];
        x[f] = lcm;
        for (i, &p) in ech.pivots.iter().enumerate() {
            x[p] = -ech.rows[(i, f)] * (lcm / ech.rows[(i, p)]);
        }
        primitive(&mut x);
        out.push(x);
    }
    out
}

pub(crate) fn rank(m: DMatrix<i128>) -> usize {
    reduced_echelon(m).rank()
}

/// Rows as an `i128` matrix, `ncols` wide (needed when `rows` is empty).
pub(crate) fn to_matrix<'a, I>(rows: I, ncols: usize) -> DMatrix<i128>
where
    I: IntoIterator<Item = &'a Row>,
{
    let data: Vec<&Row> = rows.into_iter().collect();
    DMatrix::from_fn(data.len(), ncols, |i, j| data[i][j] as i128)
}

/// Rows mapped through the pairing form, so `dual · r == ⟨v, r⟩`.
pub(crate) fn to_dual_matrix<'a, I>(rows: I, ncols: usize) -> DMatrix<i128>
where
    I: IntoIterator<Item = &'a Row>,
{
    let last = ncols.saturating_sub(1);
    let mut m = to_matrix(rows, ncols);
    for i in 0..m.nrows() {
        for j in 0..last {
            m[(i, j)] = -m[(i, j)];
        }
    }
    m
}

pub(crate) fn narrow(x: i128) -> Integer {
    Integer::try_from(x).unwrap_or_else(|_| panic!("coefficient {x} exceeds the row integer range"))
}

pub(crate) fn primitive(v: &mut [i128]) {
    let g = v.iter().fold(0i128, |acc, &x| gcd(acc, x));
    if g > 1 {
        for x in v.iter_mut() {
            *x /= g;
        }
    }
}

fn make_primitive(m: &mut DMatrix<i128>, row: usize) {
    let g = m.row(row).iter().fold(0i128, |acc, &x| gcd(acc, x));
    if g > 1 {
        for x in m.row_mut(row).iter_mut() {
            *x /= g;
        }
    }
}

fn gcd(a: i128, b: i128) -> i128 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn lcm(a: i128, b: i128) -> i128 {
    if a == 0 || b == 0 {
        return 0;
    }
    (a / gcd(a, b) * b).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    #[test]
    fn echelon_of_dependent_rows() {
        let m = dmatrix![2i128, 4, 6; 1, 2, 3; 0, 1, 1];
        let ech = reduced_echelon(m);
        assert_eq!(ech.rank(), 2);
        assert_eq!(ech.pivots, vec![0, 1]);
        // pivot columns are cleared outside their row
        assert_eq!(ech.rows[(1, 0)], 0);
        assert_eq!(ech.rows[(0, 1)], 0);
        assert!(ech.rows[(0, 0)] > 0 && ech.rows[(1, 1)] > 0);
    }

    #[test]
    fn nullspace_vectors_are_annihilated() {
        let m = dmatrix![1i128, 1, 1, -1; 0, 2, 1, 0];
        let basis = nullspace(m.clone());
        assert_eq!(basis.len(), 2);
        for x in &basis {
            for i in 0..m.nrows() {
                let dot: i128 = (0..m.ncols()).map(|j| m[(i, j)] * x[j]).sum();
                assert_eq!(dot, 0);
            }
        }
    }

    #[test]
    fn full_rank_has_trivial_nullspace() {
        let m = DMatrix::<i128>::identity(3, 3);
        assert!(nullspace(m).is_empty());
    }

    #[test]
    fn dual_matrix_realizes_pairing() {
        let v = Row::from([1, 2, 1]);
        let f = Row::from([1, 0, 3]);
        let d = to_dual_matrix([&v], 3);
        let dot: i128 = (0..3).map(|j| d[(0, j)] * f[j] as i128).sum();
        assert_eq!(dot, v.pairing(&f));
    }
}
