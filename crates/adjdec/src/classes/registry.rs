//! Registry of every representative admitted so far.
//!
//! One structure, two lookups:
//! - exact mode: rows are canonical maxima, identity is value equality;
//! - fingerprint mode: rows are bucketed by their sorted fingerprint, and a
//!   candidate is compared with `check_equivalence_maps` only inside its own
//!   bucket. Any accepted pair has equal sorted fingerprints, so bucketing
//!   never hides a match.
//!
//! Rows are stored once, keyed by their bucket; discovery order is kept in a
//! separate index list into the same storage.

use std::collections::{BTreeSet, HashMap};

use crate::maps::Maps;
use crate::row::{Matrix, Row};

use super::affine::{check_equivalence_maps, Deterministics, Fingerprint};

#[derive(Debug)]
enum Lookup {
    Exact(BTreeSet<Row>),
    Fingerprint {
        deterministics: Deterministics,
        maps: Maps,
        buckets: HashMap<Fingerprint, Vec<usize>>,
    },
}

#[derive(Debug)]
pub struct ClassRegistry {
    lookup: Lookup,
    rows: Matrix,
}

impl ClassRegistry {
    pub fn exact() -> Self {
        Self {
            lookup: Lookup::Exact(BTreeSet::new()),
            rows: Matrix::new(),
        }
    }

    /// Fingerprint registry; empty `deterministics` gives an exact registry.
    pub fn deterministic(deterministics: Deterministics, maps: Maps) -> Self {
        if deterministics.is_empty() {
            return Self::exact();
        }
        Self {
            lookup: Lookup::Fingerprint {
                deterministics,
                maps,
                buckets: HashMap::new(),
            },
            rows: Matrix::new(),
        }
    }

    pub fn contains_equivalent(&self, row: &Row) -> bool {
        match &self.lookup {
            Lookup::Exact(seen) => seen.contains(row),
            Lookup::Fingerprint {
                deterministics,
                maps,
                buckets,
            } => {
                let key = Fingerprint::of(row, deterministics).sorted();
                buckets.get(&key).is_some_and(|idxs| {
                    idxs.iter().any(|&i| {
                        check_equivalence_maps(row, &self.rows[i], deterministics, maps)
                    })
                })
            }
        }
    }

    /// Record `row` unless an equivalent row is already present.
    /// Returns whether it was new.
    pub fn admit(&mut self, row: Row) -> bool {
        if self.contains_equivalent(&row) {
            return false;
        }
        let idx = self.rows.len();
        match &mut self.lookup {
            Lookup::Exact(seen) => {
                seen.insert(row.clone());
            }
            Lookup::Fingerprint {
                deterministics,
                buckets,
                ..
            } => {
                let key = Fingerprint::of(&row, deterministics).sorted();
                buckets.entry(key).or_default().push(idx);
            }
        }
        self.rows.push(row);
        true
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Admitted rows in discovery order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Matrix {
        self.rows
    }
}
