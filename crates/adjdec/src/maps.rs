//! Symmetry generators and their application to rows.
//!
//! A map is a pure, invertible `Row → Row` that commutes with adjacency:
//! the image of a facet is again a facet. The group generated by a `Maps`
//! set may be much larger than the set itself; the orbit code closes over
//! compositions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::geometry::Equations;
use crate::row::Row;

/// One generator of the symmetry group.
pub trait SymmetryMap: fmt::Debug + Send + Sync {
    fn apply(&self, row: &Row) -> Row;

    /// Row length the map is defined on; `None` if it accepts any length.
    fn arity(&self) -> Option<usize> {
        None
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MapError {
    #[error("index {index} out of range for a map over {len} slots")]
    OutOfRange { index: usize, len: usize },
    #[error("slot {0} is hit twice; not a permutation")]
    Repeated(usize),
    #[error("unknown coordinate name `{0}`")]
    UnknownName(String),
    #[error("map lists {got} names, expected {expected}")]
    Arity { got: usize, expected: usize },
}

/// Finite generating set, shared cheaply between threads.
#[derive(Clone, Debug, Default)]
pub struct Maps(Vec<Arc<dyn SymmetryMap>>);

impl Maps {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push<M: SymmetryMap + 'static>(&mut self, map: M) {
        self.0.push(Arc::new(map));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn SymmetryMap> + '_ {
        self.0.iter().map(|m| m.as_ref())
    }

    /// Compose every generator with the equation normalization so images
    /// land on the normalized representative of their facet.
    ///
    /// Applied once at startup; an empty equation set returns the maps
    /// unchanged.
    pub fn normalized(&self, equations: &Arc<Equations>) -> Maps {
        if equations.is_empty() {
            return self.clone();
        }
        Maps(
            self.0
                .iter()
                .map(|inner| {
                    Arc::new(Normalized {
                        inner: Arc::clone(inner),
                        equations: Arc::clone(equations),
                    }) as Arc<dyn SymmetryMap>
                })
                .collect(),
        )
    }
}

impl<M: SymmetryMap + 'static> FromIterator<M> for Maps {
    fn from_iter<I: IntoIterator<Item = M>>(iter: I) -> Self {
        Maps(
            iter.into_iter()
                .map(|m| Arc::new(m) as Arc<dyn SymmetryMap>)
                .collect(),
        )
    }
}

/// Slot permutation: `image[i] = row[source[i]]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Permutation {
    source: Vec<usize>,
}

impl Permutation {
    pub fn new(source: Vec<usize>) -> Result<Self, MapError> {
        let len = source.len();
        let mut hit = vec![false; len];
        for &i in &source {
            if i >= len {
                return Err(MapError::OutOfRange { index: i, len });
            }
            if hit[i] {
                return Err(MapError::Repeated(i));
            }
            hit[i] = true;
        }
        Ok(Self { source })
    }

    /// Build from coordinate names: variable `names[i]` is sent to
    /// `images[i]`. The trailing slot (offset) stays fixed.
    pub fn from_names<S: AsRef<str>>(names: &[S], images: &[S]) -> Result<Self, MapError> {
        if images.len() != names.len() {
            return Err(MapError::Arity {
                got: images.len(),
                expected: names.len(),
            });
        }
        let position: HashMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_ref(), i))
            .collect();
        let n = names.len();
        let mut source = vec![usize::MAX; n + 1];
        for (i, image) in images.iter().enumerate() {
            let j = *position
                .get(image.as_ref())
                .ok_or_else(|| MapError::UnknownName(image.as_ref().to_string()))?;
            if source[j] != usize::MAX {
                return Err(MapError::Repeated(j));
            }
            source[j] = i;
        }
        source[n] = n;
        Self::new(source)
    }

    /// Reversal of all `len` slots (handy for small symmetric examples).
    pub fn reversal(len: usize) -> Self {
        Self {
            source: (0..len).rev().collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.source.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
}

impl SymmetryMap for Permutation {
    fn apply(&self, row: &Row) -> Row {
        assert_eq!(
            row.len(),
            self.source.len(),
            "permutation over {} slots applied to a row of length {}",
            self.source.len(),
            row.len()
        );
        Row::new(self.source.iter().map(|&i| row[i]).collect())
    }

    fn arity(&self) -> Option<usize> {
        Some(self.source.len())
    }
}

/// A generator followed by the equation normalization.
#[derive(Debug)]
struct Normalized {
    inner: Arc<dyn SymmetryMap>,
    equations: Arc<Equations>,
}

impl SymmetryMap for Normalized {
    fn apply(&self, row: &Row) -> Row {
        self.equations.normalize_row(&self.inner.apply(row))
    }

    fn arity(&self) -> Option<usize> {
        self.inner.arity()
    }
}
