//! Small utilities: lazy index combinations.

/// k-combinations of `0..n` in lexicographic order, produced lazily so
/// callers can stop at the first hit.
pub(crate) struct Combinations {
    n: usize,
    idxs: Vec<usize>,
    done: bool,
}

impl Combinations {
    pub(crate) fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            idxs: (0..k).collect(),
            done: k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if self.done {
            return None;
        }
        let out = self.idxs.clone();
        let k = self.idxs.len();
        let mut i = k;
        loop {
            if i == 0 {
                self.done = true;
                break;
            }
            i -= 1;
            if self.idxs[i] != i + self.n - k {
                self.idxs[i] += 1;
                for j in i + 1..k {
                    self.idxs[j] = self.idxs[j - 1] + 1;
                }
                break;
            }
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_match_binomials() {
        assert_eq!(Combinations::new(5, 2).count(), 10);
        assert_eq!(Combinations::new(4, 4).count(), 1);
        assert_eq!(Combinations::new(3, 0).count(), 1);
        assert_eq!(Combinations::new(2, 3).count(), 0);
    }

    #[test]
    fn order_is_lexicographic() {
        let all: Vec<_> = Combinations::new(4, 2).collect();
        assert_eq!(all[0], vec![0, 1]);
        assert_eq!(all[1], vec![0, 2]);
        assert_eq!(all[5], vec![2, 3]);
    }
}
