#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use vob::Vob;

/// A dense boolean matrix, stored as one bit vector per row.
///
/// Matrix "addition" is logical OR and "multiplication" is boolean AND-OR composition: the
/// product `A @ B` has `[i][j]` set iff there is some `k` with `A[i][k]` and `B[k][j]`.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoolMatrix {
    cols_len: usize,
    rows: Vec<Vob>,
}

impl BoolMatrix {
    /// Create an all-false matrix with `rows_len` rows and `cols_len` columns.
    pub fn new(rows_len: usize, cols_len: usize) -> Self {
        BoolMatrix {
            cols_len,
            rows: vec![Vob::from_elem(false, cols_len); rows_len],
        }
    }

    /// Create an all-false `n * n` matrix.
    pub fn square(n: usize) -> Self {
        BoolMatrix::new(n, n)
    }

    /// Create the `n * n` identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut m = BoolMatrix::square(n);
        m.set_diagonal();
        m
    }

    pub fn rows_len(&self) -> usize {
        self.rows.len()
    }

    pub fn cols_len(&self) -> usize {
        self.cols_len
    }

    /// Is entry `[r][c]` set? Panics if `r` or `c` is out of bounds.
    pub fn get(&self, r: usize, c: usize) -> bool {
        assert!(c < self.cols_len);
        self.rows[r][c]
    }

    /// Ensure that entry `[r][c]` is set. Returns true if this changed the matrix, or false if
    /// the entry was already set.
    pub fn set(&mut self, r: usize, c: usize) -> bool {
        assert!(c < self.cols_len);
        let row = &mut self.rows[r];
        if row[c] {
            false
        } else {
            row.set(c, true);
            true
        }
    }

    /// Set every entry on the main diagonal. Returns true if this changed the matrix.
    pub fn set_diagonal(&mut self) -> bool {
        let mut changed = false;
        for i in 0..self.rows.len().min(self.cols_len) {
            changed |= self.set(i, i);
        }
        changed
    }

    /// Return row `r`. Panics if `r` is out of bounds.
    pub fn row(&self, r: usize) -> &Vob {
        &self.rows[r]
    }

    /// `self |= other`. Returns true if this changed `self`. Panics if the dimensions differ.
    pub fn or_assign(&mut self, other: &BoolMatrix) -> bool {
        self.check_same_shape(other);
        let mut changed = false;
        for (r, o) in self.rows.iter_mut().zip(other.rows.iter()) {
            if r.or(o) {
                changed = true;
            }
        }
        changed
    }

    /// Boolean matrix product `self @ other`. Panics if `self.cols_len() != other.rows_len()`.
    pub fn mul(&self, other: &BoolMatrix) -> BoolMatrix {
        if self.cols_len != other.rows_len() {
            panic!(
                "Cannot multiply a {}x{} matrix by a {}x{} matrix",
                self.rows_len(),
                self.cols_len,
                other.rows_len(),
                other.cols_len
            );
        }
        let mut out = BoolMatrix::new(self.rows_len(), other.cols_len);
        for (orow, srow) in out.rows.iter_mut().zip(self.rows.iter()) {
            for k in srow.iter_set_bits(..) {
                orow.or(&other.rows[k]);
            }
        }
        out
    }

    /// The Kronecker (tensor) product `self ⊗ other`. If `self` is `m * n` and `other` is
    /// `p * q`, the result is `(m * p) * (n * q)` and entry `[i * p + k][j * q + l]` is
    /// `self[i][j] && other[k][l]`.
    pub fn kron(&self, other: &BoolMatrix) -> BoolMatrix {
        let p = other.rows_len();
        let q = other.cols_len;
        let mut out = BoolMatrix::new(self.rows_len() * p, self.cols_len * q);
        for (i, srow) in self.rows.iter().enumerate() {
            for j in srow.iter_set_bits(..) {
                for (k, orow) in other.rows.iter().enumerate() {
                    for l in orow.iter_set_bits(..) {
                        out.set(i * p + k, j * q + l);
                    }
                }
            }
        }
        out
    }

    /// Return the reflexive transitive closure of this (square) matrix: entry `[i][j]` is set iff
    /// `j` is reachable from `i` in zero or more steps. Panics if the matrix is not square.
    pub fn transitive_closure(&self) -> BoolMatrix {
        if self.rows_len() != self.cols_len {
            panic!("Transitive closure of a non-square matrix");
        }
        let mut reach = self.clone();
        reach.set_diagonal();
        // Warshall's algorithm, a row at a time: after round k, reach[i][j] is set iff there is a
        // path from i to j whose intermediate nodes are all < k.
        for k in 0..reach.rows.len() {
            let rowk = reach.rows[k].clone();
            for row in reach.rows.iter_mut() {
                if row[k] {
                    row.or(&rowk);
                }
            }
        }
        reach
    }

    /// How many entries are set?
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(|r| r.iter_set_bits(..).count()).sum()
    }

    pub fn is_zero(&self) -> bool {
        self.rows.iter().all(|r| r.iter_set_bits(..).next().is_none())
    }

    /// Iterate over all set entries as `(row, col)` pairs, in row-major order.
    pub fn iter_nonzero(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(r, row)| row.iter_set_bits(..).map(move |c| (r, c)))
    }

    fn check_same_shape(&self, other: &BoolMatrix) {
        if self.rows_len() != other.rows_len() || self.cols_len != other.cols_len {
            panic!(
                "Matrix shapes differ: {}x{} vs. {}x{}",
                self.rows_len(),
                self.cols_len,
                other.rows_len(),
                other.cols_len
            );
        }
    }
}
