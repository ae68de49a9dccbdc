//! The narrow sparse-matrix interface the execution engine consumes
//! (SPEC_FULL.md §3.4, §4.4, §6). Stands in for the external GraphBLAS
//! collaborator: a boolean `row -> RoaringBitmap of columns` adjacency
//! structure with multiply (boolean AND-OR semiring), transpose, select, and
//! tuple iteration. The engine never needs numeric weights or arbitrary
//! semirings, so a dense vector of per-row bitmaps is sufficient and avoids
//! pulling in a full GraphBLAS binding.

use roaring::RoaringBitmap;

pub type Dim = u32;

/// A sparse boolean matrix: row -> set of columns present.
#[derive(Debug, Clone, Default)]
pub struct Matrix {
    rows: Vec<RoaringBitmap>,
    n_cols: Dim,
}

impl Matrix {
    pub fn new(n_rows: Dim, n_cols: Dim) -> Self {
        Matrix { rows: vec![RoaringBitmap::new(); n_rows as usize], n_cols }
    }

    pub fn n_rows(&self) -> Dim {
        self.rows.len() as Dim
    }

    pub fn n_cols(&self) -> Dim {
        self.n_cols
    }

    pub fn resize(&mut self, n_rows: Dim, n_cols: Dim) {
        if n_rows as usize > self.rows.len() {
            self.rows.resize(n_rows as usize, RoaringBitmap::new());
        }
        self.n_cols = self.n_cols.max(n_cols);
    }

    pub fn set(&mut self, row: Dim, col: Dim) {
        self.ensure_row(row);
        self.rows[row as usize].insert(col);
        if col >= self.n_cols {
            self.n_cols = col + 1;
        }
    }

    pub fn unset(&mut self, row: Dim, col: Dim) {
        if let Some(r) = self.rows.get_mut(row as usize) {
            r.remove(col);
        }
    }

    pub fn get(&self, row: Dim, col: Dim) -> bool {
        self.rows.get(row as usize).map(|r| r.contains(col)).unwrap_or(false)
    }

    pub fn row(&self, row: Dim) -> Option<&RoaringBitmap> {
        self.rows.get(row as usize)
    }

    pub fn clear(&mut self) {
        for r in &mut self.rows {
            r.clear();
        }
    }

    fn ensure_row(&mut self, row: Dim) {
        if row as usize >= self.rows.len() {
            self.rows.resize(row as usize + 1, RoaringBitmap::new());
        }
    }

    /// Boolean-semiring multiply: `self * rhs`, where `rhs` indexes by
    /// `self`'s column space.
    pub fn multiply(&self, rhs: &Matrix) -> Matrix {
        let mut out = Matrix::new(self.n_rows(), rhs.n_cols());
        for (i, row) in self.rows.iter().enumerate() {
            let mut acc = RoaringBitmap::new();
            for mid in row.iter() {
                if let Some(rhs_row) = rhs.rows.get(mid as usize) {
                    acc |= rhs_row;
                }
            }
            if !acc.is_empty() {
                out.rows[i] = acc;
            }
        }
        out
    }

    /// Boolean OR over two same-shaped matrices.
    pub fn add(&self, other: &Matrix) -> Matrix {
        let n_rows = self.n_rows().max(other.n_rows());
        let mut out = Matrix::new(n_rows, self.n_cols().max(other.n_cols()));
        for i in 0..n_rows as usize {
            let mut acc = self.rows.get(i).cloned().unwrap_or_default();
            if let Some(other_row) = other.rows.get(i) {
                acc |= other_row;
            }
            out.rows[i] = acc;
        }
        out
    }

    /// Transpose: column-major view materialized as a fresh matrix.
    pub fn transpose(&self) -> Matrix {
        let mut out = Matrix::new(self.n_cols(), self.n_rows());
        for (row, bitmap) in self.rows.iter().enumerate() {
            for col in bitmap.iter() {
                out.set(col, row as Dim);
            }
        }
        out
    }

    /// Diagonal matrix with `true` at `(i, i)` for each `i` in `ids`.
    pub fn diagonal(dim: Dim, ids: impl IntoIterator<Item = Dim>) -> Matrix {
        let mut m = Matrix::new(dim, dim);
        for id in ids {
            m.set(id, id);
        }
        m
    }

    /// All non-zero `(row, col)` tuples, row-major, ascending column order —
    /// the contract `GxB_MatrixTupleIter` exposes in the original source.
    pub fn tuples(&self) -> TupleIter<'_> {
        TupleIter { matrix: self, row: 0, col_iter: None }
    }
}

pub struct TupleIter<'a> {
    matrix: &'a Matrix,
    row: usize,
    col_iter: Option<roaring::bitmap::Iter<'a>>,
}

impl<'a> Iterator for TupleIter<'a> {
    type Item = (Dim, Dim);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(iter) = self.col_iter.as_mut() {
                if let Some(col) = iter.next() {
                    return Some((self.row as Dim, col));
                }
                self.col_iter = None;
                self.row += 1;
            }
            let row_bitmap = self.matrix.rows.get(self.row)?;
            self.col_iter = Some(row_bitmap.iter());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiply_composes_reachability() {
        let mut a = Matrix::new(3, 3);
        a.set(0, 1);
        let mut b = Matrix::new(3, 3);
        b.set(1, 2);
        let c = a.multiply(&b);
        assert!(c.get(0, 2));
        assert!(!c.get(0, 1));
    }

    #[test]
    fn transpose_flips_entries() {
        let mut a = Matrix::new(2, 3);
        a.set(0, 2);
        let t = a.transpose();
        assert!(t.get(2, 0));
    }

    #[test]
    fn tuples_are_row_major() {
        let mut a = Matrix::new(2, 2);
        a.set(1, 0);
        a.set(0, 1);
        let tuples: Vec<_> = a.tuples().collect();
        assert_eq!(tuples, vec![(0, 1), (1, 0)]);
    }
}
