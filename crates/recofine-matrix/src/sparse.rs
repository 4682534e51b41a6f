//! Compressed sparse row matrix of `f32` weights.

use std::ops::Range;

use recofine_core::{Error, Result};

/// Row-major sparse matrix. Column indices within a row are strictly
/// increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    n_cols: usize,
    indptr: Vec<usize>,
    indices: Vec<u32>,
    data: Vec<f32>,
}

/// Borrowed view of one matrix row.
#[derive(Debug, Clone, Copy)]
pub struct SparseRow<'a> {
    pub indices: &'a [u32],
    pub values: &'a [f32],
}

impl<'a> SparseRow<'a> {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + 'a {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    /// Dot product of two rows (merge of sorted index lists).
    pub fn dot(&self, other: &SparseRow<'_>) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0f32;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }
}

impl CsrMatrix {
    /// Empty matrix with `n_cols` columns and no rows.
    pub fn new(n_cols: usize) -> Self {
        Self {
            n_cols,
            indptr: vec![0],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Build a matrix from per-row `(column, value)` entries.
    pub fn from_rows<I>(n_cols: usize, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = Vec<(u32, f32)>>,
    {
        let mut matrix = Self::new(n_cols);
        for row in rows {
            matrix.push_row(row)?;
        }
        Ok(matrix)
    }

    /// Append a row. Entries are sorted by column; zero values are dropped;
    /// duplicate or out-of-range columns are rejected.
    pub fn push_row(&mut self, mut entries: Vec<(u32, f32)>) -> Result<()> {
        entries.sort_by_key(|&(c, _)| c);
        for w in entries.windows(2) {
            if w[0].0 == w[1].0 {
                return Err(Error::Matrix(format!("duplicate column {} in row", w[0].0)));
            }
        }
        if let Some(&(c, _)) = entries.last() {
            if c as usize >= self.n_cols {
                return Err(Error::Matrix(format!(
                    "column {} out of range for {} columns",
                    c, self.n_cols
                )));
            }
        }
        for (c, v) in entries {
            if v != 0.0 {
                self.indices.push(c);
                self.data.push(v);
            }
        }
        self.indptr.push(self.indices.len());
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.indptr.len() - 1
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Number of stored (non-zero) values.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Row `i`. Panics if out of range, like slice indexing.
    pub fn row(&self, i: usize) -> SparseRow<'_> {
        let (lo, hi) = (self.indptr[i], self.indptr[i + 1]);
        SparseRow {
            indices: &self.indices[lo..hi],
            values: &self.data[lo..hi],
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = SparseRow<'_>> {
        (0..self.n_rows()).map(move |i| self.row(i))
    }

    /// Copy a contiguous row range into a new matrix with the same columns.
    pub fn slice_rows(&self, range: Range<usize>) -> Result<CsrMatrix> {
        if range.start > range.end || range.end > self.n_rows() {
            return Err(Error::Matrix(format!(
                "row range {:?} out of bounds for {} rows",
                range,
                self.n_rows()
            )));
        }
        let (lo, hi) = (self.indptr[range.start], self.indptr[range.end]);
        Ok(CsrMatrix {
            n_cols: self.n_cols,
            indptr: self.indptr[range.start..=range.end]
                .iter()
                .map(|p| p - lo)
                .collect(),
            indices: self.indices[lo..hi].to_vec(),
            data: self.data[lo..hi].to_vec(),
        })
    }
}
