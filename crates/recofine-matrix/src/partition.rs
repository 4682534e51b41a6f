//! Row partitioning of a corpus matrix into worker chunks.

use recofine_core::{Error, Result};

use crate::sparse::CsrMatrix;

/// A contiguous row range of a corpus. Local row `i` is global row
/// `start + i`.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub start: usize,
    pub rows: CsrMatrix,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.rows.n_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn global_row(&self, local: usize) -> usize {
        self.start + local
    }
}

/// Split `matrix` into `ceil(N / rows_per_chunk)` chunks, in order, without
/// reordering rows. An empty matrix yields no chunks.
pub fn partition(matrix: &CsrMatrix, rows_per_chunk: usize) -> Result<Vec<Chunk>> {
    if rows_per_chunk == 0 {
        return Err(Error::Matrix("rows_per_chunk must be positive".into()));
    }
    let n = matrix.n_rows();
    let mut chunks = Vec::with_capacity(n.div_ceil(rows_per_chunk));
    let mut start = 0;
    while start < n {
        let end = (start + rows_per_chunk).min(n);
        chunks.push(Chunk {
            start,
            rows: matrix.slice_rows(start..end)?,
        });
        start = end;
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(n: usize) -> CsrMatrix {
        CsrMatrix::from_rows(n.max(1), (0..n).map(|i| vec![(i as u32, 1.0)])).unwrap()
    }

    #[test]
    fn test_chunk_count_and_offsets() {
        let m = matrix(7);
        let chunks = partition(&m, 3).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| (c.start, c.len())).collect::<Vec<_>>(),
            vec![(0, 3), (3, 3), (6, 1)]
        );
        // Local row maps back to the original global row.
        let last = &chunks[2];
        assert_eq!(last.global_row(0), 6);
        assert_eq!(last.rows.row(0).indices, &[6]);
    }

    #[test]
    fn test_exact_multiple_and_oversized_chunk() {
        assert_eq!(partition(&matrix(6), 3).unwrap().len(), 2);
        let whole = partition(&matrix(6), 100).unwrap();
        assert_eq!(whole.len(), 1);
        assert_eq!(whole[0].len(), 6);
    }

    #[test]
    fn test_empty_and_invalid() {
        assert!(partition(&CsrMatrix::new(3), 10).unwrap().is_empty());
        assert!(partition(&matrix(2), 0).is_err());
    }
}
