//! Read-only target corpus shared with every matcher worker.

use std::ops::Deref;
use std::sync::Arc;

use recofine_core::{Error, ItemIdentity, Result};

use crate::identity::IdentityIndex;
use crate::sparse::CsrMatrix;

/// Immutable snapshot handed to each worker. Cloning shares the value.
#[derive(Debug)]
pub struct Broadcast<T>(Arc<T>);

impl<T> Broadcast<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl<T> Clone for Broadcast<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Deref for Broadcast<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

/// The full corpus every chunk is matched against, with a column-major
/// posting list for sparse dot products and the row → identity index.
#[derive(Debug)]
pub struct TargetCorpus {
    matrix: CsrMatrix,
    /// `postings[term]` lists `(row, weight)` for every row containing `term`.
    postings: Vec<Vec<(u32, f32)>>,
    identities: IdentityIndex,
}

impl TargetCorpus {
    pub fn new(matrix: CsrMatrix, identities: IdentityIndex) -> Result<Self> {
        if matrix.n_rows() != identities.len() {
            return Err(Error::Matrix(format!(
                "{} corpus rows but {} identities",
                matrix.n_rows(),
                identities.len()
            )));
        }
        if matrix.n_rows() > u32::MAX as usize {
            return Err(Error::Matrix("corpus too large to index".into()));
        }
        let mut postings = vec![Vec::new(); matrix.n_cols()];
        for (row_idx, row) in matrix.rows().enumerate() {
            for (term, weight) in row.iter() {
                postings[term as usize].push((row_idx as u32, weight));
            }
        }
        Ok(Self {
            matrix,
            postings,
            identities,
        })
    }

    /// Build and broadcast in one step.
    pub fn broadcast(matrix: CsrMatrix, identities: Vec<ItemIdentity>) -> Result<Broadcast<Self>> {
        let index = IdentityIndex::new(identities)?;
        Ok(Broadcast::new(Self::new(matrix, index)?))
    }

    pub fn matrix(&self) -> &CsrMatrix {
        &self.matrix
    }

    pub fn identities(&self) -> &IdentityIndex {
        &self.identities
    }

    pub fn n_rows(&self) -> usize {
        self.matrix.n_rows()
    }

    pub(crate) fn postings(&self, term: u32) -> &[(u32, f32)] {
        self.postings
            .get(term as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recofine_core::ContentType;

    #[test]
    fn test_clone_shares_snapshot() {
        let matrix = CsrMatrix::from_rows(2, vec![vec![(0, 1.0)], vec![(1, 1.0)]]).unwrap();
        let ids = vec![
            ItemIdentity::new(1, ContentType::Game),
            ItemIdentity::new(2, ContentType::Game),
        ];
        let a = TargetCorpus::broadcast(matrix, ids).unwrap();
        let b = a.clone();
        assert!(std::ptr::eq(a.matrix(), b.matrix()));
        assert_eq!(b.postings(1), &[(1, 1.0)]);
        assert!(b.postings(7).is_empty());
    }

    #[test]
    fn test_row_count_must_match_identities() {
        let matrix = CsrMatrix::from_rows(1, vec![vec![(0, 1.0)]]).unwrap();
        assert!(TargetCorpus::broadcast(matrix, Vec::new()).is_err());
    }
}
