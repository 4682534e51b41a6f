//! Chunk matcher: similarity of a row chunk against the broadcast target
//! corpus, with type filtering, top-K selection, self-match exclusion and
//! thresholding.

use std::cmp::Ordering;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use recofine_core::{ContentType, ItemId, Result, TypePair};

use crate::broadcast::{Broadcast, TargetCorpus};
use crate::partition::Chunk;
use crate::sparse::SparseRow;

/// Matching parameters of one scope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchParams {
    /// Only scores strictly above this value are emitted.
    pub threshold: f32,
    /// Maximum edges emitted per source row.
    pub max_sim: usize,
    /// Cross-type mode: only rows of `anchor` type, only columns of `other` type.
    pub type_filter: Option<TypePair>,
}

/// A directed similarity edge between two catalog items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEdge {
    pub source_id: ItemId,
    pub target_id: ItemId,
    pub similarity: f32,
    pub source_type: ContentType,
    pub target_type: ContentType,
}

/// Matches chunks of a corpus against a broadcast target corpus.
#[derive(Debug, Clone)]
pub struct Matcher {
    target: Broadcast<TargetCorpus>,
    params: MatchParams,
}

impl Matcher {
    pub fn new(target: Broadcast<TargetCorpus>, params: MatchParams) -> Self {
        Self { target, params }
    }

    /// Lazily emit the edges of one chunk. Re-running on the same chunk
    /// yields the same sequence; no state is shared between chunks.
    pub fn matches<'a>(&'a self, chunk: &'a Chunk) -> ChunkMatches<'a> {
        ChunkMatches {
            matcher: self,
            chunk,
            next_row: 0,
            scores: Array1::zeros(self.target.n_rows()),
            touched: Vec::new(),
            pending: Vec::new().into_iter(),
            failed: false,
        }
    }

    /// Accumulate the similarity of `row` against every target into
    /// `scores`, recording which columns received a contribution.
    fn score_row(&self, row: SparseRow<'_>, scores: &mut Array1<f32>, touched: &mut Vec<usize>) {
        for (term, weight) in row.iter() {
            for &(col, tw) in self.target.postings(term) {
                let col = col as usize;
                if scores[col] == 0.0 {
                    touched.push(col);
                }
                scores[col] += weight * tw;
            }
        }
    }

    /// Top-K surviving columns of one source row, best first.
    fn select(&self, global_row: usize, scores: &Array1<f32>, touched: &[usize]) -> Result<Vec<(usize, f32)>> {
        let identities = self.target.identities();
        let mut candidates = Vec::with_capacity(touched.len());
        for &col in touched {
            if col == global_row {
                continue;
            }
            let score = scores[col];
            if score.is_nan() || score <= self.params.threshold {
                continue;
            }
            if let Some(pair) = &self.params.type_filter {
                if identities.identity(col)?.content_type != pair.other {
                    continue;
                }
            }
            candidates.push((col, score));
        }

        let by_rank = |a: &(usize, f32), b: &(usize, f32)| -> Ordering {
            b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
        };
        let k = self.params.max_sim;
        if candidates.len() > k {
            if k == 0 {
                return Ok(Vec::new());
            }
            candidates.select_nth_unstable_by(k - 1, by_rank);
            candidates.truncate(k);
        }
        candidates.sort_unstable_by(by_rank);
        Ok(candidates)
    }
}

/// Iterator over the edges of one chunk, computed row by row.
pub struct ChunkMatches<'a> {
    matcher: &'a Matcher,
    chunk: &'a Chunk,
    next_row: usize,
    scores: Array1<f32>,
    touched: Vec<usize>,
    pending: std::vec::IntoIter<SimilarityEdge>,
    failed: bool,
}

impl ChunkMatches<'_> {
    fn advance_row(&mut self) -> Result<()> {
        let local = self.next_row;
        self.next_row += 1;
        let matcher = self.matcher;
        let chunk = self.chunk;
        let global = chunk.global_row(local);
        let identities = matcher.target.identities();
        let source = identities.identity(global)?;

        if let Some(pair) = &matcher.params.type_filter {
            if source.content_type != pair.anchor {
                return Ok(());
            }
        }

        matcher.score_row(chunk.rows.row(local), &mut self.scores, &mut self.touched);
        // A column is recorded again if its running score was still zero.
        self.touched.sort_unstable();
        self.touched.dedup();
        let selected = matcher.select(global, &self.scores, &self.touched);
        for &col in &self.touched {
            self.scores[col] = 0.0;
        }
        self.touched.clear();

        let mut edges = Vec::new();
        for (col, score) in selected? {
            let target = identities.identity(col)?;
            edges.push(SimilarityEdge {
                source_id: source.id.clone(),
                target_id: target.id.clone(),
                similarity: score,
                source_type: source.content_type,
                target_type: target.content_type,
            });
        }
        self.pending = edges.into_iter();
        Ok(())
    }
}

impl Iterator for ChunkMatches<'_> {
    type Item = Result<SimilarityEdge>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(edge) = self.pending.next() {
                return Some(Ok(edge));
            }
            if self.next_row >= self.chunk.len() {
                return None;
            }
            if let Err(e) = self.advance_row() {
                self.failed = true;
                return Some(Err(e));
            }
        }
    }
}

/// Sort edges into the canonical persisted order: source, best score first,
/// then target.
pub fn canonical_order(edges: &mut [SimilarityEdge]) {
    edges.sort_by(|a, b| {
        (a.source_type, &a.source_id)
            .cmp(&(b.source_type, &b.source_id))
            .then(b.similarity.total_cmp(&a.similarity))
            .then((a.target_type, &a.target_id).cmp(&(b.target_type, &b.target_id)))
    });
}
