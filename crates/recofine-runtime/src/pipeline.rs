//! The per-scope similarity pipeline shared by both engines:
//! vectorize → broadcast → partition → parallel match → collect.

use std::time::Instant;

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::debug;

use recofine_core::{Error, Result, ScopeSettings, TypePair};
use recofine_ingest::Document;
use recofine_matrix::{
    canonical_order, partition, Chunk, MatchParams, Matcher, SimilarityEdge, TargetCorpus,
};
use recofine_vectorize::TfidfVectorizer;

/// Inputs of one pipeline run besides the corpus.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub scope: ScopeSettings,
    pub type_filter: Option<TypePair>,
    /// Corpora larger than this abort the scope.
    pub max_corpus_rows: usize,
}

/// Match every document of `corpus` against the whole corpus, in parallel
/// on `pool`. The returned edges are in canonical order.
pub fn match_corpus(
    pool: &ThreadPool,
    corpus: &[Document],
    options: PipelineOptions,
) -> Result<Vec<SimilarityEdge>> {
    let start = Instant::now();
    if corpus.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Vec<&str> = corpus.iter().map(|d| d.text.as_str()).collect();
    let vocabulary = TfidfVectorizer::new()
        .with_max_documents(options.max_corpus_rows)
        .fit(&texts)?;
    let matrix = vocabulary.transform(&texts)?;
    debug!(
        "Vectorized {} documents over {} terms in {:?}",
        matrix.n_rows(),
        vocabulary.len(),
        start.elapsed()
    );

    let identities = corpus.iter().map(|d| d.identity.clone()).collect();
    let target = TargetCorpus::broadcast(matrix, identities)?;
    let chunks = partition(target.matrix(), options.scope.rows_per_chunk)?;
    let matcher = Matcher::new(
        target.clone(),
        MatchParams {
            threshold: options.scope.threshold,
            max_sim: options.scope.max_sim,
            type_filter: options.type_filter,
        },
    );

    let edges = match_chunks(pool, &matcher, &chunks)?;
    debug!(
        "Matched {} chunks into {} edges in {:?}",
        chunks.len(),
        edges.len(),
        start.elapsed()
    );
    Ok(edges)
}

/// Run `matcher` over every chunk on `pool` and gather the edges in
/// canonical order. Any failing chunk fails the whole call.
pub fn match_chunks(
    pool: &ThreadPool,
    matcher: &Matcher,
    chunks: &[Chunk],
) -> Result<Vec<SimilarityEdge>> {
    let per_chunk: Vec<Vec<SimilarityEdge>> = pool.install(|| {
        chunks
            .par_iter()
            .map(|chunk| {
                matcher
                    .matches(chunk)
                    .collect::<Result<Vec<_>>>()
                    .map_err(|e| {
                        Error::Worker(format!("chunk at row {} failed: {}", chunk.start, e))
                    })
            })
            .collect::<Result<Vec<_>>>()
    })?;

    let mut edges: Vec<SimilarityEdge> = per_chunk.into_iter().flatten().collect();
    canonical_order(&mut edges);
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use recofine_core::{ContentType, ItemId, ItemIdentity};
    use recofine_store::SqliteStore;
    use rayon::ThreadPoolBuilder;

    fn doc(id: i64, ct: ContentType, text: &str) -> Document {
        Document {
            identity: ItemIdentity::new(id, ct),
            text: text.to_string(),
        }
    }

    fn options(threshold: f32, max_sim: usize, rows_per_chunk: usize) -> PipelineOptions {
        PipelineOptions {
            scope: ScopeSettings {
                threshold,
                max_sim,
                rows_per_chunk,
            },
            type_filter: None,
            max_corpus_rows: 1000,
        }
    }

    #[test]
    fn test_red_car_scenario() {
        let pool = ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let corpus = vec![
            doc(1, ContentType::Track, "red car"),
            doc(2, ContentType::Track, "red bike"),
            doc(3, ContentType::Track, "blue boat"),
        ];
        let edges = match_corpus(&pool, &corpus, options(0.1, 2, 2)).unwrap();

        let from_one: Vec<_> = edges.iter().filter(|e| e.source_id == ItemId::Int(1)).collect();
        assert_eq!(from_one.len(), 1);
        assert_eq!(from_one[0].target_id, ItemId::Int(2));
        assert!(from_one[0].similarity > 0.1);
        assert!(edges.iter().all(|e| e.source_id != e.target_id));
        assert!(edges
            .iter()
            .all(|e| e.source_id != ItemId::Int(3) && e.target_id != ItemId::Int(3)));
    }

    #[test]
    fn test_empty_corpus_yields_no_edges() {
        let pool = ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let edges = match_corpus(&pool, &[], options(0.1, 10, 100)).unwrap();
        assert!(edges.is_empty());
    }

    #[test]
    fn test_oversized_corpus_is_fatal() {
        let pool = ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let corpus: Vec<Document> = (0..5)
            .map(|i| doc(i, ContentType::Game, "same words"))
            .collect();
        let mut opts = options(0.1, 10, 2);
        opts.max_corpus_rows = 4;
        assert!(matches!(
            match_corpus(&pool, &corpus, opts),
            Err(Error::Vectorize(_))
        ));
    }

    #[test]
    fn test_duplicate_identity_fails_scope() {
        let pool = ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let corpus = vec![
            doc(1, ContentType::Game, "alpha"),
            doc(1, ContentType::Game, "alpha beta"),
        ];
        assert!(matches!(
            match_corpus(&pool, &corpus, options(0.1, 10, 1)),
            Err(Error::Identity(_))
        ));
    }

    fn two_game_matcher() -> (Matcher, Vec<Chunk>) {
        let texts = ["red car", "red bike"];
        let matrix = TfidfVectorizer::new()
            .fit(&texts)
            .unwrap()
            .transform(&texts)
            .unwrap();
        let identities = vec![
            ItemIdentity::new(1, ContentType::Game),
            ItemIdentity::new(2, ContentType::Game),
        ];
        let target = TargetCorpus::broadcast(matrix, identities).unwrap();
        let mut chunks = partition(target.matrix(), 1).unwrap();
        // A chunk positioned past the end of the target corpus.
        chunks.push(Chunk {
            start: 7,
            rows: target.matrix().clone(),
        });
        let matcher = Matcher::new(
            target,
            MatchParams {
                threshold: 0.1,
                max_sim: 10,
                type_filter: None,
            },
        );
        (matcher, chunks)
    }

    #[test]
    fn test_failed_chunk_fails_whole_match() {
        let pool = ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let (matcher, chunks) = two_game_matcher();

        assert_eq!(match_chunks(&pool, &matcher, &chunks[..2]).unwrap().len(), 2);
        match match_chunks(&pool, &matcher, &chunks) {
            Err(Error::Worker(msg)) => assert!(msg.contains("row 7"), "{}", msg),
            other => panic!("expected worker error, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_chunk_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("test.db")).unwrap();
        let previous = vec![SimilarityEdge {
            source_id: ItemId::Int(1),
            target_id: ItemId::Int(2),
            similarity: 0.42,
            source_type: ContentType::Game,
            target_type: ContentType::Game,
        }];
        store.replace_similars(ContentType::Game, &previous).unwrap();
        store.mark_done("ContentSimilarities", ContentType::Game).unwrap();
        let checkpoint = store.last_run("ContentSimilarities", ContentType::Game).unwrap();

        let pool = ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let (matcher, chunks) = two_game_matcher();
        let result = match_chunks(&pool, &matcher, &chunks).and_then(|edges| {
            store.replace_similars(ContentType::Game, &edges)?;
            store.mark_done("ContentSimilarities", ContentType::Game)
        });

        assert!(matches!(result, Err(Error::Worker(_))));
        assert_eq!(store.similars(ContentType::Game).unwrap(), previous);
        assert_eq!(
            store.last_run("ContentSimilarities", ContentType::Game).unwrap(),
            checkpoint
        );
    }
}
