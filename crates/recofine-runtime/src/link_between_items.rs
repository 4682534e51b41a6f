//! Cross-type engine: links items of different content types that share
//! title-like text, for every pair declared in the type-pair table.
//!
//! The checkpoint scope is the anchor type. Each (anchor, other) pair is
//! vectorized over the union of both types and persisted in its own
//! transaction; the anchor checkpoint advances once all its pairs commit.

use std::time::Instant;

use chrono::Utc;
use rayon::ThreadPool;
use tracing::{debug, error, info};

use recofine_core::{ContentType, EngineSettings, Result, TypePair};
use recofine_ingest::DocumentBuilder;
use recofine_store::SqliteStore;

use crate::engine::Engine;
use crate::pipeline::{match_corpus, PipelineOptions};
use crate::types::{EngineKind, EngineReport, ScopeOutcome, ScopeReport};

pub struct LinkBetweenItems<'a> {
    settings: &'a EngineSettings,
    pool: &'a ThreadPool,
}

impl<'a> LinkBetweenItems<'a> {
    pub fn new(settings: &'a EngineSettings, pool: &'a ThreadPool) -> Self {
        Self { settings, pool }
    }

    fn train_anchor(
        &self,
        store: &SqliteStore,
        anchor: ContentType,
        others: &[ContentType],
    ) -> Result<ScopeReport> {
        let scope_start = Utc::now();
        let timer = Instant::now();

        let mut watched = vec![anchor];
        watched.extend_from_slice(others);
        if !store.should_run_any(self.name(), anchor, &watched)? {
            info!("{} {}: no change since last run, skipping", self.name(), anchor);
            return Ok(ScopeReport {
                scope: anchor.to_string(),
                outcome: ScopeOutcome::Skipped,
                duration_ms: timer.elapsed().as_millis() as u64,
            });
        }

        let builder = DocumentBuilder::new(store);
        let anchor_docs = builder.cross_type(anchor)?;
        let mut written = 0;
        for other in others {
            let pair = TypePair::new(anchor, *other);
            let pair_timer = Instant::now();

            let mut corpus = anchor_docs.clone();
            corpus.extend(builder.cross_type(*other)?);
            debug!(
                "{} data preparation performed in {:?} ({} documents)",
                pair,
                pair_timer.elapsed(),
                corpus.len()
            );

            let edges = match_corpus(
                self.pool,
                &corpus,
                PipelineOptions {
                    scope: self.settings.cross,
                    type_filter: Some(pair),
                    max_corpus_rows: self.settings.max_corpus_rows,
                },
            )?;
            let lines = store.replace_content_links(pair, &edges)?;
            written += lines;
            info!(
                "{} similarity reloading performed in {:?} ({} lines)",
                pair,
                pair_timer.elapsed(),
                lines
            );
        }

        store.mark_done_at(self.name(), anchor, scope_start)?;
        Ok(ScopeReport {
            scope: anchor.to_string(),
            outcome: ScopeOutcome::Completed { edges: written },
            duration_ms: timer.elapsed().as_millis() as u64,
        })
    }
}

impl Engine for LinkBetweenItems<'_> {
    fn kind(&self) -> EngineKind {
        EngineKind::LinkBetweenItems
    }

    fn train(&self, store: &SqliteStore) -> Result<EngineReport> {
        let start = Instant::now();
        let mut scopes = Vec::new();
        for (anchor, others) in self.settings.pairs_by_anchor() {
            let report = self.train_anchor(store, anchor, &others).map_err(|e| {
                error!("{} {} aborted: {}", self.name(), anchor, e);
                e
            })?;
            scopes.push(report);
        }
        Ok(EngineReport {
            engine: self.kind(),
            scopes,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
