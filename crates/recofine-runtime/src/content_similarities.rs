//! Within-type engine: for each content type, the top-K most similar items
//! of the same type.

use std::time::Instant;

use chrono::Utc;
use rayon::ThreadPool;
use tracing::{debug, error, info};

use recofine_core::{ContentType, EngineSettings, Result};
use recofine_ingest::DocumentBuilder;
use recofine_store::SqliteStore;

use crate::engine::Engine;
use crate::pipeline::{match_corpus, PipelineOptions};
use crate::types::{EngineKind, EngineReport, ScopeOutcome, ScopeReport};

pub struct ContentSimilarities<'a> {
    settings: &'a EngineSettings,
    pool: &'a ThreadPool,
}

impl<'a> ContentSimilarities<'a> {
    pub fn new(settings: &'a EngineSettings, pool: &'a ThreadPool) -> Self {
        Self { settings, pool }
    }

    fn train_type(&self, store: &SqliteStore, content_type: ContentType) -> Result<ScopeReport> {
        let scope_start = Utc::now();
        let timer = Instant::now();

        if !store.should_run(self.name(), content_type)? {
            info!("{} {}: no change since last run, skipping", self.name(), content_type);
            return Ok(ScopeReport {
                scope: content_type.to_string(),
                outcome: ScopeOutcome::Skipped,
                duration_ms: timer.elapsed().as_millis() as u64,
            });
        }

        let features = self.settings.features_for(content_type);
        let docs = DocumentBuilder::new(store).within_type(content_type, &features)?;
        debug!(
            "{} data preparation performed in {:?} ({} documents)",
            content_type,
            timer.elapsed(),
            docs.len()
        );

        let edges = match_corpus(
            self.pool,
            &docs,
            PipelineOptions {
                scope: self.settings.within,
                type_filter: None,
                max_corpus_rows: self.settings.max_corpus_rows,
            },
        )?;
        let written = store.replace_similars(content_type, &edges)?;
        store.mark_done_at(self.name(), content_type, scope_start)?;

        info!(
            "{} similarity reloading performed in {:?} ({} lines)",
            content_type,
            timer.elapsed(),
            written
        );
        Ok(ScopeReport {
            scope: content_type.to_string(),
            outcome: ScopeOutcome::Completed { edges: written },
            duration_ms: timer.elapsed().as_millis() as u64,
        })
    }
}

impl Engine for ContentSimilarities<'_> {
    fn kind(&self) -> EngineKind {
        EngineKind::ContentSimilarities
    }

    fn train(&self, store: &SqliteStore) -> Result<EngineReport> {
        let start = Instant::now();
        let mut scopes = Vec::with_capacity(ContentType::all().len());
        for content_type in ContentType::all() {
            let report = self.train_type(store, *content_type).map_err(|e| {
                error!("{} {} aborted: {}", self.name(), content_type, e);
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
