//! Orchestrator: owns the engine settings and the bounded matcher pool,
//! and runs engines one at a time.

use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::info;

use recofine_core::{EngineSettings, Error, Result};
use recofine_store::SqliteStore;

use crate::content_similarities::ContentSimilarities;
use crate::engine::Engine;
use crate::link_between_items::LinkBetweenItems;
use crate::types::{EngineKind, EngineReport};

pub struct Orchestrator {
    settings: EngineSettings,
    pool: ThreadPool,
    /// Held for the duration of a run.
    running: Mutex<()>,
}

impl Orchestrator {
    pub fn new(settings: EngineSettings) -> Result<Self> {
        settings.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(settings.workers)
            .thread_name(|i| format!("recofine-matcher-{}", i))
            .build()
            .map_err(|e| Error::Internal(format!("matcher pool: {}", e)))?;

        info!(
            "Orchestrator initialized: workers={}, type_pairs={}",
            settings.workers,
            settings.type_pairs.len()
        );

        Ok(Self {
            settings,
            pool,
            running: Mutex::new(()),
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn engine(&self, kind: EngineKind) -> Box<dyn Engine + '_> {
        match kind {
            EngineKind::ContentSimilarities => {
                Box::new(ContentSimilarities::new(&self.settings, &self.pool))
            }
            EngineKind::LinkBetweenItems => {
                Box::new(LinkBetweenItems::new(&self.settings, &self.pool))
            }
        }
    }

    /// Run one engine to completion. Concurrent calls queue up.
    pub fn run(&self, kind: EngineKind, store: &SqliteStore) -> Result<EngineReport> {
        let _guard = self.running.lock();
        let engine = self.engine(kind);
        let report = engine.train(store)?;
        info!(
            "{} engine performed in {}ms ({} lines, {} scopes skipped)",
            engine.name(),
            report.duration_ms,
            report.edges(),
            report.skipped()
        );
        Ok(report)
    }
}
