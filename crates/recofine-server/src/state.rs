//! Shared application state.

use recofine_core::{RecoConfig, Result};
use recofine_runtime::Orchestrator;
use recofine_store::SqliteStore;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: RecoConfig,
    pub store: SqliteStore,
    pub orchestrator: Orchestrator,
}

impl AppState {
    pub fn new(config: RecoConfig, store: SqliteStore) -> Result<Self> {
        let orchestrator = Orchestrator::new(config.engines.clone())?;
        Ok(Self {
            config,
            store,
            orchestrator,
        })
    }
}
