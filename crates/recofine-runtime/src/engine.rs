//! Engine trait shared by the similarity engines.

use recofine_core::Result;
use recofine_store::SqliteStore;

use crate::types::{EngineKind, EngineReport};

/// A recomputation engine. `train` walks the engine's scopes in order,
/// skipping those whose checkpoint is fresh.
pub trait Engine {
    fn kind(&self) -> EngineKind;

    /// Name used for checkpoints and logs.
    fn name(&self) -> &'static str {
        self.kind().checkpoint_name()
    }

    fn train(&self, store: &SqliteStore) -> Result<EngineReport>;
}
