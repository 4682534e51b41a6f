//! Runtime: the similarity engines and their orchestrator.
//!
//! Each engine walks its scopes sequentially: checkpoint check, document
//! building, vectorization, parallel chunk matching on a bounded pool,
//! transactional persistence, checkpoint update.

pub mod content_similarities;
pub mod engine;
pub mod link_between_items;
pub mod orchestrator;
pub mod pipeline;
pub mod types;

pub use content_similarities::ContentSimilarities;
pub use engine::Engine;
pub use link_between_items::LinkBetweenItems;
pub use orchestrator::Orchestrator;
pub use pipeline::{match_chunks, match_corpus, PipelineOptions};
pub use types::*;
