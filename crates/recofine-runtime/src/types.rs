//! Runtime types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use recofine_core::Error;

/// Engine that can be triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Within-type similarities, one scope per content type.
    ContentSimilarities,
    /// Cross-type links, one scope per anchor type of the pair table.
    LinkBetweenItems,
}

impl EngineKind {
    pub fn all() -> &'static [EngineKind] {
        &[Self::ContentSimilarities, Self::LinkBetweenItems]
    }

    /// Route segment (`content_similarities`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContentSimilarities => "content_similarities",
            Self::LinkBetweenItems => "link_between_items",
        }
    }

    /// Name recorded in the `engine` checkpoint table.
    pub fn checkpoint_name(&self) -> &'static str {
        match self {
            Self::ContentSimilarities => "ContentSimilarities",
            Self::LinkBetweenItems => "LinkBetweenItems",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Self::all()
            .iter()
            .copied()
            .find(|k| k.as_str() == s || k.checkpoint_name() == s)
            .ok_or_else(|| Error::NotFound(format!("engine '{}'", s)))
    }
}

/// What happened to one scope during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ScopeOutcome {
    /// Nothing changed since the last successful run.
    Skipped,
    /// Edges were recomputed and persisted, checkpoint advanced.
    Completed { edges: usize },
}

/// Result of one scope (a content type, or an anchor type with its pairs).
#[derive(Debug, Clone, Serialize)]
pub struct ScopeReport {
    pub scope: String,
    #[serde(flatten)]
    pub outcome: ScopeOutcome,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
}

/// Result of one engine run.
#[derive(Debug, Clone, Serialize)]
pub struct EngineReport {
    pub engine: EngineKind,
    pub scopes: Vec<ScopeReport>,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
}

impl EngineReport {
    /// Total edges written by completed scopes.
    pub fn edges(&self) -> usize {
        self.scopes
            .iter()
            .map(|s| match s.outcome {
                ScopeOutcome::Completed { edges } => edges,
                ScopeOutcome::Skipped => 0,
            })
            .sum()
    }

    pub fn skipped(&self) -> usize {
        self.scopes
            .iter()
            .filter(|s| s.outcome == ScopeOutcome::Skipped)
            .count()
    }
}
