//! Configuration: environment-driven server settings plus the engine
//! settings file (`engines.json`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::content::ContentType;
use crate::descriptor::TypeDescriptor;
use crate::error::{Error, Result};

/// Paths to all RecoFine data files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// SQLite database (`data/recofine.db`).
    pub db_file: PathBuf,
    /// Engine settings (`data/engines.json`).
    pub engines_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            db_file: root.join("recofine.db"),
            engines_file: root.join("engines.json"),
            root,
        })
    }
}

/// Matching parameters of one engine mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScopeSettings {
    /// Scores at or below this value are never persisted. In `[0, 1)`.
    pub threshold: f32,
    /// Maximum outgoing edges per source item per run (top-K).
    pub max_sim: usize,
    /// Rows per matcher chunk (memory vs. parallelism trade-off).
    pub rows_per_chunk: usize,
}

impl ScopeSettings {
    /// Within-type defaults favor recall.
    pub fn within() -> Self {
        Self {
            threshold: 0.1,
            max_sim: 10,
            rows_per_chunk: 100,
        }
    }

    /// Cross-type defaults favor precision.
    pub fn cross() -> Self {
        Self {
            threshold: 0.8,
            max_sim: 25,
            rows_per_chunk: 100,
        }
    }

    fn validate(&self, label: &str) -> Result<()> {
        if !(0.0..1.0).contains(&self.threshold) {
            return Err(Error::Config(format!(
                "{}.threshold must be in [0, 1), got {}",
                label, self.threshold
            )));
        }
        if self.max_sim == 0 {
            return Err(Error::Config(format!("{}.max_sim must be positive", label)));
        }
        if self.rows_per_chunk == 0 {
            return Err(Error::Config(format!(
                "{}.rows_per_chunk must be positive",
                label
            )));
        }
        Ok(())
    }
}

/// One declared cross-type comparison: edges go from `anchor` items to
/// `other` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypePair {
    pub anchor: ContentType,
    pub other: ContentType,
}

impl TypePair {
    pub fn new(anchor: ContentType, other: ContentType) -> Self {
        Self { anchor, other }
    }
}

impl std::fmt::Display for TypePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} + {}", self.anchor, self.other)
    }
}

/// Engine settings (persisted to engines.json). Every field is optional in
/// the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "ScopeSettings::within")]
    pub within: ScopeSettings,
    #[serde(default = "ScopeSettings::cross")]
    pub cross: ScopeSettings,
    /// Size of the matcher worker pool.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Largest corpus a scope may vectorize.
    #[serde(default = "default_max_corpus_rows")]
    pub max_corpus_rows: usize,
    /// Per-type override of the within-type feature list.
    #[serde(default)]
    pub features: BTreeMap<ContentType, Vec<String>>,
    /// Cross-type compatibility table.
    #[serde(default = "default_type_pairs")]
    pub type_pairs: Vec<TypePair>,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_max_corpus_rows() -> usize {
    100_000
}

fn default_type_pairs() -> Vec<TypePair> {
    use ContentType::*;
    vec![
        TypePair::new(Game, Movie),
        TypePair::new(Game, Serie),
        TypePair::new(Movie, Game),
        TypePair::new(Movie, Serie),
        TypePair::new(Serie, Game),
        TypePair::new(Serie, Movie),
        TypePair::new(Track, Movie),
        TypePair::new(Track, Serie),
    ]
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            within: ScopeSettings::within(),
            cross: ScopeSettings::cross(),
            workers: default_workers(),
            max_corpus_rows: default_max_corpus_rows(),
            features: BTreeMap::new(),
            type_pairs: default_type_pairs(),
        }
    }
}

impl EngineSettings {
    /// Load settings from file. A missing file yields the defaults; a
    /// malformed or invalid one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let settings: EngineSettings = match std::fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No engine settings at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => return Err(e.into()),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Saved engine settings to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.within.validate("within")?;
        self.cross.validate("cross")?;
        if self.workers == 0 {
            return Err(Error::Config("workers must be positive".into()));
        }
        if self.max_corpus_rows == 0 {
            return Err(Error::Config("max_corpus_rows must be positive".into()));
        }
        for (ct, names) in &self.features {
            let descriptor = TypeDescriptor::of(*ct);
            for name in names {
                if descriptor.column(name).is_none() {
                    return Err(Error::Config(format!(
                        "unknown feature '{}' for {}",
                        name, ct
                    )));
                }
            }
        }
        for pair in &self.type_pairs {
            if pair.anchor == pair.other {
                return Err(Error::Config(format!(
                    "type pair {} compares a type with itself",
                    pair
                )));
            }
        }
        Ok(())
    }

    /// Within-type feature list for a type (override or descriptor default).
    pub fn features_for(&self, content_type: ContentType) -> Vec<String> {
        match self.features.get(&content_type) {
            Some(names) => names.clone(),
            None => TypeDescriptor::of(content_type)
                .features
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Declared pairs grouped by anchor, in first-seen order, duplicates removed.
    pub fn pairs_by_anchor(&self) -> Vec<(ContentType, Vec<ContentType>)> {
        let mut grouped: Vec<(ContentType, Vec<ContentType>)> = Vec::new();
        for pair in &self.type_pairs {
            match grouped.iter_mut().find(|(a, _)| *a == pair.anchor) {
                Some((_, others)) => {
                    if !others.contains(&pair.other) {
                        others.push(pair.other);
                    }
                }
                None => grouped.push((pair.anchor, vec![pair.other])),
            }
        }
        grouped
    }
}

/// Top-level RecoFine configuration.
#[derive(Debug, Clone)]
pub struct RecoConfig {
    /// HTTP server port.
    pub port: u16,
    /// Shared secret expected in the `X-API-TOKEN` header.
    pub api_token: String,
    /// Data file paths.
    pub data_paths: DataPaths,
    /// Engine settings.
    pub engines: EngineSettings,
}

impl RecoConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5001);

        let api_token = std::env::var("API_TOKEN").unwrap_or_else(|_| "FOOBAR1".to_string());

        let data_paths = DataPaths::new(data_dir)?;
        let engines = EngineSettings::load(&data_paths.engines_file)?;

        Ok(Self {
            port,
            api_token,
            data_paths,
            engines,
        })
    }
}
