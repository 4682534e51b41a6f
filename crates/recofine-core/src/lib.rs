//! RecoFine Core: content types, per-type descriptors, configuration, errors.

pub mod config;
pub mod content;
pub mod descriptor;
pub mod error;

pub use config::{DataPaths, EngineSettings, RecoConfig, ScopeSettings, TypePair};
pub use content::{ContentType, ItemId, ItemIdentity};
pub use descriptor::{FeatureKind, FeatureSpec, IdKind, TypeDescriptor};
pub use error::{Error, Result};
