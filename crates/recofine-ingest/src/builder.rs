//! Document builder: one soup per item, keyed by external identity.

use tracing::debug;

use recofine_core::{ContentType, Error, FeatureSpec, ItemIdentity, Result, TypeDescriptor};
use recofine_store::{ItemRecord, SqliteStore};

use crate::normalize::normalize;

/// A built document. Transient, rebuilt on every run.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub identity: ItemIdentity,
    pub text: String,
}

/// Join normalized feature values with a single space.
pub fn build_soup<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|v| v.as_ref())
        .collect::<Vec<_>>()
        .join(" ")
}

fn soup_of(record: &ItemRecord, features: &[&FeatureSpec]) -> String {
    let values: Vec<String> = features
        .iter()
        .zip(&record.values)
        .map(|(spec, value)| normalize(value.as_deref(), spec.kind))
        .collect();
    build_soup(&values)
}

/// Builds document corpora from the catalog store.
pub struct DocumentBuilder<'a> {
    store: &'a SqliteStore,
}

impl<'a> DocumentBuilder<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    /// Within-type corpus: items keyed by their per-type id, ordered by id.
    pub fn within_type<S: AsRef<str>>(
        &self,
        content_type: ContentType,
        features: &[S],
    ) -> Result<Vec<Document>> {
        let d = TypeDescriptor::of(content_type);
        let specs = d.resolve_features(features).ok_or_else(|| {
            Error::Config(format!("unknown feature in list for {}", content_type))
        })?;
        let records = self.store.load_items(d, &specs)?;
        let docs: Vec<Document> = records
            .iter()
            .map(|r| Document {
                identity: r.identity.clone(),
                text: soup_of(r, &specs),
            })
            .collect();
        debug!("Built {} {} documents", docs.len(), content_type);
        Ok(docs)
    }

    /// Cross-type corpus: items keyed by their global `content_id`, built
    /// from the type's cross features.
    pub fn cross_type(&self, content_type: ContentType) -> Result<Vec<Document>> {
        let d = TypeDescriptor::of(content_type);
        let specs = d.resolve_features(d.cross_features).ok_or_else(|| {
            Error::Internal(format!("cross features of {} are not declared", content_type))
        })?;
        let records = self.store.load_items(d, &specs)?;
        let docs: Vec<Document> = records
            .iter()
            .map(|r| Document {
                identity: ItemIdentity::new(r.content_id, content_type),
                text: soup_of(r, &specs),
            })
            .collect();
        debug!("Built {} {} cross-type documents", docs.len(), content_type);
        Ok(docs)
    }
}
