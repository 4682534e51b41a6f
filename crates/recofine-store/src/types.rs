//! Data types for catalog items and engine checkpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use recofine_core::{ContentType, ItemId, ItemIdentity};

/// An item row projected onto a requested feature list.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub identity: ItemIdentity,
    /// Globally unique id across all content types.
    pub content_id: i64,
    /// Raw feature values, aligned with the requested features. The
    /// `genres` feature is the comma-joined genre names.
    pub values: Vec<Option<String>>,
}

/// A checkpoint row of the `engine` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub engine: String,
    pub content_type: ContentType,
    pub last_launch_date: DateTime<Utc>,
}

/// An item to insert or update, used to seed the catalog.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub content_type: ContentType,
    pub id: ItemId,
    /// Column name → value. Only descriptor-declared columns are accepted.
    pub fields: Vec<(String, String)>,
    /// Genre names, linked in order.
    pub genres: Vec<String>,
}

impl NewItem {
    pub fn new(content_type: ContentType, id: impl Into<ItemId>) -> Self {
        Self {
            content_type,
            id: id.into(),
            fields: Vec::new(),
            genres: Vec::new(),
        }
    }

    pub fn field(mut self, name: &str, value: &str) -> Self {
        self.fields.push((name.to_string(), value.to_string()));
        self
    }

    pub fn genre(mut self, name: &str) -> Self {
        self.genres.push(name.to_string());
        self
    }
}
