//! Catalog content types and item identities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Kind of catalog item. Stored upper-case (`GAME`), used lower-case in
/// table names (`similars_game`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentType {
    Application,
    Book,
    Game,
    Movie,
    Serie,
    Track,
}

impl ContentType {
    pub fn all() -> &'static [ContentType] {
        &[
            Self::Application,
            Self::Book,
            Self::Game,
            Self::Movie,
            Self::Serie,
            Self::Track,
        ]
    }

    /// Lower-case name, as used in table names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Book => "book",
            Self::Game => "game",
            Self::Movie => "movie",
            Self::Serie => "serie",
            Self::Track => "track",
        }
    }

    /// Upper-case name, as persisted in `content_type` columns.
    pub fn as_upper(&self) -> &'static str {
        match self {
            Self::Application => "APPLICATION",
            Self::Book => "BOOK",
            Self::Game => "GAME",
            Self::Movie => "MOVIE",
            Self::Serie => "SERIE",
            Self::Track => "TRACK",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Config(format!("unknown content type: {}", s)))
    }
}

/// External identifier of an item. Most types use integer ids; books are
/// keyed by ISBN.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Int(i64),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for ItemId {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ItemId {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<String> for ItemId {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for ItemId {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Identity of an item across the whole catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemIdentity {
    pub id: ItemId,
    pub content_type: ContentType,
}

impl ItemIdentity {
    pub fn new(id: impl Into<ItemId>, content_type: ContentType) -> Self {
        Self {
            id: id.into(),
            content_type,
        }
    }
}

impl fmt::Display for ItemIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.content_type.as_upper(), self.id)
    }
}
