//! Per-type descriptors: the data-driven table that parameterizes the
//! single similarity pipeline (table names, id column, feature columns).

use crate::content::ContentType;

/// Storage type of an item's external id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Integer,
    Text,
}

/// How a feature value is normalized before it enters the soup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    /// Short categorical value: lower-cased, all whitespace removed.
    Keyword,
    /// Free text: lower-cased, whitespace runs collapsed.
    Text,
    /// Comma-separated values, each normalized as a keyword, capped.
    List,
}

/// A feature column readable for document building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub kind: FeatureKind,
}

/// Name of the virtual feature resolved through the genre link table.
pub const GENRES_FEATURE: &str = "genres";

const fn keyword(name: &'static str) -> FeatureSpec {
    FeatureSpec {
        name,
        kind: FeatureKind::Keyword,
    }
}

const fn text(name: &'static str) -> FeatureSpec {
    FeatureSpec {
        name,
        kind: FeatureKind::Text,
    }
}

const fn list(name: &'static str) -> FeatureSpec {
    FeatureSpec {
        name,
        kind: FeatureKind::List,
    }
}

/// Everything the pipeline needs to know about one content type.
#[derive(Debug)]
pub struct TypeDescriptor {
    pub content_type: ContentType,
    /// Item table (`game`).
    pub table: &'static str,
    /// Per-type id column (`game_id`).
    pub id_column: &'static str,
    pub id_kind: IdKind,
    /// Within-type edge table (`similars_game`).
    pub similars_table: &'static str,
    /// Change log (`game_added_event`).
    pub event_table: &'static str,
    /// Genre link table (`game_genres`).
    pub genre_link_table: &'static str,
    /// Every column that may be used as a feature.
    pub columns: &'static [FeatureSpec],
    /// Default ordered feature list for within-type documents.
    pub features: &'static [&'static str],
    /// Ordered feature list for cross-type documents. Must produce
    /// comparable text across types.
    pub cross_features: &'static [&'static str],
}

static DESCRIPTORS: [TypeDescriptor; 6] = [
    TypeDescriptor {
        content_type: ContentType::Application,
        table: "application",
        id_column: "app_id",
        id_kind: IdKind::Integer,
        similars_table: "similars_application",
        event_table: "application_added_event",
        genre_link_table: "application_genres",
        columns: &[
            keyword("name"),
            keyword("category"),
            keyword("content_rating"),
            list(GENRES_FEATURE),
        ],
        features: &["name", "category", "content_rating", GENRES_FEATURE],
        cross_features: &["name"],
    },
    TypeDescriptor {
        content_type: ContentType::Book,
        table: "book",
        id_column: "isbn",
        id_kind: IdKind::Text,
        similars_table: "similars_book",
        event_table: "book_added_event",
        genre_link_table: "book_genres",
        columns: &[
            keyword("title"),
            keyword("author"),
            keyword("publisher"),
            list(GENRES_FEATURE),
        ],
        features: &["title", "author", "publisher", GENRES_FEATURE],
        cross_features: &["title"],
    },
    TypeDescriptor {
        content_type: ContentType::Game,
        table: "game",
        id_column: "game_id",
        id_kind: IdKind::Integer,
        similars_table: "similars_game",
        event_table: "game_added_event",
        genre_link_table: "game_genres",
        columns: &[
            keyword("name"),
            text("short_description"),
            list("developers"),
            list("publishers"),
            list(GENRES_FEATURE),
        ],
        features: &["name", "developers", "publishers", GENRES_FEATURE],
        cross_features: &["name"],
    },
    TypeDescriptor {
        content_type: ContentType::Movie,
        table: "movie",
        id_column: "movie_id",
        id_kind: IdKind::Integer,
        similars_table: "similars_movie",
        event_table: "movie_added_event",
        genre_link_table: "movie_genres",
        columns: &[
            keyword("title"),
            list("actors"),
            keyword("director"),
            text("plot"),
            list(GENRES_FEATURE),
        ],
        features: &["title", "actors", "director", GENRES_FEATURE],
        cross_features: &["title"],
    },
    TypeDescriptor {
        content_type: ContentType::Serie,
        table: "serie",
        id_column: "serie_id",
        id_kind: IdKind::Integer,
        similars_table: "similars_serie",
        event_table: "serie_added_event",
        genre_link_table: "serie_genres",
        columns: &[
            keyword("title"),
            list("actors"),
            list("directors"),
            list("writers"),
            text("plot"),
            list(GENRES_FEATURE),
        ],
        features: &["title", "actors", "directors", "writers", GENRES_FEATURE],
        cross_features: &["title"],
    },
    TypeDescriptor {
        content_type: ContentType::Track,
        table: "track",
        id_column: "track_id",
        id_kind: IdKind::Integer,
        similars_table: "similars_track",
        event_table: "track_added_event",
        genre_link_table: "track_genres",
        columns: &[
            keyword("title"),
            keyword("artist_name"),
            keyword("release"),
            list(GENRES_FEATURE),
        ],
        features: &["title", "artist_name", "release", GENRES_FEATURE],
        cross_features: &["title"],
    },
];

impl TypeDescriptor {
    /// Descriptor of a content type.
    pub fn of(content_type: ContentType) -> &'static TypeDescriptor {
        let idx = match content_type {
            ContentType::Application => 0,
            ContentType::Book => 1,
            ContentType::Game => 2,
            ContentType::Movie => 3,
            ContentType::Serie => 4,
            ContentType::Track => 5,
        };
        &DESCRIPTORS[idx]
    }

    pub fn all() -> &'static [TypeDescriptor] {
        &DESCRIPTORS
    }

    /// Look up a feature column by name.
    pub fn column(&self, name: &str) -> Option<&'static FeatureSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Resolve a list of feature names against the known columns.
    /// Unknown names yield `None` so callers can reject them.
    pub fn resolve_features<S: AsRef<str>>(&self, names: &[S]) -> Option<Vec<&'static FeatureSpec>> {
        names.iter().map(|n| self.column(n.as_ref())).collect()
    }
}
