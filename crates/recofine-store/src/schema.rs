//! Database schema SQL. Shared tables are static; per-type tables are
//! generated from the type descriptors.

use recofine_core::descriptor::{IdKind, TypeDescriptor, GENRES_FEATURE};

/// Tables shared by every content type: the content registry, genres,
/// engine checkpoints and cross-type links.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS content (
    content_id INTEGER PRIMARY KEY AUTOINCREMENT,
    content_type TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS genre (
    genre_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    content_type TEXT NOT NULL,
    UNIQUE (name, content_type)
);

CREATE TABLE IF NOT EXISTS engine (
    engine TEXT NOT NULL,
    content_type TEXT NOT NULL,
    last_launch_date TIMESTAMP NOT NULL,
    PRIMARY KEY (engine, content_type)
);

CREATE TABLE IF NOT EXISTS similars_content (
    content_id0 INTEGER NOT NULL,
    content_id1 INTEGER NOT NULL,
    similarity REAL NOT NULL,
    content_type0 TEXT NOT NULL,
    content_type1 TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_similars_content_pair ON similars_content(content_type0, content_type1);
CREATE INDEX IF NOT EXISTS idx_similars_content_id0 ON similars_content(content_id0);
"#;

fn sql_type(kind: IdKind) -> &'static str {
    match kind {
        IdKind::Integer => "INTEGER",
        IdKind::Text => "TEXT",
    }
}

/// Item, genre link, within-type edge and change-log tables of one type.
pub fn type_schema_sql(d: &TypeDescriptor) -> String {
    let id = d.id_column;
    let id_type = sql_type(d.id_kind);
    let columns: String = d
        .columns
        .iter()
        .filter(|c| c.name != GENRES_FEATURE)
        .map(|c| format!(",\n    {} TEXT", c.name))
        .collect();

    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    {id} {id_type} PRIMARY KEY,
    content_id INTEGER NOT NULL UNIQUE REFERENCES content(content_id){columns}
);

CREATE TABLE IF NOT EXISTS {genres} (
    {id} {id_type} NOT NULL REFERENCES {table}({id}) ON DELETE CASCADE,
    genre_id INTEGER NOT NULL REFERENCES genre(genre_id),
    PRIMARY KEY ({id}, genre_id)
);

CREATE TABLE IF NOT EXISTS {similars} (
    {id}0 {id_type} NOT NULL,
    {id}1 {id_type} NOT NULL,
    similarity REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_{similars}_{id}0 ON {similars}({id}0);

CREATE TABLE IF NOT EXISTS {events} (
    event_id INTEGER PRIMARY KEY AUTOINCREMENT,
    object_id NOT NULL,
    occured_at TIMESTAMP NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_{events}_occured_at ON {events}(occured_at);
"#,
        table = d.table,
        genres = d.genre_link_table,
        similars = d.similars_table,
        events = d.event_table,
    )
}

/// Full schema: shared tables followed by every type's tables.
pub fn schema_sql() -> String {
    let mut sql = String::from(SCHEMA_SQL);
    for d in TypeDescriptor::all() {
        sql.push_str(&type_schema_sql(d));
    }
    sql
}
