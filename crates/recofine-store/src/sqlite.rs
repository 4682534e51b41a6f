//! SQLite-backed catalog store: item loading, change log, engine
//! checkpoints and transactional edge persistence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::{Type, Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use recofine_core::descriptor::GENRES_FEATURE;
use recofine_core::{
    ContentType, Error, FeatureSpec, IdKind, ItemId, ItemIdentity, Result, TypeDescriptor,
    TypePair,
};
use recofine_matrix::SimilarityEdge;

use crate::schema::schema_sql;
use crate::types::{Checkpoint, ItemRecord, NewItem};

/// SQLite store shared by every engine. All access goes through one
/// connection guarded by a mutex; each write is its own transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create the database file, creating parent directories.
    pub fn open(db_file: impl AsRef<Path>) -> Result<Self> {
        let db_file = db_file.as_ref();
        if let Some(parent) = db_file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_file).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        let store = Self::with_connection(conn, Some(db_file.to_path_buf()))?;
        info!("SqliteStore initialized: path={}", db_file.display());
        Ok(store)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| Error::Database(e.to_string()))?;
        Self::with_connection(conn, None)
    }

    fn with_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(&schema_sql())
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    // ---------------------------------------------------------------
    // Items
    // ---------------------------------------------------------------

    /// Insert an item, or update the given columns of an existing one.
    /// Genres, when given, replace the item's genre links. Returns the
    /// item's `content_id`.
    pub fn upsert_item(&self, item: &NewItem) -> Result<i64> {
        let d = TypeDescriptor::of(item.content_type);
        let id = id_value(d, &item.id)?;
        for (name, _) in &item.fields {
            if name == GENRES_FEATURE || d.column(name).is_none() {
                return Err(Error::Config(format!(
                    "unknown column '{}' for {}",
                    name, item.content_type
                )));
            }
        }

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;

        let existing: Option<i64> = tx
            .query_row(
                &format!(
                    "SELECT content_id FROM {} WHERE {} = ?1",
                    d.table, d.id_column
                ),
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        let content_id = match existing {
            Some(content_id) => {
                for (name, value) in &item.fields {
                    tx.execute(
                        &format!(
                            "UPDATE {} SET {} = ?1 WHERE {} = ?2",
                            d.table, name, d.id_column
                        ),
                        params![value, id],
                    )
                    .map_err(|e| Error::Database(e.to_string()))?;
                }
                content_id
            }
            None => {
                tx.execute(
                    "INSERT INTO content (content_type) VALUES (?1)",
                    params![item.content_type.as_upper()],
                )
                .map_err(|e| Error::Database(e.to_string()))?;
                let content_id = tx.last_insert_rowid();

                let mut columns = vec![d.id_column.to_string(), "content_id".to_string()];
                let mut values = vec![id.clone(), Value::Integer(content_id)];
                for (name, value) in &item.fields {
                    columns.push(name.clone());
                    values.push(Value::Text(value.clone()));
                }
                let placeholders: Vec<String> =
                    (1..=columns.len()).map(|i| format!("?{}", i)).collect();
                tx.execute(
                    &format!(
                        "INSERT INTO {} ({}) VALUES ({})",
                        d.table,
                        columns.join(", "),
                        placeholders.join(", ")
                    ),
                    params_from_iter(values.iter()),
                )
                .map_err(|e| Error::Database(e.to_string()))?;
                content_id
            }
        };

        if !item.genres.is_empty() {
            tx.execute(
                &format!(
                    "DELETE FROM {} WHERE {} = ?1",
                    d.genre_link_table, d.id_column
                ),
                params![id],
            )
            .map_err(|e| Error::Database(e.to_string()))?;
            for genre in &item.genres {
                tx.execute(
                    "INSERT OR IGNORE INTO genre (name, content_type) VALUES (?1, ?2)",
                    params![genre, item.content_type.as_upper()],
                )
                .map_err(|e| Error::Database(e.to_string()))?;
                let genre_id: i64 = tx
                    .query_row(
                        "SELECT genre_id FROM genre WHERE name = ?1 AND content_type = ?2",
                        params![genre, item.content_type.as_upper()],
                        |row| row.get(0),
                    )
                    .map_err(|e| Error::Database(e.to_string()))?;
                tx.execute(
                    &format!(
                        "INSERT OR IGNORE INTO {} ({}, genre_id) VALUES (?1, ?2)",
                        d.genre_link_table, d.id_column
                    ),
                    params![id, genre_id],
                )
                .map_err(|e| Error::Database(e.to_string()))?;
            }
        }

        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        Ok(content_id)
    }

    /// Load every item of a type with the requested feature values, ordered
    /// by id. Feature names must be columns declared by the descriptor.
    pub fn load_items(
        &self,
        d: &TypeDescriptor,
        features: &[&FeatureSpec],
    ) -> Result<Vec<ItemRecord>> {
        let mut select = format!("SELECT t.{}, t.content_id", d.id_column);
        for f in features {
            if d.column(f.name).is_none() {
                return Err(Error::Config(format!(
                    "unknown feature '{}' for {}",
                    f.name, d.content_type
                )));
            }
            if f.name == GENRES_FEATURE {
                select.push_str(", NULL");
            } else {
                select.push_str(&format!(", t.{}", f.name));
            }
        }
        select.push_str(&format!(" FROM {} AS t ORDER BY t.{}", d.table, d.id_column));

        let genres = if features.iter().any(|f| f.name == GENRES_FEATURE) {
            self.load_genres(d)?
        } else {
            HashMap::new()
        };

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&select)
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                let id = read_id(d.id_kind, row, 0)?;
                let content_id: i64 = row.get(1)?;
                let mut values = Vec::with_capacity(features.len());
                for i in 0..features.len() {
                    values.push(text_value(row.get_ref(2 + i)?));
                }
                Ok((id, content_id, values))
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(e.to_string()))?;

        let items: Vec<ItemRecord> = rows
            .into_iter()
            .map(|(id, content_id, mut values)| {
                for (i, f) in features.iter().enumerate() {
                    if f.name == GENRES_FEATURE {
                        values[i] = genres.get(&id).map(|names| names.join(","));
                    }
                }
                ItemRecord {
                    identity: ItemIdentity::new(id, d.content_type),
                    content_id,
                    values,
                }
            })
            .collect();

        debug!("Loaded {} {} items", items.len(), d.content_type);
        Ok(items)
    }

    /// Genre names per item, in link order.
    fn load_genres(&self, d: &TypeDescriptor) -> Result<HashMap<ItemId, Vec<String>>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT l.{id}, g.name FROM {link} AS l
                 JOIN genre AS g ON g.genre_id = l.genre_id
                 ORDER BY l.{id}, l.rowid",
                id = d.id_column,
                link = d.genre_link_table,
            ))
            .map_err(|e| Error::Database(e.to_string()))?;
        let pairs = stmt
            .query_map([], |row| Ok((read_id(d.id_kind, row, 0)?, row.get::<_, String>(1)?)))
            .map_err(|e| Error::Database(e.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut genres: HashMap<ItemId, Vec<String>> = HashMap::new();
        for (id, name) in pairs {
            genres.entry(id).or_default().push(name);
        }
        Ok(genres)
    }

    pub fn count_items(&self, content_type: ContentType) -> Result<i64> {
        let d = TypeDescriptor::of(content_type);
        let conn = self.conn.lock();
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", d.table), [], |row| {
            row.get(0)
        })
        .map_err(|e| Error::Database(e.to_string()))
    }

    // ---------------------------------------------------------------
    // Change log
    // ---------------------------------------------------------------

    /// Append a change event for an item of the given type.
    pub fn record_change_event(
        &self,
        content_type: ContentType,
        object_id: &ItemId,
        occurred_at: DateTime<Utc>,
    ) -> Result<()> {
        let d = TypeDescriptor::of(content_type);
        let object_id = id_value(d, object_id)?;
        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO {} (object_id, occured_at) VALUES (?1, ?2)",
                d.event_table
            ),
            params![object_id, occurred_at],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Checkpoints
    // ---------------------------------------------------------------

    /// Last successful run of an engine for a type, if any.
    pub fn last_run(&self, engine: &str, content_type: ContentType) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock();
        let last = conn
            .prepare_cached(
                "SELECT last_launch_date FROM engine WHERE engine = ?1 AND content_type = ?2",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![engine, content_type.as_upper()], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(last)
    }

    /// True if the engine never ran for this type, or if a change event of
    /// the type happened after the last run.
    pub fn should_run(&self, engine: &str, content_type: ContentType) -> Result<bool> {
        self.should_run_any(engine, content_type, &[content_type])
    }

    /// Like [`should_run`](Self::should_run) for the checkpoint of `scope`,
    /// but watching the change logs of every type in `watched`.
    pub fn should_run_any(
        &self,
        engine: &str,
        scope: ContentType,
        watched: &[ContentType],
    ) -> Result<bool> {
        let last = match self.last_run(engine, scope)? {
            Some(last) => last,
            None => return Ok(true),
        };

        let conn = self.conn.lock();
        for content_type in watched {
            let d = TypeDescriptor::of(*content_type);
            let changed: bool = conn
                .prepare_cached(&format!(
                    "SELECT EXISTS(SELECT 1 FROM {} WHERE occured_at > ?1)",
                    d.event_table
                ))
                .map_err(|e| Error::Database(e.to_string()))?
                .query_row(params![last], |row| row.get(0))
                .map_err(|e| Error::Database(e.to_string()))?;
            if changed {
                debug!("{} changed since {} ({} {})", content_type, last, engine, scope);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Record a successful run at the current time.
    pub fn mark_done(&self, engine: &str, content_type: ContentType) -> Result<()> {
        self.mark_done_at(engine, content_type, Utc::now())
    }

    /// Record a successful run at `at`. The stored timestamp never moves
    /// backwards.
    pub fn mark_done_at(
        &self,
        engine: &str,
        content_type: ContentType,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO engine (engine, content_type, last_launch_date) VALUES (?1, ?2, ?3)
             ON CONFLICT (engine, content_type) DO UPDATE
             SET last_launch_date = excluded.last_launch_date
             WHERE excluded.last_launch_date > engine.last_launch_date",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![engine, content_type.as_upper(), at])
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    /// All checkpoints of an engine, ordered by content type.
    pub fn checkpoints(&self, engine: &str) -> Result<Vec<Checkpoint>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT engine, content_type, last_launch_date FROM engine
                 WHERE engine = ?1 ORDER BY content_type",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![engine], |row| {
                Ok(Checkpoint {
                    engine: row.get(0)?,
                    content_type: content_type_at(row, 1)?,
                    last_launch_date: row.get(2)?,
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows)
    }

    // ---------------------------------------------------------------
    // Within-type edges
    // ---------------------------------------------------------------

    /// Replace every edge of a type in one transaction.
    pub fn replace_similars(
        &self,
        content_type: ContentType,
        edges: &[SimilarityEdge],
    ) -> Result<usize> {
        let d = TypeDescriptor::of(content_type);
        let rows = edges
            .iter()
            .map(|e| {
                if e.source_type != content_type || e.target_type != content_type {
                    return Err(Error::Identity(format!(
                        "edge {}:{} -> {}:{} does not belong to {}",
                        e.source_type, e.source_id, e.target_type, e.target_id, d.similars_table
                    )));
                }
                Ok((
                    id_value(d, &e.source_id)?,
                    id_value(d, &e.target_id)?,
                    e.similarity as f64,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        tx.execute(&format!("DELETE FROM {}", d.similars_table), [])
            .map_err(|e| Error::Database(e.to_string()))?;
        {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT INTO {table} ({id}0, {id}1, similarity) VALUES (?1, ?2, ?3)",
                    table = d.similars_table,
                    id = d.id_column,
                ))
                .map_err(|e| Error::Database(e.to_string()))?;
            for (source, target, similarity) in &rows {
                stmt.execute(params![source, target, similarity])
                    .map_err(|e| Error::Database(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.len())
    }

    /// Every edge of a type, ordered by source then descending similarity.
    pub fn similars(&self, content_type: ContentType) -> Result<Vec<SimilarityEdge>> {
        self.query_similars(content_type, None)
    }

    /// Outgoing edges of one item.
    pub fn similars_for(
        &self,
        content_type: ContentType,
        id: &ItemId,
    ) -> Result<Vec<SimilarityEdge>> {
        self.query_similars(content_type, Some(id))
    }

    fn query_similars(
        &self,
        content_type: ContentType,
        source: Option<&ItemId>,
    ) -> Result<Vec<SimilarityEdge>> {
        let d = TypeDescriptor::of(content_type);
        let filter = match source {
            Some(_) => format!("WHERE {}0 = ?1", d.id_column),
            None => String::new(),
        };
        let sql = format!(
            "SELECT {id}0, {id}1, similarity FROM {table} {filter}
             ORDER BY {id}0, similarity DESC, {id}1",
            id = d.id_column,
            table = d.similars_table,
            filter = filter,
        );
        let args: Vec<Value> = match source {
            Some(id) => vec![id_value(d, id)?],
            None => Vec::new(),
        };

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::Database(e.to_string()))?;
        let edges = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok(SimilarityEdge {
                    source_id: read_id(d.id_kind, row, 0)?,
                    target_id: read_id(d.id_kind, row, 1)?,
                    similarity: row.get::<_, f64>(2)? as f32,
                    source_type: content_type,
                    target_type: content_type,
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(edges)
    }

    pub fn count_similars(&self, content_type: ContentType) -> Result<i64> {
        let d = TypeDescriptor::of(content_type);
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", d.similars_table),
            [],
            |row| row.get(0),
        )
        .map_err(|e| Error::Database(e.to_string()))
    }

    // ---------------------------------------------------------------
    // Cross-type edges
    // ---------------------------------------------------------------

    /// Replace the edges of one type pair in one transaction. Rows of other
    /// pairs are untouched.
    pub fn replace_content_links(&self, pair: TypePair, edges: &[SimilarityEdge]) -> Result<usize> {
        if pair.anchor == pair.other {
            return Err(Error::Identity(format!(
                "type pair {} belongs to the within-type tables",
                pair
            )));
        }
        let rows = edges
            .iter()
            .map(|e| {
                if e.source_type != pair.anchor || e.target_type != pair.other {
                    return Err(Error::Identity(format!(
                        "edge {}:{} -> {}:{} does not belong to pair {}",
                        e.source_type, e.source_id, e.target_type, e.target_id, pair
                    )));
                }
                Ok((
                    content_id_of(&e.source_id)?,
                    content_id_of(&e.target_id)?,
                    e.similarity as f64,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let anchor = pair.anchor.as_upper();
        let other = pair.other.as_upper();
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        tx.execute(
            "DELETE FROM similars_content WHERE content_type0 = ?1 AND content_type1 = ?2",
            params![anchor, other],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO similars_content
                     (content_id0, content_id1, similarity, content_type0, content_type1)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(|e| Error::Database(e.to_string()))?;
            for (source, target, similarity) in &rows {
                stmt.execute(params![source, target, similarity, anchor, other])
                    .map_err(|e| Error::Database(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.len())
    }

    /// Every link of a type pair, ordered like [`similars`](Self::similars).
    pub fn content_links(&self, pair: TypePair) -> Result<Vec<SimilarityEdge>> {
        self.query_content_links(
            "WHERE content_type0 = ?1 AND content_type1 = ?2",
            vec![
                Value::Text(pair.anchor.as_upper().to_string()),
                Value::Text(pair.other.as_upper().to_string()),
            ],
        )
    }

    /// Outgoing links of one item, across every partner type.
    pub fn content_links_for(&self, content_id: i64) -> Result<Vec<SimilarityEdge>> {
        self.query_content_links("WHERE content_id0 = ?1", vec![Value::Integer(content_id)])
    }

    fn query_content_links(&self, filter: &str, args: Vec<Value>) -> Result<Vec<SimilarityEdge>> {
        let sql = format!(
            "SELECT content_id0, content_id1, similarity, content_type0, content_type1
             FROM similars_content {}
             ORDER BY content_id0, similarity DESC, content_type1, content_id1",
            filter
        );
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::Database(e.to_string()))?;
        let edges = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok(SimilarityEdge {
                    source_id: ItemId::Int(row.get(0)?),
                    target_id: ItemId::Int(row.get(1)?),
                    similarity: row.get::<_, f64>(2)? as f32,
                    source_type: content_type_at(row, 3)?,
                    target_type: content_type_at(row, 4)?,
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(edges)
    }

    pub fn count_content_links(&self, pair: TypePair) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM similars_content WHERE content_type0 = ?1 AND content_type1 = ?2",
            params![pair.anchor.as_upper(), pair.other.as_upper()],
            |row| row.get(0),
        )
        .map_err(|e| Error::Database(e.to_string()))
    }
}

// ---------------------------------------------------------------
// Row Mapping Helpers
// ---------------------------------------------------------------

/// Bind an item id, checking it against the type's id column kind.
fn id_value(d: &TypeDescriptor, id: &ItemId) -> Result<Value> {
    match (d.id_kind, id) {
        (IdKind::Integer, ItemId::Int(v)) => Ok(Value::Integer(*v)),
        (IdKind::Text, ItemId::Text(s)) => Ok(Value::Text(s.clone())),
        _ => Err(Error::Identity(format!(
            "id {} does not fit column {}.{}",
            id, d.table, d.id_column
        ))),
    }
}

fn content_id_of(id: &ItemId) -> Result<i64> {
    match id {
        ItemId::Int(v) => Ok(*v),
        ItemId::Text(s) => Err(Error::Identity(format!(
            "content id must be an integer, got '{}'",
            s
        ))),
    }
}

fn read_id(kind: IdKind, row: &Row<'_>, idx: usize) -> rusqlite::Result<ItemId> {
    match kind {
        IdKind::Integer => row.get::<_, i64>(idx).map(ItemId::Int),
        IdKind::Text => row.get::<_, String>(idx).map(ItemId::Text),
    }
}

fn content_type_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<ContentType> {
    let raw: String = row.get(idx)?;
    raw.parse::<ContentType>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Feature value as text. Numbers are rendered; blobs count as missing.
fn text_value(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
    }
}
