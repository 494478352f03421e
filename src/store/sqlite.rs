use std::path::{Path, PathBuf};

use regex::Regex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use serde::Serialize;
use tracing::debug;

use super::{CorpusFilter, CorpusStore, StoreError, StoreHit};
use crate::model::CorpusItem;
use crate::semantic::{cosine_distance, decode_embedding_blob};

const ITEM_COLUMNS: &str = "
  i.item_id,
  i.technical_name,
  i.name,
  i.summary,
  i.version,
  i.depends_json,
  i.popularity,
  i.searchable_text
";

const DEPENDENCY_SUPERSET_CLAUSE: &str = "
  NOT EXISTS (
    SELECT 1
    FROM json_each(?2) AS wanted
    WHERE wanted.value NOT IN (
      SELECT have.value FROM json_each(i.depends_json) AS have
    )
  )
";

const LEXICAL_STOPWORDS: &[&str] = &[
    "a", "an", "and", "for", "from", "in", "into", "is", "it", "of", "on", "or", "the", "to",
    "with", "module", "modules", "odoo",
];

/// SQLite-backed corpus. Every query opens its own read-only connection, so a
/// single store value can serve concurrent searches.
pub struct SqliteCorpusStore {
    db_path: PathBuf,
    term_pattern: Regex,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionStatus {
    pub version: String,
    pub items: i64,
    pub embedded_items: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub db_schema_version: Option<String>,
    pub db_updated_at: Option<String>,
    pub total_items: i64,
    pub versions: Vec<VersionStatus>,
}

impl SqliteCorpusStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let store = Self {
            db_path: db_path.to_path_buf(),
            term_pattern: Regex::new(r"[\p{L}\p{N}_]+")?,
        };

        let connection = store.connect()?;
        let has_items = connection
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'items' LIMIT 1",
                [],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .is_some();
        if !has_items {
            return Err(StoreError::Uninitialized(format!(
                "{} has no items table; run the load command first",
                db_path.display()
            )));
        }

        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn contains_module(&self, technical_name: &str, version: &str) -> Result<bool, StoreError> {
        let connection = self.connect()?;
        let found = connection
            .query_row(
                "SELECT 1 FROM items WHERE technical_name = ?1 AND version = ?2 LIMIT 1",
                params![technical_name, version],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn status(&self) -> Result<StoreStatus, StoreError> {
        let connection = self.connect()?;
        let db_schema_version = metadata_value(&connection, "db_schema_version")?;
        let db_updated_at = metadata_value(&connection, "db_updated_at")?;
        let total_items = connection.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;

        let mut statement = connection.prepare(
            "
            SELECT version, COUNT(*), SUM(CASE WHEN embedding IS NOT NULL THEN 1 ELSE 0 END)
            FROM items
            GROUP BY version
            ORDER BY version ASC
            ",
        )?;
        let versions = statement
            .query_map([], |row| {
                Ok(VersionStatus {
                    version: row.get(0)?,
                    items: row.get(1)?,
                    embedded_items: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<VersionStatus>, rusqlite::Error>>()?;

        Ok(StoreStatus {
            db_schema_version,
            db_updated_at,
            total_items,
            versions,
        })
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let connection = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(connection)
    }

    /// Reduces free text to an FTS5 expression of quoted terms joined by OR.
    /// Returns `None` when nothing searchable remains.
    fn fts_match_expression(&self, query_text: &str) -> Option<String> {
        let mut terms = Vec::<String>::new();
        for found in self.term_pattern.find_iter(query_text) {
            let term = found.as_str().to_lowercase();
            if term.chars().count() < 2 || LEXICAL_STOPWORDS.contains(&term.as_str()) {
                continue;
            }
            if !terms.contains(&term) {
                terms.push(term);
            }
        }

        if terms.is_empty() {
            return None;
        }

        Some(
            terms
                .iter()
                .map(|term| format!("\"{term}\""))
                .collect::<Vec<String>>()
                .join(" OR "),
        )
    }
}

impl CorpusStore for SqliteCorpusStore {
    fn vector_candidates(
        &self,
        filter: &CorpusFilter,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<StoreHit>, StoreError> {
        if limit == 0 || embedding.is_empty() {
            return Ok(Vec::new());
        }

        let connection = self.connect()?;
        let depends_json = dependency_filter_json(filter);
        let sql = format!(
            "
            SELECT {ITEM_COLUMNS}, i.embedding
            FROM items i
            WHERE
              i.version = ?1
              AND {DEPENDENCY_SUPERSET_CLAUSE}
              AND i.embedding IS NOT NULL
              AND i.embedding_dim = ?3
            "
        );
        let mut statement = connection.prepare(&sql)?;
        let mut rows = statement.query(params![
            filter.version,
            depends_json,
            embedding.len() as i64
        ])?;

        let mut hits = Vec::<StoreHit>::new();
        while let Some(row) = rows.next()? {
            let item = item_from_row(row)?;
            let blob = row.get::<_, Vec<u8>>(8)?;
            let Some(item_embedding) = decode_embedding_blob(&blob, embedding.len()) else {
                debug!(item_id = item.item_id, "skipping undecodable embedding");
                continue;
            };
            hits.push(StoreHit {
                score: cosine_distance(embedding, &item_embedding),
                item,
            });
        }

        hits.sort_by(|left, right| {
            left.score
                .total_cmp(&right.score)
                .then(left.item.item_id.cmp(&right.item.item_id))
        });
        hits.truncate(limit);

        Ok(hits)
    }

    fn lexical_candidates(
        &self,
        filter: &CorpusFilter,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<StoreHit>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let Some(match_expression) = self.fts_match_expression(query_text) else {
            debug!(query = %query_text, "no lexical signal terms in query");
            return Ok(Vec::new());
        };

        let connection = self.connect()?;
        let depends_json = dependency_filter_json(filter);
        let sql = format!(
            "
            SELECT {ITEM_COLUMNS}, -bm25(items_fts, 3.0, 2.0, 1.5, 1.0) AS relevance
            FROM items_fts
            JOIN items i ON i.item_id = items_fts.rowid
            WHERE
              items_fts MATCH ?4
              AND i.version = ?1
              AND {DEPENDENCY_SUPERSET_CLAUSE}
            ORDER BY relevance DESC, i.item_id ASC
            LIMIT ?3
            "
        );
        let mut statement = connection.prepare(&sql)?;
        let mut rows = statement.query(params![
            filter.version,
            depends_json,
            limit as i64,
            match_expression
        ])?;

        let mut hits = Vec::<StoreHit>::new();
        while let Some(row) = rows.next()? {
            hits.push(StoreHit {
                item: item_from_row(row)?,
                score: row.get::<_, f64>(8)?,
            });
        }

        Ok(hits)
    }
}

fn dependency_filter_json(filter: &CorpusFilter) -> String {
    serde_json::Value::from(filter.depends.clone()).to_string()
}

fn item_from_row(row: &Row<'_>) -> Result<CorpusItem, StoreError> {
    let item_id = row.get::<_, i64>(0)?;
    let depends_json = row.get::<_, String>(5)?;
    let depends = serde_json::from_str::<Vec<String>>(&depends_json).map_err(|err| {
        StoreError::CorruptRow {
            item_id,
            reason: format!("depends_json: {err}"),
        }
    })?;

    Ok(CorpusItem {
        item_id,
        technical_name: row.get(1)?,
        name: row.get(2)?,
        summary: row.get(3)?,
        version: row.get(4)?,
        depends,
        popularity: row.get(6)?,
        searchable_text: row.get(7)?,
    })
}

fn metadata_value(connection: &Connection, key: &str) -> Result<Option<String>, StoreError> {
    let value = connection
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [key],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(value)
}
