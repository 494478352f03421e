use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, params};
use tracing::info;

use super::schema::{configure_connection, ensure_schema, rebuild_fts};
use crate::semantic::encode_embedding_blob;
use crate::util::now_utc_string;

/// A corpus row ready to be written: text assembled, hashed and embedded.
#[derive(Debug, Clone)]
pub struct PreparedItem {
    pub technical_name: String,
    pub name: String,
    pub summary: String,
    pub version: String,
    pub depends: Vec<String>,
    pub popularity: i64,
    pub searchable_text: String,
    pub text_hash: String,
    pub embedding: Vec<f32>,
    pub model_id: String,
}

pub struct CorpusWriter {
    connection: Connection,
}

impl CorpusWriter {
    pub fn open(db_path: &Path) -> Result<Self> {
        let connection = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open corpus database: {}", db_path.display()))?;

        configure_connection(&connection)?;
        ensure_schema(&connection)?;

        Ok(Self { connection })
    }

    /// Inserts or replaces items keyed by `(technical_name, version)` in one
    /// transaction, then rebuilds the full-text index.
    pub fn upsert_items(&mut self, items: &[PreparedItem]) -> Result<usize> {
        let updated_at = now_utc_string();
        let tx = self
            .connection
            .transaction()
            .context("failed to start corpus load transaction")?;

        let mut upserted = 0usize;
        {
            let mut statement = tx.prepare(
                "
                INSERT INTO items(
                  technical_name, name, summary, version, depends_json, popularity,
                  searchable_text, text_hash, embedding, embedding_dim, model_id, updated_at
                )
                VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                ON CONFLICT(technical_name, version) DO UPDATE SET
                  name=excluded.name,
                  summary=excluded.summary,
                  depends_json=excluded.depends_json,
                  popularity=excluded.popularity,
                  searchable_text=excluded.searchable_text,
                  text_hash=excluded.text_hash,
                  embedding=excluded.embedding,
                  embedding_dim=excluded.embedding_dim,
                  model_id=excluded.model_id,
                  updated_at=excluded.updated_at
                ",
            )?;

            for item in items {
                let depends_json = serde_json::to_string(&item.depends)
                    .context("failed to serialize dependency list")?;
                upserted += statement.execute(params![
                    item.technical_name,
                    item.name,
                    item.summary,
                    item.version,
                    depends_json,
                    item.popularity,
                    item.searchable_text,
                    item.text_hash,
                    encode_embedding_blob(&item.embedding),
                    item.embedding.len() as i64,
                    item.model_id,
                    updated_at,
                ])?;
            }
        }

        rebuild_fts(&tx)?;
        tx.commit().context("failed to commit corpus load")?;

        info!(upserted, "corpus items committed");
        Ok(upserted)
    }
}
