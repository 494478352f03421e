use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::util::now_utc_string;

pub const DB_SCHEMA_VERSION: &str = "1.0.0";

pub(super) fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

pub(super) fn ensure_schema(connection: &Connection) -> Result<()> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS items (
          item_id INTEGER PRIMARY KEY,
          technical_name TEXT NOT NULL,
          name TEXT NOT NULL,
          summary TEXT NOT NULL DEFAULT '',
          version TEXT NOT NULL,
          depends_json TEXT NOT NULL DEFAULT '[]',
          popularity INTEGER NOT NULL DEFAULT 0,
          searchable_text TEXT NOT NULL,
          text_hash TEXT NOT NULL,
          embedding BLOB,
          embedding_dim INTEGER,
          model_id TEXT,
          updated_at TEXT NOT NULL,
          UNIQUE(technical_name, version)
        );
        ",
    )?;

    connection
        .execute(
            "
            CREATE VIRTUAL TABLE IF NOT EXISTS items_fts
            USING fts5(
              technical_name,
              name,
              summary,
              searchable_text,
              content='items',
              content_rowid='item_id',
              tokenize='porter unicode61'
            )
            ",
            [],
        )
        .context("failed to initialize FTS5 table items_fts")?;

    connection.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_items_version ON items(version);
        CREATE INDEX IF NOT EXISTS idx_items_version_dim ON items(version, embedding_dim);
        ",
    )?;

    let now = now_utc_string();
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now],
    )?;

    Ok(())
}

pub(super) fn rebuild_fts(connection: &Connection) -> Result<()> {
    connection
        .execute("INSERT INTO items_fts(items_fts) VALUES('rebuild')", [])
        .context("failed to rebuild FTS5 table items_fts")?;
    Ok(())
}
