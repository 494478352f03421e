use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::store::{SqliteCorpusStore, StoreStatus, VersionStatus};

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = args.store.resolved_db_path();
    info!(cache_root = %args.store.cache_root.display(), "status requested");

    if !db_path.exists() {
        warn!(path = %db_path.display(), "database file missing");
        return Ok(());
    }

    let store = SqliteCorpusStore::open(&db_path)
        .with_context(|| format!("failed to open corpus store {}", db_path.display()))?;
    let status = store
        .status()
        .with_context(|| format!("failed to read status of {}", db_path.display()))?;

    info!(
        path = %store.db_path().display(),
        schema = %status.db_schema_version.clone().unwrap_or_default(),
        items = status.total_items,
        versions = status.versions.len(),
        "database status"
    );

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &status)
            .context("failed to serialize status json output")?;
        writeln!(output)?;
    } else {
        write_text_status(&mut output, &status)?;
    }
    output.flush()?;
    Ok(())
}

fn write_text_status(output: &mut impl Write, status: &StoreStatus) -> Result<()> {
    writeln!(
        output,
        "Schema version: {}",
        status.db_schema_version.as_deref().unwrap_or("unknown")
    )?;
    writeln!(
        output,
        "Last updated: {}",
        status.db_updated_at.as_deref().unwrap_or("never")
    )?;
    writeln!(output, "Items: {}", status.total_items)?;
    for version in &status.versions {
        writeln!(
            output,
            "  {}: {} items, {} embedded ({:.1}%)",
            version.version,
            version.items,
            version.embedded_items,
            embedding_coverage(version) * 100.0
        )?;
    }
    Ok(())
}

fn embedding_coverage(version: &VersionStatus) -> f64 {
    if version.items <= 0 {
        return 0.0;
    }
    version.embedded_items as f64 / version.items as f64
}
