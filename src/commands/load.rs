use std::collections::HashSet;
use std::time::Instant;

use anyhow::{Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::LoadArgs;
use crate::model::{CorpusItemInput, CorpusSnapshot, LoadRunManifest};
use crate::semantic::{EmbeddingProvider, normalize_whitespace};
use crate::store::{CorpusWriter, DB_SCHEMA_VERSION, PreparedItem};
use crate::util::{
    ensure_directory, now_utc_string, read_json, sha256_text, utc_file_stamp, write_json_pretty,
};

#[derive(Debug, Default)]
struct PrepareCounts {
    embeddings_computed: usize,
    embeddings_supplied: usize,
}

pub fn run(args: LoadArgs) -> Result<()> {
    let started = Instant::now();
    let started_ts = Utc::now();
    let run_id = format!("load-{}", utc_file_stamp(started_ts));

    let db_path = args.store.resolved_db_path();
    let manifest_path = args.load_manifest_path.clone().unwrap_or_else(|| {
        args.store
            .cache_root
            .join("manifests")
            .join(format!("load_run_{}.json", utc_file_stamp(started_ts)))
    });
    if let Some(parent) = db_path.parent() {
        ensure_directory(parent)?;
    }

    info!(
        run_id = %run_id,
        corpus = %args.corpus_path.display(),
        db = %db_path.display(),
        "starting corpus load"
    );

    let snapshot: CorpusSnapshot = read_json(&args.corpus_path)?;
    let embedder = args.embedding.embedder();

    let mut warnings = Vec::<String>::new();
    let mut counts = PrepareCounts::default();
    let prepared = prepare_items(&snapshot.items, &embedder, &mut counts, &mut warnings)?;
    for warning in &warnings {
        warn!(warning = %warning, "corpus item skipped");
    }
    if prepared.is_empty() && !snapshot.items.is_empty() {
        bail!(
            "no loadable items in {} ({} skipped)",
            args.corpus_path.display(),
            warnings.len()
        );
    }

    let mut writer = CorpusWriter::open(&db_path)?;
    let upserted = writer.upsert_items(&prepared)?;

    let manifest = LoadRunManifest {
        manifest_version: 1,
        run_id,
        generated_at: now_utc_string(),
        source_path: args.corpus_path.display().to_string(),
        db_path: db_path.display().to_string(),
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        model_id: embedder.model_id().to_string(),
        embedding_dim: embedder.dimensions(),
        items_read: snapshot.items.len(),
        items_upserted: upserted,
        embeddings_computed: counts.embeddings_computed,
        embeddings_supplied: counts.embeddings_supplied,
        duration_ms: started.elapsed().as_millis(),
        warnings,
    };
    write_json_pretty(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), "wrote load run manifest");
    info!(
        items = manifest.items_read,
        upserted = manifest.items_upserted,
        computed = manifest.embeddings_computed,
        supplied = manifest.embeddings_supplied,
        "corpus load completed"
    );
    Ok(())
}

/// Builds searchable text, hashes and embeddings for every usable item.
/// Unusable items are reported through `warnings` and left out.
fn prepare_items(
    items: &[CorpusItemInput],
    embedder: &dyn EmbeddingProvider,
    counts: &mut PrepareCounts,
    warnings: &mut Vec<String>,
) -> Result<Vec<PreparedItem>> {
    let mut seen = HashSet::<(String, String)>::new();
    let mut prepared = Vec::<PreparedItem>::with_capacity(items.len());

    for (index, input) in items.iter().enumerate() {
        let technical_name = input.technical_name.trim();
        let version = input.version.trim();
        if technical_name.is_empty() || version.is_empty() {
            warnings.push(format!(
                "item #{index}: technical_name and version are required"
            ));
            continue;
        }
        if !seen.insert((technical_name.to_string(), version.to_string())) {
            warnings.push(format!(
                "item #{index}: duplicate {technical_name}@{version}, keeping the first"
            ));
            continue;
        }

        let depends = input
            .depends
            .iter()
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect::<Vec<String>>();
        let searchable_text = build_searchable_text(input, &depends);

        let embedding = match &input.embedding {
            Some(values) if values.len() == embedder.dimensions() => {
                counts.embeddings_supplied += 1;
                values.clone()
            }
            Some(values) => {
                warnings.push(format!(
                    "item #{index}: {technical_name}@{version} embedding has {} dimensions, expected {}",
                    values.len(),
                    embedder.dimensions()
                ));
                continue;
            }
            None => {
                counts.embeddings_computed += 1;
                embedder.embed(&searchable_text)?
            }
        };

        prepared.push(PreparedItem {
            technical_name: technical_name.to_string(),
            name: normalize_whitespace(&input.name),
            summary: normalize_whitespace(&input.summary),
            version: version.to_string(),
            depends,
            popularity: input.popularity,
            text_hash: sha256_text(&searchable_text),
            searchable_text,
            embedding,
            model_id: embedder.model_id().to_string(),
        });
    }

    Ok(prepared)
}

fn build_searchable_text(input: &CorpusItemInput, depends: &[String]) -> String {
    let mut parts = vec![
        input.technical_name.replace('_', " "),
        input.name.clone(),
        input.summary.clone(),
    ];
    if let Some(description) = &input.description {
        parts.push(description.clone());
    }
    parts.push(depends.join(" "));
    normalize_whitespace(&parts.join(" "))
}
