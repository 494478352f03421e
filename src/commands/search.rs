use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use crate::cli::SearchArgs;
use crate::search::{
    CandidateCounts, Diagnostic, ScoredItem, SearchMode, SearchOrchestrator, SearchOutcome,
    SearchRequest,
};
use crate::store::SqliteCorpusStore;

#[derive(Debug, Serialize)]
struct SearchResponse<'a> {
    query: &'a str,
    version: &'a str,
    depends: &'a [String],
    mode: SearchMode,
    limit: usize,
    min_score: u32,
    status: &'static str,
    returned: usize,
    candidates: CandidateCounts,
    duration_ms: f64,
    diagnostic: Option<Diagnostic>,
    results: &'a [ScoredItem],
}

pub fn run(args: SearchArgs) -> Result<()> {
    let db_path = args.store.resolved_db_path();
    let store = SqliteCorpusStore::open(&db_path)
        .with_context(|| format!("failed to open corpus store {}", db_path.display()))?;
    let embedder = args.embedding.embedder();
    let config = args.tuning.search_config()?;
    let orchestrator = SearchOrchestrator::new(&store, &embedder, config);

    let request = SearchRequest {
        query: args.query.clone(),
        version: args.target_version.clone(),
        depends: args.depends.clone(),
        limit: args.limit,
        min_score: args.min_score,
        mode: args.mode,
    };
    info!(mode = %request.mode, version = %request.version, "running search");

    let outcome = orchestrator.search(&request);
    if let SearchOutcome::Invalid(error) = &outcome {
        bail!("invalid search request: {error}");
    }

    if args.json {
        write_json_response(&request, &outcome)
    } else {
        write_text_response(&request, &outcome)
    }
}

fn write_json_response(request: &SearchRequest, outcome: &SearchOutcome) -> Result<()> {
    let (status, candidates, duration_ms, diagnostic) = match outcome {
        SearchOutcome::Ok(results) => ("ok", results.candidates, results.duration_ms, None),
        SearchOutcome::Degraded { diagnostic } => (
            "degraded",
            CandidateCounts::default(),
            0.0,
            Some(diagnostic.clone()),
        ),
        SearchOutcome::Invalid(_) => ("invalid", CandidateCounts::default(), 0.0, None),
    };

    let results = outcome.results();
    let response = SearchResponse {
        query: &request.query,
        version: &request.version,
        depends: &request.depends,
        mode: request.mode,
        limit: request.limit,
        min_score: request.min_score,
        status,
        returned: results.len(),
        candidates,
        duration_ms,
        diagnostic,
        results,
    };

    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, &response)
        .context("failed to serialize search json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_response(request: &SearchRequest, outcome: &SearchOutcome) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Query: {}", request.query.trim())?;
    writeln!(output, "Version: {} | Mode: {}", request.version, request.mode)?;
    if let SearchOutcome::Degraded { diagnostic } = outcome {
        writeln!(
            output,
            "Search degraded at {}: {}",
            diagnostic.stage, diagnostic.message
        )?;
    }
    if let SearchOutcome::Ok(results) = outcome {
        writeln!(
            output,
            "Candidates: vector={} lexical={} fused={} ({:.1} ms)",
            results.candidates.vector,
            results.candidates.lexical,
            results.candidates.fused,
            results.duration_ms
        )?;
    }

    let results = outcome.results();
    writeln!(output, "Results: {}", results.len())?;
    for item in results {
        writeln!(
            output,
            "{}. [{:>3}] {} ({})",
            item.rank, item.score, item.technical_name, item.name
        )?;
        if !item.summary.is_empty() {
            writeln!(output, "\tsummary: {}", item.summary)?;
        }
        if !item.depends.is_empty() {
            writeln!(output, "\tdepends: {}", item.depends.join(", "))?;
        }
        writeln!(output, "\ttrace: {}", format_trace(item))?;
    }

    output.flush()?;
    Ok(())
}

fn format_trace(item: &ScoredItem) -> String {
    let rank = |value: Option<usize>| value.map_or_else(|| "-".to_string(), |v| v.to_string());
    let mut parts = vec![
        format!("vector_rank={}", rank(item.trace.vector_rank)),
        format!("lexical_rank={}", rank(item.trace.lexical_rank)),
    ];
    if let Some(fused) = item.trace.fused_score {
        parts.push(format!("fused={fused:.6}"));
    }
    parts.join(" ")
}
