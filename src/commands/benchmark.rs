use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::benchmark::{BenchmarkReport, BenchmarkRunner, persist_report};
use crate::cli::BenchmarkArgs;
use crate::metrics::median_metrics;
use crate::model::{Difficulty, QueryCaseManifest};
use crate::search::SearchOrchestrator;
use crate::store::SqliteCorpusStore;
use crate::util::read_json;

const BAR_WIDTH: usize = 24;

pub fn run(args: BenchmarkArgs) -> Result<()> {
    let queries_path = args.resolved_queries_path();
    let output_dir = args.resolved_output_dir();
    let db_path = args.store.resolved_db_path();

    let manifest: QueryCaseManifest = read_json(&queries_path)?;
    if manifest.benchmark_queries.is_empty() {
        bail!("no benchmark queries in {}", queries_path.display());
    }
    info!(
        path = %queries_path.display(),
        cases = manifest.benchmark_queries.len(),
        "loaded benchmark queries"
    );

    let store = SqliteCorpusStore::open(&db_path)
        .with_context(|| format!("failed to open corpus store {}", db_path.display()))?;
    let embedder = args.embedding.embedder();
    let orchestrator = SearchOrchestrator::new(&store, &embedder, args.tuning.search_config()?);
    let config = orchestrator.config();
    info!(
        mode = %args.mode,
        top_candidates = config.top_candidates,
        rrf_k = config.rrf_k.get(),
        hybrid_calibration = config.hybrid_calibration,
        "search configuration"
    );

    let runner = BenchmarkRunner::new(&orchestrator, args.mode)
        .with_limit(args.limit)
        .with_parallel(args.parallel);
    let report = runner.run(&manifest.benchmark_queries);

    let stamp_source = report_started_at(&report);
    let path = persist_report(&output_dir, &report, stamp_source)?;
    info!(path = %path.display(), "wrote benchmark report");

    write_summary(&report, &path)?;

    if report.metadata.failed_queries > 0 {
        warn!(
            failed = report.metadata.failed_queries,
            "benchmark completed with failures"
        );
        bail!(
            "{} of {} benchmark queries failed",
            report.metadata.failed_queries,
            report.metadata.total_queries
        );
    }
    Ok(())
}

fn report_started_at(report: &BenchmarkReport) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&report.metadata.timestamp)
        .map(|value| value.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn write_summary(report: &BenchmarkReport, path: &Path) -> Result<()> {
    let metadata = &report.metadata;
    let metrics = &report.aggregate_metrics;
    let medians = median_metrics(&report.valid_results());

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "Benchmark ({})", metadata.search_mode)?;
    writeln!(
        output,
        "Execution time: {:.1} seconds",
        metadata.execution_time_seconds
    )?;
    writeln!(output, "Total queries: {}", metadata.total_queries)?;
    writeln!(output, "Valid queries: {}", metadata.valid_queries)?;
    if metadata.failed_queries > 0 {
        writeln!(output, "Failed queries: {}", metadata.failed_queries)?;
    }

    writeln!(output)?;
    writeln!(output, "Aggregate metrics:")?;
    writeln!(
        output,
        "  Precision@3  {:>6}  {}",
        percent(metrics.precision_at_3),
        bar(metrics.precision_at_3)
    )?;
    writeln!(
        output,
        "  Precision@5  {:>6}  {}",
        percent(metrics.precision_at_5),
        bar(metrics.precision_at_5)
    )?;
    writeln!(
        output,
        "  Recall@10    {:>6}  {}",
        percent(metrics.recall_at_10),
        bar(metrics.recall_at_10)
    )?;
    writeln!(output, "  Mean MRR     {:.3}", metrics.mrr)?;
    writeln!(
        output,
        "  Median P@3   {:>6}   Median MRR {:.3}",
        percent(medians.precision_at_3),
        medians.mrr
    )?;

    if !report.per_difficulty.is_empty() {
        writeln!(output)?;
        writeln!(output, "By difficulty:")?;
        for difficulty in Difficulty::ALL {
            let Some(group) = report.per_difficulty.get(difficulty.as_str()) else {
                continue;
            };
            writeln!(
                output,
                "  {:<6} ({:>2})  P@3 {:>6}  MRR {:.3}",
                difficulty.as_str(),
                group.count,
                percent(group.means.precision_at_3),
                group.means.mrr
            )?;
        }
    }

    writeln!(output)?;
    writeln!(output, "Results saved to: {}", path.display())?;
    output.flush()?;
    Ok(())
}

fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

fn bar(value: f64) -> String {
    let filled = ((value.clamp(0.0, 1.0) * BAR_WIDTH as f64) as usize).min(BAR_WIDTH);
    format!("{}{}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}
