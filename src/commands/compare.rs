use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::benchmark::{BenchmarkReport, ReportComparison, compare_reports};
use crate::cli::CompareArgs;
use crate::util::read_json;

pub fn run(args: CompareArgs) -> Result<()> {
    let baseline: BenchmarkReport = read_json(&args.baseline)?;
    let candidate: BenchmarkReport = read_json(&args.candidate)?;
    info!(
        baseline = %args.baseline.display(),
        candidate = %args.candidate.display(),
        "comparing benchmark reports"
    );

    let comparison = compare_reports(&baseline, &candidate, args.min_p3_improvement);
    if args.json {
        let mut output = io::BufWriter::new(io::stdout().lock());
        serde_json::to_writer_pretty(&mut output, &comparison)
            .context("failed to serialize comparison json output")?;
        writeln!(output)?;
        output.flush()?;
    } else {
        write_text_comparison(&comparison)?;
    }

    if !comparison.passed {
        bail!(
            "precision@3 improvement {:+.1}% is below the required {:+.1}%",
            comparison.delta.precision_at_3 * 100.0,
            comparison.min_p3_improvement * 100.0
        );
    }
    Ok(())
}

fn write_text_comparison(comparison: &ReportComparison) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    for (label, mode, metrics) in [
        ("Baseline", comparison.baseline_mode, &comparison.baseline),
        ("Candidate", comparison.candidate_mode, &comparison.candidate),
    ] {
        writeln!(output, "{label} ({mode}):")?;
        writeln!(output, "  Precision@3  {:.1}%", metrics.precision_at_3 * 100.0)?;
        writeln!(output, "  Precision@5  {:.1}%", metrics.precision_at_5 * 100.0)?;
        writeln!(output, "  Recall@10    {:.1}%", metrics.recall_at_10 * 100.0)?;
        writeln!(output, "  MRR          {:.3}", metrics.mrr)?;
    }

    let delta = &comparison.delta;
    writeln!(output)?;
    writeln!(output, "Improvements:")?;
    writeln!(
        output,
        "  Precision@3  {:+.1}%  {}",
        delta.precision_at_3 * 100.0,
        if comparison.passed { "PASS" } else { "FAIL" }
    )?;
    writeln!(output, "  Precision@5  {:+.1}%", delta.precision_at_5 * 100.0)?;
    writeln!(output, "  Recall@10    {:+.1}%", delta.recall_at_10 * 100.0)?;
    writeln!(output, "  MRR          {:+.3}", delta.mrr)?;

    if !comparison.per_difficulty.is_empty() {
        writeln!(output)?;
        writeln!(output, "By difficulty (precision@3):")?;
        for row in &comparison.per_difficulty {
            writeln!(
                output,
                "  {:<6} {:.1}% -> {:.1}% ({:+.1}%)",
                row.difficulty.as_str(),
                row.baseline_precision_at_3 * 100.0,
                row.candidate_precision_at_3 * 100.0,
                row.delta * 100.0
            )?;
        }
    }

    output.flush()?;
    Ok(())
}
