use serde::Serialize;

use super::report::BenchmarkReport;
use crate::metrics::AggregateMetrics;
use crate::model::Difficulty;
use crate::search::SearchMode;

pub const DEFAULT_MIN_P3_IMPROVEMENT: f64 = 0.15;

#[derive(Debug, Clone, Serialize)]
pub struct DifficultyDelta {
    pub difficulty: Difficulty,
    pub baseline_precision_at_3: f64,
    pub candidate_precision_at_3: f64,
    pub delta: f64,
}

/// Candidate minus baseline for each aggregate metric.
#[derive(Debug, Clone, Serialize)]
pub struct ReportComparison {
    pub baseline_mode: SearchMode,
    pub candidate_mode: SearchMode,
    pub baseline: AggregateMetrics,
    pub candidate: AggregateMetrics,
    pub delta: AggregateMetrics,
    pub per_difficulty: Vec<DifficultyDelta>,
    pub min_p3_improvement: f64,
    pub passed: bool,
}

pub fn compare_reports(
    baseline: &BenchmarkReport,
    candidate: &BenchmarkReport,
    min_p3_improvement: f64,
) -> ReportComparison {
    let before = baseline.aggregate_metrics;
    let after = candidate.aggregate_metrics;
    let delta = AggregateMetrics {
        precision_at_3: after.precision_at_3 - before.precision_at_3,
        precision_at_5: after.precision_at_5 - before.precision_at_5,
        recall_at_10: after.recall_at_10 - before.recall_at_10,
        mrr: after.mrr - before.mrr,
    };

    // only tiers present in both runs are comparable
    let per_difficulty = Difficulty::ALL
        .iter()
        .filter_map(|difficulty| {
            let left = baseline.per_difficulty.get(difficulty.as_str())?;
            let right = candidate.per_difficulty.get(difficulty.as_str())?;
            Some(DifficultyDelta {
                difficulty: *difficulty,
                baseline_precision_at_3: left.means.precision_at_3,
                candidate_precision_at_3: right.means.precision_at_3,
                delta: right.means.precision_at_3 - left.means.precision_at_3,
            })
        })
        .collect();

    ReportComparison {
        baseline_mode: baseline.metadata.search_mode,
        candidate_mode: candidate.metadata.search_mode,
        baseline: before,
        candidate: after,
        delta,
        per_difficulty,
        min_p3_improvement,
        passed: delta.precision_at_3 >= min_p3_improvement,
    }
}
