use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::{
    AggregateMetrics, GroupMetrics, IrMetrics, MetricSource, aggregate_metrics, group_by,
};
use crate::model::{Difficulty, QueryCase};
use crate::search::SearchMode;
use crate::util::{utc_file_stamp, write_json_snapshot};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub timestamp: String,
    pub total_queries: usize,
    pub valid_queries: usize,
    pub failed_queries: usize,
    pub search_mode: SearchMode,
    pub limit: usize,
    pub execution_time_seconds: f64,
}

/// Outcome of one benchmark query. Failed queries keep zeroed metrics and the
/// failure message in `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResultRecord {
    pub query_id: String,
    pub query: String,
    pub version: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub expected_modules: Vec<String>,
    #[serde(default)]
    pub returned_modules: Vec<String>,
    #[serde(default)]
    pub metrics: IrMetrics,
    pub execution_time_ms: f64,
    #[serde(default)]
    pub error: Option<String>,
}

impl QueryResultRecord {
    pub fn succeeded(
        case: &QueryCase,
        returned_modules: Vec<String>,
        metrics: IrMetrics,
        elapsed_ms: f64,
    ) -> Self {
        Self::from_case(case, returned_modules, metrics, elapsed_ms, None)
    }

    pub fn failed(case: &QueryCase, message: String, elapsed_ms: f64) -> Self {
        Self::from_case(case, Vec::new(), IrMetrics::default(), elapsed_ms, Some(message))
    }

    fn from_case(
        case: &QueryCase,
        returned_modules: Vec<String>,
        metrics: IrMetrics,
        execution_time_ms: f64,
        error: Option<String>,
    ) -> Self {
        Self {
            query_id: case.id.clone(),
            query: case.query.clone(),
            version: case.version.clone(),
            category: case.category.clone(),
            difficulty: case.difficulty,
            expected_modules: case.expected_modules.clone(),
            returned_modules,
            metrics,
            execution_time_ms,
            error,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

impl MetricSource for QueryResultRecord {
    fn metrics(&self) -> &IrMetrics {
        &self.metrics
    }
}

/// Persisted benchmark run. Field names are the on-disk contract read back by
/// `compare`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub metadata: ReportMetadata,
    pub aggregate_metrics: AggregateMetrics,
    #[serde(default)]
    pub per_difficulty: BTreeMap<String, GroupMetrics>,
    #[serde(default)]
    pub per_category: BTreeMap<String, GroupMetrics>,
    pub detailed_results: Vec<QueryResultRecord>,
}

impl BenchmarkReport {
    /// Aggregates and groups cover valid queries only; failures are still
    /// listed in `detailed_results` in input order.
    pub fn build(
        results: Vec<QueryResultRecord>,
        mode: SearchMode,
        limit: usize,
        started_at: DateTime<Utc>,
        execution_time_seconds: f64,
    ) -> Self {
        let valid = results
            .iter()
            .filter(|record| record.is_valid())
            .collect::<Vec<&QueryResultRecord>>();

        let metadata = ReportMetadata {
            timestamp: started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            total_queries: results.len(),
            valid_queries: valid.len(),
            failed_queries: results.len() - valid.len(),
            search_mode: mode,
            limit,
            execution_time_seconds,
        };

        Self {
            metadata,
            aggregate_metrics: aggregate_metrics(&valid),
            per_difficulty: group_by(&valid, |record| record.difficulty.as_str().to_string()),
            per_category: group_by(&valid, |record| record.category.clone()),
            detailed_results: results,
        }
    }

    pub fn valid_results(&self) -> Vec<&QueryResultRecord> {
        self.detailed_results
            .iter()
            .filter(|record| record.is_valid())
            .collect()
    }
}

/// Writes `<mode>_<YYYYmmdd_HHMMSS>.json` under `dir`, never replacing an
/// earlier run.
pub fn persist_report(
    dir: &Path,
    report: &BenchmarkReport,
    started_at: DateTime<Utc>,
) -> Result<PathBuf> {
    let stem = format!(
        "{}_{}",
        report.metadata.search_mode,
        utc_file_stamp(started_at)
    );
    write_json_snapshot(dir, &stem, report)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::tempdir;

    use super::*;

    fn case(id: &str, difficulty: Difficulty, category: &str) -> QueryCase {
        QueryCase {
            id: id.to_string(),
            query: format!("query {id}"),
            version: "17.0".to_string(),
            category: category.to_string(),
            difficulty,
            expected_modules: vec!["sale_margin".to_string()],
        }
    }

    fn perfect() -> IrMetrics {
        IrMetrics {
            precision_at_3: 1.0 / 3.0,
            precision_at_5: 0.2,
            recall_at_10: 1.0,
            mrr: 1.0,
            hits_in_top_3: 1,
            hits_in_top_5: 1,
            first_relevant_position: Some(1),
        }
    }

    fn sample_report() -> BenchmarkReport {
        let results = vec![
            QueryResultRecord::succeeded(
                &case("Q1", Difficulty::Easy, "sales"),
                vec!["sale_margin".to_string()],
                perfect(),
                12.0,
            ),
            QueryResultRecord::failed(
                &case("Q2", Difficulty::Hard, "stock"),
                "embedding degraded: model not loaded".to_string(),
                3.0,
            ),
        ];
        let started_at = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).single().expect("timestamp");
        BenchmarkReport::build(results, SearchMode::Hybrid, 10, started_at, 0.5)
    }

    #[test]
    fn failures_are_listed_but_excluded_from_aggregates() {
        let report = sample_report();
        assert_eq!(report.metadata.total_queries, 2);
        assert_eq!(report.metadata.valid_queries, 1);
        assert_eq!(report.metadata.failed_queries, 1);
        assert_eq!(report.aggregate_metrics.mrr, 1.0);
        assert_eq!(report.detailed_results.len(), 2);
        assert!(!report.per_difficulty.contains_key("hard"));
        assert_eq!(report.per_category["sales"].count, 1);
    }

    #[test]
    fn report_uses_the_snake_case_wire_names() {
        let value = serde_json::to_value(sample_report()).expect("serialize report");
        assert_eq!(value["metadata"]["search_mode"], "hybrid");
        assert_eq!(value["metadata"]["timestamp"], "2025-03-04T05:06:07Z");
        assert!(value["aggregate_metrics"].get("precision@3").is_some());
        assert_eq!(value["per_difficulty"]["easy"]["count"], 1);

        let failed = &value["detailed_results"][1];
        assert_eq!(failed["query_id"], "Q2");
        assert_eq!(failed["difficulty"], "hard");
        assert_eq!(failed["metrics"]["mrr"], 0.0);
        assert!(failed["metrics"]["first_relevant_position"].is_null());
        assert!(failed["error"].as_str().is_some());
    }

    #[test]
    fn legacy_reports_without_category_groups_still_parse() {
        let raw = r#"{
          "metadata": {
            "timestamp": "2025-01-15T10:30:00.123456",
            "total_queries": 2,
            "valid_queries": 1,
            "failed_queries": 1,
            "search_mode": "bm25",
            "limit": 10,
            "execution_time_seconds": 1.25
          },
          "aggregate_metrics": {"precision@3": 0.3333, "precision@5": 0.2, "recall@10": 1.0, "mrr": 1.0},
          "per_difficulty": {
            "easy": {"count": 1, "precision@3": 0.3333, "precision@5": 0.2, "recall@10": 1.0, "mrr": 1.0}
          },
          "detailed_results": [
            {
              "query_id": "Q1",
              "query": "margin on sales orders",
              "version": "17.0",
              "category": "sales",
              "difficulty": "easy",
              "expected_modules": ["sale_margin"],
              "returned_modules": ["sale_margin", "sale_stock"],
              "metrics": {
                "precision@3": 0.3333, "precision@5": 0.2, "recall@10": 1.0, "mrr": 1.0,
                "hits_in_top_3": 1, "hits_in_top_5": 1, "first_relevant_position": 1
              },
              "execution_time_ms": 41.7,
              "error": null
            },
            {
              "query_id": "Q2",
              "query": "batch pickings",
              "version": "17.0",
              "category": "stock",
              "difficulty": "hard",
              "expected_modules": ["stock_picking_batch"],
              "returned_modules": [],
              "metrics": {
                "precision@3": 0.0, "precision@5": 0.0, "recall@10": 0.0, "mrr": 0.0,
                "hits_in_top_3": 0, "hits_in_top_5": 0, "first_relevant_position": null
              },
              "execution_time_ms": 2.0,
              "error": "connection refused"
            }
          ]
        }"#;

        let report: BenchmarkReport = serde_json::from_str(raw).expect("legacy report should parse");
        assert_eq!(report.metadata.search_mode, SearchMode::Lexical);
        assert!(report.per_category.is_empty());
        assert_eq!(report.per_difficulty["easy"].count, 1);
        assert_eq!(report.valid_results().len(), 1);
        assert_eq!(report.detailed_results[0].metrics.first_relevant_position, Some(1));
        assert_eq!(report.detailed_results[1].error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn persisted_reports_never_overwrite_each_other() {
        let dir = tempdir().expect("tempdir");
        let report = sample_report();
        let started_at = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).single().expect("timestamp");

        let first = persist_report(dir.path(), &report, started_at).expect("first persist");
        let second = persist_report(dir.path(), &report, started_at).expect("second persist");

        assert_eq!(
            first.file_name().and_then(|value| value.to_str()),
            Some("hybrid_20250304_050607.json")
        );
        assert_ne!(first, second);

        let reloaded: BenchmarkReport =
            crate::util::read_json(&first).expect("persisted report should parse");
        assert_eq!(reloaded.metadata.failed_queries, 1);
    }
}
