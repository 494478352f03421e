use std::time::Instant;

use chrono::Utc;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::report::{BenchmarkReport, QueryResultRecord};
use crate::metrics::calculate_all;
use crate::model::QueryCase;
use crate::search::{SearchMode, SearchOrchestrator, SearchOutcome, SearchRequest};

pub const DEFAULT_BENCHMARK_LIMIT: usize = 10;

/// Runs labeled query cases through one orchestrator and scores them.
pub struct BenchmarkRunner<'a> {
    orchestrator: &'a SearchOrchestrator<'a>,
    mode: SearchMode,
    limit: usize,
    parallel: bool,
}

impl<'a> BenchmarkRunner<'a> {
    pub fn new(orchestrator: &'a SearchOrchestrator<'a>, mode: SearchMode) -> Self {
        Self {
            orchestrator,
            mode,
            limit: DEFAULT_BENCHMARK_LIMIT,
            parallel: false,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Every case yields exactly one record, in input order, whether or not
    /// its search succeeded.
    pub fn run(&self, cases: &[QueryCase]) -> BenchmarkReport {
        let started_at = Utc::now();
        let started = Instant::now();
        info!(
            cases = cases.len(),
            mode = %self.mode,
            limit = self.limit,
            parallel = self.parallel,
            "benchmark started"
        );

        let results = if self.parallel {
            cases
                .par_iter()
                .map(|case| self.run_case(case))
                .collect::<Vec<QueryResultRecord>>()
        } else {
            cases
                .iter()
                .map(|case| self.run_case(case))
                .collect::<Vec<QueryResultRecord>>()
        };

        let elapsed = started.elapsed().as_secs_f64();
        let report = BenchmarkReport::build(results, self.mode, self.limit, started_at, elapsed);
        info!(
            total = report.metadata.total_queries,
            valid = report.metadata.valid_queries,
            failed = report.metadata.failed_queries,
            seconds = format!("{elapsed:.2}"),
            "benchmark finished"
        );
        report
    }

    fn run_case(&self, case: &QueryCase) -> QueryResultRecord {
        let request = SearchRequest {
            limit: self.limit,
            ..SearchRequest::new(case.query.as_str(), case.version.as_str(), self.mode)
        };

        let started = Instant::now();
        let outcome = self.orchestrator.search(&request);
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            SearchOutcome::Ok(results) => {
                let returned = results
                    .items
                    .into_iter()
                    .map(|item| item.technical_name)
                    .collect::<Vec<String>>();
                let metrics = calculate_all(&returned, &case.expected_set());
                debug!(
                    query_id = %case.id,
                    precision_at_3 = metrics.precision_at_3,
                    mrr = metrics.mrr,
                    returned = returned.len(),
                    "benchmark query scored"
                );
                QueryResultRecord::succeeded(case, returned, metrics, elapsed_ms)
            }
            failure => {
                let message = failure
                    .failure_message()
                    .unwrap_or_else(|| "search failed".to_string());
                warn!(query_id = %case.id, error = %message, "benchmark query failed");
                QueryResultRecord::failed(case, message, elapsed_ms)
            }
        }
    }
}
