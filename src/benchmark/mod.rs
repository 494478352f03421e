//! Benchmark harness: runs labeled query cases, scores them and persists
//! immutable report snapshots.

mod compare;
mod report;
mod runner;

pub use self::compare::{DEFAULT_MIN_P3_IMPROVEMENT, ReportComparison, compare_reports};
pub use self::report::{BenchmarkReport, persist_report};
pub use self::runner::{BenchmarkRunner, DEFAULT_BENCHMARK_LIMIT};
