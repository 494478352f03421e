//! Information-retrieval metrics for one query and their aggregation across
//! a benchmark run.

mod aggregate;
mod calculator;

pub use self::aggregate::{
    AggregateMetrics, GroupMetrics, MetricSource, aggregate_metrics, group_by, median_metrics,
};
pub use self::calculator::{IrMetrics, calculate_all};
