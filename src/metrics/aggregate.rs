use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::calculator::IrMetrics;

/// Anything that carries one query's metrics.
pub trait MetricSource {
    fn metrics(&self) -> &IrMetrics;
}

impl MetricSource for IrMetrics {
    fn metrics(&self) -> &IrMetrics {
        self
    }
}

impl<T: MetricSource + ?Sized> MetricSource for &T {
    fn metrics(&self) -> &IrMetrics {
        (**self).metrics()
    }
}

/// Arithmetic means of the rate metrics over a set of queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    #[serde(rename = "precision@3")]
    pub precision_at_3: f64,
    #[serde(rename = "precision@5")]
    pub precision_at_5: f64,
    #[serde(rename = "recall@10")]
    pub recall_at_10: f64,
    pub mrr: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupMetrics {
    pub count: usize,
    #[serde(flatten)]
    pub means: AggregateMetrics,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MedianMetrics {
    #[serde(rename = "precision@3")]
    pub precision_at_3: f64,
    pub mrr: f64,
}

/// Empty input yields the all-zero record.
pub fn aggregate_metrics<R: MetricSource>(records: &[R]) -> AggregateMetrics {
    if records.is_empty() {
        return AggregateMetrics::default();
    }

    let mut sums = AggregateMetrics::default();
    for record in records {
        let metrics = record.metrics();
        sums.precision_at_3 += metrics.precision_at_3;
        sums.precision_at_5 += metrics.precision_at_5;
        sums.recall_at_10 += metrics.recall_at_10;
        sums.mrr += metrics.mrr;
    }

    let count = records.len() as f64;
    AggregateMetrics {
        precision_at_3: sums.precision_at_3 / count,
        precision_at_5: sums.precision_at_5 / count,
        recall_at_10: sums.recall_at_10 / count,
        mrr: sums.mrr / count,
    }
}

/// Partitions records by `key_fn` and aggregates each partition.
pub fn group_by<R, K, F>(records: &[R], key_fn: F) -> BTreeMap<K, GroupMetrics>
where
    R: MetricSource,
    K: Ord,
    F: Fn(&R) -> K,
{
    let mut partitions = BTreeMap::<K, Vec<&IrMetrics>>::new();
    for record in records {
        partitions
            .entry(key_fn(record))
            .or_default()
            .push(record.metrics());
    }

    partitions
        .into_iter()
        .map(|(key, members)| {
            let group = GroupMetrics {
                count: members.len(),
                means: aggregate_metrics(&members),
            };
            (key, group)
        })
        .collect()
}

pub fn median_metrics<R: MetricSource>(records: &[R]) -> MedianMetrics {
    MedianMetrics {
        precision_at_3: median(records.iter().map(|record| record.metrics().precision_at_3)),
        mrr: median(records.iter().map(|record| record.metrics().mrr)),
    }
}

fn median(values: impl Iterator<Item = f64>) -> f64 {
    let mut values = values.collect::<Vec<f64>>();
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);

    let middle = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[middle - 1] + values[middle]) / 2.0
    } else {
        values[middle]
    }
}
