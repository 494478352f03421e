use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub const PRECISION_SHALLOW_K: usize = 3;
pub const PRECISION_DEEP_K: usize = 5;
pub const RECALL_K: usize = 10;

/// Per-query retrieval quality. Every rate lies in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IrMetrics {
    #[serde(rename = "precision@3")]
    pub precision_at_3: f64,
    #[serde(rename = "precision@5")]
    pub precision_at_5: f64,
    #[serde(rename = "recall@10")]
    pub recall_at_10: f64,
    pub mrr: f64,
    pub hits_in_top_3: usize,
    pub hits_in_top_5: usize,
    pub first_relevant_position: Option<usize>,
}

/// Relevant entries among the first `k` retrieved, divided by `k`.
///
/// Slots past the end of `retrieved` count as non-relevant.
pub fn precision_at_k(retrieved: &[String], expected: &HashSet<String>, k: usize) -> f64 {
    if retrieved.is_empty() || k == 0 {
        return 0.0;
    }
    count_hits(top_k(retrieved, k), expected) as f64 / k as f64
}

/// Share of distinct expected ids present in the first `k` retrieved.
pub fn recall_at_k(retrieved: &[String], expected: &HashSet<String>, k: usize) -> f64 {
    if expected.is_empty() {
        return 0.0;
    }
    let window = top_k(retrieved, k)
        .iter()
        .map(String::as_str)
        .collect::<HashSet<&str>>();
    let found = expected
        .iter()
        .filter(|value| window.contains(value.as_str()))
        .count();
    found as f64 / expected.len() as f64
}

pub fn mrr(retrieved: &[String], expected: &HashSet<String>) -> f64 {
    first_relevant_position(retrieved, expected)
        .map(|position| 1.0 / position as f64)
        .unwrap_or(0.0)
}

pub fn count_hits(retrieved: &[String], expected: &HashSet<String>) -> usize {
    retrieved
        .iter()
        .filter(|value| expected.contains(*value))
        .count()
}

/// 1-based position of the first relevant entry.
pub fn first_relevant_position(retrieved: &[String], expected: &HashSet<String>) -> Option<usize> {
    retrieved
        .iter()
        .position(|value| expected.contains(value))
        .map(|index| index + 1)
}

pub fn calculate_all(retrieved: &[String], expected: &HashSet<String>) -> IrMetrics {
    IrMetrics {
        precision_at_3: precision_at_k(retrieved, expected, PRECISION_SHALLOW_K),
        precision_at_5: precision_at_k(retrieved, expected, PRECISION_DEEP_K),
        recall_at_10: recall_at_k(retrieved, expected, RECALL_K),
        mrr: mrr(retrieved, expected),
        hits_in_top_3: count_hits(top_k(retrieved, PRECISION_SHALLOW_K), expected),
        hits_in_top_5: count_hits(top_k(retrieved, PRECISION_DEEP_K), expected),
        first_relevant_position: first_relevant_position(retrieved, expected),
    }
}

fn top_k(retrieved: &[String], k: usize) -> &[String] {
    &retrieved[..retrieved.len().min(k)]
}
