//! Reciprocal Rank Fusion: score(d) = Σ 1/(k + rank_i(d))
//!
//! Items that tie on fused score keep the order in which they were first
//! seen while merging, vector list first, then lexical list.

use std::collections::HashMap;

use serde::Serialize;

use super::ValidationError;

pub const DEFAULT_RRF_K: u32 = 60;

/// Damping constant for RRF. Always greater than zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RrfK(u32);

impl RrfK {
    pub fn new(value: u32) -> Result<Self, ValidationError> {
        if value == 0 {
            return Err(ValidationError::InvalidRrfK);
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for RrfK {
    fn default() -> Self {
        Self(DEFAULT_RRF_K)
    }
}

/// One entry of a single method's ranking. `rank` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedHit {
    pub item_id: i64,
    pub rank: usize,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedResult {
    pub item_id: i64,
    pub vector_rank: Option<usize>,
    pub vector_score: Option<f64>,
    pub lexical_rank: Option<usize>,
    pub lexical_score: Option<f64>,
    pub fused_score: f64,
    pub final_rank: usize,
}

impl FusedResult {
    fn seed(item_id: i64) -> Self {
        Self {
            item_id,
            vector_rank: None,
            vector_score: None,
            lexical_rank: None,
            lexical_score: None,
            fused_score: 0.0,
            final_rank: 0,
        }
    }

    fn slot_mut(&mut self, source: FusionSource) -> (&mut Option<usize>, &mut Option<f64>) {
        match source {
            FusionSource::Vector => (&mut self.vector_rank, &mut self.vector_score),
            FusionSource::Lexical => (&mut self.lexical_rank, &mut self.lexical_score),
        }
    }
}

#[derive(Clone, Copy)]
enum FusionSource {
    Vector,
    Lexical,
}

/// Fuses the vector and lexical rankings into one ranking over the union of
/// their ids, ordered by descending fused score with dense final ranks.
///
/// A repeated id inside one list only counts at its first occurrence.
pub fn fuse(vector: &[RankedHit], lexical: &[RankedHit], k: RrfK) -> Vec<FusedResult> {
    let base = f64::from(k.get());
    let mut fused = Vec::<FusedResult>::with_capacity(vector.len() + lexical.len());
    let mut positions = HashMap::<i64, usize>::new();

    merge_ranking(&mut fused, &mut positions, vector, base, FusionSource::Vector);
    merge_ranking(&mut fused, &mut positions, lexical, base, FusionSource::Lexical);

    // stable: equal scores stay in first-seen order
    fused.sort_by(|left, right| right.fused_score.total_cmp(&left.fused_score));
    for (index, result) in fused.iter_mut().enumerate() {
        result.final_rank = index + 1;
    }

    fused
}

fn merge_ranking(
    fused: &mut Vec<FusedResult>,
    positions: &mut HashMap<i64, usize>,
    hits: &[RankedHit],
    base: f64,
    source: FusionSource,
) {
    for hit in hits {
        let index = *positions.entry(hit.item_id).or_insert_with(|| {
            fused.push(FusedResult::seed(hit.item_id));
            fused.len() - 1
        });

        let entry = &mut fused[index];
        let (rank_slot, score_slot) = entry.slot_mut(source);
        if rank_slot.is_some() {
            continue;
        }
        *rank_slot = Some(hit.rank);
        *score_slot = Some(hit.score);
        entry.fused_score += 1.0 / (base + hit.rank as f64);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    const A: i64 = 1;
    const B: i64 = 2;
    const C: i64 = 3;

    fn hit(item_id: i64, rank: usize) -> RankedHit {
        RankedHit {
            item_id,
            rank,
            score: 0.0,
        }
    }

    #[test]
    fn rrf_prefers_item_with_better_combined_ranks() {
        let vector = vec![hit(A, 1), hit(B, 2)];
        let lexical = vec![hit(B, 1), hit(A, 3)];

        let fused = fuse(&vector, &lexical, RrfK::default());

        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].item_id, B);
        assert_eq!(fused[1].item_id, A);
        let expected_b = 1.0 / 62.0 + 1.0 / 61.0;
        let expected_a = 1.0 / 61.0 + 1.0 / 63.0;
        assert!((fused[0].fused_score - expected_b).abs() < 1e-12);
        assert!((fused[1].fused_score - expected_a).abs() < 1e-12);
        assert!((fused[0].fused_score - 0.032520).abs() < 1e-5);
        assert_eq!(fused[0].final_rank, 1);
        assert_eq!(fused[1].final_rank, 2);
    }

    #[test]
    fn ties_keep_vector_then_lexical_encounter_order() {
        let vector = vec![hit(C, 1)];
        let lexical = vec![hit(A, 1), hit(B, 2)];

        let fused = fuse(&vector, &lexical, RrfK::default());
        let order = fused.iter().map(|value| value.item_id).collect::<Vec<i64>>();
        assert_eq!(order, vec![C, A, B]);

        let again = fuse(&vector, &lexical, RrfK::default());
        assert_eq!(fused, again);
    }

    #[test]
    fn missing_method_leaves_fields_empty() {
        let fused = fuse(&[hit(A, 1)], &[hit(B, 4)], RrfK::new(10).expect("k"));

        let a = fused.iter().find(|value| value.item_id == A).expect("A fused");
        assert_eq!(a.vector_rank, Some(1));
        assert_eq!(a.lexical_rank, None);
        assert_eq!(a.lexical_score, None);

        let b = fused.iter().find(|value| value.item_id == B).expect("B fused");
        assert_eq!(b.vector_rank, None);
        assert_eq!(b.vector_score, None);
        assert!((b.fused_score - 1.0 / 14.0).abs() < 1e-12);
    }

    #[test]
    fn empty_inputs_pass_through_the_other_list() {
        assert!(fuse(&[], &[], RrfK::default()).is_empty());

        let only_lexical = fuse(&[], &[hit(B, 1), hit(A, 2)], RrfK::default());
        let order = only_lexical
            .iter()
            .map(|value| (value.item_id, value.final_rank))
            .collect::<Vec<(i64, usize)>>();
        assert_eq!(order, vec![(B, 1), (A, 2)]);
    }

    #[test]
    fn duplicate_ids_within_one_list_count_once() {
        let vector = vec![hit(A, 1), hit(A, 2)];
        let fused = fuse(&vector, &[], RrfK::default());

        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].vector_rank, Some(1));
        assert!((fused[0].fused_score - 1.0 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn fused_ids_are_exactly_the_union_of_inputs() {
        let vector = vec![hit(1, 1), hit(2, 2), hit(3, 3)];
        let lexical = vec![hit(3, 1), hit(4, 2)];

        let fused = fuse(&vector, &lexical, RrfK::default());
        let ids = fused.iter().map(|value| value.item_id).collect::<HashSet<i64>>();
        assert_eq!(ids, HashSet::from([1, 2, 3, 4]));

        let ranks = fused.iter().map(|value| value.final_rank).collect::<Vec<usize>>();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
        assert!(
            fused
                .windows(2)
                .all(|pair| pair[0].fused_score >= pair[1].fused_score)
        );
    }

    #[test]
    fn zero_k_is_rejected() {
        assert_eq!(RrfK::new(0), Err(ValidationError::InvalidRrfK));
        assert_eq!(RrfK::new(1).map(RrfK::get), Ok(1));
    }
}
