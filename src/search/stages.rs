use std::collections::HashSet;

use super::fusion::RankedHit;
use crate::model::CorpusItem;
use crate::store::{CorpusFilter, CorpusStore, StoreError, StoreHit};

/// A ranked hit together with the item it refers to.
#[derive(Debug, Clone)]
pub struct StageCandidate {
    pub ranked: RankedHit,
    pub item: CorpusItem,
}

pub struct VectorSearchStage<'a> {
    store: &'a dyn CorpusStore,
    top_candidates: usize,
}

impl<'a> VectorSearchStage<'a> {
    pub fn new(store: &'a dyn CorpusStore, top_candidates: usize) -> Self {
        Self {
            store,
            top_candidates,
        }
    }

    /// Candidates by ascending cosine distance; `ranked.score` is the distance.
    pub fn run(
        &self,
        filter: &CorpusFilter,
        embedding: &[f32],
    ) -> Result<Vec<StageCandidate>, StoreError> {
        let hits = self
            .store
            .vector_candidates(filter, embedding, self.top_candidates)?;
        Ok(rank_store_hits(hits, filter, self.top_candidates))
    }
}

pub struct LexicalSearchStage<'a> {
    store: &'a dyn CorpusStore,
    top_candidates: usize,
}

impl<'a> LexicalSearchStage<'a> {
    pub fn new(store: &'a dyn CorpusStore, top_candidates: usize) -> Self {
        Self {
            store,
            top_candidates,
        }
    }

    /// Candidates by descending relevance; `ranked.score` is the relevance.
    pub fn run(
        &self,
        filter: &CorpusFilter,
        query_text: &str,
    ) -> Result<Vec<StageCandidate>, StoreError> {
        let hits = self
            .store
            .lexical_candidates(filter, query_text, self.top_candidates)?;
        Ok(rank_store_hits(hits, filter, self.top_candidates))
    }
}

/// Assigns dense 1-based ranks in store order. Rows failing the filter and
/// repeated ids are dropped so a misbehaving store cannot leak them.
fn rank_store_hits(
    hits: Vec<StoreHit>,
    filter: &CorpusFilter,
    top_candidates: usize,
) -> Vec<StageCandidate> {
    let mut seen = HashSet::<i64>::new();
    hits.into_iter()
        .filter(|hit| filter.accepts(&hit.item))
        .filter(|hit| seen.insert(hit.item.item_id))
        .take(top_candidates)
        .enumerate()
        .map(|(index, hit)| StageCandidate {
            ranked: RankedHit {
                item_id: hit.item.item_id,
                rank: index + 1,
                score: hit.score,
            },
            item: hit.item,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::test_support::{StubStore, stub_item};

    #[test]
    fn stages_rank_densely_and_drop_duplicates_and_filtered_rows() {
        let store = StubStore::new(
            vec![
                (stub_item(1, "a", "17.0", &[]), 0.1),
                (stub_item(2, "b", "16.0", &[]), 0.2),
                (stub_item(1, "a", "17.0", &[]), 0.3),
                (stub_item(3, "c", "17.0", &[]), 0.4),
            ],
            Vec::new(),
        );
        let filter = CorpusFilter::new("17.0", Vec::new());

        let candidates = VectorSearchStage::new(&store, 50)
            .run(&filter, &[1.0, 0.0])
            .expect("vector stage");
        let ranks = candidates
            .iter()
            .map(|value| (value.ranked.item_id, value.ranked.rank))
            .collect::<Vec<(i64, usize)>>();
        assert_eq!(ranks, vec![(1, 1), (3, 2)]);
    }

    #[test]
    fn lexical_stage_respects_top_candidates() {
        let store = StubStore::new(
            Vec::new(),
            vec![
                (stub_item(7, "x", "17.0", &[]), 9.0),
                (stub_item(8, "y", "17.0", &[]), 5.0),
                (stub_item(9, "z", "17.0", &[]), 1.0),
            ],
        );
        let filter = CorpusFilter::new("17.0", Vec::new());

        let candidates = LexicalSearchStage::new(&store, 2)
            .run(&filter, "anything")
            .expect("lexical stage");
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].ranked.item_id, 8);
        assert_eq!(candidates[1].ranked.score, 5.0);
    }
}
