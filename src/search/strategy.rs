use std::collections::HashMap;

use tracing::debug;

use super::error::{CandidateCounts, SearchError};
use super::fusion::{RankedHit, fuse};
use super::orchestrator::SearchConfig;
use super::scoring::{hybrid_score, lexical_score, vector_score};
use super::stages::{LexicalSearchStage, StageCandidate, VectorSearchStage};
use super::{RankTrace, ScoredItem, SearchMode, ValidationError};
use crate::model::CorpusItem;
use crate::semantic::EmbeddingProvider;
use crate::store::{CorpusFilter, CorpusStore};

pub(super) struct RetrievalContext<'a> {
    pub(super) store: &'a dyn CorpusStore,
    pub(super) embedder: &'a dyn EmbeddingProvider,
    pub(super) filter: &'a CorpusFilter,
    pub(super) query_text: &'a str,
    pub(super) config: &'a SearchConfig,
}

pub(super) struct StrategyOutput {
    pub(super) candidates: Vec<ScoredItem>,
    pub(super) counts: CandidateCounts,
}

/// One ranking policy per [`SearchMode`]. Output is in final rank order with
/// scores already on the 0..=100 scale.
pub(super) trait RetrievalStrategy: Sync {
    fn retrieve(&self, ctx: &RetrievalContext<'_>) -> Result<StrategyOutput, SearchError>;
}

pub(super) struct VectorStrategy;
pub(super) struct LexicalStrategy;
pub(super) struct HybridStrategy;

impl SearchMode {
    pub(super) fn strategy(self) -> &'static dyn RetrievalStrategy {
        match self {
            Self::Vector => &VectorStrategy,
            Self::Lexical => &LexicalStrategy,
            Self::Hybrid => &HybridStrategy,
        }
    }
}

impl RetrievalStrategy for VectorStrategy {
    fn retrieve(&self, ctx: &RetrievalContext<'_>) -> Result<StrategyOutput, SearchError> {
        let candidates = run_vector_stage(ctx)?;
        let counts = CandidateCounts {
            vector: candidates.len(),
            ..CandidateCounts::default()
        };

        let candidates = candidates
            .into_iter()
            .map(|candidate| {
                let trace = RankTrace {
                    vector_rank: Some(candidate.ranked.rank),
                    vector_distance: Some(candidate.ranked.score),
                    ..RankTrace::default()
                };
                ScoredItem::new(candidate.item, vector_score(candidate.ranked.score), trace)
            })
            .collect();

        Ok(StrategyOutput { candidates, counts })
    }
}

impl RetrievalStrategy for LexicalStrategy {
    fn retrieve(&self, ctx: &RetrievalContext<'_>) -> Result<StrategyOutput, SearchError> {
        let candidates = run_lexical_stage(ctx)?;
        let counts = CandidateCounts {
            lexical: candidates.len(),
            ..CandidateCounts::default()
        };

        let multiplier = ctx.config.lexical_multiplier;
        let candidates = candidates
            .into_iter()
            .map(|candidate| {
                let trace = RankTrace {
                    lexical_rank: Some(candidate.ranked.rank),
                    lexical_score: Some(candidate.ranked.score),
                    ..RankTrace::default()
                };
                let score = lexical_score(candidate.ranked.score, multiplier);
                ScoredItem::new(candidate.item, score, trace)
            })
            .collect();

        Ok(StrategyOutput { candidates, counts })
    }
}

impl RetrievalStrategy for HybridStrategy {
    fn retrieve(&self, ctx: &RetrievalContext<'_>) -> Result<StrategyOutput, SearchError> {
        // The two stages share nothing; fusion below is the join point.
        let (vector, lexical) = rayon::join(|| run_vector_stage(ctx), || run_lexical_stage(ctx));
        let vector = vector?;
        let lexical = lexical?;

        let vector_hits = vector
            .iter()
            .map(|candidate| candidate.ranked)
            .collect::<Vec<RankedHit>>();
        let lexical_hits = lexical
            .iter()
            .map(|candidate| candidate.ranked)
            .collect::<Vec<RankedHit>>();
        let fused = fuse(&vector_hits, &lexical_hits, ctx.config.rrf_k);

        let mut catalog = HashMap::<i64, CorpusItem>::with_capacity(fused.len());
        for candidate in vector.into_iter().chain(lexical) {
            catalog
                .entry(candidate.item.item_id)
                .or_insert(candidate.item);
        }

        let counts = CandidateCounts {
            vector: vector_hits.len(),
            lexical: lexical_hits.len(),
            fused: fused.len(),
        };
        debug!(
            vector = counts.vector,
            lexical = counts.lexical,
            fused = counts.fused,
            rrf_k = ctx.config.rrf_k.get(),
            "hybrid fusion completed"
        );

        let calibration = ctx.config.hybrid_calibration;
        let mut candidates = Vec::<ScoredItem>::with_capacity(fused.len());
        for result in fused {
            let Some(item) = catalog.remove(&result.item_id) else {
                continue;
            };
            let trace = RankTrace {
                vector_rank: result.vector_rank,
                vector_distance: result.vector_score,
                lexical_rank: result.lexical_rank,
                lexical_score: result.lexical_score,
                fused_score: Some(result.fused_score),
                fused_rank: Some(result.final_rank),
            };
            candidates.push(ScoredItem::new(
                item,
                hybrid_score(result.fused_score, calibration),
                trace,
            ));
        }

        Ok(StrategyOutput { candidates, counts })
    }
}

fn run_vector_stage(ctx: &RetrievalContext<'_>) -> Result<Vec<StageCandidate>, SearchError> {
    let embedding = ctx.embedder.embed(ctx.query_text)?;
    let expected = ctx.embedder.dimensions();
    if embedding.len() != expected {
        return Err(ValidationError::EmbeddingDimension {
            expected,
            actual: embedding.len(),
        }
        .into());
    }

    let stage = VectorSearchStage::new(ctx.store, ctx.config.top_candidates);
    Ok(stage.run(ctx.filter, &embedding)?)
}

fn run_lexical_stage(ctx: &RetrievalContext<'_>) -> Result<Vec<StageCandidate>, SearchError> {
    let stage = LexicalSearchStage::new(ctx.store, ctx.config.top_candidates);
    Ok(stage.run(ctx.filter, ctx.query_text)?)
}
