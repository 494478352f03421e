use std::time::Instant;

use tracing::{info, warn};

use super::error::{Diagnostic, SearchError, SearchOutcome, SearchResults};
use super::fusion::RrfK;
use super::strategy::RetrievalContext;
use super::SearchRequest;
use crate::semantic::EmbeddingProvider;
use crate::store::{CorpusFilter, CorpusStore};

pub const DEFAULT_TOP_CANDIDATES: usize = 50;
pub const DEFAULT_LEXICAL_MULTIPLIER: f64 = 10.0;
/// Maps the best possible fused score at k = 60 (2/61) onto 98.
pub const DEFAULT_HYBRID_CALIBRATION: f64 = 3000.0;

/// Tuning shared by every search an orchestrator runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Per-method candidate cap before fusion or truncation.
    pub top_candidates: usize,
    pub rrf_k: RrfK,
    pub lexical_multiplier: f64,
    pub hybrid_calibration: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_candidates: DEFAULT_TOP_CANDIDATES,
            rrf_k: RrfK::default(),
            lexical_multiplier: DEFAULT_LEXICAL_MULTIPLIER,
            hybrid_calibration: DEFAULT_HYBRID_CALIBRATION,
        }
    }
}

/// Entry point for one search request in any mode.
///
/// Holds no per-request state, so a single orchestrator can serve concurrent
/// callers as long as its store and embedder can.
pub struct SearchOrchestrator<'a> {
    store: &'a dyn CorpusStore,
    embedder: &'a dyn EmbeddingProvider,
    config: SearchConfig,
}

impl<'a> SearchOrchestrator<'a> {
    pub fn new(
        store: &'a dyn CorpusStore,
        embedder: &'a dyn EmbeddingProvider,
        config: SearchConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn search(&self, request: &SearchRequest) -> SearchOutcome {
        if let Err(error) = request.validate() {
            warn!(mode = %request.mode, error = %error, "rejected search request");
            return SearchOutcome::Invalid(error);
        }

        let started = Instant::now();
        let query_text = request.query.trim();
        let depends = request
            .depends
            .iter()
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect::<Vec<String>>();
        let filter = CorpusFilter::new(request.version.trim(), depends);

        let ctx = RetrievalContext {
            store: self.store,
            embedder: self.embedder,
            filter: &filter,
            query_text,
            config: &self.config,
        };

        let output = match request.mode.strategy().retrieve(&ctx) {
            Ok(output) => output,
            Err(SearchError::Invalid(error)) => {
                warn!(mode = %request.mode, error = %error, "search request invalid");
                return SearchOutcome::Invalid(error);
            }
            Err(SearchError::Retrieval(error)) => {
                let diagnostic = Diagnostic::from_retrieval(&error);
                warn!(
                    mode = %request.mode,
                    stage = %diagnostic.stage,
                    error = %diagnostic.message,
                    "search degraded"
                );
                return SearchOutcome::Degraded { diagnostic };
            }
        };

        let mut items = output
            .candidates
            .into_iter()
            .filter(|item| u32::from(item.score) >= request.min_score)
            .take(request.limit)
            .collect::<Vec<_>>();
        for (index, item) in items.iter_mut().enumerate() {
            item.rank = index + 1;
        }

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        info!(
            mode = %request.mode,
            version = %filter.version,
            vector_candidates = output.counts.vector,
            lexical_candidates = output.counts.lexical,
            fused_candidates = output.counts.fused,
            returned = items.len(),
            duration_ms = format!("{duration_ms:.1}"),
            "search completed"
        );

        SearchOutcome::Ok(SearchResults {
            items,
            candidates: output.counts,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::test_support::{
        FailingEmbedder, FixedEmbedder, StubStore, WrongDimensionEmbedder, stub_item,
    };
    use crate::search::{SearchMode, ValidationError};

    fn orchestrator<'a>(
        store: &'a StubStore,
        embedder: &'a dyn EmbeddingProvider,
    ) -> SearchOrchestrator<'a> {
        SearchOrchestrator::new(store, embedder, SearchConfig::default())
    }

    fn two_method_store() -> StubStore {
        // vector: A(1) B(2); lexical: B(1) A(3) with C(2) between them
        StubStore::new(
            vec![
                (stub_item(1, "a", "17.0", &[]), 0.25),
                (stub_item(2, "b", "17.0", &[]), 0.5),
            ],
            vec![
                (stub_item(2, "b", "17.0", &[]), 8.0),
                (stub_item(3, "c", "17.0", &[]), 6.0),
                (stub_item(1, "a", "17.0", &[]), 3.0),
            ],
        )
    }

    fn names(outcome: &SearchOutcome) -> Vec<&str> {
        outcome
            .results()
            .iter()
            .map(|item| item.technical_name.as_str())
            .collect()
    }

    #[test]
    fn invalid_requests_never_touch_retrieval() {
        let store = StubStore::failing();
        let embedder = FailingEmbedder;
        let engine = orchestrator(&store, &embedder);

        let request = SearchRequest::new("", "17.0", SearchMode::Hybrid);
        let outcome = engine.search(&request);
        assert!(matches!(
            outcome,
            SearchOutcome::Invalid(ValidationError::EmptyQuery)
        ));

        let mut request = SearchRequest::new("invoice", "17.0", SearchMode::Vector);
        request.min_score = 150;
        assert!(matches!(
            engine.search(&request),
            SearchOutcome::Invalid(ValidationError::MinScoreOutOfRange(150))
        ));
    }

    #[test]
    fn embedding_failure_degrades_vector_and_hybrid_but_not_lexical() {
        let store = two_method_store();
        let embedder = FailingEmbedder;
        let engine = orchestrator(&store, &embedder);

        for mode in [SearchMode::Vector, SearchMode::Hybrid] {
            let outcome = engine.search(&SearchRequest::new("invoice", "17.0", mode));
            match outcome {
                SearchOutcome::Degraded { diagnostic } => assert_eq!(diagnostic.stage, "embedding"),
                other => panic!("expected degraded outcome for {mode}, got {other:?}"),
            }
        }

        let lexical = engine.search(&SearchRequest::new("invoice", "17.0", SearchMode::Lexical));
        assert!(matches!(lexical, SearchOutcome::Ok(_)));
        assert_eq!(names(&lexical), vec!["b", "c", "a"]);
    }

    #[test]
    fn store_failure_degrades_with_store_stage() {
        let store = StubStore::failing();
        let embedder = FixedEmbedder::new(vec![1.0, 0.0]);
        let engine = orchestrator(&store, &embedder);

        let outcome = engine.search(&SearchRequest::new("invoice", "17.0", SearchMode::Lexical));
        match outcome {
            SearchOutcome::Degraded { diagnostic } => assert_eq!(diagnostic.stage, "corpus_store"),
            other => panic!("expected degraded outcome, got {other:?}"),
        }

        let vector = engine.search(&SearchRequest::new("invoice", "17.0", SearchMode::Vector));
        assert!(matches!(vector, SearchOutcome::Degraded { .. }));
        assert!(vector.results().is_empty());
    }

    #[test]
    fn wrong_embedding_dimension_is_a_validation_error() {
        let store = two_method_store();
        let embedder = WrongDimensionEmbedder;
        let engine = orchestrator(&store, &embedder);

        let outcome = engine.search(&SearchRequest::new("invoice", "17.0", SearchMode::Vector));
        assert!(matches!(
            outcome,
            SearchOutcome::Invalid(ValidationError::EmbeddingDimension { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn hybrid_orders_by_fused_rank_and_reports_traces() {
        let store = two_method_store();
        let embedder = FixedEmbedder::new(vec![1.0, 0.0]);
        let engine = orchestrator(&store, &embedder);

        let outcome = engine.search(&SearchRequest::new("invoice", "17.0", SearchMode::Hybrid));
        let SearchOutcome::Ok(results) = outcome else {
            panic!("hybrid search should succeed");
        };

        let order = results
            .items
            .iter()
            .map(|item| item.technical_name.as_str())
            .collect::<Vec<&str>>();
        assert_eq!(order, vec!["b", "a", "c"]);
        assert_eq!(results.candidates.vector, 2);
        assert_eq!(results.candidates.lexical, 3);
        assert_eq!(results.candidates.fused, 3);

        let top = &results.items[0];
        assert_eq!(top.rank, 1);
        assert_eq!(top.trace.vector_rank, Some(2));
        assert_eq!(top.trace.lexical_rank, Some(1));
        assert_eq!(top.trace.fused_rank, Some(1));
        // (1/62 + 1/61) * 3000 = 97.57..
        assert_eq!(top.score, 97);

        let c = &results.items[2];
        assert_eq!(c.trace.vector_rank, None);
        assert_eq!(c.trace.vector_distance, None);
        assert_eq!(c.trace.lexical_rank, Some(2));
        assert!(
            results
                .items
                .windows(2)
                .all(|pair| pair[0].score >= pair[1].score)
        );
    }

    #[test]
    fn vector_scores_follow_distance() {
        let store = two_method_store();
        let embedder = FixedEmbedder::new(vec![1.0, 0.0]);
        let engine = orchestrator(&store, &embedder);

        let outcome = engine.search(&SearchRequest::new("invoice", "17.0", SearchMode::Vector));
        let scores = outcome
            .results()
            .iter()
            .map(|item| (item.technical_name.as_str(), item.score))
            .collect::<Vec<(&str, u8)>>();
        assert_eq!(scores, vec![("a", 87), ("b", 75)]);
    }

    #[test]
    fn min_score_and_limit_are_applied_after_ranking() {
        let store = two_method_store();
        let embedder = FixedEmbedder::new(vec![1.0, 0.0]);
        let engine = orchestrator(&store, &embedder);

        let mut request = SearchRequest::new("invoice", "17.0", SearchMode::Lexical);
        request.min_score = 60;
        let outcome = engine.search(&request);
        assert_eq!(names(&outcome), vec!["b", "c"]);

        request.min_score = 0;
        request.limit = 1;
        let outcome = engine.search(&request);
        assert_eq!(names(&outcome), vec!["b"]);
        assert_eq!(outcome.results()[0].rank, 1);

        request.min_score = 100;
        request.limit = 10;
        let outcome = engine.search(&request);
        assert!(matches!(outcome, SearchOutcome::Ok(_)));
        assert!(outcome.results().is_empty());
    }

    #[test]
    fn dependency_filter_drops_items_missing_a_dependency() {
        let store = StubStore::new(
            Vec::new(),
            vec![
                (stub_item(1, "sale_margin", "17.0", &["sale"]), 4.0),
                (stub_item(2, "sale_stock_margin", "17.0", &["sale", "stock"]), 3.0),
            ],
        );
        let embedder = FixedEmbedder::new(vec![1.0, 0.0]);
        let engine = orchestrator(&store, &embedder);

        let mut request = SearchRequest::new("margin", "17.0", SearchMode::Lexical);
        request.depends = vec![" stock ".to_string(), String::new()];
        let outcome = engine.search(&request);
        assert_eq!(names(&outcome), vec!["sale_stock_margin"]);
    }
}
