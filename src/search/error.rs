use serde::Serialize;
use thiserror::Error;

use super::ScoredItem;
use crate::semantic::EmbeddingError;
use crate::store::StoreError;

/// Caller mistakes. Reported immediately and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("query text must not be empty")]
    EmptyQuery,
    #[error("target version must not be empty")]
    MissingVersion,
    #[error("result limit must be at least 1")]
    ZeroLimit,
    #[error("minimum score {0} is outside 0..=100")]
    MinScoreOutOfRange(u32),
    #[error("unknown search mode '{0}' (expected vector, lexical or hybrid)")]
    UnknownMode(String),
    #[error("rrf k must be greater than zero")]
    InvalidRrfK,
    #[error("embedding has {actual} dimensions, expected {expected}")]
    EmbeddingDimension { expected: usize, actual: usize },
}

/// Failures of the embedding provider or corpus store.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("corpus store failed: {0}")]
    Store(#[from] StoreError),
}

impl RetrievalError {
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Embedding(_) => "embedding",
            Self::Store(_) => "corpus_store",
        }
    }
}

#[derive(Debug, Error)]
pub(super) enum SearchError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
}

impl From<EmbeddingError> for SearchError {
    fn from(value: EmbeddingError) -> Self {
        Self::Retrieval(value.into())
    }
}

impl From<StoreError> for SearchError {
    fn from(value: StoreError) -> Self {
        Self::Retrieval(value.into())
    }
}

/// Why a search came back empty without being the caller's fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub stage: String,
    pub message: String,
}

impl Diagnostic {
    pub fn from_retrieval(error: &RetrievalError) -> Self {
        Self {
            stage: error.stage().to_string(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CandidateCounts {
    pub vector: usize,
    pub lexical: usize,
    pub fused: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub items: Vec<ScoredItem>,
    pub candidates: CandidateCounts,
    pub duration_ms: f64,
}

/// Result of one orchestrated search.
///
/// `Degraded` means the retrieval subsystem failed and nothing could be
/// ranked; it is never produced for a query that simply matched nothing.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Ok(SearchResults),
    Degraded { diagnostic: Diagnostic },
    Invalid(ValidationError),
}

impl SearchOutcome {
    pub fn results(&self) -> &[ScoredItem] {
        match self {
            Self::Ok(results) => &results.items,
            Self::Degraded { .. } | Self::Invalid(_) => &[],
        }
    }

    pub fn failure_message(&self) -> Option<String> {
        match self {
            Self::Ok(_) => None,
            Self::Degraded { diagnostic } => {
                Some(format!("{} degraded: {}", diagnostic.stage, diagnostic.message))
            }
            Self::Invalid(error) => Some(format!("invalid request: {error}")),
        }
    }
}
