//! Hybrid retrieval: vector and lexical stages, rank fusion and the
//! multi-mode orchestrator that scores, thresholds and truncates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::CorpusItem;

mod error;
mod fusion;
mod orchestrator;
mod scoring;
mod stages;
mod strategy;
#[cfg(test)]
pub(crate) mod test_support;

pub use self::error::{CandidateCounts, Diagnostic, SearchOutcome, ValidationError};
pub use self::fusion::{DEFAULT_RRF_K, RrfK};
pub use self::orchestrator::{
    DEFAULT_HYBRID_CALIBRATION, DEFAULT_LEXICAL_MULTIPLIER, DEFAULT_TOP_CANDIDATES, SearchConfig,
    SearchOrchestrator,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Vector,
    #[serde(alias = "bm25")]
    Lexical,
    Hybrid,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Lexical => "lexical",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "vector" => Ok(Self::Vector),
            "lexical" | "bm25" => Ok(Self::Lexical),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(ValidationError::UnknownMode(value.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub version: String,
    pub depends: Vec<String>,
    pub limit: usize,
    pub min_score: u32,
    pub mode: SearchMode,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, version: impl Into<String>, mode: SearchMode) -> Self {
        Self {
            query: query.into(),
            version: version.into(),
            depends: Vec::new(),
            limit: 10,
            min_score: 0,
            mode,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.query.trim().is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        if self.version.trim().is_empty() {
            return Err(ValidationError::MissingVersion);
        }
        if self.limit == 0 {
            return Err(ValidationError::ZeroLimit);
        }
        if self.min_score > 100 {
            return Err(ValidationError::MinScoreOutOfRange(self.min_score));
        }
        Ok(())
    }
}

/// Where a result came from in each ranking. Absent methods stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankTrace {
    pub vector_rank: Option<usize>,
    pub vector_distance: Option<f64>,
    pub lexical_rank: Option<usize>,
    pub lexical_score: Option<f64>,
    pub fused_score: Option<f64>,
    pub fused_rank: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredItem {
    pub rank: usize,
    pub score: u8,
    pub item_id: i64,
    pub technical_name: String,
    pub name: String,
    pub summary: String,
    pub version: String,
    pub depends: Vec<String>,
    pub popularity: i64,
    pub trace: RankTrace,
}

impl ScoredItem {
    fn new(item: CorpusItem, score: u8, trace: RankTrace) -> Self {
        Self {
            rank: 0,
            score,
            item_id: item.item_id,
            technical_name: item.technical_name,
            name: item.name,
            summary: item.summary,
            version: item.version,
            depends: item.depends,
            popularity: item.popularity,
            trace,
        }
    }
}
