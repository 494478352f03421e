//! Read-only corpus access for the retrieval stages.
//!
//! The search engine only talks to [`CorpusStore`]; [`SqliteCorpusStore`] is
//! the bundled implementation and [`CorpusWriter`] populates it.

use thiserror::Error;

use crate::model::CorpusItem;

mod schema;
mod sqlite;
mod writer;

pub use self::schema::DB_SCHEMA_VERSION;
pub use self::sqlite::{SqliteCorpusStore, StoreStatus, VersionStatus};
pub use self::writer::{CorpusWriter, PreparedItem};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid lexical pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("corrupt row for item {item_id}: {reason}")]
    CorruptRow { item_id: i64, reason: String },
    #[error("corpus store not initialized: {0}")]
    Uninitialized(String),
}

/// Structural filters applied before any ranking happens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusFilter {
    /// Exact match on the item's target version.
    pub version: String,
    /// Items must depend on every name listed here. Empty means no constraint.
    pub depends: Vec<String>,
}

impl CorpusFilter {
    pub fn new(version: impl Into<String>, depends: Vec<String>) -> Self {
        Self {
            version: version.into(),
            depends,
        }
    }

    pub fn accepts(&self, item: &CorpusItem) -> bool {
        item.version == self.version
            && self
                .depends
                .iter()
                .all(|wanted| item.depends.iter().any(|have| have == wanted))
    }
}

/// A candidate returned by the store, in store order.
///
/// `score` is the cosine distance (lower is closer) for vector queries and the
/// lexical relevance (higher is better) for text queries.
#[derive(Debug, Clone)]
pub struct StoreHit {
    pub item: CorpusItem,
    pub score: f64,
}

pub trait CorpusStore: Send + Sync {
    /// Up to `limit` items passing `filter`, ordered by ascending cosine
    /// distance to `embedding`.
    fn vector_candidates(
        &self,
        filter: &CorpusFilter,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<StoreHit>, StoreError>;

    /// Up to `limit` items passing `filter`, ordered by descending lexical
    /// relevance to `query_text`.
    fn lexical_candidates(
        &self,
        filter: &CorpusFilter,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<StoreHit>, StoreError>;
}
