use crate::model::CorpusItem;
use crate::semantic::{EmbeddingError, EmbeddingProvider};
use crate::store::{CorpusFilter, CorpusStore, StoreError, StoreHit};

pub(crate) fn stub_item(
    item_id: i64,
    technical_name: &str,
    version: &str,
    depends: &[&str],
) -> CorpusItem {
    CorpusItem {
        item_id,
        technical_name: technical_name.to_string(),
        name: technical_name.replace('_', " "),
        summary: String::new(),
        version: version.to_string(),
        depends: depends.iter().map(|value| value.to_string()).collect(),
        popularity: 0,
        searchable_text: technical_name.to_string(),
    }
}

/// Returns canned rows verbatim, ignoring filter and query.
pub(crate) struct StubStore {
    vector: Vec<(CorpusItem, f64)>,
    lexical: Vec<(CorpusItem, f64)>,
    fail: bool,
}

impl StubStore {
    pub(crate) fn new(vector: Vec<(CorpusItem, f64)>, lexical: Vec<(CorpusItem, f64)>) -> Self {
        Self {
            vector,
            lexical,
            fail: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            vector: Vec::new(),
            lexical: Vec::new(),
            fail: true,
        }
    }

    fn rows(&self, rows: &[(CorpusItem, f64)]) -> Result<Vec<StoreHit>, StoreError> {
        if self.fail {
            return Err(StoreError::Uninitialized("stub store offline".to_string()));
        }
        Ok(rows
            .iter()
            .map(|(item, score)| StoreHit {
                item: item.clone(),
                score: *score,
            })
            .collect())
    }
}

impl CorpusStore for StubStore {
    fn vector_candidates(
        &self,
        _filter: &CorpusFilter,
        _embedding: &[f32],
        _limit: usize,
    ) -> Result<Vec<StoreHit>, StoreError> {
        self.rows(&self.vector)
    }

    fn lexical_candidates(
        &self,
        _filter: &CorpusFilter,
        _query_text: &str,
        _limit: usize,
    ) -> Result<Vec<StoreHit>, StoreError> {
        self.rows(&self.lexical)
    }
}

pub(crate) struct FixedEmbedder {
    vector: Vec<f32>,
}

impl FixedEmbedder {
    pub(crate) fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }
}

impl EmbeddingProvider for FixedEmbedder {
    fn model_id(&self) -> &str {
        "fixed"
    }

    fn dimensions(&self) -> usize {
        self.vector.len()
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.vector.clone())
    }
}

pub(crate) struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn model_id(&self) -> &str {
        "failing"
    }

    fn dimensions(&self) -> usize {
        4
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Unavailable("model not loaded".to_string()))
    }
}

/// Claims four dimensions but produces three.
pub(crate) struct WrongDimensionEmbedder;

impl EmbeddingProvider for WrongDimensionEmbedder {
    fn model_id(&self) -> &str {
        "wrong-dimension"
    }

    fn dimensions(&self) -> usize {
        4
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(vec![0.5, 0.5, 0.5])
    }
}
