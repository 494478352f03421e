use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One add-on module as it appears in a corpus snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusItemInput {
    pub technical_name: String,
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default, alias = "github_stars")]
    pub popularity: i64,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusSnapshot {
    pub items: Vec<CorpusItemInput>,
}

/// A stored corpus item. Immutable for the duration of a search call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusItem {
    pub item_id: i64,
    pub technical_name: String,
    pub name: String,
    pub summary: String,
    pub version: String,
    pub depends: Vec<String>,
    pub popularity: i64,
    #[serde(skip)]
    pub searchable_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labeled benchmark query with its ground-truth module names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryCase {
    pub id: String,
    pub query: String,
    pub version: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub expected_modules: Vec<String>,
}

impl QueryCase {
    pub fn expected_set(&self) -> HashSet<String> {
        self.expected_modules.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryCaseManifest {
    pub benchmark_queries: Vec<QueryCase>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub source_path: String,
    pub db_path: String,
    pub db_schema_version: String,
    pub model_id: String,
    pub embedding_dim: usize,
    pub items_read: usize,
    pub items_upserted: usize,
    pub embeddings_computed: usize,
    pub embeddings_supplied: usize,
    pub duration_ms: u128,
    pub warnings: Vec<String>,
}
