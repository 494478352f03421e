use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::benchmark::{DEFAULT_BENCHMARK_LIMIT, DEFAULT_MIN_P3_IMPROVEMENT};
use crate::search::{
    DEFAULT_HYBRID_CALIBRATION, DEFAULT_LEXICAL_MULTIPLIER, DEFAULT_RRF_K, DEFAULT_TOP_CANDIDATES,
    RrfK, SearchConfig, SearchMode,
};
use crate::semantic::{
    DEFAULT_EMBEDDING_DIM, DEFAULT_MODEL_ID, LocalHashEmbedder, resolve_model_config,
};

#[derive(Parser, Debug)]
#[command(
    name = "modfinder",
    version,
    about = "Hybrid add-on module search and retrieval benchmarking"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a corpus snapshot into the local store.
    Load(LoadArgs),
    /// Run one search against the local store.
    Search(SearchArgs),
    /// Score a labeled query set and persist a report snapshot.
    Benchmark(BenchmarkArgs),
    /// Compare two persisted benchmark reports.
    Compare(CompareArgs),
    /// Check that every expected module in a query set exists in the store.
    CheckExpected(CheckExpectedArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, default_value = ".cache/modfinder")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

impl StoreArgs {
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.cache_root.join("corpus.sqlite"))
    }
}

#[derive(Args, Debug, Clone)]
pub struct EmbeddingArgs {
    #[arg(long, default_value = DEFAULT_MODEL_ID)]
    pub model_id: String,

    #[arg(long, default_value_t = DEFAULT_EMBEDDING_DIM)]
    pub embedding_dim: usize,
}

impl EmbeddingArgs {
    pub fn embedder(&self) -> LocalHashEmbedder {
        LocalHashEmbedder::new(resolve_model_config(&self.model_id, self.embedding_dim))
    }
}

#[derive(Args, Debug, Clone)]
pub struct SearchTuningArgs {
    /// Candidates fetched per retrieval method before fusion.
    #[arg(long, default_value_t = DEFAULT_TOP_CANDIDATES)]
    pub top_candidates: usize,

    #[arg(long, default_value_t = DEFAULT_RRF_K)]
    pub rrf_k: u32,

    #[arg(long, default_value_t = DEFAULT_LEXICAL_MULTIPLIER)]
    pub lexical_multiplier: f64,

    /// Scale applied to fused RRF scores before clamping to 0..=100.
    #[arg(long, default_value_t = DEFAULT_HYBRID_CALIBRATION)]
    pub hybrid_calibration: f64,
}

impl SearchTuningArgs {
    pub fn search_config(&self) -> Result<SearchConfig> {
        Ok(SearchConfig {
            top_candidates: self.top_candidates.max(1),
            rrf_k: RrfK::new(self.rrf_k)?,
            lexical_multiplier: self.lexical_multiplier,
            hybrid_calibration: self.hybrid_calibration,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub embedding: EmbeddingArgs,

    /// Corpus snapshot JSON (`{"items": [...]}`).
    #[arg(long)]
    pub corpus_path: PathBuf,

    #[arg(long)]
    pub load_manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub embedding: EmbeddingArgs,

    #[command(flatten)]
    pub tuning: SearchTuningArgs,

    #[arg(long)]
    pub query: String,

    #[arg(long)]
    pub target_version: String,

    /// Required dependencies; results must depend on all of them.
    #[arg(long = "depends", value_delimiter = ',')]
    pub depends: Vec<String>,

    /// vector, lexical (alias bm25) or hybrid.
    #[arg(long, value_parser = SearchMode::from_str, default_value_t = SearchMode::Hybrid)]
    pub mode: SearchMode,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    #[arg(long, default_value_t = 0)]
    pub min_score: u32,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BenchmarkArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub embedding: EmbeddingArgs,

    #[command(flatten)]
    pub tuning: SearchTuningArgs,

    #[arg(long)]
    pub queries_path: Option<PathBuf>,

    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// vector, lexical (alias bm25) or hybrid.
    #[arg(long, value_parser = SearchMode::from_str, default_value_t = SearchMode::Hybrid)]
    pub mode: SearchMode,

    #[arg(long, default_value_t = DEFAULT_BENCHMARK_LIMIT)]
    pub limit: usize,

    /// Run query cases on the rayon pool; report order is unchanged.
    #[arg(long, default_value_t = false)]
    pub parallel: bool,
}

impl BenchmarkArgs {
    pub fn resolved_queries_path(&self) -> PathBuf {
        self.queries_path
            .clone()
            .unwrap_or_else(|| self.store.cache_root.join("benchmark_queries.json"))
    }

    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.store.cache_root.join("benchmarks"))
    }
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    #[arg(long)]
    pub baseline: PathBuf,

    #[arg(long)]
    pub candidate: PathBuf,

    #[arg(long, default_value_t = DEFAULT_MIN_P3_IMPROVEMENT)]
    pub min_p3_improvement: f64,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CheckExpectedArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub queries_path: Option<PathBuf>,
}

impl CheckExpectedArgs {
    pub fn resolved_queries_path(&self) -> PathBuf {
        self.queries_path
            .clone()
            .unwrap_or_else(|| self.store.cache_root.join("benchmark_queries.json"))
    }
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;
    use crate::search::ValidationError;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn search_defaults_to_hybrid_with_standard_tuning() {
        let cli = Cli::try_parse_from([
            "modfinder",
            "search",
            "--query",
            "electronic invoicing",
            "--target-version",
            "17.0",
            "--depends",
            "account,l10n_es",
        ])
        .expect("search args should parse");

        let Commands::Search(args) = cli.command else {
            panic!("expected search command");
        };
        assert_eq!(args.mode, SearchMode::Hybrid);
        assert_eq!(args.depends, vec!["account", "l10n_es"]);
        assert_eq!(
            args.store.resolved_db_path(),
            PathBuf::from(".cache/modfinder/corpus.sqlite")
        );

        let config = args.tuning.search_config().expect("default tuning");
        assert_eq!(config, SearchConfig::default());
    }

    #[test]
    fn bm25_is_accepted_as_a_mode_alias() {
        let cli = Cli::try_parse_from(["modfinder", "benchmark", "--mode", "bm25", "--parallel"])
            .expect("benchmark args should parse");
        let Commands::Benchmark(args) = cli.command else {
            panic!("expected benchmark command");
        };
        assert_eq!(args.mode, SearchMode::Lexical);
        assert!(args.parallel);
    }

    #[test]
    fn unknown_mode_is_rejected_with_the_validation_message() {
        let error = Cli::try_parse_from(["modfinder", "benchmark", "--mode", "semantic"])
            .expect_err("unknown mode should not parse");
        assert_eq!(error.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(
            error
                .to_string()
                .contains(&ValidationError::UnknownMode("semantic".to_string()).to_string())
        );
    }

    #[test]
    fn zero_rrf_k_is_rejected_when_building_config() {
        let tuning = SearchTuningArgs {
            top_candidates: 50,
            rrf_k: 0,
            lexical_multiplier: 10.0,
            hybrid_calibration: 3000.0,
        };
        assert!(tuning.search_config().is_err());
    }
}
