use std::collections::BTreeSet;
use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::CheckExpectedArgs;
use crate::model::{QueryCase, QueryCaseManifest};
use crate::store::SqliteCorpusStore;
use crate::util::read_json;

#[derive(Debug, Clone, PartialEq, Eq)]
struct MissingModule {
    query_id: String,
    version: String,
    technical_name: String,
}

pub fn run(args: CheckExpectedArgs) -> Result<()> {
    let queries_path = args.resolved_queries_path();
    let db_path = args.store.resolved_db_path();

    let manifest: QueryCaseManifest = read_json(&queries_path)?;
    let store = SqliteCorpusStore::open(&db_path)
        .with_context(|| format!("failed to open corpus store {}", db_path.display()))?;

    let missing = find_missing(&manifest.benchmark_queries, |name, version| {
        store.contains_module(name, version)
    })?;
    let checked = manifest
        .benchmark_queries
        .iter()
        .map(|case| case.expected_modules.len())
        .sum::<usize>();
    info!(
        cases = manifest.benchmark_queries.len(),
        checked,
        missing = missing.len(),
        "checked expected modules"
    );

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "Expected modules checked: {checked}")?;
    writeln!(output, "Missing: {}", missing.len())?;
    for entry in &missing {
        writeln!(
            output,
            "  {}: {}@{}",
            entry.query_id, entry.technical_name, entry.version
        )?;
    }
    output.flush()?;

    if !missing.is_empty() {
        let distinct = missing
            .iter()
            .map(|entry| (entry.technical_name.as_str(), entry.version.as_str()))
            .collect::<BTreeSet<(&str, &str)>>();
        warn!(distinct = distinct.len(), "expected modules missing from store");
        bail!("{} expected modules are missing from the store", distinct.len());
    }
    Ok(())
}

fn find_missing<F, E>(cases: &[QueryCase], mut exists: F) -> Result<Vec<MissingModule>, E>
where
    F: FnMut(&str, &str) -> Result<bool, E>,
{
    let mut missing = Vec::new();
    for case in cases {
        for technical_name in &case.expected_modules {
            if !exists(technical_name, &case.version)? {
                missing.push(MissingModule {
                    query_id: case.id.clone(),
                    version: case.version.clone(),
                    technical_name: technical_name.clone(),
                });
            }
        }
    }
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use crate::model::Difficulty;

    #[test]
    fn reports_each_missing_module_with_its_query() {
        let cases = vec![QueryCase {
            id: "Q7".to_string(),
            query: "margin".to_string(),
            version: "16.0".to_string(),
            category: "sales".to_string(),
            difficulty: Difficulty::Easy,
            expected_modules: vec!["sale_margin".to_string(), "sale_ghost".to_string()],
        }];

        let missing = find_missing(&cases, |name, version| {
            Ok::<bool, Infallible>(name == "sale_margin" && version == "16.0")
        })
        .expect("lookup cannot fail");

        assert_eq!(
            missing,
            vec![MissingModule {
                query_id: "Q7".to_string(),
                version: "16.0".to_string(),
                technical_name: "sale_ghost".to_string(),
            }]
        );
    }
}
