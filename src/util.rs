use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

const MAX_SNAPSHOT_SUFFIX: usize = 1000;

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn utc_file_stamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%d_%H%M%S").to_string()
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

pub fn sha256_text(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let data = serialize_json(path, value)?;
    let mut file = File::create(path)
        .with_context(|| format!("failed to create json file: {}", path.display()))?;
    finish_json_file(&mut file, path, &data)
}

/// Writes `value` to `<dir>/<stem>.json` without ever replacing an existing
/// file. On a name collision `-1`, `-2`, ... is appended to the stem.
pub fn write_json_snapshot<T: Serialize>(dir: &Path, stem: &str, value: &T) -> Result<PathBuf> {
    ensure_directory(dir)?;
    let data = serialize_json(dir, value)?;

    for attempt in 0..MAX_SNAPSHOT_SUFFIX {
        let filename = if attempt == 0 {
            format!("{stem}.json")
        } else {
            format!("{stem}-{attempt}.json")
        };
        let path = dir.join(filename);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to create snapshot: {}", path.display()));
            }
        };
        finish_json_file(&mut file, &path, &data)?;
        return Ok(path);
    }

    bail!(
        "no free snapshot name for {} in {}",
        stem,
        dir.display()
    )
}

fn serialize_json<T: Serialize>(path: &Path, value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))
}

fn finish_json_file(file: &mut File, path: &Path, data: &[u8]) -> Result<()> {
    file.write_all(data)
        .with_context(|| format!("failed to write json file: {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("failed to finalize json file: {}", path.display()))?;
    Ok(())
}
