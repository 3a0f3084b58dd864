use anyhow::{Context, Result};
use chrono::DateTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::cache::write_atomic;
use crate::models::Digest;

/// Where saved digests live, created on first use
pub fn get_default_digests_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .context("Could not determine local data directory")?
        .join("newsbreeze")
        .join("digests");

    fs::create_dir_all(&data_dir).context("Failed to create digests directory")?;

    Ok(data_dir)
}

/// Write a digest into `dir` as pretty JSON and return its path
pub fn save_digest(data: &Digest, dir: &Path, filename: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).context("Failed to create digests directory")?;
    let filepath = dir.join(filename);

    let json = serde_json::to_string_pretty(data).context("Failed to serialize digest")?;

    write_atomic(&filepath, json.as_bytes()).context("Failed to write digest file")?;

    Ok(filepath)
}

/// Read a digest back, rejecting unknown versions and empty article lists
pub fn load_digest(filepath: &Path) -> Result<Digest> {
    if !filepath.exists() {
        anyhow::bail!("Digest file not found: {}", filepath.display());
    }

    let content = fs::read_to_string(filepath)
        .with_context(|| format!("Failed to read digest file: {}", filepath.display()))?;

    let data: Digest = serde_json::from_str(&content).with_context(|| {
        format!(
            "Failed to parse digest JSON from {}. The file may be corrupted or not a valid digest file.",
            filepath.display()
        )
    })?;

    if data.version != "1.0" {
        anyhow::bail!(
            "Unsupported digest file version: {}. Expected 1.0. Please regenerate it with fetch-news.",
            data.version
        );
    }

    if data.articles.is_empty() {
        anyhow::bail!(
            "Digest file {} contains no articles. The file may be incomplete.",
            filepath.display()
        );
    }

    Ok(data)
}

/// Every readable digest in `dir`, newest first; unreadable files are logged and skipped
pub fn list_digest_files(dir: &Path) -> Result<Vec<(PathBuf, Digest)>> {
    let mut files = Vec::new();

    if dir.exists() {
        for entry in fs::read_dir(dir).context("Failed to read digests directory")? {
            let path = entry?.path();

            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                match load_digest(&path) {
                    Ok(data) => files.push((path, data)),
                    Err(e) => warn!("Could not load {}: {}", path.display(), e),
                }
            }
        }
    }

    files.sort_by(|a, b| {
        let time_a = DateTime::parse_from_rfc3339(&a.1.created_at).ok();
        let time_b = DateTime::parse_from_rfc3339(&b.1.created_at).ok();
        time_b.cmp(&time_a)
    });

    Ok(files)
}
