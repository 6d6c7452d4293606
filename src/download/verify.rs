use super::types::Artifact;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;

/// Leftovers from interrupted attempts; never counted as artifacts.
const PARTIAL_SUFFIXES: [&str; 3] = [".part", ".ytdl", ".temp"];

/// Lists the non-empty plain files in the destination directory.
///
/// Subdirectories, zero-byte files, and partial-download debris are
/// ignored. An empty result set means the claimed success produced nothing
/// worth keeping.
pub fn verify(destination_dir: &Path) -> Result<BTreeSet<Artifact>> {
    let entries = std::fs::read_dir(destination_dir).with_context(|| {
        format!(
            "Failed to read destination directory {}",
            destination_dir.display()
        )
    })?;

    let mut artifacts = BTreeSet::new();
    for entry in entries {
        let entry = entry.context("Failed to read directory entry")?;
        let metadata = entry
            .metadata()
            .with_context(|| format!("Failed to stat {}", entry.path().display()))?;

        if !metadata.is_file() || metadata.len() == 0 {
            continue;
        }

        let filename = entry.file_name().to_string_lossy().into_owned();
        if PARTIAL_SUFFIXES.iter().any(|s| filename.ends_with(s)) {
            continue;
        }

        artifacts.insert(Artifact {
            filename,
            size_bytes: metadata.len(),
        });
    }

    Ok(artifacts)
}
