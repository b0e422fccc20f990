use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use walkdir::WalkDir;

use super::model::ImageId;
use super::record::IndexState;
use crate::config::IndexerConfig;

// ---------------------------------------------------------------------------
// Manifests – lists of (id, filename) handed over by the upload side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestRecord {
    pub id: ImageId,
    pub filename: String,
}

/// Load an upload manifest. Dispatch by extension.
///
/// Supported formats:
/// * `.csv`  – header `id,filename`, one image per row
/// * `.json` – `[{ "id": 1, "filename": "0001 UD.tif" }, ...]`
pub fn load_manifest(path: &Path) -> Result<Vec<ManifestRecord>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let records = match ext.as_str() {
        "csv" => load_csv_manifest(path)?,
        "json" => load_json_manifest(path)?,
        other => bail!("Unsupported manifest extension: .{other}"),
    };
    info!("{}: {} manifest rows", path.display(), records.len());
    Ok(records)
}

fn load_csv_manifest(path: &Path) -> Result<Vec<ManifestRecord>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV manifest")?;
    reader
        .deserialize::<ManifestRecord>()
        .enumerate()
        .map(|(row, record)| record.with_context(|| format!("CSV manifest row {row}")))
        .collect()
}

fn load_json_manifest(path: &Path) -> Result<Vec<ManifestRecord>> {
    let text = std::fs::read_to_string(path).context("reading JSON manifest")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let rows = root.as_array().context("Expected top-level JSON array")?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let obj = row
                .as_object()
                .with_context(|| format!("Row {i} is not a JSON object"))?;
            let id = obj
                .get("id")
                .and_then(JsonValue::as_u64)
                .with_context(|| format!("Row {i}: missing or invalid 'id'"))?;
            let filename = obj
                .get("filename")
                .and_then(JsonValue::as_str)
                .with_context(|| format!("Row {i}: missing or invalid 'filename'"))?;
            Ok(ManifestRecord {
                id: ImageId(id),
                filename: filename.to_string(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Directory scan
// ---------------------------------------------------------------------------

/// Image files under `dir` with a configured extension, sorted by path.
pub fn scan_directory(dir: &Path, config: &IndexerConfig) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let max_depth = if config.recursive_scan { usize::MAX } else { 1 };

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).max_depth(max_depth).follow_links(true) {
        let entry = entry.with_context(|| format!("walking {}", dir.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        if config.is_supported(path) {
            files.push(path.to_path_buf());
        } else {
            debug!("skipping {}", path.display());
        }
    }
    files.sort();
    info!("{}: {} image files", dir.display(), files.len());
    Ok(files)
}

// ---------------------------------------------------------------------------
// Index state files
// ---------------------------------------------------------------------------

pub fn save_state(path: &Path, state: &IndexState) -> Result<()> {
    let json = serde_json::to_string_pretty(state).context("serializing index state")?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    info!("saved index to {}", path.display());
    Ok(())
}

pub fn load_state(path: &Path) -> Result<IndexState> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing index state {}", path.display()))
}

/// Like [`load_state`], but a missing file is an empty index.
pub fn load_state_or_default(path: &Path) -> Result<IndexState> {
    if path.exists() {
        load_state(path)
    } else {
        Ok(IndexState::default())
    }
}
