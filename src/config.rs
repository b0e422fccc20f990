use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

/// Extensions accepted when scanning folders, lowercase and without the dot.
pub const DEFAULT_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp"];

/// Settings read from `indexer.toml`. Every key is optional.
///
/// ```toml
/// supported_extensions = ["tif", "tiff", "png"]
/// state_file = "image_index.json"
/// recursive_scan = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub supported_extensions: Vec<String>,
    /// Where the index is saved between runs.
    pub state_file: PathBuf,
    pub recursive_scan: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        IndexerConfig {
            supported_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            state_file: PathBuf::from("image_index.json"),
            recursive_scan: true,
        }
    }
}

impl IndexerConfig {
    /// Read a TOML config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: IndexerConfig = toml::from_str(text).context("invalid TOML")?;
        for ext in &mut config.supported_extensions {
            *ext = ext.trim_start_matches('.').to_ascii_lowercase();
        }
        Ok(config)
    }

    /// Whether `path` has one of the configured image extensions.
    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| self.supported_extensions.iter().any(|s| *s == e))
    }
}
