//! TOML configuration for the `trag` binary.
//!
//! Every field except `build.root` and `index.persist_dir` has a default,
//! and both of those can be supplied on the command line instead.
//!
//! ```toml
//! [build]
//! root = "./data"
//!
//! [chunking]
//! chunk_size = 512
//! chunk_overlap = 200
//!
//! [tables]
//! cell_join = "flatten"
//!
//! [index]
//! persist_dir = "./index"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use table_rag_core::models::MetadataKeys;
use table_rag_core::table::CellJoin;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub tables: TablesConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub metadata: MetadataKeys,
    #[serde(default)]
    pub index: IndexConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BuildConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_archive_extension")]
    pub archive_extension: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            root: None,
            archive_extension: default_archive_extension(),
        }
    }
}

fn default_archive_extension() -> String {
    "zip".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    512
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImagesConfig {
    #[serde(default = "default_images_enabled")]
    pub enabled: bool,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            enabled: default_images_enabled(),
        }
    }
}

fn default_images_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TablesConfig {
    #[serde(default)]
    pub cell_join: CellJoin,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RenderConfig {
    /// TrueType font embedded in synthetic documents. Helvetica when unset.
    #[serde(default)]
    pub font_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IndexConfig {
    #[serde(default)]
    pub persist_dir: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }

        let ext = self.build.archive_extension.trim();
        if ext.is_empty() || ext.contains('.') || ext.contains('/') {
            bail!(
                "build.archive_extension must be a bare extension like 'zip', got '{}'",
                self.build.archive_extension
            );
        }

        let keys = &self.metadata;
        let names = [&keys.document_id, &keys.page, &keys.kind, &keys.table_markup];
        if names.iter().any(|k| k.trim().is_empty()) {
            bail!("metadata key names must not be empty");
        }
        for (i, a) in names.iter().enumerate() {
            if names[i + 1..].contains(a) {
                bail!("metadata key '{}' is used for more than one field", a);
            }
        }

        Ok(())
    }
}
